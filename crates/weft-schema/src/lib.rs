//! Data model for compiled Weft schemas.
//!
//! A Weft schema is a tree of [`Node`]s: one per file, struct, enum,
//! interface, constant, or annotation declaration. Struct nodes carry the
//! bit-exact layout of every field within the struct's data and pointer
//! sections; the translator in `weft-compiler` is what fills those in.
//!
//! This crate is deliberately passive: plain data with accessors, plus a
//! text [`dump`] for debugging and tests.

pub mod dump;

mod ids;
mod node;
mod ty;
mod value;

pub use ids::NodeId;
pub use node::{
    Annotation, AnnotationNode, ConstNode, ElementSize, Enumerant, Field, FieldSlot, Node,
    NodeBody, StructNode, Targets,
};
pub use ty::{FieldSize, Type};
pub use value::{ListValue, StructValue, Value};
