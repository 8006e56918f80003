//! Name resolution interface between the translator and the surrounding
//! compiler.
//!
//! The translator never walks scopes itself. It hands every [`DeclName`] to
//! the resolver, which also serves back previously translated nodes so
//! constants and annotations can be read.

use weft_schema::{Node, NodeId};

use crate::ast::{DeclKind, DeclName};

/// A builtin type name, resolved like any other name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuiltinType {
    Void,
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
    Text,
    Data,
    List,
    Any,
}

/// What a name resolved to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    Builtin(BuiltinType),
    Node { kind: DeclKind, id: NodeId },
}

/// The surrounding compiler, as seen from one node translation.
pub trait Resolver {
    /// Look up a name from the translated declaration's scope.
    ///
    /// Unresolved names are the resolver's to report; on `None` the
    /// translator stays quiet and degrades the affected value to defaults.
    fn resolve(&self, name: &DeclName) -> Option<Resolution>;

    /// The bootstrap version of a translated node: enough schema for
    /// constants and annotations to be interpreted during the first pass.
    fn resolve_bootstrap(&self, id: NodeId) -> Option<&Node>;

    /// The final version of a node, available during the finish pass.
    fn resolve_final(&self, id: NodeId) -> Option<&Node>;
}
