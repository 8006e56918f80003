//! Schema values: field defaults, constants, and annotation payloads.

use crate::{NodeId, Type};

/// A compiled value, one variant per [`Type`] shape.
///
/// Pointer-typed values are optional: `None` is the null pointer, which is
/// also the default-default for those types.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Void,
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Uint8(u8),
    Uint16(u16),
    Uint32(u32),
    Uint64(u64),
    Float32(f32),
    Float64(f64),
    Text(Option<String>),
    Data(Option<Vec<u8>>),
    List(Option<ListValue>),
    /// An enumerant, stored as its 16-bit wire value.
    Enum(u16),
    Struct(Option<StructValue>),
    Interface,
    Any,
}

/// A compiled struct literal.
#[derive(Clone, Debug, PartialEq)]
pub struct StructValue {
    pub type_id: NodeId,
    /// Assigned fields in source order; unassigned fields keep their defaults.
    pub fields: Vec<(String, Value)>,
}

/// A compiled list literal.
#[derive(Clone, Debug, PartialEq)]
pub struct ListValue {
    pub elements: Vec<Value>,
}

impl Value {
    /// The default-default: the value a field of `ty` has when no explicit
    /// default was declared, and the value errors degrade to.
    pub fn default_for(ty: &Type) -> Value {
        match ty {
            Type::Void => Value::Void,
            Type::Bool => Value::Bool(false),
            Type::Int8 => Value::Int8(0),
            Type::Int16 => Value::Int16(0),
            Type::Int32 => Value::Int32(0),
            Type::Int64 => Value::Int64(0),
            Type::Uint8 => Value::Uint8(0),
            Type::Uint16 => Value::Uint16(0),
            Type::Uint32 => Value::Uint32(0),
            Type::Uint64 => Value::Uint64(0),
            Type::Float32 => Value::Float32(0.0),
            Type::Float64 => Value::Float64(0.0),
            Type::Enum(_) => Value::Enum(0),
            Type::Text => Value::Text(None),
            Type::Data => Value::Data(None),
            Type::List(_) => Value::List(None),
            Type::Struct(_) => Value::Struct(None),
            Type::Interface(_) => Value::Interface,
            Type::Any => Value::Any,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Void => write!(f, "void"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int8(v) => write!(f, "{v}"),
            Value::Int16(v) => write!(f, "{v}"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Uint8(v) => write!(f, "{v}"),
            Value::Uint16(v) => write!(f, "{v}"),
            Value::Uint32(v) => write!(f, "{v}"),
            Value::Uint64(v) => write!(f, "{v}"),
            Value::Float32(v) => write!(f, "{v}"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::Text(Some(s)) => write!(f, "{s:?}"),
            Value::Data(Some(bytes)) => {
                write!(f, "0x[")?;
                for (i, b) in bytes.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{b:02x}")?;
                }
                write!(f, "]")
            }
            Value::Text(None) | Value::Data(None) | Value::List(None) | Value::Struct(None) => {
                write!(f, "null")
            }
            Value::List(Some(list)) => {
                write!(f, "[")?;
                for (i, element) in list.elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{element}")?;
                }
                write!(f, "]")
            }
            Value::Enum(v) => write!(f, "{v}"),
            Value::Struct(Some(value)) => {
                write!(f, "(")?;
                for (i, (name, field)) in value.fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name} = {field}")?;
                }
                write!(f, ")")
            }
            Value::Interface => write!(f, "interface"),
            Value::Any => write!(f, "null"),
        }
    }
}
