//! Schema nodes: the output of the node translator.

use crate::{NodeId, Type, Value};

/// One schema node: a file, type, constant, or annotation declaration,
/// fully translated.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub id: NodeId,
    /// Fully qualified name, e.g. `addressbook.weft:Person.employment`.
    pub display_name: String,
    /// Byte length of the prefix of `display_name` up to and including the
    /// separator before the local name.
    pub display_name_prefix_len: u32,
    /// Id of the lexically enclosing node.
    pub scope_id: NodeId,
    pub annotations: Vec<Annotation>,
    pub body: NodeBody,
}

impl Node {
    pub fn new(id: NodeId, scope_id: NodeId, display_name: String, local_name_len: usize) -> Self {
        let prefix = display_name.len().saturating_sub(local_name_len) as u32;
        Node {
            id,
            display_name,
            display_name_prefix_len: prefix,
            scope_id,
            annotations: Vec::new(),
            body: NodeBody::File,
        }
    }

    /// The unqualified name this node was declared with.
    pub fn local_name(&self) -> &str {
        &self.display_name[self.display_name_prefix_len as usize..]
    }

    pub fn as_struct(&self) -> Option<&StructNode> {
        match &self.body {
            NodeBody::Struct(s) => Some(s),
            _ => None,
        }
    }
}

/// Kind-specific payload of a node.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeBody {
    File,
    Struct(StructNode),
    Enum(Vec<Enumerant>),
    Interface,
    Const(ConstNode),
    Annotation(AnnotationNode),
}

/// A struct (or group) node with its complete layout.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct StructNode {
    /// Size of the data section in 64-bit words.
    pub data_words: u16,
    /// Size of the pointer section in slots.
    pub pointer_count: u16,
    pub preferred_encoding: ElementSize,
    /// Groups share their enclosing struct's storage rather than owning any.
    pub is_group: bool,
    /// Number of fields in this scope's union; zero if there is none.
    pub discriminant_count: u16,
    /// Position of the 16-bit union tag, as a multiple of 16 bits.
    pub discriminant_offset: u32,
    /// Fields in the order their layout was first decided.
    pub fields: Vec<Field>,
}

impl StructNode {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// One field record within a struct node.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub name: String,
    /// Position among same-scope siblings in declaration order.
    pub code_order: u32,
    /// The field's stable 16-bit ordinal.
    pub ordinal: u16,
    /// The union tag value selecting this field, if it is a union member.
    pub discriminant_value: Option<u16>,
    pub annotations: Vec<Annotation>,
    pub slot: FieldSlot,
}

/// Where a field's content lives.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldSlot {
    /// An ordinary value field. `offset` is a multiple of the field's own
    /// size for data fields, a slot index for pointer fields, and zero for
    /// void fields.
    Regular {
        ty: Type,
        default_value: Value,
        offset: u32,
    },
    /// A named group or union; content described by the referenced node.
    Group { type_id: NodeId },
}

/// One member of an enum node, in ordinal order.
#[derive(Clone, Debug, PartialEq)]
pub struct Enumerant {
    pub name: String,
    pub code_order: u32,
    pub annotations: Vec<Annotation>,
}

/// A constant node.
#[derive(Clone, Debug, PartialEq)]
pub struct ConstNode {
    pub ty: Type,
    pub value: Value,
}

/// An annotation declaration node.
#[derive(Clone, Debug, PartialEq)]
pub struct AnnotationNode {
    pub ty: Type,
    pub targets: Targets,
}

/// An annotation applied to a declaration.
#[derive(Clone, Debug, PartialEq)]
pub struct Annotation {
    pub id: NodeId,
    pub value: Value,
}

/// The most compact per-element representation usable when many instances
/// of a struct are stored in a list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ElementSize {
    Empty,
    Bit,
    Byte,
    TwoBytes,
    FourBytes,
    EightBytes,
    Pointer,
    #[default]
    InlineComposite,
}

impl std::fmt::Display for ElementSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ElementSize::Empty => "empty",
            ElementSize::Bit => "bit",
            ElementSize::Byte => "byte",
            ElementSize::TwoBytes => "two-bytes",
            ElementSize::FourBytes => "four-bytes",
            ElementSize::EightBytes => "eight-bytes",
            ElementSize::Pointer => "pointer",
            ElementSize::InlineComposite => "inline-composite",
        };
        f.write_str(name)
    }
}

/// Set of declaration kinds an annotation may be applied to.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[repr(transparent)]
pub struct Targets(pub u16);

impl Targets {
    pub const NONE: Targets = Targets(0);
    pub const FILE: Targets = Targets(1 << 0);
    pub const CONST: Targets = Targets(1 << 1);
    pub const ENUM: Targets = Targets(1 << 2);
    pub const ENUMERANT: Targets = Targets(1 << 3);
    pub const STRUCT: Targets = Targets(1 << 4);
    pub const FIELD: Targets = Targets(1 << 5);
    pub const UNION: Targets = Targets(1 << 6);
    pub const GROUP: Targets = Targets(1 << 7);
    pub const INTERFACE: Targets = Targets(1 << 8);
    pub const METHOD: Targets = Targets(1 << 9);
    pub const ANNOTATION: Targets = Targets(1 << 10);
    pub const ALL: Targets = Targets((1 << 11) - 1);

    #[inline]
    pub fn contains(self, other: Targets) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for Targets {
    type Output = Targets;

    fn bitor(self, rhs: Targets) -> Targets {
        Targets(self.0 | rhs.0)
    }
}
