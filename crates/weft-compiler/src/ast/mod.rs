//! Parsed declarations: the input to the node translator.
//!
//! The parser (out of scope here) produces one [`Declaration`] tree per
//! top-level item. Every name and ordinal carries its source range so
//! diagnostics can point back into the file.

use rowan::TextRange;

use weft_schema::Targets;

/// A name with its source range. An unnamed union has empty text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Name {
    pub text: String,
    pub span: TextRange,
}

/// An explicit 16-bit ordinal with its source range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LocatedOrdinal {
    pub value: u16,
    pub span: TextRange,
}

/// One parsed declaration and everything nested inside it.
#[derive(Clone, Debug, PartialEq)]
pub struct Declaration {
    pub name: Name,
    pub span: TextRange,
    pub ordinal: Option<LocatedOrdinal>,
    pub body: DeclBody,
    pub nested: Vec<Declaration>,
    pub annotations: Vec<AnnotationApplication>,
}

/// Kind-specific payload of a declaration.
#[derive(Clone, Debug, PartialEq)]
pub enum DeclBody {
    File,
    Using,
    Const(ConstDecl),
    Enum,
    Enumerant,
    Struct,
    Field(FieldDecl),
    Union,
    Group,
    Interface,
    Method,
    Annotation(AnnotationDecl),
}

/// Declaration kind without payload, for permission checks and messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeclKind {
    File,
    Using,
    Const,
    Enum,
    Enumerant,
    Struct,
    Field,
    Union,
    Group,
    Interface,
    Method,
    Annotation,
}

impl DeclBody {
    pub fn kind(&self) -> DeclKind {
        match self {
            DeclBody::File => DeclKind::File,
            DeclBody::Using => DeclKind::Using,
            DeclBody::Const(_) => DeclKind::Const,
            DeclBody::Enum => DeclKind::Enum,
            DeclBody::Enumerant => DeclKind::Enumerant,
            DeclBody::Struct => DeclKind::Struct,
            DeclBody::Field(_) => DeclKind::Field,
            DeclBody::Union => DeclKind::Union,
            DeclBody::Group => DeclKind::Group,
            DeclBody::Interface => DeclKind::Interface,
            DeclBody::Method => DeclKind::Method,
            DeclBody::Annotation(_) => DeclKind::Annotation,
        }
    }
}

/// Payload of a field declaration.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldDecl {
    pub ty: TypeExpr,
    pub default_value: Option<ValueExpr>,
}

/// Payload of a constant declaration.
#[derive(Clone, Debug, PartialEq)]
pub struct ConstDecl {
    pub ty: TypeExpr,
    pub value: ValueExpr,
}

/// Payload of an annotation declaration.
#[derive(Clone, Debug, PartialEq)]
pub struct AnnotationDecl {
    pub ty: TypeExpr,
    pub targets: Targets,
}

/// An annotation applied to some declaration, e.g. `$verified(level = 3)`.
#[derive(Clone, Debug, PartialEq)]
pub struct AnnotationApplication {
    pub name: DeclName,
    pub value: Option<ValueExpr>,
    pub span: TextRange,
}

/// A type expression, possibly parameterised: `List(Text)`.
#[derive(Clone, Debug, PartialEq)]
pub struct TypeExpr {
    pub name: DeclName,
    pub params: Vec<TypeExpr>,
    pub span: TextRange,
}

/// A possibly-qualified reference to a declared name.
#[derive(Clone, Debug, PartialEq)]
pub struct DeclName {
    pub base: NameBase,
    pub member_path: Vec<String>,
    pub span: TextRange,
}

/// How the first segment of a [`DeclName`] is anchored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NameBase {
    /// Resolved outward through enclosing scopes.
    Relative(String),
    /// Resolved from the file root.
    Absolute(String),
    /// Resolved inside another file.
    Import(String),
}

impl DeclName {
    /// A single unqualified identifier.
    pub fn is_bare(&self) -> bool {
        matches!(self.base, NameBase::Relative(_)) && self.member_path.is_empty()
    }

    /// The bare identifier, when [`is_bare`](Self::is_bare) holds.
    pub fn bare_name(&self) -> Option<&str> {
        match &self.base {
            NameBase::Relative(name) if self.member_path.is_empty() => Some(name),
            _ => None,
        }
    }
}

impl std::fmt::Display for DeclName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.base {
            NameBase::Relative(name) => write!(f, "{name}")?,
            NameBase::Absolute(name) => write!(f, ".{name}")?,
            NameBase::Import(path) => write!(f, "import \"{path}\"")?,
        }
        for segment in &self.member_path {
            write!(f, ".{segment}")?;
        }
        Ok(())
    }
}

/// A value expression: a literal or a reference to a constant.
#[derive(Clone, Debug, PartialEq)]
pub struct ValueExpr {
    pub body: ValueBody,
    pub span: TextRange,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ValueBody {
    /// An identifier: an enumerant, a keyword literal, or a constant.
    Name(DeclName),
    PositiveInt(u64),
    /// The magnitude of a negated integer literal.
    NegativeInt(u64),
    Float(f64),
    String(String),
    List(Vec<ValueExpr>),
    Struct(Vec<FieldAssignment>),
    /// Placeholder left behind by an earlier parse error.
    Unknown,
}

/// One `field = value` entry of a struct literal.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldAssignment {
    pub field_name: Name,
    pub value: ValueExpr,
}
