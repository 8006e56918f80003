//! Declaration builders and a canned resolver for translation tests.

use std::collections::HashMap;

use rowan::{TextRange, TextSize};

use weft_schema::{Node, NodeId, StructNode};

use crate::ast::{
    AnnotationApplication, AnnotationDecl, ConstDecl, DeclBody, DeclKind, DeclName, Declaration,
    FieldAssignment, FieldDecl, LocatedOrdinal, Name, NameBase, TypeExpr, ValueBody, ValueExpr,
};
use crate::diagnostics::Diagnostics;
use crate::resolve::{BuiltinType, Resolution, Resolver};
use crate::translate::NodeTranslator;

pub(crate) fn span(start: u32, end: u32) -> TextRange {
    TextRange::new(TextSize::from(start), TextSize::from(end))
}

pub(crate) fn name_at(text: &str, at: u32) -> Name {
    Name {
        text: text.to_string(),
        span: span(at, at + text.len() as u32),
    }
}

// ---- declarations ----

fn decl(name: &str, body: DeclBody, nested: Vec<Declaration>) -> Declaration {
    Declaration {
        name: name_at(name, 0),
        span: span(0, 0),
        ordinal: None,
        body,
        nested,
        annotations: Vec::new(),
    }
}

fn located_ordinal(value: u16) -> LocatedOrdinal {
    // Distinct spans per ordinal so related-location tests can tell them
    // apart.
    let at = 1000 + u32::from(value) * 10;
    LocatedOrdinal {
        value,
        span: span(at, at + 2),
    }
}

pub(crate) fn struct_decl(name: &str, nested: Vec<Declaration>) -> Declaration {
    decl(name, DeclBody::Struct, nested)
}

pub(crate) fn file_decl(name: &str, nested: Vec<Declaration>) -> Declaration {
    decl(name, DeclBody::File, nested)
}

pub(crate) fn interface_decl(name: &str, nested: Vec<Declaration>) -> Declaration {
    decl(name, DeclBody::Interface, nested)
}

pub(crate) fn method_decl(name: &str) -> Declaration {
    decl(name, DeclBody::Method, Vec::new())
}

pub(crate) fn enum_decl(name: &str, nested: Vec<Declaration>) -> Declaration {
    decl(name, DeclBody::Enum, nested)
}

pub(crate) fn enumerant(name: &str, ordinal: u16) -> Declaration {
    let mut d = decl(name, DeclBody::Enumerant, Vec::new());
    d.ordinal = Some(located_ordinal(ordinal));
    d
}

pub(crate) fn field(name: &str, ordinal: u16, ty: TypeExpr) -> Declaration {
    let mut d = decl(
        name,
        DeclBody::Field(FieldDecl {
            ty,
            default_value: None,
        }),
        Vec::new(),
    );
    d.ordinal = Some(located_ordinal(ordinal));
    d
}

pub(crate) fn field_with_default(
    name: &str,
    ordinal: u16,
    ty: TypeExpr,
    default_value: ValueExpr,
) -> Declaration {
    let mut d = decl(
        name,
        DeclBody::Field(FieldDecl {
            ty,
            default_value: Some(default_value),
        }),
        Vec::new(),
    );
    d.ordinal = Some(located_ordinal(ordinal));
    d
}

/// A union declaration; empty `name` makes it unnamed.
pub(crate) fn union_decl(
    name: &str,
    ordinal: Option<u16>,
    members: Vec<Declaration>,
) -> Declaration {
    let mut d = decl(name, DeclBody::Union, members);
    d.ordinal = ordinal.map(located_ordinal);
    d
}

pub(crate) fn group_decl(name: &str, members: Vec<Declaration>) -> Declaration {
    decl(name, DeclBody::Group, members)
}

pub(crate) fn const_decl(name: &str, ty: TypeExpr, value: ValueExpr) -> Declaration {
    decl(name, DeclBody::Const(ConstDecl { ty, value }), Vec::new())
}

pub(crate) fn annotation_decl(
    name: &str,
    ty: TypeExpr,
    targets: weft_schema::Targets,
) -> Declaration {
    decl(
        name,
        DeclBody::Annotation(AnnotationDecl { ty, targets }),
        Vec::new(),
    )
}

pub(crate) fn annotate(mut d: Declaration, name: &str, value: Option<ValueExpr>) -> Declaration {
    d.annotations.push(AnnotationApplication {
        name: decl_name(name),
        value,
        span: span(0, 0),
    });
    d
}

// ---- type and value expressions ----

pub(crate) fn decl_name(text: &str) -> DeclName {
    let mut segments = text.split('.');
    let base = segments.next().expect("split yields at least one segment");
    DeclName {
        base: NameBase::Relative(base.to_string()),
        member_path: segments.map(|s| s.to_string()).collect(),
        span: span(0, text.len() as u32),
    }
}

pub(crate) fn ty(name: &str) -> TypeExpr {
    TypeExpr {
        name: decl_name(name),
        params: Vec::new(),
        span: span(0, name.len() as u32),
    }
}

pub(crate) fn list_of(element: TypeExpr) -> TypeExpr {
    TypeExpr {
        name: decl_name("List"),
        params: vec![element],
        span: span(0, 4),
    }
}

fn value(body: ValueBody) -> ValueExpr {
    ValueExpr {
        body,
        span: span(0, 1),
    }
}

pub(crate) fn int(v: u64) -> ValueExpr {
    value(ValueBody::PositiveInt(v))
}

pub(crate) fn neg(magnitude: u64) -> ValueExpr {
    value(ValueBody::NegativeInt(magnitude))
}

pub(crate) fn float(v: f64) -> ValueExpr {
    value(ValueBody::Float(v))
}

pub(crate) fn text(s: &str) -> ValueExpr {
    value(ValueBody::String(s.to_string()))
}

pub(crate) fn vname(name: &str) -> ValueExpr {
    value(ValueBody::Name(decl_name(name)))
}

pub(crate) fn vlist(elements: Vec<ValueExpr>) -> ValueExpr {
    value(ValueBody::List(elements))
}

pub(crate) fn vstruct(fields: Vec<(&str, ValueExpr)>) -> ValueExpr {
    value(ValueBody::Struct(
        fields
            .into_iter()
            .map(|(name, value)| FieldAssignment {
                field_name: name_at(name, 0),
                value,
            })
            .collect(),
    ))
}

// ---- resolver ----

/// A resolver over a fixed set of registered nodes, with all builtin type
/// names pre-wired.
pub(crate) struct FakeResolver {
    names: HashMap<String, Resolution>,
    nodes: HashMap<NodeId, Node>,
}

impl Default for FakeResolver {
    fn default() -> Self {
        let mut names = HashMap::new();
        for (name, builtin) in [
            ("Void", BuiltinType::Void),
            ("Bool", BuiltinType::Bool),
            ("Int8", BuiltinType::Int8),
            ("Int16", BuiltinType::Int16),
            ("Int32", BuiltinType::Int32),
            ("Int64", BuiltinType::Int64),
            ("UInt8", BuiltinType::Uint8),
            ("UInt16", BuiltinType::Uint16),
            ("UInt32", BuiltinType::Uint32),
            ("UInt64", BuiltinType::Uint64),
            ("Float32", BuiltinType::Float32),
            ("Float64", BuiltinType::Float64),
            ("Text", BuiltinType::Text),
            ("Data", BuiltinType::Data),
            ("List", BuiltinType::List),
            ("Any", BuiltinType::Any),
        ] {
            names.insert(name.to_string(), Resolution::Builtin(builtin));
        }
        FakeResolver {
            names,
            nodes: HashMap::new(),
        }
    }
}

impl FakeResolver {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a node reachable under `name` from the translated scope.
    pub(crate) fn add_node(&mut self, name: &str, kind: DeclKind, node: Node) {
        self.names.insert(
            name.to_string(),
            Resolution::Node { kind, id: node.id },
        );
        self.nodes.insert(node.id, node);
    }

    /// Register a name that resolves but has no node behind it, as happens
    /// when the node's own translation already failed.
    pub(crate) fn add_name(&mut self, name: &str, kind: DeclKind, id: NodeId) {
        self.names
            .insert(name.to_string(), Resolution::Node { kind, id });
    }

    /// Convenience: an empty struct node with the given fields.
    pub(crate) fn add_struct(&mut self, name: &str, id: NodeId, body: StructNode) {
        let mut node = Node::new(
            id,
            NodeId(1),
            format!("test.weft:{name}"),
            name.len(),
        );
        node.body = weft_schema::NodeBody::Struct(body);
        self.add_node(name, DeclKind::Struct, node);
    }
}

impl Resolver for FakeResolver {
    fn resolve(&self, name: &DeclName) -> Option<Resolution> {
        self.names.get(&name.to_string()).copied()
    }

    fn resolve_bootstrap(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    fn resolve_final(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }
}

// ---- driving the translator ----

pub(crate) const TEST_NODE_ID: NodeId = NodeId(0x1000);

/// Translate one declaration to completion with the given resolver.
pub(crate) fn translate_with(
    resolver: &FakeResolver,
    decl: &Declaration,
) -> (Node, Vec<Node>, Diagnostics) {
    let mut diag = Diagnostics::new();
    let mut translator = NodeTranslator::new(
        resolver,
        &mut diag,
        decl,
        TEST_NODE_ID,
        NodeId(1),
        format!("test.weft:{}", decl.name.text),
        true,
    );
    translator.finish();
    let (node, groups) = translator.into_output();
    (node, groups, diag)
}

/// Translate a struct declaration named `Subject` with the given members.
pub(crate) fn translate_struct(members: Vec<Declaration>) -> (Node, Vec<Node>, Diagnostics) {
    let resolver = FakeResolver::new();
    let decl = struct_decl("Subject", members);
    translate_with(&resolver, &decl)
}
