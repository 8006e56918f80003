//! Node translation: one parsed declaration in, one schema node out.
//!
//! [`NodeTranslator`] drives the whole pass. Construction compiles the
//! declaration immediately; [`NodeTranslator::bootstrap`] then exposes a
//! node set good enough for other translations to read constants and
//! annotations from, and [`NodeTranslator::finish`] compiles the compound
//! default values that had to wait for bootstrap schemas to exist.
//!
//! Struct declarations additionally produce one auxiliary node per named
//! group or union, with ids derived from the parent's id.

pub mod layout;

mod detect;
mod structs;
mod value;

#[cfg(test)]
mod mod_tests;
#[cfg(test)]
mod value_tests;

use std::collections::BTreeMap;

use weft_schema::{
    Annotation, AnnotationNode, ConstNode, Enumerant, Field, FieldSlot, Node, NodeBody, NodeId,
    StructNode, Targets, Type, Value,
};

use crate::ast::{AnnotationApplication, DeclBody, DeclKind, Declaration, TypeExpr, ValueExpr};
use crate::diagnostics::{DiagnosticMessage, Diagnostics};
use crate::resolve::{BuiltinType, Resolution, Resolver};

use detect::{DuplicateNameDetector, DuplicateOrdinalDetector};

/// The translated node plus its auxiliary group nodes, borrowed from the
/// translator.
#[derive(Clone, Copy, Debug)]
pub struct NodeSet<'s> {
    pub node: &'s Node,
    pub groups: &'s [Node],
}

/// Translates one declaration into a schema node.
///
/// One instance handles one declaration; transient state (the member tree,
/// the layout scopes) lives and dies with it. Every user-facing problem is
/// reported into the [`Diagnostics`] collection and translation proceeds
/// with defaulted output.
pub struct NodeTranslator<'a> {
    resolver: &'a dyn Resolver,
    diag: &'a mut Diagnostics,
    compile_annotations: bool,
    node: Node,
    groups: Vec<Node>,
    unfinished_values: Vec<UnfinishedValue<'a>>,
}

/// A compound value that could not be compiled during bootstrap. Compiled
/// in `finish`, once every referenced node has a bootstrap schema.
struct UnfinishedValue<'a> {
    source: &'a ValueExpr,
    ty: Type,
    target: ValueTarget,
}

/// Which output node a piece of state lives on.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum NodeSlot {
    Root,
    Group(usize),
}

/// A path to a value inside the output, stable while the output grows.
#[derive(Clone, Debug)]
pub(crate) enum ValueTarget {
    /// The value of the root const node.
    ConstValue,
    /// A field's default value.
    FieldDefault { node: NodeSlot, field: usize },
    /// The payload of an applied annotation.
    Annotation { slot: AnnotationSlot, index: usize },
}

/// Which annotation list an applied annotation landed in.
#[derive(Clone, Debug)]
pub(crate) enum AnnotationSlot {
    Node(NodeSlot),
    Field { node: NodeSlot, field: usize },
    Enumerant(usize),
}

impl<'a> NodeTranslator<'a> {
    /// Translate `decl` into a node with the given identity. The resolver
    /// supplies cross-declaration lookups; `compile_annotations` is off
    /// while the builtin prelude itself is compiled.
    pub fn new(
        resolver: &'a dyn Resolver,
        diag: &'a mut Diagnostics,
        decl: &'a Declaration,
        id: NodeId,
        scope_id: NodeId,
        display_name: String,
        compile_annotations: bool,
    ) -> Self {
        let node = Node::new(id, scope_id, display_name, decl.name.text.len());
        let mut translator = NodeTranslator {
            resolver,
            diag,
            compile_annotations,
            node,
            groups: Vec::new(),
            unfinished_values: Vec::new(),
        };
        translator.compile_node(decl);
        translator
    }

    /// The work-in-progress node set: complete except for compound values.
    pub fn bootstrap(&self) -> NodeSet<'_> {
        NodeSet {
            node: &self.node,
            groups: &self.groups,
        }
    }

    /// Compile the queued compound values and return the finished set.
    ///
    /// The queue can grow while it drains (a value may reference another
    /// constant), so iteration is by index against the live length.
    pub fn finish(&mut self) -> NodeSet<'_> {
        let mut i = 0;
        while i < self.unfinished_values.len() {
            let pending = &self.unfinished_values[i];
            let (source, ty, target) = (pending.source, pending.ty.clone(), pending.target.clone());
            self.compile_value(source, &ty, &target, false);
            i += 1;
        }
        self.bootstrap()
    }

    /// Surrender the translated nodes.
    pub fn into_output(self) -> (Node, Vec<Node>) {
        (self.node, self.groups)
    }

    fn compile_node(&mut self, decl: &'a Declaration) {
        DuplicateNameDetector::new().check(&decl.nested, decl.body.kind(), self.diag);

        match &decl.body {
            DeclBody::File => self.node.body = NodeBody::File,
            DeclBody::Const(c) => self.compile_const(c),
            DeclBody::Annotation(a) => self.compile_annotation(a),
            DeclBody::Enum => self.compile_enum(&decl.nested),
            DeclBody::Struct => self.compile_struct(decl),
            // Method translation is out of scope; nested declarations were
            // still name-checked above.
            DeclBody::Interface => self.node.body = NodeBody::Interface,
            _ => panic!("declaration is not a node"),
        }

        let kind = decl.body.kind();
        self.compile_annotation_applications(&decl.annotations, kind, AnnotationSlot::Node(NodeSlot::Root));
    }

    fn compile_const(&mut self, decl: &'a crate::ast::ConstDecl) {
        let compiled = self.compile_type(&decl.ty);
        let ty = compiled.clone().unwrap_or(Type::Void);
        self.node.body = NodeBody::Const(ConstNode {
            ty: ty.clone(),
            value: Value::default_for(&ty),
        });
        if compiled.is_some() {
            self.compile_bootstrap_value(&decl.value, ty, ValueTarget::ConstValue);
        }
    }

    fn compile_annotation(&mut self, decl: &'a crate::ast::AnnotationDecl) {
        let ty = self.compile_type(&decl.ty).unwrap_or(Type::Void);
        self.node.body = NodeBody::Annotation(AnnotationNode {
            ty,
            targets: decl.targets,
        });
    }

    fn compile_enum(&mut self, members: &'a [Declaration]) {
        // ordinal -> (code order, declaration); same-ordinal entries keep
        // declaration order so duplicates report deterministically
        let mut enumerants: BTreeMap<u16, Vec<(u32, &'a Declaration)>> = BTreeMap::new();
        let mut code_order = 0u32;
        for member in members {
            if matches!(member.body, DeclBody::Enumerant) {
                let ordinal = member
                    .ordinal
                    .expect("enumerants always carry an explicit ordinal");
                enumerants
                    .entry(ordinal.value)
                    .or_default()
                    .push((code_order, member));
                code_order += 1;
            }
        }

        let mut list = Vec::new();
        let mut in_order = Vec::new();
        let mut dup = DuplicateOrdinalDetector::new();
        for entries in enumerants.values() {
            for &(code_order, decl) in entries {
                let ordinal = decl
                    .ordinal
                    .expect("enumerants always carry an explicit ordinal");
                dup.check(ordinal, self.diag);
                list.push(Enumerant {
                    name: decl.name.text.clone(),
                    code_order,
                    annotations: Vec::new(),
                });
                in_order.push(decl);
            }
        }
        self.node.body = NodeBody::Enum(list);

        for (index, decl) in in_order.into_iter().enumerate() {
            self.compile_annotation_applications(
                &decl.annotations,
                DeclKind::Enumerant,
                AnnotationSlot::Enumerant(index),
            );
        }
    }

    /// Resolve a type expression. `None` means the type could not be
    /// compiled; the failure has been reported (by the resolver for unknown
    /// names, here otherwise).
    pub(crate) fn compile_type(&mut self, source: &TypeExpr) -> Option<Type> {
        let resolver = self.resolver;
        let resolved = resolver.resolve(&source.name)?;

        let mut handled_params = false;
        let ty = match resolved {
            Resolution::Node { kind, id } => match kind {
                DeclKind::Enum => Type::Enum(id),
                DeclKind::Struct => Type::Struct(id),
                DeclKind::Interface => Type::Interface(id),
                _ => {
                    self.diag.push(DiagnosticMessage::error(
                        source.span,
                        format!("'{}' is not a type", source.name),
                    ));
                    return None;
                }
            },
            Resolution::Builtin(BuiltinType::List) => {
                if source.params.len() != 1 {
                    self.diag.push(DiagnosticMessage::error(
                        source.span,
                        "'List' requires exactly one parameter",
                    ));
                    return None;
                }
                let element = self.compile_type(&source.params[0])?;
                if element == Type::Any {
                    // an element without a fixed encoding cannot be packed
                    self.diag.push(DiagnosticMessage::error(
                        source.span,
                        "'List(Any)' is not supported",
                    ));
                    return None;
                }
                handled_params = true;
                Type::List(Box::new(element))
            }
            Resolution::Builtin(builtin) => match builtin {
                BuiltinType::Void => Type::Void,
                BuiltinType::Bool => Type::Bool,
                BuiltinType::Int8 => Type::Int8,
                BuiltinType::Int16 => Type::Int16,
                BuiltinType::Int32 => Type::Int32,
                BuiltinType::Int64 => Type::Int64,
                BuiltinType::Uint8 => Type::Uint8,
                BuiltinType::Uint16 => Type::Uint16,
                BuiltinType::Uint32 => Type::Uint32,
                BuiltinType::Uint64 => Type::Uint64,
                BuiltinType::Float32 => Type::Float32,
                BuiltinType::Float64 => Type::Float64,
                BuiltinType::Text => Type::Text,
                BuiltinType::Data => Type::Data,
                BuiltinType::Any => Type::Any,
                BuiltinType::List => unreachable!("handled above"),
            },
        };

        if !handled_params && !source.params.is_empty() {
            self.diag.push(DiagnosticMessage::error(
                source.span,
                format!("'{}' does not accept parameters", source.name),
            ));
            return None;
        }

        Some(ty)
    }

    pub(crate) fn compile_annotation_applications(
        &mut self,
        applications: &'a [AnnotationApplication],
        kind: DeclKind,
        slot: AnnotationSlot,
    ) {
        if applications.is_empty() || !self.compile_annotations {
            return;
        }
        let resolver = self.resolver;

        for application in applications {
            // Reserve the record up front so value targets have a stable
            // index even when later applications fail.
            let index = self.annotation_list_mut(&slot).len();
            self.annotation_list_mut(&slot).push(Annotation {
                id: NodeId::NONE,
                value: Value::Void,
            });

            let Some(resolved) = resolver.resolve(&application.name) else {
                continue;
            };
            let Resolution::Node {
                kind: DeclKind::Annotation,
                id,
            } = resolved
            else {
                self.diag.push(DiagnosticMessage::error(
                    application.name.span,
                    format!("'{}' is not an annotation", application.name),
                ));
                continue;
            };
            self.annotation_list_mut(&slot)[index].id = id;

            let Some(node) = resolver.resolve_bootstrap(id) else {
                continue;
            };
            let NodeBody::Annotation(annotation) = &node.body else {
                continue;
            };

            if !annotation.targets.contains(targets_flag(kind)) {
                self.diag.push(DiagnosticMessage::error(
                    application.name.span,
                    format!(
                        "'{}' cannot be applied to this kind of declaration",
                        application.name
                    ),
                ));
            }

            match &application.value {
                None => {
                    // no payload means void
                    if annotation.ty != Type::Void {
                        self.diag.push(DiagnosticMessage::error(
                            application.name.span,
                            format!("'{}' requires a value", application.name),
                        ));
                        self.annotation_list_mut(&slot)[index].value =
                            Value::default_for(&annotation.ty);
                    }
                }
                Some(expression) => {
                    let ty = annotation.ty.clone();
                    self.compile_bootstrap_value(
                        expression,
                        ty,
                        ValueTarget::Annotation {
                            slot: slot.clone(),
                            index,
                        },
                    );
                }
            }
        }
    }

    /// Create the auxiliary node backing a named group or union, nested
    /// under `parent`'s node. Its id and scope id are filled in once member
    /// indexes are final.
    pub(crate) fn new_group_node(&mut self, parent: NodeSlot, name: &str) -> NodeSlot {
        let display_name = format!("{}.{name}", self.node_ref(parent).display_name);
        let mut node = Node::new(NodeId::NONE, NodeId::NONE, display_name, name.len());
        node.body = NodeBody::Struct(StructNode {
            is_group: true,
            ..StructNode::default()
        });
        self.groups.push(node);
        NodeSlot::Group(self.groups.len() - 1)
    }

    pub(crate) fn node_ref(&self, slot: NodeSlot) -> &Node {
        match slot {
            NodeSlot::Root => &self.node,
            NodeSlot::Group(i) => &self.groups[i],
        }
    }

    pub(crate) fn node_mut(&mut self, slot: NodeSlot) -> &mut Node {
        match slot {
            NodeSlot::Root => &mut self.node,
            NodeSlot::Group(i) => &mut self.groups[i],
        }
    }

    pub(crate) fn struct_node_mut(&mut self, slot: NodeSlot) -> &mut StructNode {
        match &mut self.node_mut(slot).body {
            NodeBody::Struct(s) => s,
            _ => panic!("expected a struct node"),
        }
    }

    fn field_record_mut(&mut self, slot: NodeSlot, field: usize) -> &mut Field {
        &mut self.struct_node_mut(slot).fields[field]
    }

    fn annotation_list_mut(&mut self, slot: &AnnotationSlot) -> &mut Vec<Annotation> {
        match slot {
            AnnotationSlot::Node(node) => &mut self.node_mut(*node).annotations,
            AnnotationSlot::Field { node, field } => {
                &mut self.field_record_mut(*node, *field).annotations
            }
            AnnotationSlot::Enumerant(index) => match &mut self.node.body {
                NodeBody::Enum(enumerants) => &mut enumerants[*index].annotations,
                _ => panic!("enumerant annotation on a non-enum node"),
            },
        }
    }

    pub(crate) fn value_target_mut(&mut self, target: &ValueTarget) -> &mut Value {
        match target {
            ValueTarget::ConstValue => match &mut self.node.body {
                NodeBody::Const(c) => &mut c.value,
                _ => panic!("const value target on a non-const node"),
            },
            ValueTarget::FieldDefault { node, field } => {
                match &mut self.field_record_mut(*node, *field).slot {
                    FieldSlot::Regular { default_value, .. } => default_value,
                    FieldSlot::Group { .. } => panic!("default value target on a group field"),
                }
            }
            ValueTarget::Annotation { slot, index } => {
                &mut self.annotation_list_mut(slot)[*index].value
            }
        }
    }
}

/// The targets flag an annotation must carry to be applied to `kind`.
fn targets_flag(kind: DeclKind) -> Targets {
    match kind {
        DeclKind::File => Targets::FILE,
        DeclKind::Const => Targets::CONST,
        DeclKind::Enum => Targets::ENUM,
        DeclKind::Enumerant => Targets::ENUMERANT,
        DeclKind::Struct => Targets::STRUCT,
        DeclKind::Field => Targets::FIELD,
        DeclKind::Union => Targets::UNION,
        DeclKind::Group => Targets::GROUP,
        DeclKind::Interface => Targets::INTERFACE,
        DeclKind::Method => Targets::METHOD,
        DeclKind::Annotation => Targets::ANNOTATION,
        DeclKind::Using => Targets::NONE,
    }
}

/// Derive a stable id for a nested node from its parent's id and its index
/// among the parent's members. Two chained CRC32 passes give 64 bits; the
/// top bit is forced so derived ids stay clear of the reserved range.
pub(crate) fn generate_group_id(parent: NodeId, index: u32) -> NodeId {
    let mut bytes = [0u8; 12];
    bytes[..8].copy_from_slice(&parent.0.to_le_bytes());
    bytes[8..].copy_from_slice(&index.to_le_bytes());
    let lo = crc32fast::hash(&bytes);
    let mut hasher = crc32fast::Hasher::new_with_initial(lo);
    hasher.update(&bytes);
    let hi = hasher.finalize();
    NodeId((u64::from(hi) << 32 | u64::from(lo)) | 1 << 63)
}
