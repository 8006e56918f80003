//! Struct translation: member discovery, ordinal-ordered layout, and
//! schema emission.
//!
//! A pre-pass walks the declaration's members in source order, building a
//! member tree and an ordinal-indexed map while allocating layout scopes.
//! The main pass then visits members in ascending ordinal order so that
//! offsets only ever depend on lower ordinals; that is what keeps a schema
//! stable when later fields are added.

use std::collections::BTreeMap;

use weft_schema::{ElementSize, Field, FieldSize, FieldSlot, StructNode, Type, Value};

use crate::ast::{DeclBody, DeclKind, Declaration};
use crate::diagnostics::DiagnosticMessage;

use super::detect::DuplicateOrdinalDetector;
use super::layout::{ScopeId, StructLayout, Top, UnionId};
use super::{AnnotationSlot, NodeSlot, NodeTranslator, ValueTarget, generate_group_id};

impl<'a> NodeTranslator<'a> {
    pub(super) fn compile_struct(&mut self, decl: &'a Declaration) {
        StructTranslator::new(self).translate(decl);
    }
}

/// Index into the member arena.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct MemberId(usize);

/// A field record within an output node.
#[derive(Clone, Copy, Debug)]
struct FieldRef {
    node: NodeSlot,
    index: usize,
}

/// Which layout scope a member talks to.
#[derive(Clone, Copy, Debug)]
enum MemberLayout {
    /// A field allocates from this scope.
    Field(ScopeId),
    /// A union; also set on the member owning an unnamed union.
    Union(UnionId),
    /// A node-bearing member with no union of its own.
    None,
}

/// One node of the member tree built during the pre-pass walk.
struct MemberInfo<'a> {
    parent: Option<MemberId>,
    /// Position among same-scope siblings in declaration order.
    code_order: u32,
    /// Position within the parent's emitted fields; assigned when the
    /// member's field record is first created.
    index: u32,
    child_count: u32,
    child_initialized_count: u32,
    /// How many children sit in this member's union and have their
    /// discriminant value decided.
    union_discriminant_count: u16,
    is_in_union: bool,
    /// `None` only for the root.
    decl: Option<&'a Declaration>,
    /// The output node this member writes to, if it is node-bearing.
    node: Option<NodeSlot>,
    layout: MemberLayout,
    field: Option<FieldRef>,
}

/// An entry of the ordinal map: the member to lay out, plus the
/// declaration whose ordinal put it there (for a union's explicit ordinal
/// the member may be the shared parent record).
struct OrdinalEntry<'a> {
    member: MemberId,
    decl: &'a Declaration,
}

pub(super) struct StructTranslator<'a, 't> {
    translator: &'t mut NodeTranslator<'a>,
    layout: StructLayout,
    members: Vec<MemberInfo<'a>>,
    members_by_ordinal: BTreeMap<u16, Vec<OrdinalEntry<'a>>>,
    /// Every member except the root, in traversal order (parents first).
    all_members: Vec<MemberId>,
}

impl<'a, 't> StructTranslator<'a, 't> {
    pub(super) fn new(translator: &'t mut NodeTranslator<'a>) -> Self {
        StructTranslator {
            translator,
            layout: StructLayout::new(),
            members: Vec::new(),
            members_by_ordinal: BTreeMap::new(),
            all_members: Vec::new(),
        }
    }

    pub(super) fn translate(mut self, decl: &'a Declaration) {
        self.translator.node.body = weft_schema::NodeBody::Struct(StructNode::default());

        let root = self.add_root_member();
        self.traverse_top_or_group(&decl.nested, root, ScopeId::Top);

        // Lay members out in ascending ordinal order.
        let mut dup = DuplicateOrdinalDetector::new();
        let by_ordinal = std::mem::take(&mut self.members_by_ordinal);
        for (&ordinal, entries) in &by_ordinal {
            for entry in entries {
                self.translate_member(entry, ordinal, &mut dup);
            }
        }

        // Discriminants, nested node ids, and member annotations.
        self.finish_group(root);
        for m in self.all_members.clone() {
            let decl = self.members[m.0].decl.expect("non-root members carry a declaration");
            let kind = decl.body.kind();
            match kind {
                DeclKind::Field => {}
                DeclKind::Union | DeclKind::Group => self.finish_group(m),
                _ => unreachable!("members are fields, unions, or groups"),
            }
            if !decl.annotations.is_empty() {
                let field = self.ensure_field(m);
                self.translator.compile_annotation_applications(
                    &decl.annotations,
                    kind,
                    AnnotationSlot::Field {
                        node: field.node,
                        field: field.index,
                    },
                );
            }
        }

        // Section sizes and the preferred list encoding, copied onto every
        // group node: a group is read and written as its enclosing struct.
        let data_words = self.layout.top().data_words as u16;
        let pointer_count = self.layout.top().pointers as u16;
        let encoding = preferred_encoding(self.layout.top());

        let root_node = self.translator.struct_node_mut(NodeSlot::Root);
        root_node.data_words = data_words;
        root_node.pointer_count = pointer_count;
        root_node.preferred_encoding = encoding;

        for i in 0..self.translator.groups.len() {
            let group = self.translator.struct_node_mut(NodeSlot::Group(i));
            group.data_words = data_words;
            group.pointer_count = pointer_count;
            group.preferred_encoding = encoding;
        }
    }

    fn translate_member(
        &mut self,
        entry: &OrdinalEntry<'a>,
        ordinal: u16,
        dup: &mut DuplicateOrdinalDetector,
    ) {
        let located = entry
            .decl
            .ordinal
            .expect("members recorded by ordinal carry an explicit ordinal");
        dup.check(located, self.translator.diag);

        // The root stands in for an unnamed union and has no field record.
        let field = self.members[entry.member.0]
            .parent
            .is_some()
            .then(|| self.ensure_field(entry.member));
        if let Some(field) = field {
            self.field_mut(field).ordinal = ordinal;
        }

        match &entry.decl.body {
            DeclBody::Field(field_decl) => {
                let field = field.expect("field members always have a parent");

                let compiled = self.translator.compile_type(&field_decl.ty);
                let ty = compiled.clone().unwrap_or(Type::Void);
                self.field_mut(field).slot = FieldSlot::Regular {
                    ty: ty.clone(),
                    default_value: Value::default_for(&ty),
                    offset: 0,
                };
                if compiled.is_some()
                    && let Some(expression) = &field_decl.default_value
                {
                    self.translator.compile_bootstrap_value(
                        expression,
                        ty.clone(),
                        ValueTarget::FieldDefault {
                            node: field.node,
                            field: field.index,
                        },
                    );
                }

                let scope = match self.members[entry.member.0].layout {
                    MemberLayout::Field(scope) => scope,
                    _ => unreachable!("field members carry a field scope"),
                };
                let offset = match ty.field_size() {
                    FieldSize::Void => {
                        self.layout.add_void(scope);
                        0
                    }
                    FieldSize::Data(lg_size) => self.layout.add_data(scope, lg_size),
                    FieldSize::Pointer => self.layout.add_pointer(scope),
                };
                if let FieldSlot::Regular { offset: slot, .. } = &mut self.field_mut(field).slot {
                    *slot = offset;
                }
            }

            DeclBody::Union => {
                // An explicit ordinal on a union places its discriminant as
                // if it were a field declared with that ordinal.
                let MemberLayout::Union(union_id) = self.members[entry.member.0].layout else {
                    unreachable!("union ordinal on a member without a union scope");
                };
                if !self.layout.union_add_discriminant(union_id) {
                    self.translator.diag.push(DiagnosticMessage::error(
                        located.span,
                        "only one field can be retroactively unionized",
                    ));
                }
            }

            DeclBody::Group => unreachable!("groups do not have ordinals"),

            _ => unreachable!("only fields and unions are recorded by ordinal"),
        }
    }

    // ---- pre-pass walk ----

    fn add_root_member(&mut self) -> MemberId {
        self.members.push(MemberInfo {
            parent: None,
            code_order: 0,
            index: 0,
            child_count: 0,
            child_initialized_count: 0,
            union_discriminant_count: 0,
            is_in_union: false,
            decl: None,
            node: Some(NodeSlot::Root),
            layout: MemberLayout::None,
            field: None,
        });
        MemberId(self.members.len() - 1)
    }

    fn new_member(
        &mut self,
        parent: MemberId,
        code_order: u32,
        decl: &'a Declaration,
        node: Option<NodeSlot>,
        layout: MemberLayout,
        is_in_union: bool,
    ) -> MemberId {
        self.members.push(MemberInfo {
            parent: Some(parent),
            code_order,
            index: 0,
            child_count: 0,
            child_initialized_count: 0,
            union_discriminant_count: 0,
            is_in_union,
            decl: Some(decl),
            node,
            layout,
            field: None,
        });
        MemberId(self.members.len() - 1)
    }

    fn record_ordinal(&mut self, decl: &'a Declaration, member: MemberId) {
        let ordinal = decl
            .ordinal
            .expect("members recorded by ordinal carry an explicit ordinal")
            .value;
        self.members_by_ordinal
            .entry(ordinal)
            .or_default()
            .push(OrdinalEntry { member, decl });
    }

    fn traverse_top_or_group(
        &mut self,
        members: &'a [Declaration],
        parent: MemberId,
        scope: ScopeId,
    ) {
        let mut code_order = 0u32;
        for member in members {
            self.traverse_member(member, parent, scope, &mut code_order);
        }
    }

    fn traverse_member(
        &mut self,
        member: &'a Declaration,
        parent: MemberId,
        scope: ScopeId,
        code_order: &mut u32,
    ) {
        match &member.body {
            DeclBody::Field(_) => {
                self.members[parent.0].child_count += 1;
                let m = self.new_member(
                    parent,
                    take_order(code_order),
                    member,
                    None,
                    MemberLayout::Field(scope),
                    false,
                );
                self.all_members.push(m);
                self.record_ordinal(member, m);
            }

            DeclBody::Union => {
                let union_id = self.layout.new_union(scope);
                let m = if member.name.text.is_empty() {
                    // An unnamed union belongs to the enclosing member:
                    // same record, same code-order counter, but its own
                    // layout scope and discriminant.
                    self.members[parent.0].layout = MemberLayout::Union(union_id);
                    self.traverse_union(member, parent, union_id, code_order);
                    parent
                } else {
                    self.members[parent.0].child_count += 1;
                    let parent_slot = self.member_node(parent);
                    let node = self.translator.new_group_node(parent_slot, &member.name.text);
                    let m = self.new_member(
                        parent,
                        take_order(code_order),
                        member,
                        Some(node),
                        MemberLayout::Union(union_id),
                        false,
                    );
                    self.all_members.push(m);
                    let mut sub_order = 0u32;
                    self.traverse_union(member, m, union_id, &mut sub_order);
                    m
                };
                if member.ordinal.is_some() {
                    self.record_ordinal(member, m);
                }
            }

            DeclBody::Group => {
                self.members[parent.0].child_count += 1;
                let parent_slot = self.member_node(parent);
                let node = self.translator.new_group_node(parent_slot, &member.name.text);
                let m = self.new_member(
                    parent,
                    take_order(code_order),
                    member,
                    Some(node),
                    MemberLayout::None,
                    false,
                );
                self.all_members.push(m);
                // Group members lay out as if declared in the enclosing
                // scope. No ordinal.
                self.traverse_group(member, m, scope);
            }

            // Misplaced kinds were reported by the duplicate-name pass.
            _ => {}
        }
    }

    fn traverse_union(
        &mut self,
        union_decl: &'a Declaration,
        parent: MemberId,
        union_id: UnionId,
        code_order: &mut u32,
    ) {
        if union_decl.nested.len() < 2 {
            self.translator.diag.push(DiagnosticMessage::error(
                union_decl.span,
                "a union must have at least two members",
            ));
        }

        for member in &union_decl.nested {
            match &member.body {
                DeclBody::Field(_) => {
                    self.members[parent.0].child_count += 1;
                    // For layout, a field of a union is a one-member group,
                    // so fields and groups of a union share one code path.
                    let group = self.layout.new_group(union_id);
                    let m = self.new_member(
                        parent,
                        take_order(code_order),
                        member,
                        None,
                        MemberLayout::Field(ScopeId::Group(group)),
                        true,
                    );
                    self.all_members.push(m);
                    self.record_ordinal(member, m);
                }

                DeclBody::Union => {
                    self.translator.diag.push(DiagnosticMessage::error(
                        member.span,
                        "unions cannot contain unions",
                    ));
                }

                DeclBody::Group => {
                    self.members[parent.0].child_count += 1;
                    let group = self.layout.new_group(union_id);
                    let parent_slot = self.member_node(parent);
                    let node = self.translator.new_group_node(parent_slot, &member.name.text);
                    let m = self.new_member(
                        parent,
                        take_order(code_order),
                        member,
                        Some(node),
                        MemberLayout::None,
                        true,
                    );
                    self.all_members.push(m);
                    self.traverse_group(member, m, ScopeId::Group(group));
                }

                _ => {}
            }
        }
    }

    fn traverse_group(&mut self, group_decl: &'a Declaration, parent: MemberId, scope: ScopeId) {
        if group_decl.nested.is_empty() {
            self.translator.diag.push(DiagnosticMessage::error(
                group_decl.span,
                "a group must have at least one member",
            ));
        }
        self.traverse_top_or_group(&group_decl.nested, parent, scope);
    }

    // ---- field records ----

    /// The member's field record in its parent's node, created on first
    /// touch. Creation order decides both the field's position and, for
    /// union members, the discriminant value.
    fn ensure_field(&mut self, m: MemberId) -> FieldRef {
        if let Some(field) = self.members[m.0].field {
            return field;
        }
        let parent = self.members[m.0].parent.expect("the root member has no field record");
        self.members[m.0].index = self.members[parent.0].child_initialized_count;

        let field = self.append_member_field(parent);
        self.members[m.0].field = Some(field);

        let decl = self.members[m.0].decl.expect("non-root members carry a declaration");
        let name = decl.name.text.clone();
        let code_order = self.members[m.0].code_order;
        let discriminant = if self.members[m.0].is_in_union {
            let value = self.members[parent.0].union_discriminant_count;
            self.members[parent.0].union_discriminant_count += 1;
            Some(value)
        } else {
            None
        };

        let record = self.field_mut(field);
        record.name = name;
        record.code_order = code_order;
        record.discriminant_value = discriminant;
        field
    }

    /// Append a fresh field record to the member's node.
    fn append_member_field(&mut self, parent: MemberId) -> FieldRef {
        let slot = self.members[parent.0].node.expect("field-bearing members have a node");
        debug_assert!(
            self.members[parent.0].child_initialized_count < self.members[parent.0].child_count
        );

        if self.members[parent.0].child_initialized_count == 0
            && self.members[parent.0].parent.is_some()
        {
            // The parent's own field record must exist in the grandparent
            // before any of its children's.
            self.ensure_field(parent);
        }

        let index = self.members[parent.0].child_initialized_count as usize;
        self.members[parent.0].child_initialized_count += 1;

        let fields = &mut self.translator.struct_node_mut(slot).fields;
        debug_assert_eq!(fields.len(), index);
        fields.push(Field {
            name: String::new(),
            code_order: 0,
            ordinal: 0,
            discriminant_value: None,
            annotations: Vec::new(),
            slot: FieldSlot::Regular {
                ty: Type::Void,
                default_value: Value::Void,
                offset: 0,
            },
        });

        FieldRef { node: slot, index }
    }

    fn field_mut(&mut self, field: FieldRef) -> &mut Field {
        &mut self.translator.struct_node_mut(field.node).fields[field.index]
    }

    fn member_node(&self, m: MemberId) -> NodeSlot {
        self.members[m.0].node.expect("node-bearing member expected")
    }

    // ---- finishing ----

    /// Write back a member's union discriminant, and for nested members
    /// derive the node id and point the parent field at it.
    fn finish_group(&mut self, m: MemberId) {
        if let MemberLayout::Union(union_id) = self.members[m.0].layout {
            // Unions with a single variant never placed their discriminant.
            self.layout.union_add_discriminant(union_id);
            let offset = self
                .layout
                .union(union_id)
                .discriminant_offset
                .expect("discriminant was just placed");
            let count = self.members[m.0].union_discriminant_count;
            let slot = self.members[m.0].node.expect("unions live on node-bearing members");
            let node = self.translator.struct_node_mut(slot);
            node.discriminant_count = count;
            node.discriminant_offset = offset;
        }

        if let Some(parent) = self.members[m.0].parent {
            let field = self.ensure_field(m);
            let parent_slot = self.members[parent.0]
                .node
                .expect("parents of node-bearing members have nodes");
            let parent_id = self.translator.node_ref(parent_slot).id;
            let id = generate_group_id(parent_id, self.members[m.0].index);

            let slot = self.members[m.0].node.expect("nested groups have nodes");
            let node = self.translator.node_mut(slot);
            node.id = id;
            node.scope_id = parent_id;

            self.field_mut(field).slot = FieldSlot::Group { type_id: id };
        }
    }
}

fn take_order(code_order: &mut u32) -> u32 {
    let order = *code_order;
    *code_order += 1;
    order
}

/// The most compact list element representation this layout permits: a
/// pure function of the post-layout state.
fn preferred_encoding(top: &Top) -> ElementSize {
    if top.pointers == 0 {
        if top.data_words == 0 {
            return ElementSize::Empty;
        }
        if top.data_words == 1 {
            return match top.holes.first_word_used() {
                0 => ElementSize::Bit,
                1..=3 => ElementSize::Byte,
                4 => ElementSize::TwoBytes,
                5 => ElementSize::FourBytes,
                6 => ElementSize::EightBytes,
                _ => unreachable!("first_word_used is at most 6"),
            };
        }
    } else if top.pointers == 1 && top.data_words == 0 {
        return ElementSize::Pointer;
    }
    ElementSize::InlineComposite
}
