use weft_schema::{
    AnnotationNode, Node, NodeBody, NodeId, Targets, Type, Value,
};

use crate::ast::DeclKind;
use crate::test_utils::*;

use super::generate_group_id;

fn annotation_node(id: u64, name: &str, ty: Type, targets: Targets) -> Node {
    let mut node = Node::new(NodeId(id), NodeId(1), format!("test.weft:{name}"), name.len());
    node.body = NodeBody::Annotation(AnnotationNode { ty, targets });
    node
}

// ---- node kinds ----

#[test]
fn file_translates_to_a_file_node() {
    let resolver = FakeResolver::new();
    let decl = file_decl("demo.weft", vec![]);
    let (node, groups, diag) = translate_with(&resolver, &decl);

    assert!(diag.is_empty(), "{}", diag.to_lines());
    assert!(groups.is_empty());
    assert_eq!(node.body, NodeBody::File);
    assert_eq!(node.id, TEST_NODE_ID);
}

#[test]
fn interface_translates_to_an_empty_interface_node() {
    let resolver = FakeResolver::new();
    let decl = interface_decl("Service", vec![method_decl("ping")]);
    let (node, _, diag) = translate_with(&resolver, &decl);

    assert!(diag.is_empty(), "{}", diag.to_lines());
    assert_eq!(node.body, NodeBody::Interface);
}

// ---- enums ----

#[test]
fn enumerants_sort_by_ordinal_and_keep_code_order() {
    let resolver = FakeResolver::new();
    let decl = enum_decl(
        "Color",
        vec![
            enumerant("green", 1),
            enumerant("red", 0),
            enumerant("blue", 2),
        ],
    );
    let (node, _, diag) = translate_with(&resolver, &decl);
    assert!(diag.is_empty(), "{}", diag.to_lines());

    let NodeBody::Enum(enumerants) = &node.body else {
        panic!("expected an enum node");
    };
    let names: Vec<&str> = enumerants.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["red", "green", "blue"]);
    // Code order remembers the declaration order.
    assert_eq!(enumerants[0].code_order, 1);
    assert_eq!(enumerants[1].code_order, 0);
    assert_eq!(enumerants[2].code_order, 2);
}

#[test]
fn enum_ordinals_must_be_sequential() {
    let resolver = FakeResolver::new();
    let decl = enum_decl("Bad", vec![enumerant("a", 0), enumerant("b", 2)]);
    let (_, _, diag) = translate_with(&resolver, &decl);
    assert!(diag.to_lines().contains("skipped ordinal @1"));

    let decl = enum_decl("Worse", vec![enumerant("a", 0), enumerant("b", 0)]);
    let (_, _, diag) = translate_with(&resolver, &decl);
    assert!(diag.to_lines().contains("duplicate ordinal number"));
}

// ---- constants ----

#[test]
fn const_of_uint16() {
    let resolver = FakeResolver::new();
    let decl = const_decl("answer", ty("UInt16"), int(42));
    let (node, _, diag) = translate_with(&resolver, &decl);
    assert!(diag.is_empty(), "{}", diag.to_lines());

    let NodeBody::Const(constant) = &node.body else {
        panic!("expected a const node");
    };
    assert_eq!(constant.ty, Type::Uint16);
    assert_eq!(constant.value, Value::Uint16(42));
}

#[test]
fn const_with_unknown_type_degrades_to_void() {
    // The resolver reports unknown names itself; the translator just
    // leaves a defaulted node behind.
    let resolver = FakeResolver::new();
    let decl = const_decl("mystery", ty("NoSuchType"), int(1));
    let (node, _, diag) = translate_with(&resolver, &decl);
    assert!(diag.is_empty(), "{}", diag.to_lines());

    let NodeBody::Const(constant) = &node.body else {
        panic!("expected a const node");
    };
    assert_eq!(constant.ty, Type::Void);
    assert_eq!(constant.value, Value::Void);
}

// ---- type expressions ----

#[test]
fn list_types_require_one_parameter() {
    let resolver = FakeResolver::new();
    let decl = const_decl("bad", ty("List"), vlist(vec![]));
    let (_, _, diag) = translate_with(&resolver, &decl);
    assert!(diag.to_lines().contains("'List' requires exactly one parameter"));
}

#[test]
fn list_of_any_is_rejected() {
    let resolver = FakeResolver::new();
    let decl = const_decl("bad", list_of(ty("Any")), vlist(vec![]));
    let (_, _, diag) = translate_with(&resolver, &decl);
    assert!(diag.to_lines().contains("'List(Any)' is not supported"));
}

#[test]
fn scalar_types_reject_parameters() {
    let resolver = FakeResolver::new();
    let mut bad_ty = ty("UInt8");
    bad_ty.params.push(ty("Text"));
    let decl = const_decl("bad", bad_ty, int(0));
    let (_, _, diag) = translate_with(&resolver, &decl);
    assert!(diag.to_lines().contains("'UInt8' does not accept parameters"));
}

#[test]
fn non_type_names_are_rejected() {
    let mut resolver = FakeResolver::new();
    resolver.add_node(
        "someConst",
        DeclKind::Const,
        Node::new(NodeId(0x77), NodeId(1), "test.weft:someConst".into(), 9),
    );
    let decl = const_decl("bad", ty("someConst"), int(0));
    let (_, _, diag) = translate_with(&resolver, &decl);
    assert!(diag.to_lines().contains("'someConst' is not a type"));
}

// ---- annotation declarations and applications ----

#[test]
fn annotation_decl_carries_declared_targets() {
    let resolver = FakeResolver::new();
    let decl = annotation_decl("verified", ty("Text"), Targets::STRUCT | Targets::FIELD);
    let (node, _, diag) = translate_with(&resolver, &decl);
    assert!(diag.is_empty(), "{}", diag.to_lines());

    let NodeBody::Annotation(annotation) = &node.body else {
        panic!("expected an annotation node");
    };
    assert_eq!(annotation.ty, Type::Text);
    assert!(annotation.targets.contains(Targets::STRUCT));
    assert!(!annotation.targets.contains(Targets::ENUM));
}

#[test]
fn annotation_applies_to_a_permitted_target() {
    let mut resolver = FakeResolver::new();
    resolver.add_node(
        "verified",
        DeclKind::Annotation,
        annotation_node(0x50, "verified", Type::Text, Targets::STRUCT | Targets::FIELD),
    );

    let decl = annotate(
        struct_decl("S", vec![field("a", 0, ty("UInt8"))]),
        "verified",
        Some(text("audited")),
    );
    let (node, _, diag) = translate_with(&resolver, &decl);
    assert!(diag.is_empty(), "{}", diag.to_lines());

    assert_eq!(node.annotations.len(), 1);
    assert_eq!(node.annotations[0].id, NodeId(0x50));
    assert_eq!(node.annotations[0].value, Value::Text(Some("audited".into())));
}

#[test]
fn annotation_on_a_forbidden_target_is_reported() {
    let mut resolver = FakeResolver::new();
    resolver.add_node(
        "verified",
        DeclKind::Annotation,
        annotation_node(0x50, "verified", Type::Text, Targets::STRUCT),
    );

    let decl = annotate(
        enum_decl("E", vec![enumerant("a", 0)]),
        "verified",
        Some(text("nope")),
    );
    let (node, _, diag) = translate_with(&resolver, &decl);

    assert!(
        diag.to_lines()
            .contains("'verified' cannot be applied to this kind of declaration")
    );
    // The payload still compiles so downstream passes see a whole record.
    assert_eq!(node.annotations[0].value, Value::Text(Some("nope".into())));
}

#[test]
fn annotation_value_requirements() {
    let mut resolver = FakeResolver::new();
    resolver.add_node(
        "tag",
        DeclKind::Annotation,
        annotation_node(0x51, "tag", Type::Text, Targets::ALL),
    );
    resolver.add_node(
        "flag",
        DeclKind::Annotation,
        annotation_node(0x52, "flag", Type::Void, Targets::ALL),
    );

    // Text annotation without a value: error, defaulted payload.
    let decl = annotate(struct_decl("S", vec![field("a", 0, ty("UInt8"))]), "tag", None);
    let (node, _, diag) = translate_with(&resolver, &decl);
    assert!(diag.to_lines().contains("'tag' requires a value"));
    assert_eq!(node.annotations[0].value, Value::Text(None));

    // Void annotation without a value is the normal case.
    let decl = annotate(struct_decl("S", vec![field("a", 0, ty("UInt8"))]), "flag", None);
    let (node, _, diag) = translate_with(&resolver, &decl);
    assert!(diag.is_empty(), "{}", diag.to_lines());
    assert_eq!(node.annotations[0].value, Value::Void);
}

#[test]
fn non_annotation_reference_is_reported() {
    let mut resolver = FakeResolver::new();
    resolver.add_struct("Point", NodeId(0x60), weft_schema::StructNode::default());

    let decl = annotate(
        struct_decl("S", vec![field("a", 0, ty("UInt8"))]),
        "Point",
        None,
    );
    let (_, _, diag) = translate_with(&resolver, &decl);
    assert!(diag.to_lines().contains("'Point' is not an annotation"));
}

#[test]
fn field_and_enumerant_annotations_attach_to_their_records() {
    let mut resolver = FakeResolver::new();
    resolver.add_node(
        "tag",
        DeclKind::Annotation,
        annotation_node(0x51, "tag", Type::Uint16, Targets::ALL),
    );

    let decl = struct_decl(
        "S",
        vec![
            annotate(field("a", 0, ty("UInt8")), "tag", Some(int(7))),
            field("b", 1, ty("UInt8")),
        ],
    );
    let (node, _, diag) = translate_with(&resolver, &decl);
    assert!(diag.is_empty(), "{}", diag.to_lines());

    let s = node.as_struct().expect("struct node");
    let a = s.field("a").expect("field a");
    assert_eq!(a.annotations.len(), 1);
    assert_eq!(a.annotations[0].value, Value::Uint16(7));
    assert!(s.field("b").expect("field b").annotations.is_empty());

    let decl = enum_decl(
        "E",
        vec![
            annotate(enumerant("off", 0), "tag", Some(int(1))),
            enumerant("on", 1),
        ],
    );
    let (node, _, diag) = translate_with(&resolver, &decl);
    assert!(diag.is_empty(), "{}", diag.to_lines());

    let NodeBody::Enum(enumerants) = &node.body else {
        panic!("expected an enum node");
    };
    assert_eq!(enumerants[0].annotations[0].value, Value::Uint16(1));
}

// ---- scope permission checks ----

#[test]
fn enumerants_belong_in_enums_only() {
    let (_, _, diag) = translate_struct(vec![enumerant("stray", 0)]);
    assert!(diag.to_lines().contains("enumerants can only appear in enums"));
}

#[test]
fn methods_belong_in_interfaces_only() {
    let (_, _, diag) = translate_struct(vec![method_decl("stray")]);
    assert!(diag.to_lines().contains("methods can only appear in interfaces"));
}

#[test]
fn fields_do_not_belong_in_files() {
    let resolver = FakeResolver::new();
    let decl = file_decl("demo.weft", vec![field("stray", 0, ty("UInt8"))]);
    let (_, _, diag) = translate_with(&resolver, &decl);
    assert!(diag.to_lines().contains("this declaration can only appear in structs"));
}

#[test]
fn type_declarations_do_not_belong_in_enums() {
    let resolver = FakeResolver::new();
    let decl = enum_decl(
        "E",
        vec![enumerant("a", 0), struct_decl("Nested", vec![])],
    );
    let (_, _, diag) = translate_with(&resolver, &decl);
    assert!(diag.to_lines().contains("this kind of declaration doesn't belong here"));
}

// ---- group ids ----

#[test]
fn group_ids_are_stable_and_derived() {
    let parent = NodeId(0xdead_beef);
    let id = generate_group_id(parent, 3);
    assert_eq!(id, generate_group_id(parent, 3));
    assert!(id.is_derived());
    assert_ne!(id, generate_group_id(parent, 4));
    assert_ne!(id, generate_group_id(NodeId(0xdead_bef0), 3));
}
