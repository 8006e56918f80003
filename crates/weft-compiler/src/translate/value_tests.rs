use weft_schema::{
    ConstNode, Field, FieldSlot, ListValue, Node, NodeBody, NodeId, StructNode, StructValue, Type,
    Value,
};

use crate::ast::DeclKind;
use crate::diagnostics::Diagnostics;
use crate::test_utils::*;
use crate::translate::NodeTranslator;

fn const_value(node: &Node) -> &Value {
    match &node.body {
        NodeBody::Const(c) => &c.value,
        _ => panic!("expected a const node"),
    }
}

fn default_of(node: &Node, field: &str) -> Value {
    let s = node.as_struct().expect("struct node");
    match &s.field(field).expect("field").slot {
        FieldSlot::Regular { default_value, .. } => default_value.clone(),
        FieldSlot::Group { .. } => panic!("group fields have no default"),
    }
}

fn regular_field(name: &str, ty: Type) -> Field {
    let default_value = Value::default_for(&ty);
    Field {
        name: name.to_string(),
        code_order: 0,
        ordinal: 0,
        discriminant_value: None,
        annotations: Vec::new(),
        slot: FieldSlot::Regular {
            ty,
            default_value,
            offset: 0,
        },
    }
}

fn const_node(id: u64, name: &str, ty: Type, value: Value) -> Node {
    let mut node = Node::new(NodeId(id), NodeId(1), format!("test.weft:{name}"), name.len());
    node.body = NodeBody::Const(ConstNode { ty, value });
    node
}

fn enum_node(id: u64, name: &str, enumerants: &[&str]) -> Node {
    let mut node = Node::new(NodeId(id), NodeId(1), format!("test.weft:{name}"), name.len());
    node.body = NodeBody::Enum(
        enumerants
            .iter()
            .enumerate()
            .map(|(i, e)| weft_schema::Enumerant {
                name: e.to_string(),
                code_order: i as u32,
                annotations: Vec::new(),
            })
            .collect(),
    );
    node
}

// ---- field defaults ----

#[test]
fn explicit_defaults_are_compiled() {
    let (node, _, diag) = translate_struct(vec![field_with_default(
        "count",
        0,
        ty("UInt8"),
        int(5),
    )]);
    assert!(diag.is_empty(), "{}", diag.to_lines());
    assert_eq!(default_of(&node, "count"), Value::Uint8(5));
}

#[test]
fn bad_defaults_degrade_to_the_default_default() {
    let (node, _, diag) = translate_struct(vec![field_with_default(
        "count",
        0,
        ty("UInt8"),
        text("five"),
    )]);
    assert!(diag.to_lines().contains("type mismatch: expected UInt8"));
    assert_eq!(default_of(&node, "count"), Value::Uint8(0));
}

#[test]
fn out_of_range_integers_are_reported() {
    let (node, _, diag) = translate_struct(vec![field_with_default(
        "count",
        0,
        ty("UInt8"),
        int(999),
    )]);
    assert!(
        diag.to_lines()
            .contains("integer value is out of range for UInt8")
    );
    assert_eq!(default_of(&node, "count"), Value::Uint8(0));
}

#[test]
fn negative_literals() {
    let (node, _, diag) = translate_struct(vec![
        field_with_default("a", 0, ty("Int32"), neg(4)),
        field_with_default("b", 1, ty("Int64"), neg(9_223_372_036_854_775_808)),
    ]);
    assert!(diag.is_empty(), "{}", diag.to_lines());
    assert_eq!(default_of(&node, "a"), Value::Int32(-4));
    assert_eq!(default_of(&node, "b"), Value::Int64(i64::MIN));
}

#[test]
fn integer_too_big_to_negate() {
    let (_, _, diag) = translate_struct(vec![field_with_default(
        "a",
        0,
        ty("Int64"),
        neg(9_223_372_036_854_775_809),
    )]);
    assert!(diag.to_lines().contains("integer is too big to be negative"));
}

#[test]
fn float_coercions() {
    let (node, _, diag) = translate_struct(vec![
        field_with_default("a", 0, ty("Float32"), float(2.5)),
        field_with_default("b", 1, ty("Float64"), int(7)),
    ]);
    assert!(diag.is_empty(), "{}", diag.to_lines());
    assert_eq!(default_of(&node, "a"), Value::Float32(2.5));
    assert_eq!(default_of(&node, "b"), Value::Float64(7.0));
}

#[test]
fn floats_do_not_fit_integer_fields() {
    let (_, _, diag) = translate_struct(vec![field_with_default(
        "a",
        0,
        ty("UInt8"),
        float(1.5),
    )]);
    assert!(diag.to_lines().contains("type mismatch: expected UInt8"));
}

#[test]
fn keyword_literals() {
    let (node, _, diag) = translate_struct(vec![
        field_with_default("yes", 0, ty("Bool"), vname("true")),
        field_with_default("no", 1, ty("Bool"), vname("false")),
        field_with_default("unit", 2, ty("Void"), vname("void")),
        field_with_default("inf", 3, ty("Float32"), vname("inf")),
    ]);
    assert!(diag.is_empty(), "{}", diag.to_lines());
    assert_eq!(default_of(&node, "yes"), Value::Bool(true));
    assert_eq!(default_of(&node, "no"), Value::Bool(false));
    assert_eq!(default_of(&node, "unit"), Value::Void);
    assert_eq!(default_of(&node, "inf"), Value::Float32(f32::INFINITY));
}

#[test]
fn nan_compiles_to_a_nan() {
    let (node, _, diag) = translate_struct(vec![field_with_default(
        "x",
        0,
        ty("Float64"),
        vname("nan"),
    )]);
    assert!(diag.is_empty(), "{}", diag.to_lines());
    match default_of(&node, "x") {
        Value::Float64(v) => assert!(v.is_nan()),
        other => panic!("expected a float, got {other:?}"),
    }
}

#[test]
fn keywords_respect_the_expected_type() {
    let (_, _, diag) = translate_struct(vec![field_with_default(
        "a",
        0,
        ty("UInt8"),
        vname("true"),
    )]);
    assert!(diag.to_lines().contains("type mismatch: expected UInt8"));
}

#[test]
fn strings_fill_text_and_data() {
    let (node, _, diag) = translate_struct(vec![
        field_with_default("t", 0, ty("Text"), text("hello")),
        field_with_default("d", 1, ty("Data"), text("hi")),
    ]);
    assert!(diag.is_empty(), "{}", diag.to_lines());
    assert_eq!(default_of(&node, "t"), Value::Text(Some("hello".into())));
    assert_eq!(default_of(&node, "d"), Value::Data(Some(b"hi".to_vec())));
}

// ---- enums ----

#[test]
fn enumerant_names_compile_to_their_wire_value() {
    let mut resolver = FakeResolver::new();
    resolver.add_node(
        "Color",
        DeclKind::Enum,
        enum_node(0x40, "Color", &["red", "green", "blue"]),
    );

    let decl = const_decl("fav", ty("Color"), vname("green"));
    let (node, _, diag) = translate_with(&resolver, &decl);
    assert!(diag.is_empty(), "{}", diag.to_lines());
    assert_eq!(*const_value(&node), Value::Enum(1));
}

#[test]
fn broken_enum_schemas_assume_the_enumerant_matched() {
    let mut resolver = FakeResolver::new();
    // The name resolves but no bootstrap node exists: some earlier error
    // already covered it, so no fresh diagnostic appears here.
    resolver.add_name("Ghost", DeclKind::Enum, NodeId(0x41));

    let decl = const_decl("fav", ty("Ghost"), vname("whatever"));
    let (node, _, diag) = translate_with(&resolver, &decl);
    assert!(diag.is_empty(), "{}", diag.to_lines());
    assert_eq!(*const_value(&node), Value::Enum(0));
}

#[test]
fn unknown_enumerants_fall_through_to_constant_lookup() {
    let mut resolver = FakeResolver::new();
    resolver.add_node(
        "Color",
        DeclKind::Enum,
        enum_node(0x40, "Color", &["red", "green"]),
    );

    // Not an enumerant, and not a resolvable constant either; the resolver
    // owns reporting unresolved names, so nothing lands here.
    let decl = const_decl("fav", ty("Color"), vname("purple"));
    let (node, _, diag) = translate_with(&resolver, &decl);
    assert!(diag.is_empty(), "{}", diag.to_lines());
    assert_eq!(*const_value(&node), Value::Enum(0));
}

// ---- constants ----

#[test]
fn qualified_constants_resolve() {
    let mut resolver = FakeResolver::new();
    resolver.add_node(
        "Limits.max",
        DeclKind::Const,
        const_node(0x70, "Limits.max", Type::Uint32, Value::Uint32(99)),
    );

    let (node, _, diag) = {
        let decl = struct_decl(
            "S",
            vec![field_with_default("cap", 0, ty("UInt32"), vname("Limits.max"))],
        );
        translate_with(&resolver, &decl)
    };
    assert!(diag.is_empty(), "{}", diag.to_lines());
    assert_eq!(default_of(&node, "cap"), Value::Uint32(99));
}

#[test]
fn constants_widen_to_larger_integer_fields() {
    let mut resolver = FakeResolver::new();
    resolver.add_node(
        "Limits.small",
        DeclKind::Const,
        const_node(0x71, "Limits.small", Type::Uint8, Value::Uint8(5)),
    );

    let decl = struct_decl(
        "S",
        vec![field_with_default("n", 0, ty("UInt16"), vname("Limits.small"))],
    );
    let (node, _, diag) = translate_with(&resolver, &decl);
    assert!(diag.is_empty(), "{}", diag.to_lines());
    assert_eq!(default_of(&node, "n"), Value::Uint16(5));
}

#[test]
fn bare_constant_references_demand_qualification() {
    let mut resolver = FakeResolver::new();
    // Scope node so the suggestion can name the parent.
    resolver.add_node(
        "scope",
        DeclKind::File,
        Node::new(NodeId(1), NodeId(0), "test.weft".into(), 0),
    );
    resolver.add_node(
        "max",
        DeclKind::Const,
        const_node(0x70, "max", Type::Uint32, Value::Uint32(42)),
    );

    let decl = struct_decl(
        "S",
        vec![field_with_default("cap", 0, ty("UInt32"), vname("max"))],
    );
    let (node, _, diag) = translate_with(&resolver, &decl);

    assert!(diag.to_lines().contains("constant names must be qualified"));
    // The value is still applied; the error is advisory.
    assert_eq!(default_of(&node, "cap"), Value::Uint32(42));
}

#[test]
fn non_constant_references_are_reported() {
    let mut resolver = FakeResolver::new();
    resolver.add_node(
        "Color",
        DeclKind::Enum,
        enum_node(0x40, "Color", &["red"]),
    );

    // A UInt16 value referencing the enum type itself.
    let decl = struct_decl(
        "S",
        vec![field_with_default("n", 0, ty("UInt16"), vname("Color"))],
    );
    let (_, _, diag) = translate_with(&resolver, &decl);
    assert!(
        diag.to_lines()
            .contains("'Color' does not refer to a constant")
    );
}

// ---- compound values and the two-phase compile ----

#[test]
fn list_constants_wait_for_the_finish_pass() {
    let resolver = FakeResolver::new();
    let decl = const_decl("xs", list_of(ty("UInt8")), vlist(vec![int(1), int(2), int(3)]));

    let mut diag = Diagnostics::new();
    let mut translator = NodeTranslator::new(
        &resolver,
        &mut diag,
        &decl,
        TEST_NODE_ID,
        NodeId(1),
        "test.weft:xs".into(),
        true,
    );

    // Bootstrap leaves the compound value at its default-default.
    assert_eq!(*const_value(translator.bootstrap().node), Value::List(None));

    let finished = translator.finish();
    assert_eq!(
        *const_value(finished.node),
        Value::List(Some(ListValue {
            elements: vec![Value::Uint8(1), Value::Uint8(2), Value::Uint8(3)],
        }))
    );
}

#[test]
fn struct_literals_compile_against_the_bootstrap_schema() {
    let mut resolver = FakeResolver::new();
    resolver.add_struct(
        "Point",
        NodeId(0x60),
        StructNode {
            fields: vec![
                regular_field("x", Type::Int32),
                regular_field("y", Type::Int32),
            ],
            ..StructNode::default()
        },
    );

    let decl = const_decl(
        "origin",
        ty("Point"),
        vstruct(vec![("x", int(3)), ("y", neg(4))]),
    );
    let (node, _, diag) = translate_with(&resolver, &decl);
    assert!(diag.is_empty(), "{}", diag.to_lines());

    assert_eq!(
        *const_value(&node),
        Value::Struct(Some(StructValue {
            type_id: NodeId(0x60),
            fields: vec![
                ("x".to_string(), Value::Int32(3)),
                ("y".to_string(), Value::Int32(-4)),
            ],
        }))
    );
}

#[test]
fn unknown_struct_literal_fields_are_reported() {
    let mut resolver = FakeResolver::new();
    resolver.add_struct(
        "Point",
        NodeId(0x60),
        StructNode {
            fields: vec![regular_field("x", Type::Int32)],
            ..StructNode::default()
        },
    );

    let decl = const_decl("bad", ty("Point"), vstruct(vec![("z", int(1))]));
    let (_, _, diag) = translate_with(&resolver, &decl);
    assert!(diag.to_lines().contains("struct has no field named 'z'"));
}

#[test]
fn struct_literals_do_not_fit_any() {
    let resolver = FakeResolver::new();
    let decl = const_decl("bad", ty("Any"), vstruct(vec![]));
    let (node, _, diag) = translate_with(&resolver, &decl);
    assert!(diag.to_lines().contains("type mismatch: expected Any"));
    assert_eq!(*const_value(&node), Value::Any);
}

#[test]
fn list_literals_require_list_targets() {
    let resolver = FakeResolver::new();
    let decl = const_decl("bad", list_of(ty("UInt8")), int(5));
    let (node, _, diag) = translate_with(&resolver, &decl);
    assert!(diag.to_lines().contains("type mismatch: expected List(UInt8)"));
    assert_eq!(*const_value(&node), Value::List(None));
}

#[test]
fn bad_list_elements_keep_their_defaults() {
    let resolver = FakeResolver::new();
    let decl = const_decl(
        "xs",
        list_of(ty("UInt8")),
        vlist(vec![int(1), text("two"), int(3)]),
    );
    let (node, _, diag) = translate_with(&resolver, &decl);
    assert!(diag.to_lines().contains("type mismatch: expected UInt8"));
    assert_eq!(
        *const_value(&node),
        Value::List(Some(ListValue {
            elements: vec![Value::Uint8(1), Value::Uint8(0), Value::Uint8(3)],
        }))
    );
}
