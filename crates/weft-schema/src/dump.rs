//! Text dump of translated schema nodes.
//!
//! One line per node header and per field, stable across runs, meant for
//! debugging output and golden tests rather than machine consumption.

use std::fmt::Write;

use crate::{FieldSlot, Node, NodeBody, StructNode, Targets, Value};

/// Render a node followed by its auxiliary group nodes.
pub fn dump(node: &Node, groups: &[Node]) -> String {
    let mut out = dump_node(node);
    for group in groups {
        out.push('\n');
        out.push_str(&dump_node(group));
    }
    out
}

/// Render a single node as an indented text block.
pub fn dump_node(node: &Node) -> String {
    let mut out = String::new();
    let kind = match &node.body {
        NodeBody::File => "file",
        NodeBody::Struct(s) if s.is_group => "group",
        NodeBody::Struct(_) => "struct",
        NodeBody::Enum(_) => "enum",
        NodeBody::Interface => "interface",
        NodeBody::Const(_) => "const",
        NodeBody::Annotation(_) => "annotation",
    };
    writeln!(out, "{kind} {} {}", node.display_name, node.id).expect("string write never fails");

    match &node.body {
        NodeBody::File | NodeBody::Interface => {}
        NodeBody::Struct(s) => dump_struct(&mut out, s),
        NodeBody::Enum(enumerants) => {
            for (value, enumerant) in enumerants.iter().enumerate() {
                writeln!(out, "  enumerant {} = {value}", enumerant.name)
                    .expect("string write never fails");
            }
        }
        NodeBody::Const(c) => {
            writeln!(out, "  {} = {}", c.ty, c.value).expect("string write never fails");
        }
        NodeBody::Annotation(a) => {
            writeln!(out, "  {} targets {}", a.ty, targets_str(a.targets))
                .expect("string write never fails");
        }
    }
    out
}

fn dump_struct(out: &mut String, s: &StructNode) {
    writeln!(
        out,
        "  size: {} words, {} pointers, {}",
        s.data_words, s.pointer_count, s.preferred_encoding
    )
    .expect("string write never fails");
    if s.discriminant_count > 0 {
        writeln!(
            out,
            "  discriminant: {} variants, tag at {}",
            s.discriminant_count, s.discriminant_offset
        )
        .expect("string write never fails");
    }
    for field in &s.fields {
        let tag = match field.discriminant_value {
            Some(value) => format!(", tag {value}"),
            None => String::new(),
        };
        match &field.slot {
            FieldSlot::Regular {
                ty,
                default_value,
                offset,
            } => {
                let default = if *default_value == Value::default_for(ty) {
                    String::new()
                } else {
                    format!(" = {default_value}")
                };
                let place = match ty.field_size() {
                    crate::FieldSize::Void => "void".to_string(),
                    crate::FieldSize::Data(_) => format!("data {offset}"),
                    crate::FieldSize::Pointer => format!("pointer {offset}"),
                };
                writeln!(
                    out,
                    "  field {} @{}: {ty}{default} ({place}{tag})",
                    field.name, field.ordinal
                )
                .expect("string write never fails");
            }
            FieldSlot::Group { type_id } => {
                writeln!(out, "  group {} -> {type_id}{}", field.name, tag)
                    .expect("string write never fails");
            }
        }
    }
}

fn targets_str(targets: Targets) -> String {
    if targets == Targets::ALL {
        return "all".to_string();
    }
    if targets == Targets::NONE {
        return "none".to_string();
    }
    const NAMES: [(Targets, &str); 11] = [
        (Targets::FILE, "file"),
        (Targets::CONST, "const"),
        (Targets::ENUM, "enum"),
        (Targets::ENUMERANT, "enumerant"),
        (Targets::STRUCT, "struct"),
        (Targets::FIELD, "field"),
        (Targets::UNION, "union"),
        (Targets::GROUP, "group"),
        (Targets::INTERFACE, "interface"),
        (Targets::METHOD, "method"),
        (Targets::ANNOTATION, "annotation"),
    ];
    let names: Vec<&str> = NAMES
        .iter()
        .filter(|(flag, _)| targets.contains(*flag))
        .map(|(_, name)| *name)
        .collect();
    names.join(" | ")
}
