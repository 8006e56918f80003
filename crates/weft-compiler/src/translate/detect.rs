//! Duplicate detection: names within a scope, ordinals within a struct or
//! enum.

use indexmap::IndexMap;
use indexmap::map::Entry;
use rowan::TextRange;

use crate::ast::{DeclKind, Declaration, LocatedOrdinal};
use crate::diagnostics::{DiagnosticMessage, Diagnostics};

/// Checks one scope's nested declarations for clashing names and for kinds
/// that do not belong under the parent. Recurses into struct members, which
/// no later pass would otherwise visit; an unnamed union shares its
/// parent's scope.
#[derive(Default)]
pub(crate) struct DuplicateNameDetector {
    names: IndexMap<String, TextRange>,
}

impl DuplicateNameDetector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn check(
        &mut self,
        decls: &[Declaration],
        parent_kind: DeclKind,
        diag: &mut Diagnostics,
    ) {
        for decl in decls {
            let name = &decl.name;
            match self.names.entry(name.text.clone()) {
                Entry::Occupied(previous) => {
                    let previous = *previous.get();
                    if name.text.is_empty() && decl.body.kind() == DeclKind::Union {
                        diag.push(
                            DiagnosticMessage::error(
                                name.span,
                                "an unnamed union is already defined in this scope",
                            )
                            .with_related(previous, "previously defined here"),
                        );
                    } else {
                        diag.push(
                            DiagnosticMessage::error(
                                name.span,
                                format!("'{}' is already defined in this scope", name.text),
                            )
                            .with_related(
                                previous,
                                format!("'{}' previously defined here", name.text),
                            ),
                        );
                    }
                }
                Entry::Vacant(slot) => {
                    slot.insert(name.span);
                }
            }

            match decl.body.kind() {
                DeclKind::Using
                | DeclKind::Const
                | DeclKind::Enum
                | DeclKind::Struct
                | DeclKind::Interface
                | DeclKind::Annotation => match parent_kind {
                    DeclKind::File | DeclKind::Struct | DeclKind::Interface => {}
                    _ => diag.push(DiagnosticMessage::error(
                        decl.span,
                        "this kind of declaration doesn't belong here",
                    )),
                },

                DeclKind::Enumerant => {
                    if parent_kind != DeclKind::Enum {
                        diag.push(DiagnosticMessage::error(
                            decl.span,
                            "enumerants can only appear in enums",
                        ));
                    }
                }

                DeclKind::Method => {
                    if parent_kind != DeclKind::Interface {
                        diag.push(DiagnosticMessage::error(
                            decl.span,
                            "methods can only appear in interfaces",
                        ));
                    }
                }

                DeclKind::Field | DeclKind::Union | DeclKind::Group => {
                    match parent_kind {
                        DeclKind::Struct | DeclKind::Union | DeclKind::Group => {}
                        _ => diag.push(DiagnosticMessage::error(
                            decl.span,
                            "this declaration can only appear in structs",
                        )),
                    }

                    // Struct members can nest; nobody else checks those.
                    if name.text.is_empty() {
                        // Unnamed union: members live in this same scope.
                        self.check(&decl.nested, decl.body.kind(), diag);
                    } else {
                        DuplicateNameDetector::new().check(&decl.nested, decl.body.kind(), diag);
                    }
                }

                DeclKind::File => diag.push(DiagnosticMessage::error(
                    decl.span,
                    "this kind of declaration doesn't belong here",
                )),
            }
        }
    }
}

/// Sequential ordinal check: ordinals must count up from zero with no
/// repeats and no holes.
#[derive(Default)]
pub(crate) struct DuplicateOrdinalDetector {
    expected_ordinal: u32,
    last_ordinal: Option<LocatedOrdinal>,
}

impl DuplicateOrdinalDetector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn check(&mut self, ordinal: LocatedOrdinal, diag: &mut Diagnostics) {
        let value = u32::from(ordinal.value);
        if value < self.expected_ordinal {
            let mut msg = DiagnosticMessage::error(ordinal.span, "duplicate ordinal number");
            // Point at the first use once, not for every duplicate.
            if let Some(last) = self.last_ordinal.take() {
                msg = msg.with_related(
                    last.span,
                    format!("ordinal @{} originally used here", last.value),
                );
            }
            diag.push(msg);
        } else if value > self.expected_ordinal {
            diag.push(DiagnosticMessage::error(
                ordinal.span,
                format!(
                    "skipped ordinal @{}; ordinals must be sequential with no holes",
                    self.expected_ordinal
                ),
            ));
            self.expected_ordinal = value + 1;
        } else {
            self.expected_ordinal += 1;
            self.last_ordinal = Some(ordinal);
        }
    }
}
