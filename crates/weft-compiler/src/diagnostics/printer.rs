//! Builder-pattern printer for rendering diagnostics.

use std::fmt::Write;

use annotate_snippets::{AnnotationKind, Group, Level, Renderer, Snippet};
use rowan::TextRange;

use super::message::{DiagnosticMessage, Severity};

pub struct DiagnosticsPrinter<'a> {
    diagnostics: &'a [DiagnosticMessage],
    source: &'a str,
    colored: bool,
}

impl<'a> DiagnosticsPrinter<'a> {
    pub(crate) fn new(diagnostics: &'a [DiagnosticMessage], source: &'a str) -> Self {
        Self {
            diagnostics,
            source,
            colored: false,
        }
    }

    pub fn colored(mut self, value: bool) -> Self {
        self.colored = value;
        self
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        self.format(&mut out).expect("string write never fails");
        out
    }

    pub fn format(&self, w: &mut impl Write) -> std::fmt::Result {
        let renderer = if self.colored {
            Renderer::styled()
        } else {
            Renderer::plain()
        };

        for (i, diag) in self.diagnostics.iter().enumerate() {
            let range = adjust_range(diag.span, self.source.len());

            let mut snippet = Snippet::source(self.source)
                .line_start(1)
                .annotation(AnnotationKind::Primary.span(range));

            for related in &diag.related {
                snippet = snippet.annotation(
                    AnnotationKind::Context
                        .span(adjust_range(related.span, self.source.len()))
                        .label(&related.message),
                );
            }

            let level = severity_to_level(diag.severity());
            let report: Vec<Group> = vec![level.primary_title(&diag.message).element(snippet)];

            if i > 0 {
                w.write_str("\n\n")?;
            }
            write!(w, "{}", renderer.render(&report))?;
        }

        Ok(())
    }
}

fn severity_to_level(severity: Severity) -> Level<'static> {
    match severity {
        Severity::Error => Level::ERROR,
        Severity::Warning => Level::WARNING,
    }
}

fn adjust_range(range: TextRange, limit: usize) -> std::ops::Range<usize> {
    let start: usize = range.start().into();
    let end: usize = range.end().into();

    if start == end {
        return start..(start + 1).min(limit);
    }

    start..end
}
