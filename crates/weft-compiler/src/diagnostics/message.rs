//! Diagnostic message types and related structures.

use rowan::TextRange;

/// Severity level of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Severity {
    #[default]
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// Related location information for a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedInfo {
    pub(crate) span: TextRange,
    pub(crate) message: String,
}

impl RelatedInfo {
    pub fn new(span: TextRange, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
        }
    }
}

/// A diagnostic message with location, message, severity, and optional
/// related locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticMessage {
    pub(crate) severity: Severity,
    pub(crate) span: TextRange,
    pub(crate) message: String,
    pub(crate) related: Vec<RelatedInfo>,
}

impl DiagnosticMessage {
    pub fn error(span: TextRange, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            span,
            message: message.into(),
            related: Vec::new(),
        }
    }

    pub fn warning(span: TextRange, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            span,
            message: message.into(),
            related: Vec::new(),
        }
    }

    pub fn with_related(mut self, span: TextRange, message: impl Into<String>) -> Self {
        self.related.push(RelatedInfo::new(span, message));
        self
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub(crate) fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for DiagnosticMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} at {}..{}: {}",
            self.severity,
            u32::from(self.span.start()),
            u32::from(self.span.end()),
            self.message
        )?;
        for related in &self.related {
            write!(
                f,
                " (related: {} at {}..{})",
                related.message,
                u32::from(related.span.start()),
                u32::from(related.span.end())
            )?;
        }
        Ok(())
    }
}
