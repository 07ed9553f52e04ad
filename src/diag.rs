//! Diagnostic and fix-change payloads shared by every stage.
//!
//! Two record shapes flow through the pipeline:
//! - `Diagnostic`: attached to AST nodes where a problem was *detected*.
//! - `FixChange`: appended by a pass when a repair was *applied*. Append-only;
//!   never mutated after the pass that produced it.

use serde::Serialize;

/// Severity ladder for diagnostics and applied fixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
    Hint,
}

/// Stable machine-readable codes. Renderers key off these, not message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticCode {
    MissingColon,
    MissingSpaceAfterColon,
    BadIndent,
    UnterminatedQuote,
    TabIndent,
    KeyTypo,
    UnparseableLine,
    MisplacedField,
    MissingRequiredField,
    TypeMismatch,
}

/// A detected (not necessarily repaired) problem, anchored to a source line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: DiagnosticCode,
    pub message: String,
    /// 1-indexed source line.
    pub line: usize,
    /// 1-indexed column when known.
    pub column: Option<usize>,
    /// Whether an automated repair exists for this code.
    pub fixable: bool,
    /// Suggested replacement for the whole line, when one is known.
    pub suggestion: Option<String>,
}

impl Diagnostic {
    pub fn new(
        severity: Severity,
        code: DiagnosticCode,
        message: impl Into<String>,
        line: usize,
    ) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            line,
            column: None,
            fixable: false,
            suggestion: None,
        }
    }

    pub fn fixable(mut self, suggestion: impl Into<String>) -> Self {
        self.fixable = true;
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn at_column(mut self, column: usize) -> Self {
        self.column = Some(column);
        self
    }
}

/// What kind of repair a change was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FixCategory {
    /// Colon/space/indent/quote repairs local to one line.
    Syntax,
    /// A field moved (or created) somewhere else in the hierarchy.
    Structure,
    /// Document-level meaning repairs that are not pure type coercions.
    /// Reserved: no current pass emits it (coercions report as `Type`,
    /// relocations and creations as `Structure`).
    Semantic,
    /// A scalar converted to the field's declared type.
    Type,
}

/// One applied repair. `line` is 1-indexed; structure changes produced after
/// parsing carry line 0 and are grouped as document-level by the reporter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixChange {
    pub line: usize,
    pub original: String,
    pub fixed: String,
    pub reason: String,
    pub category: FixCategory,
    /// In [0, 1]; how certain the engine is the fix matches user intent.
    pub confidence: f64,
    pub severity: Severity,
}

impl FixChange {
    pub fn new(
        line: usize,
        original: impl Into<String>,
        fixed: impl Into<String>,
        reason: impl Into<String>,
        category: FixCategory,
        confidence: f64,
    ) -> Self {
        Self {
            line,
            original: original.into(),
            fixed: fixed.into(),
            reason: reason.into(),
            category,
            confidence,
            severity: Severity::Info,
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }
}
