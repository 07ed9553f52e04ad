//! Fault-tolerant repair of Kubernetes YAML manifests.
//!
//! Pipeline: a total line-oriented parse ([`parser`]) into an arena tree
//! ([`ast`]), structural reorganization against the resource catalog
//! ([`schema`], [`reorganize`]), confidence-scored type coercion ([`types`]),
//! all orchestrated by the five-pass [`fixer`]. [`report`] renders the result
//! for humans; the [`cli`] wires it to files and stdin.

pub mod ast;
pub mod cli;
pub mod diag;
pub mod fixer;
pub mod parser;
pub mod reorganize;
pub mod report;
pub mod schema;
pub mod types;
pub mod value;

pub use diag::{Diagnostic, DiagnosticCode, FixCategory, FixChange, Severity};
pub use fixer::{FixOptions, FixResult, Fixer};

/// One-shot repair with default options.
pub fn fix(content: &str) -> FixResult {
    fixer::fix(content)
}
