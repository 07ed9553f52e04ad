//! Human-readable rendering of a repair run.
//!
//! Pure over the change log: the fixer produces `FixResult`, this module only
//! groups and formats. Nothing here mutates a change.

use std::collections::BTreeMap;

use chrono::Local;
use colored::Colorize;
use indexmap::IndexMap;
use serde::Serialize;

use crate::diag::{FixCategory, FixChange, Severity};
use crate::fixer::FixResult;

// ———————————————————————————————————————————————————————————————————————————
// GROUPING
// ———————————————————————————————————————————————————————————————————————————

pub fn group_by_category(changes: &[FixChange]) -> IndexMap<FixCategory, Vec<&FixChange>> {
    let mut groups: IndexMap<FixCategory, Vec<&FixChange>> = IndexMap::new();
    for change in changes {
        groups.entry(change.category).or_default().push(change);
    }
    groups
}

pub fn group_by_severity(changes: &[FixChange]) -> IndexMap<Severity, Vec<&FixChange>> {
    let mut groups: IndexMap<Severity, Vec<&FixChange>> = IndexMap::new();
    for change in changes {
        groups.entry(change.severity).or_default().push(change);
    }
    groups
}

/// Keyed by 1-indexed line; structural changes carry line 0 and group as
/// document-level.
pub fn group_by_line(changes: &[FixChange]) -> BTreeMap<usize, Vec<&FixChange>> {
    let mut groups: BTreeMap<usize, Vec<&FixChange>> = BTreeMap::new();
    for change in changes {
        groups.entry(change.line).or_default().push(change);
    }
    groups
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceBucket {
    /// >= 0.9
    High,
    /// >= 0.7
    Medium,
    Low,
}

impl ConfidenceBucket {
    pub fn of(confidence: f64) -> Self {
        if confidence >= 0.9 {
            ConfidenceBucket::High
        } else if confidence >= 0.7 {
            ConfidenceBucket::Medium
        } else {
            ConfidenceBucket::Low
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub total_changes: usize,
    pub by_category: IndexMap<&'static str, usize>,
    pub by_severity: IndexMap<&'static str, usize>,
    pub by_confidence: IndexMap<&'static str, usize>,
    pub overall_confidence: f64,
    pub is_valid: bool,
    pub elapsed_ms: f64,
}

impl Summary {
    pub fn from_result(result: &FixResult) -> Self {
        let mut by_category = IndexMap::new();
        let mut by_severity = IndexMap::new();
        let mut by_confidence = IndexMap::new();
        for change in &result.changes {
            *by_category.entry(category_label(change.category)).or_insert(0) += 1;
            *by_severity.entry(severity_label(change.severity)).or_insert(0) += 1;
            *by_confidence
                .entry(bucket_label(ConfidenceBucket::of(change.confidence)))
                .or_insert(0) += 1;
        }
        Summary {
            total_changes: result.changes.len(),
            by_category,
            by_severity,
            by_confidence,
            overall_confidence: result.confidence,
            is_valid: result.is_valid,
            elapsed_ms: result.pass_breakdown.iter().map(|p| p.duration_ms).sum(),
        }
    }
}

pub fn category_label(category: FixCategory) -> &'static str {
    match category {
        FixCategory::Syntax => "syntax",
        FixCategory::Structure => "structure",
        FixCategory::Semantic => "semantic",
        FixCategory::Type => "type",
    }
}

pub fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
        Severity::Info => "info",
        Severity::Hint => "hint",
    }
}

fn bucket_label(bucket: ConfidenceBucket) -> &'static str {
    match bucket {
        ConfidenceBucket::High => "high",
        ConfidenceBucket::Medium => "medium",
        ConfidenceBucket::Low => "low",
    }
}

// ———————————————————————————————————————————————————————————————————————————
// LINE DIFF
// ———————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffKind {
    Unchanged,
    Modified,
    Added,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffLine {
    pub kind: DiffKind,
    /// 1-indexed position in whichever side the line exists.
    pub line: usize,
    pub old: Option<String>,
    pub new: Option<String>,
}

/// Index-aligned comparison. Positional, not a minimal edit script: line i of
/// the input is compared with line i of the output.
pub fn line_diff(original: &str, fixed: &str) -> Vec<DiffLine> {
    let old: Vec<&str> = original.split('\n').collect();
    let new: Vec<&str> = fixed.split('\n').collect();
    let mut out = Vec::with_capacity(old.len().max(new.len()));
    for i in 0..old.len().max(new.len()) {
        let line = i + 1;
        match (old.get(i), new.get(i)) {
            (Some(o), Some(n)) if o == n => out.push(DiffLine {
                kind: DiffKind::Unchanged,
                line,
                old: Some((*o).to_string()),
                new: Some((*n).to_string()),
            }),
            (Some(o), Some(n)) => out.push(DiffLine {
                kind: DiffKind::Modified,
                line,
                old: Some((*o).to_string()),
                new: Some((*n).to_string()),
            }),
            (Some(o), None) => out.push(DiffLine {
                kind: DiffKind::Removed,
                line,
                old: Some((*o).to_string()),
                new: None,
            }),
            (None, Some(n)) => out.push(DiffLine {
                kind: DiffKind::Added,
                line,
                old: None,
                new: Some((*n).to_string()),
            }),
            (None, None) => {}
        }
    }
    out
}

// ———————————————————————————————————————————————————————————————————————————
// RENDERING
// ———————————————————————————————————————————————————————————————————————————

pub fn render_text(source_name: &str, result: &FixResult) -> String {
    let summary = Summary::from_result(result);
    let mut out = String::new();

    let status = if result.is_valid {
        "VALID".green().bold()
    } else {
        "INVALID".red().bold()
    };
    out.push_str(&format!(
        "{} {} — {} ({})\n",
        "yamlfix".bold(),
        source_name,
        status,
        Local::now().format("%Y-%m-%d %H:%M:%S"),
    ));
    out.push_str(&format!(
        "{} change(s), confidence {:.2}, {:.1} ms\n",
        summary.total_changes, summary.overall_confidence, summary.elapsed_ms,
    ));

    for (line, changes) in group_by_line(&result.changes) {
        let heading = if line == 0 {
            "document".to_string()
        } else {
            format!("line {line}")
        };
        out.push_str(&format!("\n{}\n", heading.cyan()));
        for change in changes {
            let tag = match change.severity {
                Severity::Error => severity_label(change.severity).red(),
                Severity::Warning => severity_label(change.severity).yellow(),
                _ => severity_label(change.severity).normal(),
            };
            out.push_str(&format!(
                "  [{tag}] {} ({}, {:.2})\n",
                change.reason,
                category_label(change.category),
                change.confidence,
            ));
            if change.line > 0 {
                out.push_str(&format!(
                    "    {} {}\n    {} {}\n",
                    "-".red(),
                    change.original,
                    "+".green(),
                    change.fixed,
                ));
            }
        }
    }

    if !result.errors.is_empty() {
        out.push_str(&format!("\n{}\n", "remaining problems".red().bold()));
        for error in &result.errors {
            out.push_str(&format!("  {error}\n"));
        }
    }

    out
}

pub fn render_diff(original: &str, fixed: &str) -> String {
    let mut out = String::new();
    for entry in line_diff(original, fixed) {
        match entry.kind {
            DiffKind::Unchanged => {
                if let Some(line) = entry.new {
                    out.push_str(&format!("  {line}\n"));
                }
            }
            DiffKind::Modified => {
                if let Some(old) = entry.old {
                    out.push_str(&format!("{} {old}\n", "-".red()));
                }
                if let Some(new) = entry.new {
                    out.push_str(&format!("{} {new}\n", "+".green()));
                }
            }
            DiffKind::Removed => {
                if let Some(old) = entry.old {
                    out.push_str(&format!("{} {old}\n", "-".red()));
                }
            }
            DiffKind::Added => {
                if let Some(new) = entry.new {
                    out.push_str(&format!("{} {new}\n", "+".green()));
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixer;

    fn sample_changes() -> Vec<FixChange> {
        vec![
            FixChange::new(1, "kind Pod", "kind: Pod", "missing colon", FixCategory::Syntax, 0.85),
            FixChange::new(
                0,
                "spec.containers",
                "spec.template.spec.containers",
                "relocated",
                FixCategory::Structure,
                0.90,
            ),
            FixChange::new(4, "replicas: \"3\"", "replicas: 3", "unquoted", FixCategory::Type, 0.95)
                .with_severity(Severity::Warning),
        ]
    }

    #[test]
    fn grouping_splits_by_category_severity_and_line() {
        let changes = sample_changes();
        let by_cat = group_by_category(&changes);
        assert_eq!(by_cat[&FixCategory::Syntax].len(), 1);
        assert_eq!(by_cat[&FixCategory::Structure].len(), 1);

        let by_sev = group_by_severity(&changes);
        assert_eq!(by_sev[&Severity::Info].len(), 2);
        assert_eq!(by_sev[&Severity::Warning].len(), 1);

        let by_line = group_by_line(&changes);
        assert_eq!(by_line[&0].len(), 1, "document-level changes group at 0");
        assert!(by_line.contains_key(&1) && by_line.contains_key(&4));
    }

    #[test]
    fn confidence_buckets_split_at_point_nine_and_point_seven() {
        assert_eq!(ConfidenceBucket::of(0.95), ConfidenceBucket::High);
        assert_eq!(ConfidenceBucket::of(0.9), ConfidenceBucket::High);
        assert_eq!(ConfidenceBucket::of(0.75), ConfidenceBucket::Medium);
        assert_eq!(ConfidenceBucket::of(0.5), ConfidenceBucket::Low);
    }

    #[test]
    fn summary_counts_match_the_change_log() {
        let result = fixer::fix("apiVersion v1\nkind Pod\nmetadata:\n  name: a\n");
        let summary = Summary::from_result(&result);
        assert_eq!(summary.total_changes, result.changes.len());
        assert!(summary.total_changes >= 2);
        assert_eq!(
            summary.by_category.values().sum::<usize>(),
            summary.total_changes
        );
        assert_eq!(summary.overall_confidence, result.confidence);
    }

    #[test]
    fn line_diff_is_index_aligned() {
        let diff = line_diff("a\nb\nc", "a\nB\nc\nd");
        assert_eq!(diff[0].kind, DiffKind::Unchanged);
        assert_eq!(diff[1].kind, DiffKind::Modified);
        assert_eq!(diff[1].old.as_deref(), Some("b"));
        assert_eq!(diff[1].new.as_deref(), Some("B"));
        assert_eq!(diff[2].kind, DiffKind::Unchanged);
        assert_eq!(diff[3].kind, DiffKind::Added);
        assert_eq!(diff[3].new.as_deref(), Some("d"));
    }

    #[test]
    fn render_text_names_every_line_group() {
        colored::control::set_override(false);
        let result = fixer::fix("kind Pod\napiVersion: v1\nmetadata:\n  name: a\n");
        let text = render_text("test.yaml", &result);
        assert!(text.contains("line 1"), "text: {text}");
        assert!(text.contains("missing colon"));
        colored::control::unset_override();
    }

    #[test]
    fn render_diff_marks_modified_lines() {
        colored::control::set_override(false);
        let diff = render_diff("kind Pod\n", "kind: Pod\n");
        assert!(diff.contains("- kind Pod"));
        assert!(diff.contains("+ kind: Pod"));
        colored::control::unset_override();
    }
}
