//! Five-pass repair engine.
//!
//! Each pass is a bounded transformation over the current text:
//!
//! 1. line-local syntax normalization (tabs, indent, colons, dashes, quotes,
//!    key typos)
//! 2. tree reconstruction and structural reorganization (clean parses only)
//! 3. type coercion for known numeric/boolean fields
//! 4. iterative strict-error patching, bounded by `max_iterations`
//! 5. final validation and confidence scoring
//!
//! A `Fixer` carries nothing but its options; every `fix` call builds its own
//! working state, so one instance may be reused or thrown away freely.

use std::time::Instant;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::ast::analyze;
use crate::diag::{FixCategory, FixChange, Severity};
use crate::parser::{self, StrictError, StrictErrorKind};
use crate::reorganize;
use crate::types::{self, ExpectedType};
use crate::value::{self, Value};

// confidence per repair shape, most mechanical first
const CONF_TAB_FIX: f64 = 0.95;
const CONF_EVEN_INDENT: f64 = 0.85;
const CONF_DASH_SPACE: f64 = 0.95;
const CONF_KEY_TYPO: f64 = 0.90;
const CONF_MISSING_COLON: f64 = 0.85;
const CONF_COLON_SPACE: f64 = 0.98;
const CONF_CLOSE_QUOTE: f64 = 0.80;
const CONF_REINDENT: f64 = 0.75;
const CONF_STRIP_INLINE_SCALAR: f64 = 0.80;

#[derive(Debug, Clone, Copy)]
pub struct FixOptions {
    /// Changes scoring below this are kept but demoted to warning severity.
    pub confidence_threshold: f64,
    /// Apply coercions even when they score below the threshold.
    pub aggressive: bool,
    /// Upper bound on strict-error patch iterations.
    pub max_iterations: usize,
    pub indent_size: usize,
}

impl Default for FixOptions {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            aggressive: false,
            max_iterations: 3,
            indent_size: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PassBreakdown {
    pub pass: usize,
    pub name: &'static str,
    pub changes_count: usize,
    pub duration_ms: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FixResult {
    pub content: String,
    pub changes: Vec<FixChange>,
    pub is_valid: bool,
    pub errors: Vec<String>,
    /// Mean change confidence; 1.0 when nothing needed fixing.
    pub confidence: f64,
    pub pass_breakdown: Vec<PassBreakdown>,
}

pub struct Fixer {
    options: FixOptions,
}

impl Fixer {
    pub fn new(options: FixOptions) -> Self {
        Self { options }
    }

    pub fn fix(&self, content: &str) -> FixResult {
        if content.trim().is_empty() {
            return FixResult {
                content: content.to_string(),
                changes: Vec::new(),
                is_valid: true,
                errors: Vec::new(),
                confidence: 1.0,
                pass_breakdown: Vec::new(),
            };
        }

        let mut text = content.to_string();
        let mut changes = Vec::new();
        let mut semantic_errors = Vec::new();
        let mut breakdown = Vec::new();

        let passes: [(&'static str, PassFn); 4] = [
            ("syntax", Self::pass_syntax),
            ("structure", Self::pass_structure),
            ("types", Self::pass_types),
            ("strict-patch", Self::pass_strict_patch),
        ];
        for (idx, &(name, pass)) in passes.iter().enumerate() {
            let before = changes.len();
            let start = Instant::now();
            pass(self, &mut text, &mut changes, &mut semantic_errors);
            let applied = changes.len() - before;
            debug!(pass = idx + 1, name, applied, "pass complete");
            breakdown.push(PassBreakdown {
                pass: idx + 1,
                name,
                changes_count: applied,
                duration_ms: start.elapsed().as_secs_f64() * 1000.0,
            });
        }

        let start = Instant::now();
        let (is_valid, errors, confidence) =
            self.pass_score(&text, &mut changes, semantic_errors);
        debug!(pass = 5, name = "score", valid = is_valid, "pass complete");
        breakdown.push(PassBreakdown {
            pass: 5,
            name: "score",
            changes_count: 0,
            duration_ms: start.elapsed().as_secs_f64() * 1000.0,
        });

        FixResult {
            content: text,
            changes,
            is_valid,
            errors,
            confidence,
            pass_breakdown: breakdown,
        }
    }

    // ———————————————————————— Pass 1: syntax ————————————————————————— //

    fn pass_syntax(
        &self,
        text: &mut String,
        changes: &mut Vec<FixChange>,
        _errors: &mut Vec<String>,
    ) {
        let mut lines: Vec<String> = text.split('\n').map(String::from).collect();
        let mask = block_body_mask(&lines);

        for (idx, line) in lines.iter_mut().enumerate() {
            if mask[idx] || line.trim().is_empty() {
                continue;
            }
            let line_no = idx + 1;
            let trimmed = line.trim();
            if trimmed.starts_with('#') || trimmed == "---" || trimmed == "..." {
                continue;
            }

            fix_tabs(line, line_no, changes);
            fix_odd_indent(line, line_no, changes);
            fix_dash_space(line, line_no, changes);
            fix_key_typo(line, line_no, changes);
            fix_missing_colon(line, line_no, changes);
            fix_colon_space(line, line_no, changes);
            fix_unclosed_quote(line, line_no, changes);
        }

        *text = lines.join("\n");
    }

    // ——————————————————————— Pass 2: structure ——————————————————————— //

    fn pass_structure(
        &self,
        text: &mut String,
        changes: &mut Vec<FixChange>,
        errors: &mut Vec<String>,
    ) {
        let (root, strict) = parser::build_with_errors(text);
        let analysis = analyze(&root);
        if !strict.is_empty() || analysis.broken_count > 0 || analysis.keyless_count > 0 {
            // dirty parse: the strict-patch pass owns recovery, and lowering
            // here would drop broken or keyless lines
            return;
        }

        let mut rendered = Vec::new();
        let mut relocated = false;
        for &doc in &root.documents {
            let Some(document) = value::from_ast(&root, doc) else {
                rendered.push(String::new());
                continue;
            };
            if document.get_path("kind").and_then(Value::as_str).is_none() {
                rendered.push(value::to_yaml(&document, self.options.indent_size));
                continue;
            }
            let out = reorganize::reorganize(document);
            if !out.changes.is_empty() {
                relocated = true;
            }
            changes.extend(out.changes);
            errors.extend(out.errors);
            rendered.push(value::to_yaml(&out.document, self.options.indent_size));
        }

        if relocated {
            *text = if rendered.len() == 1 {
                rendered.remove(0)
            } else {
                rendered.join("---\n")
            };
        }
    }

    // ————————————————————————— Pass 3: types ————————————————————————— //

    fn pass_types(
        &self,
        text: &mut String,
        changes: &mut Vec<FixChange>,
        _errors: &mut Vec<String>,
    ) {
        static ENTRY_RE: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r"^(\s*)(- )?([A-Za-z][A-Za-z0-9_-]*):\s+(.+)$").expect("entry regex")
        });

        let mut lines: Vec<String> = text.split('\n').map(String::from).collect();
        let mask = block_body_mask(&lines);

        for (idx, line) in lines.iter_mut().enumerate() {
            if mask[idx] {
                continue;
            }
            let Some(caps) = ENTRY_RE.captures(line) else {
                continue;
            };
            let (pad, dash, key) = (
                caps.get(1).map_or("", |m| m.as_str()).to_string(),
                caps.get(2).map_or("", |m| m.as_str()).to_string(),
                caps.get(3).map_or("", |m| m.as_str()).to_string(),
            );
            let tail = caps.get(4).map_or("", |m| m.as_str());
            let (raw_value, comment) = split_trailing_comment(tail);
            let (raw_value, comment) = (raw_value.to_string(), comment.to_string());
            if raw_value.is_empty() || block_marker_value(&raw_value) {
                continue;
            }
            let Some(def) = types::field_def(&key) else {
                continue;
            };
            let line_no = idx + 1;

            match def.ty {
                ExpectedType::Integer | ExpectedType::Number | ExpectedType::Boolean => {
                    let coercion = types::coerce_value(&key, &raw_value);
                    let Some(reason) = coercion.reason.clone() else {
                        continue; // already the declared type
                    };
                    if !coercion.success {
                        continue;
                    }
                    if coercion.confidence < self.options.confidence_threshold
                        && !self.options.aggressive
                    {
                        continue;
                    }
                    let fixed_value = value::render_scalar(&coercion.value);
                    let original = line.clone();
                    *line = format!("{pad}{dash}{key}: {fixed_value}{comment}");
                    changes.push(FixChange::new(
                        line_no,
                        original,
                        line.clone(),
                        format!("{key}: {reason}"),
                        FixCategory::Type,
                        coercion.confidence,
                    ));
                }
                ExpectedType::Object | ExpectedType::Array => {
                    // inline scalar on a container field: the key awaits
                    // nested children instead
                    let original = line.clone();
                    *line = format!("{pad}{dash}{key}:{comment}");
                    changes.push(
                        FixChange::new(
                            line_no,
                            original,
                            line.clone(),
                            format!("'{key}' expects nested content, inline value dropped"),
                            FixCategory::Structure,
                            CONF_STRIP_INLINE_SCALAR,
                        )
                        .with_severity(Severity::Error),
                    );
                }
                ExpectedType::String | ExpectedType::Any => {}
            }
        }

        *text = lines.join("\n");
    }

    // ———————————————————— Pass 4: strict patching ———————————————————— //

    fn pass_strict_patch(
        &self,
        text: &mut String,
        changes: &mut Vec<FixChange>,
        _errors: &mut Vec<String>,
    ) {
        for _ in 0..self.options.max_iterations {
            let strict = parser::validate(text);
            if strict.is_empty() {
                return;
            }
            let Some(change) = strict.iter().find_map(|e| patch_strict_error(text, e)) else {
                return; // nothing patchable left
            };
            changes.push(change);
        }
    }

    // —————————————————————————— Pass 5: score ———————————————————————— //

    fn pass_score(
        &self,
        text: &str,
        changes: &mut Vec<FixChange>,
        mut errors: Vec<String>,
    ) -> (bool, Vec<String>, f64) {
        let (root, strict) = parser::build_with_errors(text);
        let broken = analyze(&root).broken_count;
        let is_valid = strict.is_empty() && broken == 0;
        errors.extend(strict.iter().map(|e| e.to_string()));
        if broken > 0 {
            errors.push(format!("{broken} line(s) could not be repaired"));
        }

        for change in changes.iter_mut() {
            if change.confidence < self.options.confidence_threshold {
                change.severity = Severity::Warning;
            }
        }
        let confidence = if changes.is_empty() {
            1.0
        } else {
            changes.iter().map(|c| c.confidence).sum::<f64>() / changes.len() as f64
        };
        (is_valid, errors, confidence)
    }
}

type PassFn = fn(&Fixer, &mut String, &mut Vec<FixChange>, &mut Vec<String>);

/// One-shot repair with default options.
pub fn fix(content: &str) -> FixResult {
    Fixer::new(FixOptions::default()).fix(content)
}

// ———————————————————————————————————————————————————————————————————————————
// LINE-LOCAL FIXES
// ———————————————————————————————————————————————————————————————————————————

static KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*$").expect("key regex"));

/// Common manifest key misspellings.
#[rustfmt::skip]
static KEY_TYPOS: &[(&str, &str)] = &[
    ("sepc", "spec"), ("spce", "spec"),
    ("contianers", "containers"), ("continers", "containers"),
    ("replcias", "replicas"), ("repicas", "replicas"),
    ("metdata", "metadata"), ("metadat", "metadata"),
    ("apiVerison", "apiVersion"), ("apiversion", "apiVersion"),
    ("lables", "labels"), ("annotaions", "annotations"),
    ("imgae", "image"), ("selctor", "selector"),
    ("tempalte", "template"), ("namepsace", "namespace"),
    ("kidn", "kind"),
];

fn indent_width(line: &str) -> usize {
    let mut width = 0;
    for c in line.chars() {
        match c {
            ' ' => width += 1,
            '\t' => width += 2,
            _ => break,
        }
    }
    width
}

/// Marks body lines of `|`/`>` block scalars so textual passes leave their
/// free-form content alone.
fn block_body_mask(lines: &[String]) -> Vec<bool> {
    static BLOCK_HEADER_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r":\s*[|>][+-]?\s*$").expect("block header regex"));
    let mut mask = vec![false; lines.len()];
    let mut header_indent: Option<usize> = None;
    for (i, line) in lines.iter().enumerate() {
        if let Some(h) = header_indent {
            if line.trim().is_empty() || indent_width(line) > h {
                mask[i] = true;
                continue;
            }
            header_indent = None;
        }
        if BLOCK_HEADER_RE.is_match(line.trim_end()) {
            header_indent = Some(indent_width(line));
        }
    }
    mask
}

fn fix_tabs(line: &mut String, line_no: usize, changes: &mut Vec<FixChange>) {
    let ws_end = line.len() - line.trim_start().len();
    if !line[..ws_end].contains('\t') {
        return;
    }
    let original = line.clone();
    let fixed_indent: String = line[..ws_end]
        .chars()
        .map(|c| if c == '\t' { "  " } else { " " })
        .collect::<Vec<_>>()
        .join("");
    *line = format!("{fixed_indent}{}", &original[ws_end..]);
    changes.push(FixChange::new(
        line_no,
        original,
        line.clone(),
        "tab indentation replaced with spaces",
        FixCategory::Syntax,
        CONF_TAB_FIX,
    ));
}

fn fix_odd_indent(line: &mut String, line_no: usize, changes: &mut Vec<FixChange>) {
    let spaces = line.chars().take_while(|&c| c == ' ').count();
    if spaces == 0 || spaces % 2 == 0 {
        return;
    }
    let original = line.clone();
    *line = format!("{}{}", " ".repeat(spaces - 1), original.trim_start());
    changes.push(FixChange::new(
        line_no,
        original,
        line.clone(),
        format!("odd indentation of {spaces} rounded down to {}", spaces - 1),
        FixCategory::Syntax,
        CONF_EVEN_INDENT,
    ));
}

fn fix_dash_space(line: &mut String, line_no: usize, changes: &mut Vec<FixChange>) {
    let original = line.clone();
    let trimmed = original.trim_start();
    let Some(rest) = trimmed.strip_prefix('-') else {
        return;
    };
    let Some(first) = rest.chars().next() else {
        return;
    };
    if first == ' ' || first == '-' {
        return;
    }
    let pad = &original[..original.len() - trimmed.len()];
    *line = format!("{pad}- {rest}");
    changes.push(FixChange::new(
        line_no,
        original,
        line.clone(),
        "missing space after list dash",
        FixCategory::Syntax,
        CONF_DASH_SPACE,
    ));
}

fn fix_key_typo(line: &mut String, line_no: usize, changes: &mut Vec<FixChange>) {
    let original = line.clone();
    let trimmed = original.trim_start();
    let content = trimmed.strip_prefix("- ").unwrap_or(trimmed);
    let key_end = content
        .find(|c: char| c == ':' || c.is_whitespace())
        .unwrap_or(content.len());
    let key = &content[..key_end];
    let Some(&(_, correct)) = KEY_TYPOS.iter().find(|(typo, _)| *typo == key) else {
        return;
    };
    let key_start = original.len() - content.len();
    let reason = format!("key '{key}' corrected to '{correct}'");
    *line = format!(
        "{}{correct}{}",
        &original[..key_start],
        &original[key_start + key.len()..]
    );
    changes.push(FixChange::new(
        line_no,
        original,
        line.clone(),
        reason,
        FixCategory::Syntax,
        CONF_KEY_TYPO,
    ));
}

fn fix_missing_colon(line: &mut String, line_no: usize, changes: &mut Vec<FixChange>) {
    let original = line.clone();
    let trimmed = original.trim_start();
    if trimmed.contains(':') || trimmed.starts_with('-') {
        return;
    }
    let (left, right) = match trimmed.split_once(char::is_whitespace) {
        Some((l, r)) => (l, r.trim()),
        None => (trimmed, ""),
    };
    if !types::is_known_field(left) || !KEY_RE.is_match(left) {
        return;
    }
    let pad = &original[..original.len() - trimmed.len()];
    let reason = format!("missing colon after '{left}'");
    *line = if right.is_empty() {
        format!("{pad}{left}:")
    } else {
        format!("{pad}{left}: {right}")
    };
    changes.push(FixChange::new(
        line_no,
        original,
        line.clone(),
        reason,
        FixCategory::Syntax,
        CONF_MISSING_COLON,
    ));
}

/// First colon outside quotes that is not followed by a space, skipping URL
/// scheme colons (`://`).
fn colon_needing_space(line: &str) -> Option<usize> {
    let bytes = line.as_bytes();
    let mut in_single = false;
    let mut in_double = false;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'\'' if !in_double => in_single = !in_single,
            b'"' if !in_single => in_double = !in_double,
            b':' if !in_single && !in_double => {
                let next = bytes.get(i + 1);
                match next {
                    None | Some(b' ') => return None,
                    Some(b'/') if bytes.get(i + 2) == Some(&b'/') => continue,
                    Some(_) => return Some(i),
                }
            }
            _ => {}
        }
    }
    None
}

fn fix_colon_space(line: &mut String, line_no: usize, changes: &mut Vec<FixChange>) {
    let Some(colon) = colon_needing_space(line) else {
        return;
    };
    let original = line.clone();
    line.insert(colon + 1, ' ');
    changes.push(FixChange::new(
        line_no,
        original,
        line.clone(),
        "missing space after ':'",
        FixCategory::Syntax,
        CONF_COLON_SPACE,
    ));
}

fn fix_unclosed_quote(line: &mut String, line_no: usize, changes: &mut Vec<FixChange>) {
    for quote in ['"', '\''] {
        if line.chars().filter(|&c| c == quote).count() % 2 == 0 {
            continue;
        }
        // only close value-initial quotes; a lone apostrophe mid-word is text
        let first = match line.find(quote) {
            Some(i) => i,
            None => continue,
        };
        let before = line[..first].trim_end();
        let value_initial =
            before.is_empty() || before.ends_with(':') || before.ends_with('-');
        if !value_initial {
            continue;
        }
        let original = line.clone();
        line.push(quote);
        changes.push(FixChange::new(
            line_no,
            original,
            line.clone(),
            format!("unterminated {quote} quote closed at end of line"),
            FixCategory::Syntax,
            CONF_CLOSE_QUOTE,
        ));
        return;
    }
}

// ———————————————————————————————————————————————————————————————————————————
// STRICT-ERROR PATCHING
// ———————————————————————————————————————————————————————————————————————————

fn patch_strict_error(text: &mut String, error: &StrictError) -> Option<FixChange> {
    let mut lines: Vec<String> = text.split('\n').map(String::from).collect();
    let idx = error.line.checked_sub(1)?;
    let line = lines.get_mut(idx)?;
    let original = line.clone();

    let (fixed, reason, confidence) = match &error.kind {
        StrictErrorKind::UnexpectedIndent { found, expected } => (
            format!("{}{}", " ".repeat(*expected), original.trim_start()),
            format!("re-indented from {found} to {expected}"),
            CONF_REINDENT,
        ),
        StrictErrorKind::MissingSpaceAfterColon => {
            let colon = colon_needing_space(&original)?;
            let mut fixed = original.clone();
            fixed.insert(colon + 1, ' ');
            (fixed, "missing space after ':'".to_string(), CONF_COLON_SPACE)
        }
        StrictErrorKind::UnterminatedQuote { quote } => (
            format!("{original}{quote}"),
            format!("unterminated {quote} quote closed at end of line"),
            CONF_CLOSE_QUOTE,
        ),
        StrictErrorKind::TabIndent => {
            let ws_end = original.len() - original.trim_start().len();
            let spaced: String = original[..ws_end]
                .chars()
                .map(|c| if c == '\t' { "  " } else { " " })
                .collect::<Vec<_>>()
                .join("");
            (
                format!("{spaced}{}", &original[ws_end..]),
                "tab indentation replaced with spaces".to_string(),
                CONF_TAB_FIX,
            )
        }
        StrictErrorKind::Unparseable => return None,
    };
    if fixed == original {
        return None;
    }

    *line = fixed.clone();
    *text = lines.join("\n");
    Some(FixChange::new(
        error.line,
        original,
        fixed,
        reason,
        FixCategory::Syntax,
        confidence,
    ))
}

// ———————————————————————————————————————————————————————————————————————————
// HELPERS
// ———————————————————————————————————————————————————————————————————————————

fn block_marker_value(value: &str) -> bool {
    matches!(value, "|" | "|-" | "|+" | ">" | ">-" | ">+")
}

/// Splits a ` #comment` tail off a value, keeping it verbatim for re-append.
fn split_trailing_comment(tail: &str) -> (&str, &str) {
    let bytes = tail.as_bytes();
    let mut in_single = false;
    let mut in_double = false;
    let mut prev_space = false;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'\'' if !in_double => in_single = !in_single,
            b'"' if !in_single => in_double = !in_double,
            b'#' if !in_single && !in_double && prev_space => {
                return (tail[..i].trim_end(), &tail[i - 1..]);
            }
            _ => {}
        }
        prev_space = b == b' ';
    }
    (tail.trim_end(), "")
}
