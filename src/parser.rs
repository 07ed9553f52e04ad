//! Line-oriented, fault-tolerant YAML parser.
//!
//! `build` is total over any string: a line that cannot be tokenized becomes
//! a [`NodeKind::Broken`] placeholder and the parse keeps going. The builder
//! maintains an indentation-keyed parent stack, captures `|`/`>` block
//! scalars, splits documents on `---`/`...`, and attempts missing-colon
//! recovery against the known-field dictionary before giving up on a line.
//!
//! Strict problems (the ones that would make a conventional YAML loader
//! reject the text) are reported as tagged [`StrictError`] values, so the
//! repair loop dispatches on a structured kind instead of matching substrings
//! of a foreign parser's message text.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::ast::{NodeId, NodeKind, PathSegment, QuoteStyle, Root, Scalar, ScalarValue};
use crate::diag::{Diagnostic, DiagnosticCode, Severity};
use crate::types;

/// Bare tokens longer than this never get a colon synthesized.
const MAX_RECOVERED_KEY_LEN: usize = 30;

static IDENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*$").expect("identifier regex"));

// ———————————————————————————————————————————————————————————————————————————
// STRICT ERRORS
// ———————————————————————————————————————————————————————————————————————————

/// Tagged reason why the text would fail a conventional strict parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StrictErrorKind {
    #[error("unexpected indentation of {found} (expected {expected})")]
    UnexpectedIndent { found: usize, expected: usize },
    #[error("missing space after ':'")]
    MissingSpaceAfterColon,
    #[error("unterminated quote ({quote})")]
    UnterminatedQuote { quote: char },
    #[error("tab character in indentation")]
    TabIndent,
    #[error("unparseable line")]
    Unparseable,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {kind}")]
pub struct StrictError {
    pub kind: StrictErrorKind,
    /// 1-indexed source line.
    pub line: usize,
    /// 1-indexed column when known.
    pub column: Option<usize>,
}

/// Parses and reports every strict error found. Empty means a conventional
/// loader would accept the text.
pub fn validate(text: &str) -> Vec<StrictError> {
    build_with_errors(text).1
}

/// Total parse: never fails, never drops input.
pub fn build(text: &str) -> Root {
    build_with_errors(text).0
}

pub fn build_with_errors(text: &str) -> (Root, Vec<StrictError>) {
    let mut builder = Builder::new();
    for (idx, raw) in text.split('\n').enumerate() {
        builder.line(idx + 1, raw.strip_suffix('\r').unwrap_or(raw));
    }
    builder.finish(text)
}

// ———————————————————————————————————————————————————————————————————————————
// LINE TOKENIZING
// ———————————————————————————————————————————————————————————————————————————

#[derive(Debug)]
enum ScalarError {
    UnterminatedQuote(char),
    ControlChar,
}

/// Tokenizes one scalar value. Quoted forms must close; stray control
/// characters reject the token (the caller degrades to a broken node).
fn parse_scalar(text: &str) -> Result<Scalar, ScalarError> {
    if text.chars().any(|c| c.is_control() && c != '\t') {
        return Err(ScalarError::ControlChar);
    }
    if let Some(rest) = text.strip_prefix('"') {
        let inner = close_double_quoted(rest).ok_or(ScalarError::UnterminatedQuote('"'))?;
        return Ok(Scalar {
            value: ScalarValue::Str(inner.clone()),
            raw: inner,
            style: QuoteStyle::Double,
        });
    }
    if let Some(rest) = text.strip_prefix('\'') {
        let inner = close_single_quoted(rest).ok_or(ScalarError::UnterminatedQuote('\''))?;
        return Ok(Scalar {
            value: ScalarValue::Str(inner.clone()),
            raw: inner,
            style: QuoteStyle::Single,
        });
    }
    Ok(plain_scalar(text))
}

fn close_double_quoted(rest: &str) -> Option<String> {
    let mut out = String::new();
    let mut chars = rest.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next()? {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                other => out.push(other),
            },
            '"' => return Some(out),
            other => out.push(other),
        }
    }
    None
}

fn close_single_quoted(rest: &str) -> Option<String> {
    let mut out = String::new();
    let mut chars = rest.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\'' {
            if chars.peek() == Some(&'\'') {
                chars.next();
                out.push('\'');
            } else {
                return Some(out);
            }
        } else {
            out.push(c);
        }
    }
    None
}

static INT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?[0-9]+$").expect("int regex"));
static FLOAT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^-?[0-9]*\.[0-9]+([eE][+-]?[0-9]+)?$|^-?[0-9]+[eE][+-]?[0-9]+$")
        .expect("float regex")
});

fn plain_scalar(text: &str) -> Scalar {
    let raw = text.to_string();
    let value = match text {
        "" | "~" | "null" | "Null" | "NULL" => ScalarValue::Null,
        "true" | "True" | "TRUE" => ScalarValue::Bool(true),
        "false" | "False" | "FALSE" => ScalarValue::Bool(false),
        _ if INT_RE.is_match(text) => match text.parse::<i64>() {
            Ok(i) => ScalarValue::Int(i),
            Err(_) => ScalarValue::Str(raw.clone()),
        },
        _ if FLOAT_RE.is_match(text) => match text.parse::<f64>() {
            Ok(f) => ScalarValue::Float(f),
            Err(_) => ScalarValue::Str(raw.clone()),
        },
        _ => ScalarValue::Str(raw.clone()),
    };
    Scalar {
        value,
        raw,
        style: QuoteStyle::Plain,
    }
}

/// Leading-whitespace width; a tab counts as two columns.
fn indent_of(line: &str) -> (usize, bool) {
    let mut indent = 0;
    let mut saw_tab = false;
    for c in line.chars() {
        match c {
            ' ' => indent += 1,
            '\t' => {
                indent += 2;
                saw_tab = true;
            }
            _ => break,
        }
    }
    (indent, saw_tab)
}

/// Drops a ` #comment` tail outside quotes.
fn strip_comment(text: &str) -> &str {
    let bytes = text.as_bytes();
    let mut in_single = false;
    let mut in_double = false;
    let mut prev_space = true;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'\'' if !in_double => in_single = !in_single,
            b'"' if !in_single => in_double = !in_double,
            b'#' if !in_single && !in_double && prev_space => {
                return text[..i].trim_end();
            }
            _ => {}
        }
        prev_space = b == b' ' || b == b'\t';
    }
    text.trim_end()
}

/// Locates the key/value separator: the first unescaped `:` outside quotes
/// that is followed by a space or end of line. When only a space-less colon
/// exists and the left side is identifier-shaped (and the right side is not a
/// `//` scheme tail), that colon is accepted and flagged.
fn find_separator(content: &str) -> Option<(usize, bool)> {
    let bytes = content.as_bytes();
    let mut in_single = false;
    let mut in_double = false;
    let mut unspaced: Option<usize> = None;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'\'' if !in_double => in_single = !in_single,
            b'"' if !in_single => in_double = !in_double,
            b':' if !in_single && !in_double => {
                let next = bytes.get(i + 1);
                if next.is_none() || next == Some(&b' ') {
                    return Some((i, true));
                }
                if unspaced.is_none() {
                    unspaced = Some(i);
                }
            }
            _ => {}
        }
    }
    let i = unspaced?;
    let key = &content[..i];
    let rest = &content[i + 1..];
    if IDENT_RE.is_match(key) && !rest.starts_with("//") {
        Some((i, false))
    } else {
        None
    }
}

// ———————————————————————————————————————————————————————————————————————————
// TREE BUILDER
// ———————————————————————————————————————————————————————————————————————————

struct Frame {
    /// Lines attach under the deepest frame whose indent is strictly less
    /// than their own. The per-document base map sits at -1.
    indent: isize,
    node: NodeId,
    /// Indent of the first child seen; later siblings must match.
    child_indent: Option<usize>,
}

enum BlockOwner {
    MapKey(NodeId, String),
    Seq(NodeId),
}

struct BlockCapture {
    owner: BlockOwner,
    style: QuoteStyle,
    /// Indent of the introducing line; body lines must sit deeper.
    indent: usize,
    line_start: usize,
    lines: Vec<String>,
}

struct Builder {
    root: Root,
    stack: Vec<Frame>,
    doc: Option<NodeId>,
    doc_count: usize,
    block: Option<BlockCapture>,
    strict: Vec<StrictError>,
    last_line: usize,
}

impl Builder {
    fn new() -> Self {
        Self {
            root: Root::new(),
            stack: Vec::new(),
            doc: None,
            doc_count: 0,
            block: None,
            strict: Vec::new(),
            last_line: 0,
        }
    }

    fn line(&mut self, line_no: usize, raw: &str) {
        self.last_line = line_no;

        if self.block.is_some() {
            let content_empty = raw.trim().is_empty();
            let (indent, _) = indent_of(raw);
            let deeper = indent > self.block.as_ref().map(|b| b.indent).unwrap_or(0);
            if content_empty || deeper {
                if let Some(block) = &mut self.block {
                    block.lines.push(raw.to_string());
                }
                return;
            }
            self.finish_block(line_no.saturating_sub(1));
        }

        let (indent, saw_tab) = indent_of(raw);
        let content = strip_comment(raw.trim_start()).to_string();
        if content.is_empty() {
            return;
        }
        if saw_tab {
            self.strict.push(StrictError {
                kind: StrictErrorKind::TabIndent,
                line: line_no,
                column: Some(1),
            });
        }

        if content == "---" {
            self.finalize_document();
            self.start_document(line_no, true);
            return;
        }
        if content == "..." {
            if let Some(doc) = self.doc {
                if let NodeKind::Document { explicit_end, .. } = &mut self.root.node_mut(doc).kind {
                    *explicit_end = true;
                }
            }
            self.finalize_document();
            return;
        }

        self.ensure_document(line_no);

        if let Some(rest) = content.strip_prefix("- ") {
            self.sequence_item(line_no, indent, rest.trim_start());
            return;
        }
        if content == "-" {
            self.sequence_item(line_no, indent, "");
            return;
        }

        self.map_line(line_no, indent, &content, saw_tab);
    }

    fn start_document(&mut self, line_no: usize, explicit_start: bool) {
        let doc = self.root.alloc(
            NodeKind::Document {
                content: None,
                explicit_start,
                explicit_end: false,
            },
            line_no,
            0,
        );
        let base = self.root.alloc(NodeKind::Map(Vec::new()), line_no, 0);
        self.root.node_mut(base).path = vec![PathSegment::Doc(self.doc_count)];
        self.root.node_mut(base).parent = Some(doc);
        if let NodeKind::Document { content, .. } = &mut self.root.node_mut(doc).kind {
            *content = Some(base);
        }
        self.root.documents.push(doc);
        self.doc = Some(doc);
        self.doc_count += 1;
        self.stack = vec![Frame {
            indent: -1,
            node: base,
            child_indent: None,
        }];
    }

    fn ensure_document(&mut self, line_no: usize) {
        if self.doc.is_none() {
            self.start_document(line_no, false);
        }
    }

    fn finalize_document(&mut self) {
        let Some(doc) = self.doc else {
            return;
        };
        // An empty base map means an empty document; a base map holding only
        // one keyless child promotes that child to the document content.
        let base = match &self.root.node(doc).kind {
            NodeKind::Document {
                content: Some(base),
                ..
            } => *base,
            _ => {
                self.doc = None;
                return;
            }
        };
        let replacement = match &self.root.node(base).kind {
            NodeKind::Map(entries) if entries.is_empty() => Some(None),
            NodeKind::Map(entries) if entries.len() == 1 && entries[0].key.is_none() => {
                Some(Some(entries[0].value))
            }
            _ => None,
        };
        if let Some(new_content) = replacement {
            if let NodeKind::Document { content, .. } = &mut self.root.node_mut(doc).kind {
                *content = new_content;
            }
            if let Some(child) = new_content {
                self.root.node_mut(child).parent = Some(doc);
            }
        }
        self.doc = None;
        self.stack.clear();
    }

    /// Deepest frame usable as a map parent for a line at `indent`.
    fn pop_to_map_parent(&mut self, indent: usize) -> usize {
        while self.stack.len() > 1
            && self.stack.last().map(|f| f.indent).unwrap_or(-1) >= indent as isize
        {
            self.stack.pop();
        }
        self.stack.len() - 1
    }

    /// Like [`Self::pop_to_map_parent`] but keeps equal-indent frames, so a
    /// `- ` item may sit at the same column as its introducing key.
    fn pop_to_seq_parent(&mut self, indent: usize) -> usize {
        while self.stack.len() > 1
            && self.stack.last().map(|f| f.indent).unwrap_or(-1) > indent as isize
        {
            self.stack.pop();
        }
        self.stack.len() - 1
    }

    fn map_line(&mut self, line_no: usize, indent: usize, content: &str, saw_tab: bool) {
        let frame_idx = self.pop_to_map_parent(indent);
        let parent = self.stack[frame_idx].node;

        // a map entry aimed at a sequence lands in an implicit item map
        let parent = if matches!(self.root.node(parent).kind, NodeKind::Sequence(_)) {
            let item = self.root.alloc(NodeKind::Map(Vec::new()), line_no, indent);
            self.root.attach_to_seq(parent, item);
            self.root.node_mut(item).diagnostics.push(Diagnostic::new(
                Severity::Warning,
                DiagnosticCode::BadIndent,
                "mapping line inside a sequence without a dash",
                line_no,
            ));
            self.stack.push(Frame {
                indent: indent as isize - 1,
                node: item,
                child_indent: None,
            });
            item
        } else {
            parent
        };

        self.check_sibling_indent(line_no, indent);

        match find_separator(content) {
            Some((sep, spaced)) => {
                let key = content[..sep].trim_end().to_string();
                let value = content[sep + 1..].trim().to_string();
                if !spaced {
                    self.strict.push(StrictError {
                        kind: StrictErrorKind::MissingSpaceAfterColon,
                        line: line_no,
                        column: Some(sep + 1),
                    });
                }
                self.keyed_value(line_no, indent, parent, key, &value, saw_tab, !spaced);
            }
            None => self.missing_colon_recovery(line_no, indent, parent, content),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn keyed_value(
        &mut self,
        line_no: usize,
        indent: usize,
        parent: NodeId,
        key: String,
        value: &str,
        saw_tab: bool,
        unspaced: bool,
    ) {
        if value.is_empty() {
            let node = self.root.alloc(NodeKind::Map(Vec::new()), line_no, indent);
            self.note_lexical_issues(node, line_no, saw_tab, unspaced);
            self.root.attach_to_map(parent, Some(key), node);
            self.stack.push(Frame {
                indent: indent as isize,
                node,
                child_indent: None,
            });
            return;
        }

        if let Some(style) = block_marker(value) {
            self.block = Some(BlockCapture {
                owner: BlockOwner::MapKey(parent, key),
                style,
                indent,
                line_start: line_no,
                lines: Vec::new(),
            });
            return;
        }

        match parse_scalar(value) {
            Ok(scalar) => {
                let node = self.root.alloc(NodeKind::Scalar(scalar), line_no, indent);
                self.note_lexical_issues(node, line_no, saw_tab, unspaced);
                self.root.attach_to_map(parent, Some(key), node);
            }
            Err(err) => {
                let raw = format!("{key}: {value}");
                self.broken(line_no, indent, parent, raw, err);
            }
        }
    }

    fn missing_colon_recovery(
        &mut self,
        line_no: usize,
        indent: usize,
        parent: NodeId,
        content: &str,
    ) {
        let (left, right) = match content.split_once(char::is_whitespace) {
            Some((l, r)) => (l, r.trim()),
            None => (content, ""),
        };
        let identifier_like = IDENT_RE.is_match(left) && left.len() <= MAX_RECOVERED_KEY_LEN;
        let recoverable = types::is_known_field(left) || (identifier_like && !right.is_empty());

        if recoverable {
            let suggestion = if right.is_empty() {
                format!("{left}:")
            } else {
                format!("{left}: {right}")
            };
            let diag = Diagnostic::new(
                Severity::Error,
                DiagnosticCode::MissingColon,
                format!("'{left}' looks like a key without a colon"),
                line_no,
            )
            .fixable(suggestion)
            .at_column(indent + left.len() + 1);

            if right.is_empty() {
                let node = self.root.alloc(NodeKind::Map(Vec::new()), line_no, indent);
                self.root.node_mut(node).diagnostics.push(diag);
                self.root.attach_to_map(parent, Some(left.to_string()), node);
                self.stack.push(Frame {
                    indent: indent as isize,
                    node,
                    child_indent: None,
                });
            } else {
                match parse_scalar(right) {
                    Ok(scalar) => {
                        let node = self.root.alloc(NodeKind::Scalar(scalar), line_no, indent);
                        self.root.node_mut(node).diagnostics.push(diag);
                        self.root.attach_to_map(parent, Some(left.to_string()), node);
                    }
                    Err(err) => self.broken(line_no, indent, parent, content.to_string(), err),
                }
            }
            return;
        }

        // bare scalar line
        match parse_scalar(content) {
            Ok(scalar) => {
                let node = self.root.alloc(NodeKind::Scalar(scalar), line_no, indent);
                self.root.attach_to_map(parent, None, node);
            }
            Err(err) => self.broken(line_no, indent, parent, content.to_string(), err),
        }
    }

    fn sequence_item(&mut self, line_no: usize, indent: usize, rest: &str) {
        let frame_idx = self.pop_to_seq_parent(indent);
        let frame_node = self.stack[frame_idx].node;

        let seq = match &self.root.node(frame_node).kind {
            NodeKind::Sequence(_) => frame_node,
            NodeKind::Map(entries) if entries.is_empty() => {
                // an awaiting key turns out to hold a sequence
                self.root.node_mut(frame_node).kind = NodeKind::Sequence(Vec::new());
                frame_node
            }
            _ => {
                // a dash with no awaiting container: keep it, keyless
                let seq = self.root.alloc(NodeKind::Sequence(Vec::new()), line_no, indent);
                self.root.attach_to_map(frame_node, None, seq);
                self.root.node_mut(seq).diagnostics.push(Diagnostic::new(
                    Severity::Warning,
                    DiagnosticCode::BadIndent,
                    "sequence item without an introducing key",
                    line_no,
                ));
                self.stack.push(Frame {
                    indent: indent as isize,
                    node: seq,
                    child_indent: None,
                });
                seq
            }
        };

        if rest.is_empty() {
            let item = self.root.alloc(NodeKind::Map(Vec::new()), line_no, indent);
            self.root.attach_to_seq(seq, item);
            self.stack.push(Frame {
                indent: indent as isize + 1,
                node: item,
                child_indent: None,
            });
            return;
        }

        if let Some(style) = block_marker(rest) {
            self.block = Some(BlockCapture {
                owner: BlockOwner::Seq(seq),
                style,
                indent,
                line_start: line_no,
                lines: Vec::new(),
            });
            return;
        }

        match find_separator(rest) {
            Some((sep, spaced)) => {
                let key = rest[..sep].trim_end().to_string();
                let value = rest[sep + 1..].trim().to_string();
                if !spaced {
                    self.strict.push(StrictError {
                        kind: StrictErrorKind::MissingSpaceAfterColon,
                        line: line_no,
                        column: Some(indent + 2 + sep + 1),
                    });
                }
                let item = self.root.alloc(NodeKind::Map(Vec::new()), line_no, indent);
                self.root.attach_to_seq(seq, item);
                self.stack.push(Frame {
                    indent: indent as isize + 1,
                    node: item,
                    child_indent: None,
                });
                self.keyed_value(line_no, indent + 2, item, key, &value, false, !spaced);
            }
            None => match parse_scalar(rest) {
                Ok(scalar) => {
                    let node = self.root.alloc(NodeKind::Scalar(scalar), line_no, indent);
                    self.root.attach_to_seq(seq, node);
                }
                Err(err) => {
                    let node = self.root.alloc(
                        NodeKind::Broken {
                            raw: format!("- {rest}"),
                            message: broken_message(&err),
                        },
                        line_no,
                        indent,
                    );
                    self.root.attach_to_seq(seq, node);
                    self.push_broken_strict(line_no, err);
                }
            },
        }
    }

    fn broken(
        &mut self,
        line_no: usize,
        indent: usize,
        parent: NodeId,
        raw: String,
        err: ScalarError,
    ) {
        let node = self.root.alloc(
            NodeKind::Broken {
                raw,
                message: broken_message(&err),
            },
            line_no,
            indent,
        );
        self.root.node_mut(node).diagnostics.push(Diagnostic::new(
            Severity::Error,
            DiagnosticCode::UnparseableLine,
            broken_message(&err),
            line_no,
        ));
        self.root.attach_to_map(parent, None, node);
        self.push_broken_strict(line_no, err);
    }

    fn push_broken_strict(&mut self, line_no: usize, err: ScalarError) {
        let kind = match err {
            ScalarError::UnterminatedQuote(quote) => StrictErrorKind::UnterminatedQuote { quote },
            ScalarError::ControlChar => StrictErrorKind::Unparseable,
        };
        self.strict.push(StrictError {
            kind,
            line: line_no,
            column: None,
        });
    }

    fn check_sibling_indent(&mut self, line_no: usize, indent: usize) {
        let Some(frame) = self.stack.last_mut() else {
            return;
        };
        match frame.child_indent {
            None => frame.child_indent = Some(indent),
            Some(expected) if expected != indent => {
                self.strict.push(StrictError {
                    kind: StrictErrorKind::UnexpectedIndent {
                        found: indent,
                        expected,
                    },
                    line: line_no,
                    column: Some(indent + 1),
                });
            }
            Some(_) => {}
        }
    }

    fn note_lexical_issues(&mut self, node: NodeId, line_no: usize, saw_tab: bool, unspaced: bool) {
        if saw_tab {
            self.root.node_mut(node).diagnostics.push(Diagnostic::new(
                Severity::Warning,
                DiagnosticCode::TabIndent,
                "tab character used for indentation",
                line_no,
            ));
        }
        if unspaced {
            self.root.node_mut(node).diagnostics.push(Diagnostic::new(
                Severity::Error,
                DiagnosticCode::MissingSpaceAfterColon,
                "no space after ':'",
                line_no,
            ));
        }
    }

    fn finish_block(&mut self, end_line: usize) {
        let Some(block) = self.block.take() else {
            return;
        };
        let mut lines = block.lines;
        while lines.last().is_some_and(|l| l.trim().is_empty()) {
            lines.pop();
        }
        let min_indent = lines
            .iter()
            .filter(|l| !l.trim().is_empty())
            .map(|l| indent_of(l).0)
            .min()
            .unwrap_or(0);
        let body = lines
            .iter()
            .map(|l| {
                if l.trim().is_empty() {
                    ""
                } else {
                    let mut stripped = l.as_str();
                    let mut remaining = min_indent;
                    while remaining > 0 {
                        match stripped.strip_prefix(' ') {
                            Some(rest) => {
                                stripped = rest;
                                remaining -= 1;
                            }
                            None => break,
                        }
                    }
                    stripped
                }
            })
            .collect::<Vec<_>>()
            .join("\n");

        let scalar = Scalar {
            value: ScalarValue::Str(body.clone()),
            raw: body,
            style: block.style,
        };
        let node = self
            .root
            .alloc(NodeKind::Scalar(scalar), block.line_start, block.indent);
        self.root.node_mut(node).line_end = end_line.max(block.line_start);
        match block.owner {
            BlockOwner::MapKey(map, key) => self.root.attach_to_map(map, Some(key), node),
            BlockOwner::Seq(seq) => self.root.attach_to_seq(seq, node),
        }
    }

    fn finish(mut self, text: &str) -> (Root, Vec<StrictError>) {
        self.finish_block(self.last_line);
        self.finalize_document();
        self.root.line_count = if text.is_empty() {
            0
        } else {
            text.split('\n').count()
        };
        (self.root, self.strict)
    }
}

fn block_marker(value: &str) -> Option<QuoteStyle> {
    match value {
        "|" | "|-" | "|+" => Some(QuoteStyle::Literal),
        ">" | ">-" | ">+" => Some(QuoteStyle::Folded),
        _ => None,
    }
}

fn broken_message(err: &ScalarError) -> String {
    match err {
        ScalarError::UnterminatedQuote(q) => format!("unterminated quote ({q})"),
        ScalarError::ControlChar => "unexpected control character".to_string(),
    }
}

// ———————————————————————————————————————————————————————————————————————————
// TESTS
// ———————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{analyze, find_by_path, serialize, NodeKind, PathSegment, ScalarValue};

    fn key(k: &str) -> PathSegment {
        PathSegment::Key(k.to_string())
    }

    #[test]
    fn simple_pod_manifest_parses() {
        let text = "apiVersion: v1\nkind: Pod\nmetadata:\n  name: test\n";
        let root = build(text);
        let analysis = analyze(&root);
        assert_eq!(analysis.document_count, 1);
        assert_eq!(analysis.detected_kind.as_deref(), Some("Pod"));
        assert_eq!(analysis.detected_api_version.as_deref(), Some("v1"));
        assert!(analysis.structure_valid);

        let name = find_by_path(&root, &[PathSegment::Doc(0), key("metadata"), key("name")])
            .expect("metadata.name exists");
        match &root.node(name).kind {
            NodeKind::Scalar(s) => assert_eq!(s.raw, "test"),
            other => panic!("expected scalar, got {other:?}"),
        }
    }

    #[test]
    fn sequences_at_key_indent_attach() {
        let text = "spec:\n  containers:\n  - name: web\n    image: nginx\n  - name: side\n";
        let root = build(text);
        let image = find_by_path(
            &root,
            &[
                PathSegment::Doc(0),
                key("spec"),
                key("containers"),
                PathSegment::Index(0),
                key("image"),
            ],
        )
        .expect("containers[0].image");
        match &root.node(image).kind {
            NodeKind::Scalar(s) => assert_eq!(s.raw, "nginx"),
            other => panic!("expected scalar, got {other:?}"),
        }
        let second = find_by_path(
            &root,
            &[
                PathSegment::Doc(0),
                key("spec"),
                key("containers"),
                PathSegment::Index(1),
                key("name"),
            ],
        );
        assert!(second.is_some(), "second item parsed");
    }

    #[test]
    fn missing_colon_recovers_known_fields() {
        let text = "apiVersion v1\nkind Pod\nmetadata\n  name test\n";
        let root = build(text);
        let analysis = analyze(&root);
        let colon_diags = analysis
            .diagnostics
            .iter()
            .filter(|d| d.code == crate::diag::DiagnosticCode::MissingColon)
            .count();
        assert!(colon_diags >= 3, "got {colon_diags} missing-colon diagnostics");
        let name = find_by_path(&root, &[PathSegment::Doc(0), key("metadata"), key("name")]);
        assert!(name.is_some(), "recovered tree keeps metadata.name");
    }

    #[test]
    fn broken_line_never_aborts() {
        let text = "kind: Pod\nbad: \"unterminated\nname: ok\n";
        let (root, errors) = build_with_errors(text);
        let analysis = analyze(&root);
        assert_eq!(analysis.broken_count, 1);
        assert!(errors
            .iter()
            .any(|e| matches!(e.kind, StrictErrorKind::UnterminatedQuote { quote: '"' })));
        // the line after the broken one still parsed
        assert!(find_by_path(&root, &[PathSegment::Doc(0), key("name")]).is_some());
        // serialization keeps the broken payload visible
        let out = serialize(&root, 2);
        assert!(out.contains("# BROKEN:"));
    }

    #[test]
    fn multi_line_literal_scalar_captured() {
        let text = "data:\n  script: |\n    echo one\n    echo two\n  after: x\n";
        let root = build(text);
        let script = find_by_path(&root, &[PathSegment::Doc(0), key("data"), key("script")])
            .expect("script parsed");
        match &root.node(script).kind {
            NodeKind::Scalar(s) => {
                assert_eq!(s.raw, "echo one\necho two");
                assert_eq!(s.style, crate::ast::QuoteStyle::Literal);
            }
            other => panic!("expected scalar, got {other:?}"),
        }
        assert!(find_by_path(&root, &[PathSegment::Doc(0), key("data"), key("after")]).is_some());
    }

    #[test]
    fn document_markers_split_and_reset() {
        let text = "---\nkind: Pod\n---\nkind: Service\n";
        let root = build(text);
        assert_eq!(root.documents.len(), 2);
        let second_kind = find_by_path(&root, &[PathSegment::Doc(1), key("kind")])
            .expect("second doc kind");
        match &root.node(second_kind).kind {
            NodeKind::Scalar(s) => assert_eq!(s.raw, "Service"),
            other => panic!("expected scalar, got {other:?}"),
        }
    }

    #[test]
    fn missing_space_after_colon_is_strict_and_recovered() {
        let errors = validate("kind:Pod\n");
        assert!(errors
            .iter()
            .any(|e| e.kind == StrictErrorKind::MissingSpaceAfterColon));
        let root = build("kind:Pod\n");
        let kind = find_by_path(&root, &[PathSegment::Doc(0), key("kind")]).expect("kind parsed");
        match &root.node(kind).kind {
            NodeKind::Scalar(s) => assert_eq!(s.raw, "Pod"),
            other => panic!("expected scalar, got {other:?}"),
        }
    }

    #[test]
    fn url_values_are_not_split_at_scheme_colon() {
        let root = build("url: http://example.com/x\n");
        let url = find_by_path(&root, &[PathSegment::Doc(0), key("url")]).expect("url parsed");
        match &root.node(url).kind {
            NodeKind::Scalar(s) => assert_eq!(s.raw, "http://example.com/x"),
            other => panic!("expected scalar, got {other:?}"),
        }
        assert!(validate("url: http://example.com/x\n").is_empty());
    }

    #[test]
    fn tab_indentation_is_a_strict_error() {
        let errors = validate("metadata:\n\tname: a\n");
        assert!(errors
            .iter()
            .any(|e| e.kind == StrictErrorKind::TabIndent));
        assert!(validate("metadata:\n  name: a\n").is_empty());
    }

    #[test]
    fn under_indented_sibling_reports_expected_column() {
        let text = "metadata:\n  name: a\n labels: b\n";
        let errors = validate(text);
        assert!(errors.iter().any(|e| matches!(
            e.kind,
            StrictErrorKind::UnexpectedIndent {
                found: 1,
                expected: 2
            }
        )));
    }

    #[test]
    fn scalar_typing_covers_int_float_bool_null() {
        let root = build("a: 3\nb: 1.5\nc: true\nd: null\ne: \"3\"\n");
        let get = |k: &str| {
            let id = find_by_path(&root, &[PathSegment::Doc(0), key(k)]).unwrap();
            match &root.node(id).kind {
                NodeKind::Scalar(s) => s.value.clone(),
                other => panic!("expected scalar, got {other:?}"),
            }
        };
        assert_eq!(get("a"), ScalarValue::Int(3));
        assert_eq!(get("b"), ScalarValue::Float(1.5));
        assert_eq!(get("c"), ScalarValue::Bool(true));
        assert_eq!(get("d"), ScalarValue::Null);
        assert_eq!(get("e"), ScalarValue::Str("3".to_string()));
    }

    #[test]
    fn empty_input_builds_empty_root() {
        let root = build("");
        assert_eq!(root.documents.len(), 0);
        assert_eq!(root.line_count, 0);
        assert!(validate("").is_empty());
    }
}
