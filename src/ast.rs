//! Arena-backed document tree for fault-tolerant YAML parsing.
//!
//! Every node lives in a flat arena owned by [`Root`]; parents and children
//! reference each other by [`NodeId`] index, so back-references cannot form
//! ownership cycles. Nodes carry their 1-indexed source line range, their
//! indentation column, and a path from the document root that is recomputed
//! on attach.
//!
//! Broken input is kept, never dropped: unparseable lines become
//! [`NodeKind::Broken`] and serialize back out as a `# BROKEN:` comment.

use serde::Serialize;

use crate::diag::Diagnostic;

/// Opaque arena index for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct NodeId(usize);

impl NodeId {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0
    }
}

/// Typed scalar payload plus its original textual form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scalar {
    pub value: ScalarValue,
    /// Original text with quotes stripped (block scalars: joined body).
    pub raw: String,
    pub style: QuoteStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ScalarValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QuoteStyle {
    Plain,
    Single,
    Double,
    /// `|` block scalar.
    Literal,
    /// `>` block scalar.
    Folded,
}

/// One ordered mapping slot. `key: None` carries a keyless line (a bare
/// scalar or a broken line) kept in place so source order survives.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapEntry {
    pub key: Option<String>,
    pub value: NodeId,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum NodeKind {
    /// Ordered key -> node; insertion order is literal source order.
    Map(Vec<MapEntry>),
    Sequence(Vec<NodeId>),
    Scalar(Scalar),
    /// Unparseable line preserved verbatim. Brokenness is local; ancestors
    /// keep building.
    Broken { raw: String, message: String },
    /// One `---`-delimited unit.
    Document {
        content: Option<NodeId>,
        explicit_start: bool,
        explicit_end: bool,
    },
}

/// Coarse node classification for traversal filters and analysis counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeType {
    Map,
    Sequence,
    Scalar,
    Broken,
    Document,
}

impl NodeKind {
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeKind::Map(_) => NodeType::Map,
            NodeKind::Sequence(_) => NodeType::Sequence,
            NodeKind::Scalar(_) => NodeType::Scalar,
            NodeKind::Broken { .. } => NodeType::Broken,
            NodeKind::Document { .. } => NodeType::Document,
        }
    }
}

/// One step of a node path: document index, map key, or sequence index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum PathSegment {
    Doc(usize),
    Key(String),
    Index(usize),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub kind: NodeKind,
    /// 1-indexed inclusive source range. Containers widen as children attach.
    pub line_start: usize,
    pub line_end: usize,
    /// Leading-whitespace column of the line that introduced the node.
    pub indent: usize,
    /// Path from the document root; recomputed on attach, never stale.
    pub path: Vec<PathSegment>,
    /// Arena index of the owning container. Diagnostic/path use only.
    pub parent: Option<NodeId>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Whole-file parse result: arena plus the ordered document list.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Root {
    nodes: Vec<Node>,
    pub documents: Vec<NodeId>,
    pub line_count: usize,
    pub file_diagnostics: Vec<Diagnostic>,
}

impl Root {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, kind: NodeKind, line: usize, indent: usize) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(Node {
            kind,
            line_start: line,
            line_end: line,
            indent,
            path: Vec::new(),
            parent: None,
            diagnostics: Vec::new(),
        });
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Attaches `child` under map `parent`. A duplicate key at the same path
    /// replaces the earlier value in place (last one wins, position kept).
    pub fn attach_to_map(&mut self, parent: NodeId, key: Option<String>, child: NodeId) {
        let parent_path = self.node(parent).path.clone();
        let mut path = parent_path;
        if let Some(k) = &key {
            path.push(PathSegment::Key(k.clone()));
        }
        {
            let node = self.node_mut(child);
            node.parent = Some(parent);
            node.path = path;
        }
        let line = self.node(child).line_end;
        match &mut self.node_mut(parent).kind {
            NodeKind::Map(entries) => {
                if let Some(k) = &key {
                    if let Some(slot) = entries
                        .iter_mut()
                        .find(|e| e.key.as_deref() == Some(k.as_str()))
                    {
                        slot.value = child;
                        self.widen_to(parent, line);
                        return;
                    }
                }
                entries.push(MapEntry { key, value: child });
            }
            _ => panic!("attach_to_map on a non-map node"),
        }
        self.widen_to(parent, line);
    }

    /// Appends `child` to sequence `parent`.
    pub fn attach_to_seq(&mut self, parent: NodeId, child: NodeId) {
        let mut path = self.node(parent).path.clone();
        let index = match &self.node(parent).kind {
            NodeKind::Sequence(items) => items.len(),
            _ => panic!("attach_to_seq on a non-sequence node"),
        };
        path.push(PathSegment::Index(index));
        {
            let node = self.node_mut(child);
            node.parent = Some(parent);
            node.path = path;
        }
        let line = self.node(child).line_end;
        match &mut self.node_mut(parent).kind {
            NodeKind::Sequence(items) => items.push(child),
            _ => unreachable!(),
        }
        self.widen_to(parent, line);
    }

    /// Widens `line_end` up the ancestor chain so container ranges stay true.
    fn widen_to(&mut self, mut id: NodeId, line: usize) {
        loop {
            let node = self.node_mut(id);
            if node.line_end < line {
                node.line_end = line;
            }
            match node.parent {
                Some(p) => id = p,
                None => break,
            }
        }
    }
}

// ———————————————————————————————————————————————————————————————————————————
// TRAVERSAL
// ———————————————————————————————————————————————————————————————————————————

/// Early-exit signal for [`traverse`] callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitFlow {
    Continue,
    Stop,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TraverseOptions {
    pub include_broken: bool,
    /// Depth 0 is a document's content node; `None` means unbounded.
    pub max_depth: Option<usize>,
    pub type_filter: Option<NodeType>,
    /// Visit children before the node itself.
    pub post_order: bool,
}

impl TraverseOptions {
    pub fn all() -> Self {
        Self {
            include_broken: true,
            ..Self::default()
        }
    }
}

/// Depth-first walk over every document. The callback sees node ids in pre-
/// or post-order and can stop the whole walk by returning [`VisitFlow::Stop`].
pub fn traverse<F>(root: &Root, options: TraverseOptions, mut callback: F)
where
    F: FnMut(&Root, NodeId) -> VisitFlow,
{
    for &doc in &root.documents {
        if walk(root, doc, 0, &options, &mut callback) == VisitFlow::Stop {
            return;
        }
    }
}

fn walk<F>(
    root: &Root,
    id: NodeId,
    depth: usize,
    options: &TraverseOptions,
    callback: &mut F,
) -> VisitFlow
where
    F: FnMut(&Root, NodeId) -> VisitFlow,
{
    let node = root.node(id);
    let node_type = node.kind.node_type();

    if node_type == NodeType::Broken && !options.include_broken {
        return VisitFlow::Continue;
    }
    if let Some(max) = options.max_depth {
        if depth > max {
            return VisitFlow::Continue;
        }
    }

    let visit = |callback: &mut F| -> VisitFlow {
        match options.type_filter {
            Some(filter) if filter != node_type => VisitFlow::Continue,
            _ => callback(root, id),
        }
    };

    if !options.post_order && visit(callback) == VisitFlow::Stop {
        return VisitFlow::Stop;
    }

    for child in children_of(root, id) {
        if walk(root, child, depth + 1, options, callback) == VisitFlow::Stop {
            return VisitFlow::Stop;
        }
    }

    if options.post_order && visit(callback) == VisitFlow::Stop {
        return VisitFlow::Stop;
    }
    VisitFlow::Continue
}

fn children_of(root: &Root, id: NodeId) -> Vec<NodeId> {
    match &root.node(id).kind {
        NodeKind::Map(entries) => entries.iter().map(|e| e.value).collect(),
        NodeKind::Sequence(items) => items.clone(),
        NodeKind::Document { content, .. } => content.iter().copied().collect(),
        _ => Vec::new(),
    }
}

// ———————————————————————————————————————————————————————————————————————————
// ANALYSIS
// ———————————————————————————————————————————————————————————————————————————

/// One-traversal structural summary of a parsed file.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Analysis {
    pub map_count: usize,
    pub sequence_count: usize,
    pub scalar_count: usize,
    pub broken_count: usize,
    /// Map entries with no key (bare scalar lines, keyless sequences); they
    /// survive tree serialization but cannot be lowered to a keyed `Value`.
    pub keyless_count: usize,
    pub document_count: usize,
    pub max_depth: usize,
    pub diagnostics: Vec<Diagnostic>,
    pub detected_kind: Option<String>,
    pub detected_api_version: Option<String>,
    /// No broken nodes and no error-severity diagnostics anywhere.
    pub structure_valid: bool,
}

pub fn analyze(root: &Root) -> Analysis {
    let mut out = Analysis {
        document_count: root.documents.len(),
        diagnostics: root.file_diagnostics.clone(),
        ..Analysis::default()
    };

    // depth bookkeeping needs its own walk state, so track it via path length
    traverse(root, TraverseOptions::all(), |root, id| {
        let node = root.node(id);
        match node.kind.node_type() {
            NodeType::Map => {
                out.map_count += 1;
                if let NodeKind::Map(entries) = &node.kind {
                    out.keyless_count += entries.iter().filter(|e| e.key.is_none()).count();
                }
            }
            NodeType::Sequence => out.sequence_count += 1,
            NodeType::Scalar => out.scalar_count += 1,
            NodeType::Broken => out.broken_count += 1,
            NodeType::Document => {}
        }
        if node.path.len() > out.max_depth {
            out.max_depth = node.path.len();
        }
        out.diagnostics.extend(node.diagnostics.iter().cloned());
        VisitFlow::Continue
    });

    if let Some(&doc) = root.documents.first() {
        out.detected_kind = top_level_str(root, doc, "kind");
        out.detected_api_version = top_level_str(root, doc, "apiVersion");
    }

    out.structure_valid = out.broken_count == 0
        && !out
            .diagnostics
            .iter()
            .any(|d| d.severity == crate::diag::Severity::Error);
    out
}

fn top_level_str(root: &Root, doc: NodeId, key: &str) -> Option<String> {
    let content = match &root.node(doc).kind {
        NodeKind::Document { content, .. } => (*content)?,
        _ => return None,
    };
    let entries = match &root.node(content).kind {
        NodeKind::Map(entries) => entries,
        _ => return None,
    };
    let entry = entries.iter().find(|e| e.key.as_deref() == Some(key))?;
    match &root.node(entry.value).kind {
        NodeKind::Scalar(s) => match &s.value {
            ScalarValue::Str(v) => Some(v.clone()),
            other => Some(render_scalar_value(other, &s.raw)),
        },
        _ => None,
    }
}

fn render_scalar_value(value: &ScalarValue, raw: &str) -> String {
    match value {
        ScalarValue::Str(s) => s.clone(),
        ScalarValue::Int(i) => i.to_string(),
        ScalarValue::Float(_) => raw.to_string(),
        ScalarValue::Bool(b) => b.to_string(),
        ScalarValue::Null => "null".to_string(),
    }
}

// ———————————————————————————————————————————————————————————————————————————
// PATH LOOKUP
// ———————————————————————————————————————————————————————————————————————————

/// Resolves a segment list (doc index, map key, sequence index) to a node.
pub fn find_by_path(root: &Root, path: &[PathSegment]) -> Option<NodeId> {
    let mut segments = path.iter();
    let mut current = match segments.next()? {
        PathSegment::Doc(i) => {
            let doc = *root.documents.get(*i)?;
            match &root.node(doc).kind {
                NodeKind::Document { content, .. } => (*content)?,
                _ => return None,
            }
        }
        _ => return None,
    };

    for segment in segments {
        current = match (&root.node(current).kind, segment) {
            (NodeKind::Map(entries), PathSegment::Key(k)) => entries
                .iter()
                .find(|e| e.key.as_deref() == Some(k.as_str()))?
                .value,
            (NodeKind::Sequence(items), PathSegment::Index(i)) => *items.get(*i)?,
            _ => return None,
        };
    }
    Some(current)
}

// ———————————————————————————————————————————————————————————————————————————
// SERIALIZATION
// ———————————————————————————————————————————————————————————————————————————

/// Deterministic round trip back to YAML text.
///
/// Scalars that would change meaning unquoted are re-quoted; broken nodes are
/// rendered as a visible `# BROKEN:` comment so no input is silently lost.
pub fn serialize(root: &Root, indent_size: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    for (i, &doc) in root.documents.iter().enumerate() {
        let (content, explicit_start, explicit_end) = match &root.node(doc).kind {
            NodeKind::Document {
                content,
                explicit_start,
                explicit_end,
            } => (*content, *explicit_start, *explicit_end),
            _ => continue,
        };
        if explicit_start || i > 0 {
            lines.push("---".to_string());
        }
        if let Some(content) = content {
            render_node(root, content, 0, indent_size, &mut lines);
        }
        if explicit_end {
            lines.push("...".to_string());
        }
    }
    if lines.is_empty() {
        String::new()
    } else {
        let mut out = lines.join("\n");
        out.push('\n');
        out
    }
}

fn render_node(root: &Root, id: NodeId, depth: usize, indent_size: usize, out: &mut Vec<String>) {
    let pad = " ".repeat(depth * indent_size);
    match &root.node(id).kind {
        NodeKind::Map(entries) => {
            for entry in entries {
                match &entry.key {
                    Some(key) => render_map_entry(root, key, entry.value, depth, indent_size, out),
                    None => render_node(root, entry.value, depth, indent_size, out),
                }
            }
        }
        NodeKind::Sequence(items) => {
            for &item in items {
                render_seq_item(root, item, depth, indent_size, out);
            }
        }
        NodeKind::Scalar(s) => out.push(format!("{pad}{}", render_scalar(s))),
        NodeKind::Broken { raw, .. } => out.push(format!("{pad}# BROKEN: {}", raw.trim())),
        NodeKind::Document { .. } => {}
    }
}

fn render_map_entry(
    root: &Root,
    key: &str,
    value: NodeId,
    depth: usize,
    indent_size: usize,
    out: &mut Vec<String>,
) {
    let pad = " ".repeat(depth * indent_size);
    match &root.node(value).kind {
        NodeKind::Scalar(s) if matches!(s.style, QuoteStyle::Literal | QuoteStyle::Folded) => {
            let marker = if s.style == QuoteStyle::Literal { "|" } else { ">" };
            out.push(format!("{pad}{key}: {marker}"));
            let body_pad = " ".repeat((depth + 1) * indent_size);
            for line in s.raw.split('\n') {
                if line.is_empty() {
                    out.push(String::new());
                } else {
                    out.push(format!("{body_pad}{line}"));
                }
            }
        }
        NodeKind::Scalar(s) => out.push(format!("{pad}{key}: {}", render_scalar(s))),
        NodeKind::Broken { raw, .. } => {
            out.push(format!("{pad}{key}:"));
            out.push(format!("{pad}# BROKEN: {}", raw.trim()));
        }
        NodeKind::Map(entries) if entries.is_empty() => out.push(format!("{pad}{key}:")),
        NodeKind::Sequence(items) if items.is_empty() => out.push(format!("{pad}{key}:")),
        NodeKind::Map(_) | NodeKind::Sequence(_) => {
            out.push(format!("{pad}{key}:"));
            render_node(root, value, depth + 1, indent_size, out);
        }
        NodeKind::Document { .. } => {}
    }
}

fn render_seq_item(root: &Root, item: NodeId, depth: usize, indent_size: usize, out: &mut Vec<String>) {
    let pad = " ".repeat(depth * indent_size);
    match &root.node(item).kind {
        NodeKind::Scalar(s) => out.push(format!("{pad}- {}", render_scalar(s))),
        NodeKind::Broken { raw, .. } => out.push(format!("{pad}- # BROKEN: {}", raw.trim())),
        NodeKind::Map(entries) if entries.is_empty() => out.push(format!("{pad}-")),
        NodeKind::Map(_) | NodeKind::Sequence(_) => {
            // first child rides on the dash line, the rest align under it
            let mut nested: Vec<String> = Vec::new();
            render_node(root, item, depth + 1, indent_size, &mut nested);
            let inner_pad = " ".repeat((depth + 1) * indent_size);
            let mut first = true;
            for line in nested {
                if first {
                    let stripped = line.strip_prefix(inner_pad.as_str()).unwrap_or(&line);
                    out.push(format!("{pad}- {stripped}"));
                    first = false;
                } else {
                    out.push(line);
                }
            }
        }
        _ => {}
    }
}

fn render_scalar(s: &Scalar) -> String {
    match s.style {
        QuoteStyle::Single => format!("'{}'", s.raw.replace('\'', "''")),
        QuoteStyle::Double => format!("\"{}\"", s.raw.replace('\\', "\\\\").replace('"', "\\\"")),
        QuoteStyle::Literal | QuoteStyle::Folded | QuoteStyle::Plain => match &s.value {
            ScalarValue::Null if s.raw.is_empty() => "null".to_string(),
            _ if needs_quoting(&s.raw) => format!("\"{}\"", s.raw.replace('"', "\\\"")),
            _ => s.raw.clone(),
        },
    }
}

/// A plain scalar must be re-quoted when unquoted text would change meaning:
/// a `: ` would read as a nested mapping, `#` starts a comment, and edge
/// whitespace does not survive a round trip.
fn needs_quoting(raw: &str) -> bool {
    raw.contains(": ")
        || raw.ends_with(':')
        || raw.contains('#')
        || raw.starts_with(' ')
        || raw.ends_with(' ')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(raw: &str) -> Scalar {
        Scalar {
            value: ScalarValue::Str(raw.to_string()),
            raw: raw.to_string(),
            style: QuoteStyle::Plain,
        }
    }

    fn tiny_root() -> (Root, NodeId) {
        // metadata:
        //   name: test
        let mut root = Root::new();
        let doc = root.alloc(
            NodeKind::Document {
                content: None,
                explicit_start: false,
                explicit_end: false,
            },
            1,
            0,
        );
        let top = root.alloc(NodeKind::Map(Vec::new()), 1, 0);
        root.node_mut(top).path = vec![PathSegment::Doc(0)];
        match &mut root.node_mut(doc).kind {
            NodeKind::Document { content, .. } => *content = Some(top),
            _ => unreachable!(),
        }
        root.documents.push(doc);

        let meta = root.alloc(NodeKind::Map(Vec::new()), 1, 0);
        root.attach_to_map(top, Some("metadata".into()), meta);
        let name = root.alloc(NodeKind::Scalar(scalar("test")), 2, 2);
        root.attach_to_map(meta, Some("name".into()), name);
        root.line_count = 2;
        (root, meta)
    }

    #[test]
    fn paths_recomputed_on_attach() {
        let (root, meta) = tiny_root();
        let name = find_by_path(
            &root,
            &[
                PathSegment::Doc(0),
                PathSegment::Key("metadata".into()),
                PathSegment::Key("name".into()),
            ],
        )
        .expect("name resolves");
        assert_eq!(
            root.node(name).path,
            vec![
                PathSegment::Doc(0),
                PathSegment::Key("metadata".into()),
                PathSegment::Key("name".into()),
            ]
        );
        assert_eq!(root.node(name).parent, Some(meta));
    }

    #[test]
    fn duplicate_key_replaces_in_place() {
        let (mut root, meta) = tiny_root();
        let other = root.alloc(NodeKind::Scalar(scalar("other")), 3, 2);
        root.attach_to_map(meta, Some("name".into()), other);
        match &root.node(meta).kind {
            NodeKind::Map(entries) => {
                assert_eq!(entries.len(), 1);
                assert_eq!(entries[0].value, other);
            }
            _ => panic!("meta must stay a map"),
        }
    }

    #[test]
    fn serialize_renders_nested_map() {
        let (root, _) = tiny_root();
        let text = serialize(&root, 2);
        assert_eq!(text, "metadata:\n  name: test\n");
    }

    #[test]
    fn broken_nodes_render_as_comment() {
        let (mut root, meta) = tiny_root();
        let broken = root.alloc(
            NodeKind::Broken {
                raw: "@@garbage".into(),
                message: "unparseable".into(),
            },
            3,
            2,
        );
        root.attach_to_map(meta, None, broken);
        let text = serialize(&root, 2);
        assert!(text.contains("# BROKEN: @@garbage"));
    }

    #[test]
    fn traverse_stops_early() {
        let (root, _) = tiny_root();
        let mut seen = 0;
        traverse(&root, TraverseOptions::all(), |_, _| {
            seen += 1;
            VisitFlow::Stop
        });
        assert_eq!(seen, 1);
    }

    #[test]
    fn traverse_type_filter_only_scalars() {
        let (root, _) = tiny_root();
        let mut scalars = 0;
        let options = TraverseOptions {
            type_filter: Some(NodeType::Scalar),
            ..TraverseOptions::all()
        };
        traverse(&root, options, |_, _| {
            scalars += 1;
            VisitFlow::Continue
        });
        assert_eq!(scalars, 1);
    }

    #[test]
    fn analyze_counts_and_validity() {
        let (root, _) = tiny_root();
        let analysis = analyze(&root);
        assert_eq!(analysis.map_count, 2);
        assert_eq!(analysis.scalar_count, 1);
        assert_eq!(analysis.broken_count, 0);
        assert!(analysis.structure_valid);
    }

    #[test]
    fn analyze_counts_keyless_entries() {
        let (mut root, meta) = tiny_root();
        let stray = root.alloc(NodeKind::Scalar(scalar("stray")), 3, 2);
        root.attach_to_map(meta, None, stray);
        let analysis = analyze(&root);
        assert_eq!(analysis.keyless_count, 1);
        assert_eq!(analysis.broken_count, 0);
    }

    #[test]
    fn colon_bearing_scalars_are_requoted() {
        let s = Scalar {
            value: ScalarValue::Str("a: b".into()),
            raw: "a: b".into(),
            style: QuoteStyle::Plain,
        };
        assert_eq!(render_scalar(&s), "\"a: b\"");
    }
}
