//! Dynamic document value for the parse → reorganize → reserialize round
//! trip.
//!
//! Deliberately decoupled from the AST node type: the AST carries
//! source-position metadata the reorganizer does not need, and the
//! reorganizer needs cheap path surgery the arena does not offer. A `Value`
//! is only ever built from a clean parse, so it has no broken-line variant.

use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;

use crate::ast::{NodeId, NodeKind, QuoteStyle, Root, ScalarValue};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Seq(Vec<Value>),
    Map(IndexMap<String, Value>),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("path segment '{0}' is not a mapping")]
    NotAMapping(String),
}

impl Value {
    pub fn map() -> Self {
        Value::Map(IndexMap::new())
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut IndexMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(self, Value::Seq(_) | Value::Map(_))
    }

    /// Resolves a dotted path (`spec.template.spec`) against nested maps.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut current = self;
        for segment in path.split('.') {
            current = current.as_map()?.get(segment)?;
        }
        Some(current)
    }

    /// Removes and returns the value at a dotted path, leaving emptied
    /// intermediate containers in place.
    pub fn remove_path(&mut self, path: &str) -> Option<Value> {
        let (parent_path, leaf) = match path.rsplit_once('.') {
            Some((p, l)) => (Some(p), l),
            None => (None, path),
        };
        let parent = match parent_path {
            Some(p) => self.get_path_mut(p)?,
            None => self,
        };
        parent.as_map_mut()?.shift_remove(leaf)
    }

    fn get_path_mut(&mut self, path: &str) -> Option<&mut Value> {
        let mut current = self;
        for segment in path.split('.') {
            current = current.as_map_mut()?.get_mut(segment)?;
        }
        Some(current)
    }

    /// Walks a dotted path, creating missing intermediate maps, and returns
    /// the final map. Errors when a non-map value is in the way.
    pub fn ensure_map_path(&mut self, path: &str) -> Result<&mut IndexMap<String, Value>, PathError> {
        let mut current = self;
        for segment in path.split('.') {
            let map = current
                .as_map_mut()
                .ok_or_else(|| PathError::NotAMapping(segment.to_string()))?;
            current = map.entry(segment.to_string()).or_insert_with(Value::map);
            if !matches!(current, Value::Map(_)) {
                return Err(PathError::NotAMapping(segment.to_string()));
            }
        }
        current
            .as_map_mut()
            .ok_or_else(|| PathError::NotAMapping(path.to_string()))
    }
}

// ———————————————————————————————————————————————————————————————————————————
// AST LOWERING
// ———————————————————————————————————————————————————————————————————————————

/// Lowers one document's content to a dynamic value. Keyless entries and
/// broken nodes are absent by contract (callers lower clean parses only).
pub fn from_ast(root: &Root, doc: NodeId) -> Option<Value> {
    let content = match &root.node(doc).kind {
        NodeKind::Document { content, .. } => (*content)?,
        _ => return None,
    };
    Some(lower(root, content))
}

fn lower(root: &Root, id: NodeId) -> Value {
    match &root.node(id).kind {
        NodeKind::Map(entries) => {
            let mut map = IndexMap::new();
            for entry in entries {
                if let Some(key) = &entry.key {
                    map.insert(key.clone(), lower(root, entry.value));
                }
            }
            Value::Map(map)
        }
        NodeKind::Sequence(items) => Value::Seq(items.iter().map(|&i| lower(root, i)).collect()),
        NodeKind::Scalar(s) => match (&s.value, s.style) {
            // quoted scalars stay strings even when they look numeric
            (_, QuoteStyle::Single | QuoteStyle::Double) => Value::Str(s.raw.clone()),
            (ScalarValue::Str(v), _) => Value::Str(v.clone()),
            (ScalarValue::Int(i), _) => Value::Int(*i),
            (ScalarValue::Float(f), _) => Value::Float(*f),
            (ScalarValue::Bool(b), _) => Value::Bool(*b),
            (ScalarValue::Null, _) => Value::Null,
        },
        NodeKind::Broken { .. } | NodeKind::Document { .. } => Value::Null,
    }
}

// ———————————————————————————————————————————————————————————————————————————
// RENDERING
// ———————————————————————————————————————————————————————————————————————————

/// Deterministic YAML rendering. Empty containers render as an awaiting key
/// (`key:`) so the output reparses with the same line-oriented parser.
pub fn to_yaml(value: &Value, indent_size: usize) -> String {
    let mut lines = Vec::new();
    render(value, 0, indent_size, &mut lines);
    if lines.is_empty() {
        String::new()
    } else {
        let mut out = lines.join("\n");
        out.push('\n');
        out
    }
}

fn render(value: &Value, depth: usize, indent_size: usize, out: &mut Vec<String>) {
    let pad = " ".repeat(depth * indent_size);
    match value {
        Value::Map(map) => {
            for (key, child) in map {
                render_entry(key, child, depth, indent_size, out);
            }
        }
        Value::Seq(items) => {
            for item in items {
                render_item(item, depth, indent_size, out);
            }
        }
        other => out.push(format!("{pad}{}", render_scalar(other))),
    }
}

fn render_entry(key: &str, value: &Value, depth: usize, indent_size: usize, out: &mut Vec<String>) {
    let pad = " ".repeat(depth * indent_size);
    match value {
        Value::Map(m) if m.is_empty() => out.push(format!("{pad}{key}:")),
        Value::Seq(s) if s.is_empty() => out.push(format!("{pad}{key}:")),
        Value::Map(_) | Value::Seq(_) => {
            out.push(format!("{pad}{key}:"));
            render(value, depth + 1, indent_size, out);
        }
        Value::Str(s) if s.contains('\n') => {
            out.push(format!("{pad}{key}: |"));
            let body_pad = " ".repeat((depth + 1) * indent_size);
            for line in s.split('\n') {
                if line.is_empty() {
                    out.push(String::new());
                } else {
                    out.push(format!("{body_pad}{line}"));
                }
            }
        }
        other => out.push(format!("{pad}{key}: {}", render_scalar(other))),
    }
}

fn render_item(value: &Value, depth: usize, indent_size: usize, out: &mut Vec<String>) {
    let pad = " ".repeat(depth * indent_size);
    match value {
        Value::Map(m) if m.is_empty() => out.push(format!("{pad}-")),
        Value::Map(_) | Value::Seq(_) => {
            let mut nested = Vec::new();
            render(value, depth + 1, indent_size, &mut nested);
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
        other => out.push(format!("{pad}- {}", render_scalar(other))),
    }
}

/// Renders one scalar, re-quoting strings that would reparse as another type
/// or change meaning unquoted.
pub fn render_scalar(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => {
            if f.fract() == 0.0 && f.is_finite() {
                format!("{f:.1}")
            } else {
                f.to_string()
            }
        }
        Value::Str(s) => {
            if string_needs_quoting(s) {
                format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
            } else {
                s.clone()
            }
        }
        Value::Seq(_) | Value::Map(_) => String::new(),
    }
}

fn string_needs_quoting(s: &str) -> bool {
    if s.is_empty() {
        return true;
    }
    // would reparse as a different scalar type
    let retyped = matches!(
        s,
        "true" | "True" | "TRUE" | "false" | "False" | "FALSE" | "null" | "Null" | "NULL" | "~"
    ) || s.parse::<i64>().is_ok()
        || s.parse::<f64>().is_ok();
    retyped
        || s.contains(": ")
        || s.ends_with(':')
        || s.contains('#')
        || s.starts_with(' ')
        || s.ends_with(' ')
        || s.starts_with('-') && s[1..].starts_with(' ')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;

    fn doc_value(text: &str) -> Value {
        let root = parser::build(text);
        from_ast(&root, root.documents[0]).expect("document lowers")
    }

    #[test]
    fn lowering_preserves_field_order() {
        let v = doc_value("kind: Pod\napiVersion: v1\nmetadata:\n  name: a\n");
        let keys: Vec<_> = v.as_map().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["kind", "apiVersion", "metadata"]);
    }

    #[test]
    fn quoted_numerics_stay_strings() {
        let v = doc_value("replicas: \"3\"\n");
        assert_eq!(v.get_path("replicas"), Some(&Value::Str("3".into())));
        // and the string re-quotes on the way out so the type survives
        let out = to_yaml(&v, 2);
        assert_eq!(out, "replicas: \"3\"\n");
    }

    #[test]
    fn path_ops_get_remove_ensure() {
        let mut v = doc_value("spec:\n  replicas: 3\n");
        assert_eq!(v.get_path("spec.replicas"), Some(&Value::Int(3)));
        let removed = v.remove_path("spec.replicas").expect("removed");
        assert_eq!(removed, Value::Int(3));
        assert_eq!(v.get_path("spec.replicas"), None);

        let target = v.ensure_map_path("spec.template.spec").expect("created");
        target.insert("x".into(), Value::Int(1));
        assert_eq!(v.get_path("spec.template.spec.x"), Some(&Value::Int(1)));
    }

    #[test]
    fn ensure_path_rejects_scalar_in_the_way() {
        let mut v = doc_value("spec: done\n");
        let err = v.ensure_map_path("spec.template").unwrap_err();
        assert_eq!(err, PathError::NotAMapping("spec".into()));
    }

    #[test]
    fn round_trip_through_render_and_reparse() {
        let text = "apiVersion: apps/v1\nkind: Deployment\nspec:\n  replicas: 3\n  template:\n    spec:\n      containers:\n        - name: web\n          image: nginx\n";
        let v = doc_value(text);
        let out = to_yaml(&v, 2);
        let v2 = doc_value(&out);
        assert_eq!(v, v2, "render/reparse is stable");
    }

    #[test]
    fn empty_containers_render_as_awaiting_keys() {
        let mut v = Value::map();
        v.ensure_map_path("spec.selector").unwrap();
        let out = to_yaml(&v, 2);
        assert_eq!(out, "spec:\n  selector:\n");
    }

    #[test]
    fn multiline_strings_render_as_literal_blocks() {
        let v = doc_value("data:\n  run: |\n    echo a\n    echo b\n");
        let out = to_yaml(&v, 2);
        assert!(out.contains("run: |"));
        assert!(out.contains("    echo a"));
        let v2 = doc_value(&out);
        assert_eq!(v, v2);
    }
}
