//! Misplaced-field detection and relocation against the schema registry.
//!
//! Consumes a dynamic document [`Value`], moves root-level fields to their
//! schema-correct paths, relocates pod-template fields that sit directly
//! under `spec`, then creates any still-missing required containers.
//! Relocation merges into existing targets (maps union favoring existing,
//! sequences concatenate) so it can never destroy correct data already at
//! the destination.

use indexmap::IndexMap;
use tracing::debug;

use crate::diag::{FixCategory, FixChange, Severity};
use crate::schema;
use crate::types;
use crate::value::Value;

// confidence policy: kind-specific pod-template rules are less ambiguous
// than generic root-level guesses, and creations follow the schema exactly
const CONF_ROOT_RELOCATION: f64 = 0.80;
const CONF_KIND_RELOCATION: f64 = 0.85;
const CONF_POD_TEMPLATE_RELOCATION: f64 = 0.90;
const CONF_CREATE_NESTED: f64 = 0.95;
const CONF_CREATE_TOP_LEVEL: f64 = 1.0;

#[derive(Debug, Clone)]
pub struct Reorganized {
    pub document: Value,
    pub changes: Vec<FixChange>,
    pub is_valid: bool,
    pub errors: Vec<String>,
}

/// Reorganizes one parsed document. Requires a `kind` field; its absence is
/// reported, not fatal.
pub fn reorganize(mut document: Value) -> Reorganized {
    let mut changes = Vec::new();
    let mut errors = Vec::new();

    let Some(kind) = document.get_path("kind").and_then(|v| v.as_str()).map(String::from) else {
        return Reorganized {
            document,
            changes,
            is_valid: false,
            errors: vec!["document has no 'kind' field".to_string()],
        };
    };

    let schema = schema::lookup(&kind);

    relocate_root_fields(&mut document, &kind, schema, &mut changes, &mut errors);
    relocate_pod_template_fields(&mut document, &kind, &mut changes, &mut errors);
    if let Some(schema) = schema {
        create_required_paths(&mut document, schema, &mut changes, &mut errors);
    }

    // only the universally required top-level fields are enforced here;
    // deeper requiredness is advisory reporting
    let mut is_valid = true;
    for field in ["apiVersion", "metadata"] {
        if document.get_path(field).is_none() {
            is_valid = false;
            let message = format!("missing required field '{field}'");
            if !errors.contains(&message) {
                errors.push(message);
            }
        }
    }

    debug!(
        kind = %kind,
        relocations = changes.len(),
        valid = is_valid,
        "reorganize complete"
    );

    Reorganized {
        document,
        changes,
        is_valid,
        errors,
    }
}

fn relocate_root_fields(
    document: &mut Value,
    kind: &str,
    schema: Option<&'static schema::ResourceSchema>,
    changes: &mut Vec<FixChange>,
    errors: &mut Vec<String>,
) {
    // wildcard table first, kind-specific second (kind-specific wins)
    let mut table: IndexMap<&str, (&str, f64)> = IndexMap::new();
    for &(field, path) in schema::WILDCARD_PATHS {
        table.insert(field, (path, CONF_ROOT_RELOCATION));
    }
    if let Some(schema) = schema {
        for &(field, path) in schema.field_paths {
            table.insert(field, (path, CONF_KIND_RELOCATION));
        }
    }

    let root_keys: Vec<String> = match document.as_map() {
        Some(map) => map.keys().cloned().collect(),
        None => return,
    };

    for field in root_keys {
        let Some(&(target, confidence)) = table.get(field.as_str()) else {
            continue;
        };
        if !target.contains('.') {
            continue; // already at its correct (root) position
        }
        let Some(moved) = document.remove_path(&field) else {
            continue;
        };
        match place(document, target, moved) {
            Ok(()) => changes.push(
                FixChange::new(
                    0,
                    field.clone(),
                    target.to_string(),
                    format!("'{field}' belongs at '{target}' for kind {kind}"),
                    FixCategory::Structure,
                    confidence,
                )
                .with_severity(Severity::Warning),
            ),
            Err(e) => errors.push(format!("cannot relocate '{field}' to '{target}': {e}")),
        }
    }
}

fn relocate_pod_template_fields(
    document: &mut Value,
    kind: &str,
    changes: &mut Vec<FixChange>,
    errors: &mut Vec<String>,
) {
    let Some(prefix) = schema::pod_template_prefix(kind) else {
        return;
    };

    let misplaced: Vec<String> = match document.get_path("spec").and_then(|v| v.as_map()) {
        Some(spec) => schema::POD_TEMPLATE_FIELDS
            .iter()
            .filter(|f| spec.contains_key(**f))
            .map(|f| f.to_string())
            .collect(),
        None => return,
    };

    for field in misplaced {
        let source = format!("spec.{field}");
        let target = format!("{prefix}.{field}");
        let Some(moved) = document.remove_path(&source) else {
            continue;
        };
        match place(document, &target, moved) {
            Ok(()) => changes.push(
                FixChange::new(
                    0,
                    source.clone(),
                    target.clone(),
                    format!("pod-template field '{field}' moved into the template for {kind}"),
                    FixCategory::Structure,
                    CONF_POD_TEMPLATE_RELOCATION,
                )
                .with_severity(Severity::Warning),
            ),
            Err(e) => errors.push(format!("cannot relocate '{source}' to '{target}': {e}")),
        }
    }
}

fn create_required_paths(
    document: &mut Value,
    schema: &'static schema::ResourceSchema,
    changes: &mut Vec<FixChange>,
    errors: &mut Vec<String>,
) {
    for &path in schema.required_paths {
        if document.get_path(path).is_some() {
            continue;
        }
        // only container-typed fields can be fabricated as empty structure;
        // a missing scalar (apiVersion, schedule) has no inventable value
        let leaf = path.rsplit('.').next().unwrap_or(path);
        if !types::is_container_field(leaf) {
            errors.push(format!("missing required field '{path}'"));
            continue;
        }
        match document.ensure_map_path(path) {
            Ok(_) => {
                let confidence = if path.contains('.') {
                    CONF_CREATE_NESTED
                } else {
                    CONF_CREATE_TOP_LEVEL
                };
                changes.push(
                    FixChange::new(
                        0,
                        String::new(),
                        path.to_string(),
                        format!("created missing required field '{path}'"),
                        FixCategory::Structure,
                        confidence,
                    )
                    .with_severity(Severity::Info),
                );
            }
            Err(e) => errors.push(format!("cannot create required path '{path}': {e}")),
        }
    }
}

/// Inserts `incoming` at the dotted `target`, merging with whatever is
/// already there instead of overwriting it.
fn place(document: &mut Value, target: &str, incoming: Value) -> Result<(), crate::value::PathError> {
    let (parent_path, leaf) = match target.rsplit_once('.') {
        Some((p, l)) => (Some(p), l),
        None => (None, target),
    };
    let parent = match parent_path {
        Some(p) => document.ensure_map_path(p)?,
        None => document
            .as_map_mut()
            .ok_or_else(|| crate::value::PathError::NotAMapping(target.to_string()))?,
    };
    match parent.get_mut(leaf) {
        Some(existing) => merge(existing, incoming),
        None => {
            parent.insert(leaf.to_string(), incoming);
        }
    }
    Ok(())
}

/// Additive merge: never throws away data that already sits at the target.
fn merge(existing: &mut Value, incoming: Value) {
    match (existing, incoming) {
        (Value::Map(existing), Value::Map(incoming)) => {
            for (key, value) in incoming {
                match existing.get_mut(&key) {
                    Some(slot) => merge(slot, value),
                    None => {
                        existing.insert(key, value);
                    }
                }
            }
        }
        (Value::Seq(existing), Value::Seq(incoming)) => existing.extend(incoming),
        // scalar conflict: the existing value wins
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;
    use crate::value::from_ast;

    fn doc(text: &str) -> Value {
        let root = parser::build(text);
        from_ast(&root, root.documents[0]).expect("document lowers")
    }

    #[test]
    fn missing_kind_is_reported_not_fatal() {
        let out = reorganize(doc("apiVersion: v1\nmetadata:\n  name: a\n"));
        assert!(!out.is_valid);
        assert_eq!(out.errors, vec!["document has no 'kind' field"]);
        assert!(out.changes.is_empty());
    }

    #[test]
    fn root_name_moves_under_metadata() {
        let out = reorganize(doc("apiVersion: v1\nkind: Pod\nname: web\nmetadata:\n  uid: x\n"));
        assert_eq!(out.document.get_path("name"), None);
        assert_eq!(
            out.document.get_path("metadata.name"),
            Some(&Value::Str("web".into()))
        );
        // pre-existing sibling data survives
        assert_eq!(
            out.document.get_path("metadata.uid"),
            Some(&Value::Str("x".into()))
        );
        assert!(out
            .changes
            .iter()
            .any(|c| c.category == FixCategory::Structure && c.fixed == "metadata.name"));
    }

    #[test]
    fn deployment_containers_move_into_template() {
        let text = "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: web\nspec:\n  replicas: 3\n  containers:\n    - name: web\n      image: nginx\n";
        let out = reorganize(doc(text));
        assert_eq!(out.document.get_path("spec.containers"), None);
        let moved = out
            .document
            .get_path("spec.template.spec.containers")
            .expect("containers relocated");
        match moved {
            Value::Seq(items) => {
                assert_eq!(items.len(), 1);
                assert_eq!(
                    items[0].get_path("image"),
                    Some(&Value::Str("nginx".into()))
                );
            }
            other => panic!("expected sequence, got {other:?}"),
        }
        let reloc = out
            .changes
            .iter()
            .find(|c| c.original == "spec.containers")
            .expect("relocation recorded");
        assert!(reloc.confidence >= 0.85, "pod-template moves score high");
    }

    #[test]
    fn cronjob_uses_the_deeper_prefix() {
        let text = "apiVersion: batch/v1\nkind: CronJob\nmetadata:\n  name: tick\nspec:\n  schedule: '* * * * *'\n  containers:\n    - name: tick\n";
        let out = reorganize(doc(text));
        assert!(out
            .document
            .get_path("spec.jobTemplate.spec.template.spec.containers")
            .is_some());
    }

    #[test]
    fn merge_is_additive_for_sequences_and_maps() {
        let text = "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: web\nspec:\n  containers:\n    - name: extra\n  template:\n    spec:\n      containers:\n        - name: original\n";
        let out = reorganize(doc(text));
        match out.document.get_path("spec.template.spec.containers") {
            Some(Value::Seq(items)) => {
                assert_eq!(items.len(), 2, "concatenated, not overwritten");
                assert_eq!(
                    items[0].get_path("name"),
                    Some(&Value::Str("original".into()))
                );
                assert_eq!(items[1].get_path("name"), Some(&Value::Str("extra".into())));
            }
            other => panic!("expected sequence, got {other:?}"),
        }
    }

    #[test]
    fn required_containers_are_created() {
        let text = "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: web\nspec:\n  replicas: 1\n";
        let out = reorganize(doc(text));
        assert!(out.document.get_path("spec.selector").is_some());
        assert!(out.document.get_path("spec.template").is_some());
        let create = out
            .changes
            .iter()
            .find(|c| c.fixed == "spec.selector")
            .expect("create recorded");
        assert!(create.confidence >= 0.95);
        assert!(out.is_valid);
    }

    #[test]
    fn scalar_required_fields_are_reported_not_fabricated() {
        let out = reorganize(doc("kind: CronJob\nmetadata:\n  name: tick\n"));
        assert_eq!(out.document.get_path("apiVersion"), None);
        assert_eq!(out.document.get_path("spec.schedule"), None);
        assert!(!out.is_valid);
        assert!(out.errors.iter().any(|e| e.contains("'apiVersion'")));
        assert!(out.errors.iter().any(|e| e.contains("'spec.schedule'")));
        // the container paths are still created
        assert!(out.document.get_path("spec.jobTemplate").is_some());
    }

    #[test]
    fn unknown_kind_still_gets_wildcard_relocations() {
        let out = reorganize(doc("apiVersion: v1\nkind: Widget\nname: w\nmetadata:\n  uid: u\n"));
        assert_eq!(
            out.document.get_path("metadata.name"),
            Some(&Value::Str("w".into()))
        );
    }
}
