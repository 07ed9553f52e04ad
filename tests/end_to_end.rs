//! End-to-end repair scenarios over the public API.

use yamlfix::ast;
use yamlfix::parser;
use yamlfix::types;
use yamlfix::value::Value;
use yamlfix::{fix, FixCategory, FixOptions, Fixer};

const MESSY_DEPLOYMENT: &str = "\
apiVersion apps/v1
kind Deployment
metadata
  name web
spec
  replicas 3
";

#[test]
fn missing_colons_all_recover() {
    let result = fix(MESSY_DEPLOYMENT);
    let colon_fixes = result
        .changes
        .iter()
        .filter(|c| c.reason.contains("missing colon"))
        .count();
    assert!(colon_fixes >= 3, "got {colon_fixes}: {:#?}", result.changes);
    assert!(result.is_valid, "errors: {:?}", result.errors);
    assert!(result.content.contains("apiVersion: apps/v1"));
    assert!(result.content.contains("kind: Deployment"));
    assert!(result.content.contains("name: web"));
    assert!(result.content.contains("replicas: 3"));
}

#[test]
fn quoted_replicas_becomes_integer_with_high_confidence() {
    let text = "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: web\nspec:\n  selector:\n    matchLabels:\n      app: web\n  template:\n    spec:\n      containers:\n        - name: web\n          image: nginx\n  replicas: \"3\"\n";
    let result = fix(text);
    assert!(result.content.contains("replicas: 3"));
    assert!(!result.content.contains("replicas: \"3\""));
    let change = result
        .changes
        .iter()
        .find(|c| c.category == FixCategory::Type)
        .expect("coercion recorded");
    assert!(change.confidence >= 0.9, "confidence {}", change.confidence);
}

#[test]
fn deployment_containers_relocate_and_keep_their_values() {
    let text = "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: web\nspec:\n  replicas: 2\n  containers:\n    - name: web\n      image: nginx\n      ports:\n        - containerPort: 8080\n";
    let result = fix(text);
    assert!(result.is_valid, "errors: {:?}", result.errors);
    assert!(result
        .changes
        .iter()
        .any(|c| c.category == FixCategory::Structure && c.original == "spec.containers"));

    // reparse the output and confirm the data survived the move
    let root = parser::build(&result.content);
    let doc = yamlfix::value::from_ast(&root, root.documents[0]).expect("clean output");
    let containers = doc
        .get_path("spec.template.spec.containers")
        .expect("containers under template");
    match containers {
        Value::Seq(items) => {
            assert_eq!(items.len(), 1);
            assert_eq!(items[0].get_path("image"), Some(&Value::Str("nginx".into())));
            assert_eq!(
                items[0].get_path("ports"),
                Some(&Value::Seq(vec![Value::Map(
                    [("containerPort".to_string(), Value::Int(8080))]
                        .into_iter()
                        .collect()
                )]))
            );
        }
        other => panic!("expected sequence, got {other:?}"),
    }
    assert_eq!(doc.get_path("spec.containers"), None);
}

#[test]
fn empty_input_is_valid_and_untouched() {
    for text in ["", "\n", "\n  \n"] {
        let result = fix(text);
        assert!(result.is_valid, "{text:?}");
        assert!(result.changes.is_empty(), "{text:?}");
        assert_eq!(result.content, text);
        assert_eq!(result.confidence, 1.0);
    }
}

#[test]
fn unterminated_quote_closes_and_validates() {
    let text = "apiVersion: v1\nkind: Pod\nmetadata:\n  name: \"web\nspec:\n  containers:\n    - name: web\n      image: nginx\n";
    let result = fix(text);
    assert!(result.is_valid, "errors: {:?}", result.errors);
    assert!(result.content.contains("name: \"web\""));
    assert!(result
        .changes
        .iter()
        .any(|c| c.reason.contains("unterminated")));
}

#[test]
fn repair_is_idempotent_across_scenarios() {
    let inputs = [
        MESSY_DEPLOYMENT,
        "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: web\nspec:\n  containers:\n    - name: web\n      image: nginx\n",
        "apiVersion: v1\nkind: Pod\nmetdata:\n  name: a\nspec:\n  containers:\n    - name: a\n      image: b\n  hostNetwork: yes\n",
        "---\nkind: Pod\napiVersion: v1\nmetadata:\n  name: a\nspec:\n  containers:\n    - name: a\n---\nkind: Service\napiVersion: v1\nmetadata:\n  name: b\nspec:\n  selector:\n    app: a\n",
    ];
    for input in inputs {
        let first = fix(input);
        let second = fix(&first.content);
        assert_eq!(
            second.content, first.content,
            "output must be a fixed point for {input:?}"
        );
        assert!(
            second.changes.is_empty(),
            "second pass found work for {input:?}: {:#?}",
            second.changes
        );
    }
}

#[test]
fn valid_manifest_round_trips_with_zero_changes() {
    let text = "apiVersion: v1\nkind: Pod\nmetadata:\n  name: web\n  labels:\n    app: web\nspec:\n  containers:\n    - name: web\n      image: nginx:1.25\n      ports:\n        - containerPort: 80\n";
    let result = fix(text);
    assert!(result.is_valid);
    assert!(result.changes.is_empty(), "changes: {:#?}", result.changes);
    assert_eq!(result.content, text);
    assert_eq!(result.confidence, 1.0);
}

#[test]
fn unrepairable_lines_are_kept_not_dropped() {
    let text = "apiVersion: v1\nkind: Pod\nbad: \u{0007}noise\nmetadata:\n  name: a\n";
    let result = fix(text);
    assert!(!result.is_valid);
    assert!(result
        .errors
        .iter()
        .any(|e| e.contains("could not be repaired")));
    // the offending payload is still in the output verbatim
    assert!(result.content.contains("noise"));

    // and tree serialization marks it instead of dropping it
    let root = parser::build(&result.content);
    let rendered = ast::serialize(&root, 2);
    assert!(rendered.contains("# BROKEN:"), "rendered: {rendered}");
}

#[test]
fn coercion_confidence_orders_quoted_above_word() {
    let quoted = types::coerce_value("replicas", "\"5\"");
    let word = types::coerce_value("replicas", "five");
    assert_eq!(quoted.value, Value::Int(5));
    assert_eq!(word.value, Value::Int(5));
    assert!(quoted.confidence >= word.confidence);
}

#[test]
fn threshold_gates_low_confidence_coercions() {
    let text = "apiVersion: v1\nkind: Pod\nmetadata:\n  name: a\nspec:\n  containers:\n    - name: a\n  replicas: three\n";
    let cautious = Fixer::new(FixOptions {
        confidence_threshold: 0.9,
        ..FixOptions::default()
    })
    .fix(text);
    assert!(
        cautious.content.contains("replicas: three"),
        "0.85 word-number stays below a 0.9 threshold"
    );

    let aggressive = Fixer::new(FixOptions {
        confidence_threshold: 0.9,
        aggressive: true,
        ..FixOptions::default()
    })
    .fix(text);
    assert!(aggressive.content.contains("replicas: 3"));
}

#[test]
fn multi_document_inputs_keep_every_document() {
    let text = "---\nkind: Pod\napiVersion: v1\nmetadata:\n  name: a\nspec:\n  containers:\n    - name: a\n---\nkind: Service\napiVersion: v1\nmetadata:\n  name: b\nspec:\n  selector:\n    app: a\n";
    let result = fix(text);
    let root = parser::build(&result.content);
    assert_eq!(root.documents.len(), 2, "content: {}", result.content);
    assert!(result.content.contains("kind: Pod"));
    assert!(result.content.contains("kind: Service"));
}
