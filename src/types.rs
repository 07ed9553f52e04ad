//! Field type registry and confidence-scored coercion.
//!
//! The registry is advisory, not a whitelist: unknown fields pass through
//! untouched at full confidence. Known fields get their loosely-typed scalar
//! values converted to the declared type, each conversion carrying a
//! confidence in [0, 1] that reflects how ambiguous the source form was.
//!
//! Tables are embedded domain knowledge about Kubernetes field names, not
//! runtime configuration; they are reachable only through lookup functions.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

use crate::value::Value;

// ——————————————————————————— Confidence policy ——————————————————————————— //

const CONF_UNCHANGED: f64 = 1.0;
const CONF_QUOTED_INT: f64 = 0.95; // "3" -> 3
const CONF_BARE_INT: f64 = 0.95;
const CONF_FLOAT_TO_INT: f64 = 0.90;
const CONF_WORD_NUMBER: f64 = 0.85; // "three" -> 3
const CONF_BOOL_TO_INT: f64 = 0.70;
const CONF_BOOL_WORD: f64 = 0.90; // yes/on/enabled and friends
const CONF_NUMBER_TO_BOOL: f64 = 0.75;
const CONF_NULL_TO_STRING: f64 = 0.80;
const CONF_SCALAR_TO_STRING: f64 = 0.95;

/// Coercions below this are not trusted by `validate_field_value`.
pub const MIN_TRUSTED_CONFIDENCE: f64 = 0.7;

// ————————————————————————————————— Model ————————————————————————————————— //

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpectedType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
    Any,
}

/// Immutable per-field definition, loaded once at process start.
#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    pub ty: ExpectedType,
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub pattern: Option<&'static str>,
    pub min_len: Option<usize>,
    pub max_len: Option<usize>,
    pub allowed: &'static [&'static str],
    pub default: Option<&'static str>,
    pub required: bool,
}

const fn base(ty: ExpectedType) -> FieldDef {
    FieldDef {
        ty,
        min: None,
        max: None,
        pattern: None,
        min_len: None,
        max_len: None,
        allowed: &[],
        default: None,
        required: false,
    }
}

const fn int_in(min: i64, max: i64) -> FieldDef {
    let mut d = base(ExpectedType::Integer);
    d.min = Some(min);
    d.max = Some(max);
    d
}

const fn int_min(min: i64) -> FieldDef {
    let mut d = base(ExpectedType::Integer);
    d.min = Some(min);
    d
}

const fn enum_of(allowed: &'static [&'static str]) -> FieldDef {
    let mut d = base(ExpectedType::String);
    d.allowed = allowed;
    d
}

const fn dns_name(max_len: usize) -> FieldDef {
    let mut d = base(ExpectedType::String);
    d.pattern = Some(r"^[a-z0-9]([-a-z0-9.]*[a-z0-9])?$");
    d.min_len = Some(1);
    d.max_len = Some(max_len);
    d
}

const BOOL: FieldDef = base(ExpectedType::Boolean);
const STRING: FieldDef = base(ExpectedType::String);
const OBJECT: FieldDef = base(ExpectedType::Object);
const ARRAY: FieldDef = base(ExpectedType::Array);

#[rustfmt::skip]
static DEFS: &[(&str, FieldDef)] = &[
    // integers
    ("replicas", int_in(0, 5000)),
    ("minReplicas", int_min(1)),
    ("maxReplicas", int_min(1)),
    ("port", int_in(1, 65535)),
    ("containerPort", int_in(1, 65535)),
    ("nodePort", int_in(30000, 32767)),
    ("backoffLimit", int_min(0)),
    ("completions", int_min(0)),
    ("parallelism", int_min(0)),
    ("activeDeadlineSeconds", int_min(1)),
    ("terminationGracePeriodSeconds", int_min(0)),
    ("revisionHistoryLimit", int_min(0)),
    ("minReadySeconds", int_min(0)),
    ("progressDeadlineSeconds", int_min(1)),
    ("successfulJobsHistoryLimit", int_min(0)),
    ("failedJobsHistoryLimit", int_min(0)),
    ("startingDeadlineSeconds", int_min(1)),
    ("runAsUser", int_min(0)),
    ("runAsGroup", int_min(0)),
    ("fsGroup", int_min(0)),
    ("weight", int_in(1, 100)),
    ("priority", base(ExpectedType::Integer)),
    // booleans
    ("hostNetwork", BOOL),
    ("hostPID", BOOL),
    ("hostIPC", BOOL),
    ("privileged", BOOL),
    ("readOnlyRootFilesystem", BOOL),
    ("allowPrivilegeEscalation", BOOL),
    ("runAsNonRoot", BOOL),
    ("automountServiceAccountToken", BOOL),
    ("suspend", BOOL),
    ("immutable", BOOL),
    ("readOnly", BOOL),
    ("stdin", BOOL),
    ("tty", BOOL),
    ("enableServiceLinks", BOOL),
    // strings
    ("name", dns_name(253)),
    ("namespace", dns_name(63)),
    ("image", STRING),
    ("apiVersion", STRING),
    ("kind", STRING),
    ("schedule", STRING),
    ("serviceAccountName", dns_name(253)),
    ("storageClassName", STRING),
    ("serviceName", STRING),
    ("clusterIP", STRING),
    ("externalName", STRING),
    ("ingressClassName", STRING),
    ("provisioner", STRING),
    ("type", STRING),
    ("host", STRING),
    ("path", STRING),
    ("mountPath", STRING),
    ("imagePullPolicy", enum_of(&["Always", "IfNotPresent", "Never"])),
    ("restartPolicy", enum_of(&["Always", "OnFailure", "Never"])),
    ("dnsPolicy", enum_of(&["ClusterFirst", "ClusterFirstWithHostNet", "Default", "None"])),
    ("protocol", enum_of(&["TCP", "UDP", "SCTP"])),
    ("concurrencyPolicy", enum_of(&["Allow", "Forbid", "Replace"])),
    ("sessionAffinity", enum_of(&["ClientIP", "None"])),
    ("persistentVolumeReclaimPolicy", enum_of(&["Retain", "Recycle", "Delete"])),
    ("reclaimPolicy", enum_of(&["Retain", "Delete"])),
    ("volumeBindingMode", enum_of(&["Immediate", "WaitForFirstConsumer"])),
    // objects
    ("metadata", OBJECT),
    ("spec", OBJECT),
    ("selector", OBJECT),
    ("labels", OBJECT),
    ("annotations", OBJECT),
    ("resources", OBJECT),
    ("limits", OBJECT),
    ("requests", OBJECT),
    ("affinity", OBJECT),
    ("nodeSelector", OBJECT),
    ("securityContext", OBJECT),
    ("roleRef", OBJECT),
    ("scaleTargetRef", OBJECT),
    ("podSelector", OBJECT),
    ("template", OBJECT),
    ("jobTemplate", OBJECT),
    ("strategy", OBJECT),
    ("matchLabels", OBJECT),
    ("capacity", OBJECT),
    ("hard", OBJECT),
    ("parameters", OBJECT),
    // arrays
    ("containers", ARRAY),
    ("initContainers", ARRAY),
    ("volumes", ARRAY),
    ("ports", ARRAY),
    ("env", ARRAY),
    ("envFrom", ARRAY),
    ("args", ARRAY),
    ("command", ARRAY),
    ("tolerations", ARRAY),
    ("imagePullSecrets", ARRAY),
    ("volumeMounts", ARRAY),
    ("accessModes", ARRAY),
    ("rules", ARRAY),
    ("subjects", ARRAY),
    ("ingress", ARRAY),
    ("egress", ARRAY),
    ("policyTypes", ARRAY),
    ("subsets", ARRAY),
    ("metrics", ARRAY),
    ("scopes", ARRAY),
    ("secrets", ARRAY),
    ("finalizers", ARRAY),
    ("tls", ARRAY),
];

/// Keys that carry no type definition but are still recognizably Kubernetes
/// field names for missing-colon recovery.
static SUPPLEMENT_FIELDS: &[&str] = &[
    "status", "data", "stringData", "value", "valueFrom", "key", "matchExpressions",
    "defaultBackend", "targetPort", "maxSurge", "maxUnavailable",
];

static BY_NAME: Lazy<HashMap<&'static str, &'static FieldDef>> =
    Lazy::new(|| DEFS.iter().map(|(k, d)| (*k, d)).collect());

static KNOWN_FIELDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    DEFS.iter()
        .map(|(k, _)| *k)
        .chain(SUPPLEMENT_FIELDS.iter().copied())
        .collect()
});

pub fn field_def(name: &str) -> Option<&'static FieldDef> {
    BY_NAME.get(name).copied()
}

/// Single known-field dictionary shared by the AST builder's missing-colon
/// recovery and the syntax pass.
pub fn is_known_field(name: &str) -> bool {
    KNOWN_FIELDS.contains(name)
}

pub fn is_numeric_field(name: &str) -> bool {
    matches!(
        field_def(name).map(|d| d.ty),
        Some(ExpectedType::Integer | ExpectedType::Number)
    )
}

pub fn is_boolean_field(name: &str) -> bool {
    matches!(field_def(name).map(|d| d.ty), Some(ExpectedType::Boolean))
}

pub fn is_container_field(name: &str) -> bool {
    matches!(
        field_def(name).map(|d| d.ty),
        Some(ExpectedType::Object | ExpectedType::Array)
    )
}

// ——————————————————————————————— Coercion ———————————————————————————————— //

#[derive(Debug, Clone, PartialEq)]
pub struct Coercion {
    pub success: bool,
    pub value: Value,
    pub confidence: f64,
    pub reason: Option<String>,
}

impl Coercion {
    fn unchanged(value: Value) -> Self {
        Self {
            success: true,
            value,
            confidence: CONF_UNCHANGED,
            reason: None,
        }
    }

    fn coerced(value: Value, confidence: f64, reason: impl Into<String>) -> Self {
        Self {
            success: true,
            value,
            confidence,
            reason: Some(reason.into()),
        }
    }

    fn rejected(value: Value, reason: impl Into<String>) -> Self {
        Self {
            success: false,
            value,
            confidence: 0.0,
            reason: Some(reason.into()),
        }
    }
}

/// A raw scalar token as it appears on the line, quotes intact.
#[derive(Debug, Clone, PartialEq)]
enum RawToken {
    Quoted(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
    Word(String),
}

static BARE_INT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?[0-9]+$").expect("int regex"));
static BARE_FLOAT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?[0-9]*\.[0-9]+$").expect("float regex"));

fn tokenize(raw: &str) -> RawToken {
    let t = raw.trim();
    if (t.starts_with('"') && t.ends_with('"') && t.len() >= 2)
        || (t.starts_with('\'') && t.ends_with('\'') && t.len() >= 2)
    {
        return RawToken::Quoted(t[1..t.len() - 1].to_string());
    }
    match t {
        "" | "~" | "null" | "Null" | "NULL" => return RawToken::Null,
        "true" | "True" | "TRUE" => return RawToken::Bool(true),
        "false" | "False" | "FALSE" => return RawToken::Bool(false),
        _ => {}
    }
    if BARE_INT_RE.is_match(t) {
        if let Ok(i) = t.parse::<i64>() {
            return RawToken::Int(i);
        }
    }
    if BARE_FLOAT_RE.is_match(t) {
        if let Ok(f) = t.parse::<f64>() {
            return RawToken::Float(f);
        }
    }
    RawToken::Word(t.to_string())
}

/// Fixed word -> value table, up to "thousand".
#[rustfmt::skip]
static WORD_NUMBERS: &[(&str, i64)] = &[
    ("zero", 0), ("one", 1), ("two", 2), ("three", 3), ("four", 4),
    ("five", 5), ("six", 6), ("seven", 7), ("eight", 8), ("nine", 9),
    ("ten", 10), ("eleven", 11), ("twelve", 12), ("thirteen", 13),
    ("fourteen", 14), ("fifteen", 15), ("sixteen", 16), ("seventeen", 17),
    ("eighteen", 18), ("nineteen", 19), ("twenty", 20), ("thirty", 30),
    ("forty", 40), ("fifty", 50), ("sixty", 60), ("seventy", 70),
    ("eighty", 80), ("ninety", 90), ("hundred", 100), ("thousand", 1000),
];

fn word_number(word: &str) -> Option<i64> {
    let lower = word.to_ascii_lowercase();
    WORD_NUMBERS
        .iter()
        .find(|(w, _)| *w == lower)
        .map(|(_, v)| *v)
}

static TRUTHY: &[&str] = &["true", "yes", "on", "1", "enabled", "enable", "active"];
static FALSY: &[&str] = &["false", "no", "off", "0", "disabled", "disable", "inactive"];

fn bool_word(word: &str) -> Option<bool> {
    let lower = word.to_ascii_lowercase();
    if TRUTHY.contains(&lower.as_str()) {
        Some(true)
    } else if FALSY.contains(&lower.as_str()) {
        Some(false)
    } else {
        None
    }
}

fn token_to_value(token: &RawToken) -> Value {
    match token {
        RawToken::Quoted(s) => Value::Str(s.clone()),
        RawToken::Int(i) => Value::Int(*i),
        RawToken::Float(f) => Value::Float(*f),
        RawToken::Bool(b) => Value::Bool(*b),
        RawToken::Null => Value::Null,
        RawToken::Word(w) => Value::Str(w.clone()),
    }
}

/// Coerces one raw scalar toward the field's declared type.
///
/// Open-world: unknown fields and already-correct values pass through at
/// confidence 1.0. A returned `success == false` means the value could not be
/// converted (or violated declared bounds) and should be left alone.
pub fn coerce_value(field: &str, raw: &str) -> Coercion {
    let token = tokenize(raw);
    let Some(def) = field_def(field) else {
        return Coercion::unchanged(token_to_value(&token));
    };

    match def.ty {
        ExpectedType::Integer | ExpectedType::Number => coerce_integer(field, def, &token),
        ExpectedType::Boolean => coerce_boolean(field, &token),
        ExpectedType::String => coerce_string(&token),
        ExpectedType::Object | ExpectedType::Array => Coercion::rejected(
            token_to_value(&token),
            format!("'{field}' expects nested content, not an inline scalar"),
        ),
        ExpectedType::Any => Coercion::unchanged(token_to_value(&token)),
    }
}

fn coerce_integer(field: &str, def: &FieldDef, token: &RawToken) -> Coercion {
    let (value, confidence, how) = match token {
        RawToken::Int(i) => return bounded(field, def, *i, CONF_UNCHANGED, None),
        RawToken::Quoted(inner) => {
            let inner_token = tokenize(inner);
            match inner_token {
                RawToken::Int(i) => (i, CONF_QUOTED_INT, "unquoted numeric string"),
                RawToken::Float(f) => (f as i64, CONF_FLOAT_TO_INT, "unquoted numeric string"),
                RawToken::Word(w) => match word_number(&w) {
                    Some(i) => (i, CONF_WORD_NUMBER, "spelled-out number"),
                    None => {
                        return Coercion::rejected(
                            Value::Str(inner.clone()),
                            format!("'{inner}' is not numeric"),
                        )
                    }
                },
                _ => {
                    return Coercion::rejected(
                        Value::Str(inner.clone()),
                        format!("'{inner}' is not numeric"),
                    )
                }
            }
        }
        RawToken::Float(f) => (*f as i64, CONF_FLOAT_TO_INT, "truncated float"),
        RawToken::Word(w) => match word_number(w) {
            Some(i) => (i, CONF_WORD_NUMBER, "spelled-out number"),
            None if BARE_INT_RE.is_match(w) => match w.parse::<i64>() {
                Ok(i) => (i, CONF_BARE_INT, "numeric text"),
                Err(_) => {
                    return Coercion::rejected(
                        Value::Str(w.clone()),
                        format!("'{w}' overflows an integer"),
                    )
                }
            },
            None => {
                return Coercion::rejected(Value::Str(w.clone()), format!("'{w}' is not numeric"))
            }
        },
        RawToken::Bool(b) => (i64::from(*b), CONF_BOOL_TO_INT, "boolean as 0/1"),
        RawToken::Null => {
            return Coercion::rejected(Value::Null, format!("'{field}' has no value"))
        }
    };
    bounded(field, def, value, confidence, Some(how))
}

fn bounded(
    field: &str,
    def: &FieldDef,
    value: i64,
    confidence: f64,
    how: Option<&str>,
) -> Coercion {
    if let Some(min) = def.min {
        if value < min {
            return Coercion::rejected(
                Value::Int(value),
                format!("{field} must be >= {min}, got {value}"),
            );
        }
    }
    if let Some(max) = def.max {
        if value > max {
            return Coercion::rejected(
                Value::Int(value),
                format!("{field} must be <= {max}, got {value}"),
            );
        }
    }
    match how {
        Some(how) => Coercion::coerced(Value::Int(value), confidence, how),
        None => Coercion::unchanged(Value::Int(value)),
    }
}

fn coerce_boolean(field: &str, token: &RawToken) -> Coercion {
    match token {
        RawToken::Bool(b) => Coercion::unchanged(Value::Bool(*b)),
        RawToken::Quoted(inner) | RawToken::Word(inner) => match bool_word(inner) {
            Some(b) => Coercion::coerced(Value::Bool(b), CONF_BOOL_WORD, "boolean synonym"),
            None => Coercion::rejected(
                Value::Str(inner.clone()),
                format!("'{inner}' is not a recognized boolean for {field}"),
            ),
        },
        RawToken::Int(i) => Coercion::coerced(
            Value::Bool(*i != 0),
            CONF_NUMBER_TO_BOOL,
            "nonzero number as true",
        ),
        RawToken::Float(f) => Coercion::coerced(
            Value::Bool(*f != 0.0),
            CONF_NUMBER_TO_BOOL,
            "nonzero number as true",
        ),
        RawToken::Null => Coercion::rejected(Value::Null, format!("'{field}' has no value")),
    }
}

fn coerce_string(token: &RawToken) -> Coercion {
    match token {
        RawToken::Quoted(s) => Coercion::unchanged(Value::Str(s.clone())),
        RawToken::Word(w) => Coercion::unchanged(Value::Str(w.clone())),
        RawToken::Null => {
            Coercion::coerced(Value::Str(String::new()), CONF_NULL_TO_STRING, "null as empty")
        }
        RawToken::Int(i) => Coercion::coerced(
            Value::Str(i.to_string()),
            CONF_SCALAR_TO_STRING,
            "number as text",
        ),
        RawToken::Float(f) => Coercion::coerced(
            Value::Str(f.to_string()),
            CONF_SCALAR_TO_STRING,
            "number as text",
        ),
        RawToken::Bool(b) => Coercion::coerced(
            Value::Str(b.to_string()),
            CONF_SCALAR_TO_STRING,
            "boolean as text",
        ),
    }
}

// ——————————————————————————————— Validation —————————————————————————————— //

/// Full per-field check: coerces when the coercion is trusted (confidence >=
/// [`MIN_TRUSTED_CONFIDENCE`]), then applies pattern/length/enum and numeric
/// bound constraints. Returns the final value or human-readable errors.
pub fn validate_field_value(field: &str, raw: &str) -> Result<Value, Vec<String>> {
    let Some(def) = field_def(field) else {
        return Ok(token_to_value(&tokenize(raw)));
    };

    let coercion = coerce_value(field, raw);
    if !coercion.success || coercion.confidence < MIN_TRUSTED_CONFIDENCE {
        let reason = coercion
            .reason
            .unwrap_or_else(|| format!("cannot interpret '{raw}' for {field}"));
        return Err(vec![reason]);
    }

    let mut errors = Vec::new();
    if let Value::Str(s) = &coercion.value {
        if let Some(min_len) = def.min_len {
            if s.len() < min_len {
                errors.push(format!("{field} must be at least {min_len} characters"));
            }
        }
        if let Some(max_len) = def.max_len {
            if s.len() > max_len {
                errors.push(format!("{field} must be at most {max_len} characters"));
            }
        }
        if let Some(pattern) = def.pattern {
            match Regex::new(pattern) {
                Ok(re) if !re.is_match(s) => {
                    errors.push(format!("{field} value '{s}' does not match {pattern}"));
                }
                _ => {}
            }
        }
        if !def.allowed.is_empty() && !def.allowed.contains(&s.as_str()) {
            errors.push(format!(
                "{field} must be one of [{}], got '{s}'",
                def.allowed.join(", ")
            ));
        }
    }

    if errors.is_empty() {
        Ok(coercion.value)
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_fields_pass_through_untouched() {
        let c = coerce_value("somethingCustom", "whatever");
        assert!(c.success);
        assert_eq!(c.confidence, 1.0);
        assert_eq!(c.value, Value::Str("whatever".into()));
    }

    #[test]
    fn quoted_integer_unquotes_at_high_confidence() {
        let c = coerce_value("replicas", "\"3\"");
        assert!(c.success);
        assert_eq!(c.value, Value::Int(3));
        assert!(c.confidence >= 0.9);
    }

    #[test]
    fn word_number_scores_below_quoted_number() {
        let quoted = coerce_value("replicas", "\"3\"");
        let word = coerce_value("replicas", "three");
        assert_eq!(word.value, Value::Int(3));
        assert!(
            quoted.confidence >= word.confidence,
            "quoted {} must be >= word {}",
            quoted.confidence,
            word.confidence
        );
    }

    #[test]
    fn bounds_reject_out_of_range_coercions() {
        let c = coerce_value("nodePort", "\"80\"");
        assert!(!c.success, "80 is below the NodePort range");
        assert!(c.reason.unwrap().contains(">= 30000"));
    }

    #[test]
    fn boolean_synonyms_cover_the_word_sets() {
        for word in ["yes", "on", "Enabled", "1", "active"] {
            let c = coerce_value("hostNetwork", word);
            assert_eq!(c.value, Value::Bool(true), "{word}");
        }
        for word in ["no", "off", "Disabled", "0", "inactive"] {
            let c = coerce_value("hostNetwork", word);
            assert_eq!(c.value, Value::Bool(false), "{word}");
        }
    }

    #[test]
    fn nonzero_number_is_true_at_lower_confidence() {
        let word = coerce_value("hostNetwork", "yes");
        let num = coerce_value("hostNetwork", "2");
        assert_eq!(num.value, Value::Bool(true));
        assert!(num.confidence < word.confidence);
    }

    #[test]
    fn string_fields_absorb_scalars() {
        assert_eq!(
            coerce_value("image", "null").value,
            Value::Str(String::new())
        );
        assert_eq!(coerce_value("kind", "42").value, Value::Str("42".into()));
    }

    #[test]
    fn container_fields_reject_inline_scalars() {
        let c = coerce_value("containers", "nginx");
        assert!(!c.success);
        assert!(c.reason.unwrap().contains("nested content"));
    }

    #[test]
    fn validate_enforces_enums_and_patterns() {
        assert!(validate_field_value("imagePullPolicy", "Always").is_ok());
        let err = validate_field_value("imagePullPolicy", "Sometimes").unwrap_err();
        assert!(err[0].contains("must be one of"));

        assert!(validate_field_value("name", "my-app").is_ok());
        let err = validate_field_value("name", "My_App").unwrap_err();
        assert!(err[0].contains("does not match"));
    }

    #[test]
    fn validate_accepts_trusted_coercions() {
        assert_eq!(validate_field_value("replicas", "\"3\""), Ok(Value::Int(3)));
    }

    #[test]
    fn known_field_dictionary_covers_registry_and_supplement() {
        assert!(is_known_field("replicas"));
        assert!(is_known_field("status"));
        assert!(!is_known_field("definitelyNotAField"));
    }
}
