//! Declarative request validation.
//!
//! [`validate`] applies a [`RuleSet`] to the raw request input and either
//! returns the validated, defaulted [`Params`] or a [`ValidationFailure`]
//! carrying a failed envelope with one warning message per unmet rule.
//!
//! Failures are collected across all fields (never fail-fast), in field
//! declaration order and then rule order, so the same input always yields the
//! same message list.

pub mod rules;

pub use rules::{Rule, RuleError, RuleSet};

use common::{Envelope, MessageKind};
use serde::Serialize;
use serde_json::{Map, Number, Value};

use rules::{FieldRules, BOOLEAN_LIKE_TOKENS, TRUTHY_TOKENS};

/// Validated request parameters, in field declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Params(Map<String, Value>);

impl Params {
    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String value, `None` when absent or null.
    pub fn str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn string(&self, key: &str) -> Option<String> {
        self.str(key).map(str::to_owned)
    }

    /// Boolean value; absent and non-boolean values read as `false`.
    pub fn flag(&self, key: &str) -> bool {
        self.0.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn i64(&self, key: &str) -> Option<i64> {
        self.0.get(key).and_then(Value::as_i64)
    }

    pub fn f64(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(Value::as_f64)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// A failed validation: `success = false`, HTTP 400 and all messages.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationFailure {
    envelope: Envelope,
}

impl ValidationFailure {
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    #[cfg(test)]
    pub fn messages(&self) -> Vec<String> {
        self.envelope
            .messages()
            .iter()
            .map(|m| m.message.clone())
            .collect()
    }
}

/// Validate `input` against `rules`, then fill `defaults`.
///
/// Defaults fill fields that are absent or null after validation. Fields that
/// declare `boolean_like` are normalised to JSON booleans afterwards.
///
/// # Errors
///
/// Returns a [`ValidationFailure`] when any field fails any rule; no partial
/// parameters are returned in that case.
pub fn validate(
    rules: &RuleSet,
    input: &Map<String, Value>,
    defaults: &[(&str, Value)],
) -> Result<Params, ValidationFailure> {
    let mut failures = Vec::new();
    let mut validated = Map::new();

    for field in rules.fields() {
        let value = input.get(field.name());

        if is_empty(value) {
            if field.is_required() {
                failures.push(format!("The {} field is required.", attribute(field)));
            } else if field.is_nullable() && value.is_some() {
                validated.insert(field.name().to_owned(), Value::Null);
            }
            continue;
        }

        // `is_empty` returned false, so the value is present.
        let Some(value) = value else { continue };
        let before = failures.len();
        for rule in field.rules() {
            if let Some(msg) = check(field, rule, value) {
                failures.push(msg);
            }
        }
        if failures.len() == before {
            validated.insert(field.name().to_owned(), coerce(field, value));
        }
    }

    if !failures.is_empty() {
        let mut envelope = Envelope::new();
        for msg in failures {
            envelope.add_message(msg, MessageKind::Warning);
        }
        envelope.mark_failure();
        return Err(ValidationFailure { envelope });
    }

    for (key, value) in defaults {
        let missing = validated.get(*key).map_or(true, Value::is_null);
        if missing {
            validated.insert((*key).to_owned(), value.clone());
        }
    }

    for field in rules.fields().iter().filter(|f| f.is_boolean_like()) {
        if let Some(v) = validated.get_mut(field.name()) {
            if !v.is_null() {
                *v = Value::Bool(normalize_boolean_like(v));
            }
        }
    }

    Ok(Params(validated))
}

/// Map an accepted boolean-like value to a boolean.
///
/// Only [`TRUTHY_TOKENS`] (and JSON `true` / `1`) read as `true`.
pub fn normalize_boolean_like(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => TRUTHY_TOKENS.contains(&s.trim().to_ascii_lowercase().as_str()),
        Value::Number(n) => n.as_f64() == Some(1.0),
        _ => false,
    }
}

fn is_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(a)) => a.is_empty(),
        Some(_) => false,
    }
}

fn attribute(field: &FieldRules) -> String {
    field.name().replace('_', " ")
}

fn check(field: &FieldRules, rule: &Rule, value: &Value) -> Option<String> {
    let attr = attribute(field);
    match rule {
        Rule::Required | Rule::Nullable => None,
        Rule::String => (!value.is_string()).then(|| format!("The {attr} field must be a string.")),
        Rule::Integer => {
            as_integer(value)
                .is_none()
                .then(|| format!("The {attr} field must be an integer."))
        }
        Rule::Numeric => {
            as_number(value)
                .is_none()
                .then(|| format!("The {attr} field must be a number."))
        }
        Rule::Email(re) => {
            let ok = value.as_str().is_some_and(|s| re.is_match(s));
            (!ok).then(|| format!("The {attr} field must be a valid email address."))
        }
        Rule::BooleanLike => {
            let ok = match value {
                Value::Bool(_) => true,
                Value::Number(n) => matches!(n.as_f64(), Some(x) if x == 0.0 || x == 1.0),
                Value::String(s) => {
                    BOOLEAN_LIKE_TOKENS.contains(&s.trim().to_ascii_lowercase().as_str())
                }
                _ => false,
            };
            (!ok).then(|| format!("The selected {attr} is invalid."))
        }
        Rule::In(allowed) => {
            let ok = scalar_text(value).is_some_and(|s| allowed.iter().any(|a| *a == s));
            (!ok).then(|| format!("The selected {attr} is invalid."))
        }
        Rule::Regex(re) => {
            let ok = scalar_text(value).is_some_and(|s| re.is_match(&s));
            (!ok).then(|| format!("The {attr} field format is invalid."))
        }
        Rule::Min(bound) => {
            let (size, numeric) = size_of(field, value);
            (size < *bound).then(|| {
                if numeric {
                    format!("The {attr} field must be at least {}.", fmt_bound(*bound))
                } else {
                    format!(
                        "The {attr} field must be at least {} {}.",
                        fmt_bound(*bound),
                        unit(value)
                    )
                }
            })
        }
        Rule::Max(bound) => {
            let (size, numeric) = size_of(field, value);
            (size > *bound).then(|| {
                if numeric {
                    format!("The {attr} field must not be greater than {}.", fmt_bound(*bound))
                } else {
                    format!(
                        "The {attr} field must not be greater than {} {}.",
                        fmt_bound(*bound),
                        unit(value)
                    )
                }
            })
        }
    }
}

/// Size used by `min`/`max` and whether it is a numeric value.
fn size_of(field: &FieldRules, value: &Value) -> (f64, bool) {
    if field.is_numeric() {
        if let Some(n) = as_number(value) {
            return (n, true);
        }
    }
    let len = match value {
        Value::Array(a) => a.len(),
        Value::String(s) => s.chars().count(),
        other => other.to_string().chars().count(),
    };
    (len as f64, false)
}

fn unit(value: &Value) -> &'static str {
    if value.is_array() {
        "items"
    } else {
        "characters"
    }
}

fn fmt_bound(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

/// Integer and numeric fields are stored as JSON numbers.
fn coerce(field: &FieldRules, value: &Value) -> Value {
    if value.is_number() {
        return value.clone();
    }
    if field.is_integer() {
        if let Some(n) = as_integer(value) {
            return Value::from(n);
        }
    }
    if field.is_numeric() {
        if let Some(n) = as_integer(value) {
            return Value::from(n);
        }
        if let Some(n) = as_number(value).and_then(Number::from_f64) {
            return Value::Number(n);
        }
    }
    value.clone()
}
