//! Small `serde_json::Value` helpers shared by the evaluator. Carried over
//! near-verbatim from an upstream `value_utils.rs` — the numeric
//! coercion and truthiness rules are generic to any JSON-valued expression
//! language, not specific to a template engine.

use serde_json::{Number, Value};

/// Get the type name of a value for error messages.
#[must_use]
pub fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Extract an `i64` from a `Number`, falling back to a truncated `f64`.
#[must_use]
pub fn number_as_i64(num: &Number) -> Option<i64> {
    num.as_i64().or_else(|| num.as_f64().map(|f| f as i64))
}

/// Extract an `f64` from a `Number`, falling back from `i64`.
#[must_use]
pub fn number_as_f64(num: &Number) -> Option<f64> {
    num.as_f64().or_else(|| num.as_i64().map(|i| i as f64))
}

/// Whether both numbers can be combined as integers without losing precision.
#[must_use]
pub fn can_add_as_int(l: &Number, r: &Number) -> bool {
    l.is_i64() && r.is_i64()
}

/// JSON truthiness: `null`, `false`, `0`, and empty strings/arrays/objects
/// are false; everything else is true.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_none_or(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(arr) => !arr.is_empty(),
        Value::Object(obj) => !obj.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names_match_json_shape() {
        assert_eq!(value_type_name(&Value::Null), "null");
        assert_eq!(value_type_name(&Value::Bool(true)), "boolean");
        assert_eq!(value_type_name(&serde_json::json!(1)), "number");
        assert_eq!(value_type_name(&serde_json::json!("s")), "string");
        assert_eq!(value_type_name(&serde_json::json!([])), "array");
        assert_eq!(value_type_name(&serde_json::json!({})), "object");
    }

    #[test]
    fn truthiness_follows_json_falsy_rules() {
        assert!(!is_truthy(&Value::Null));
        assert!(!is_truthy(&serde_json::json!(false)));
        assert!(!is_truthy(&serde_json::json!(0)));
        assert!(!is_truthy(&serde_json::json!("")));
        assert!(!is_truthy(&serde_json::json!([])));
        assert!(!is_truthy(&serde_json::json!({})));
        assert!(is_truthy(&serde_json::json!("x")));
        assert!(is_truthy(&serde_json::json!(1)));
        assert!(is_truthy(&serde_json::json!([1])));
    }

    #[test]
    fn number_coercion_prefers_native_representation() {
        assert_eq!(number_as_i64(&Number::from(5)), Some(5));
        assert_eq!(number_as_f64(&Number::from_f64(2.5).unwrap()), Some(2.5));
        assert!(can_add_as_int(&Number::from(1), &Number::from(2)));
        assert!(!can_add_as_int(&Number::from_f64(1.5).unwrap(), &Number::from(2)));
    }
}
