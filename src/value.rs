use serde_json::{Number, Value};
use std::cmp::Ordering;

pub(crate) static NULL: Value = Value::Null;

/// Structural equality over JSON trees.
///
/// Arrays are order-sensitive; objects compare by key count and per-key value
/// regardless of key order. Numbers compare by numeric value across the
/// integer and float representations (`1 == 1.0`). There is no cross-type
/// coercion: `"1"` never equals `1`, and an array never equals an object.
#[must_use]
pub fn deep_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(u, v)| deep_eq(u, v))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len() && x.iter().all(|(k, v)| y.get(k).is_some_and(|w| deep_eq(v, w)))
        }
        (Value::Number(x), Value::Number(y)) => num_eq(x, y),
        _ => a == b,
    }
}

#[allow(clippy::float_cmp)]
fn num_eq(a: &Number, b: &Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// Ordering used by the comparison operators and `$sort`. Only number/number,
/// string/string, and bool/bool pairs are ordered; every other pairing is
/// `None` and the comparison does not match.
#[must_use]
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Dynamic kind tag tested by `$type`.
#[must_use]
pub const fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Truthiness applied to non-boolean results of `$expr`, `$cond` conditions,
/// `$switch` cases, and the logical operators: `null`, `false`, `0`, and the
/// empty string are falsy; everything else is truthy.
#[must_use]
pub fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[must_use]
pub(crate) fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Materialize an arithmetic result, preferring the integer representation
/// when the value is whole and in i64 range. Non-finite values are not
/// representable in JSON and collapse to `Null`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn number(f: f64) -> Value {
    if !f.is_finite() {
        return Value::Null;
    }
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Value::Number(Number::from(f as i64))
    } else {
        Number::from_f64(f).map_or(Value::Null, Value::Number)
    }
}

/// String rendering used by `$concat`: strings pass through, scalars render
/// the way they would print in JSON.
#[must_use]
pub(crate) fn render(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn arrays_are_order_sensitive() {
        assert!(deep_eq(&json!([1, 2]), &json!([1, 2])));
        assert!(!deep_eq(&json!([1, 2]), &json!([2, 1])));
        assert!(!deep_eq(&json!([1, 2]), &json!([1, 2, 3])));
    }

    #[test]
    fn objects_ignore_key_order() {
        assert!(deep_eq(&json!({"a": 1, "b": 2}), &json!({"b": 2, "a": 1})));
        assert!(!deep_eq(&json!({"a": 1}), &json!({"a": 1, "b": 2})));
    }

    #[test]
    fn numbers_compare_across_representations() {
        assert!(deep_eq(&json!(1), &json!(1.0)));
        assert!(!deep_eq(&json!("1"), &json!(1)));
    }

    #[test]
    fn arithmetic_results_prefer_integers() {
        assert_eq!(number(4.0), json!(4));
        assert_eq!(number(4.5), json!(4.5));
        assert_eq!(number(f64::INFINITY), Value::Null);
    }
}
