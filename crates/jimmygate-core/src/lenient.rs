//! Forgiving field deserializers for inbound OpenAI request bodies.
//!
//! Clients send loosely-typed JSON. Rather than rejecting a whole request
//! because `model` is a number or `chatOptions` is a string, each helper
//! keeps the value only when it has the expected shape and otherwise
//! behaves as if the field were absent.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// Keep the field only if it is a JSON string.
pub fn string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

/// Keep the field only if it is a JSON object.
pub fn object<'de, D>(deserializer: D) -> Result<Option<Map<String, Value>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(map) => Some(map),
        _ => None,
    })
}

/// Keep the field only if it is a JSON array.
pub fn array<'de, D>(deserializer: D) -> Result<Option<Vec<Value>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => Some(items),
        _ => None,
    })
}

/// `true` only for a literal JSON `true`.
pub fn literal_true<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(matches!(Value::deserialize(deserializer)?, Value::Bool(true)))
}

/// JavaScript-style truthiness of a JSON value.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Parse a positive integer the way a lenient `parseInt` would.
///
/// Numbers are truncated; strings may carry leading whitespace and trailing
/// garbage (`"12abc"` is 12). Anything below 1 yields `None`.
pub fn positive_int(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                return (u >= 1).then_some(u);
            }
            let f = n.as_f64()?;
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let truncated = f.trunc() as u64;
            (f.is_finite() && f >= 1.0).then_some(truncated)
        }
        Value::String(s) => positive_int_str(s),
        _ => None,
    }
}

/// String form of [`positive_int`].
pub fn positive_int_str(raw: &str) -> Option<u64> {
    let trimmed = raw.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let end = digits
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(digits.len());
    let parsed: u64 = digits[..end].parse().ok()?;
    (!negative && parsed >= 1).then_some(parsed)
}
