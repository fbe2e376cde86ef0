//! Tolerant deserializers for optional scan attributes.
//!
//! Scanners emit the same scalar as text in one version and as a number in
//! the next. Optional attributes accept either form, and anything else reads
//! as the field's default instead of failing the whole report.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Text form of a scalar, `None` for null, arrays and objects.
fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

pub(crate) fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(scalar_text(Value::deserialize(deserializer)?).unwrap_or_default())
}

pub(crate) fn opt_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(scalar_text(Value::deserialize(deserializer)?))
}

/// Attribute map keeping only the entries with a scalar value.
pub(crate) fn text_map<'de, D, M>(deserializer: D) -> Result<M, D::Error>
where
    D: Deserializer<'de>,
    M: FromIterator<(String, String)>,
{
    let entries = indexmap::IndexMap::<String, Value>::deserialize(deserializer)?;
    Ok(entries
        .into_iter()
        .filter_map(|(k, v)| scalar_text(v).map(|v| (k, v)))
        .collect())
}

/// Counter given as a number or numeric text; anything else reads as 0.
pub(crate) fn count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let parsed = match &value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    if parsed.is_none() {
        tracing::debug!(value = %value, "Unreadable counter, using 0");
    }
    Ok(parsed.unwrap_or_default())
}

/// Nested record, or its default when the shape does not match.
pub(crate) fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Ok(serde_json::from_value(Value::deserialize(deserializer)?).unwrap_or_default())
}

/// Nested record, or `None` when the shape does not match.
pub(crate) fn or_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(serde_json::from_value(Value::deserialize(deserializer)?).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use serde_json::json;

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    struct Sample {
        #[serde(deserialize_with = "text")]
        label: String,
        #[serde(deserialize_with = "opt_text")]
        note: Option<String>,
        #[serde(deserialize_with = "count")]
        up: u32,
        #[serde(deserialize_with = "text_map")]
        attrs: IndexMap<String, String>,
    }

    fn sample(value: Value) -> Sample {
        serde_json::from_value(value).expect("lenient fields never fail")
    }

    #[test]
    fn test_numbers_read_as_text() {
        let s = sample(json!({"label": 50.12, "note": 7, "attrs": {"conf": 10, "product": "nginx"}}));
        assert_eq!(s.label, "50.12");
        assert_eq!(s.note.as_deref(), Some("7"));
        assert_eq!(s.attrs.get("conf").map(String::as_str), Some("10"));
        assert_eq!(s.attrs.get("product").map(String::as_str), Some("nginx"));
    }

    #[test]
    fn test_malformed_values_read_as_default() {
        let s = sample(json!({"label": {"x": 1}, "note": [1], "up": "n/a", "attrs": {"cpe": ["a"]}}));
        assert_eq!(s.label, "");
        assert!(s.note.is_none());
        assert_eq!(s.up, 0);
        assert!(s.attrs.is_empty());
    }

    #[test]
    fn test_count_accepts_text_and_numbers() {
        assert_eq!(sample(json!({"up": " 3 "})).up, 3);
        assert_eq!(sample(json!({"up": 4})).up, 4);
        assert_eq!(sample(json!({"up": -1})).up, 0);
        assert_eq!(sample(json!({"up": 5_000_000_000_u64})).up, 0);
    }
}
