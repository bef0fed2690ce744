//! Result descriptors shared by the engines.
//!
//! The data unit itself is [`serde_json::Value`]: null, boolean, number, text,
//! sequence, or mapping. Mappings keep insertion order (`preserve_order`), which
//! lets key-narrowing rules keep the remaining keys in their original order.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Success,
}

/// Output of the extraction engine. The status fields are for observability only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub extracted_data: Value,
    pub source: String,
    pub status: ResultStatus,
    pub elapsed_ms: u64,
    /// Number of records for sequence results, 1 for anything else, 0 for null.
    pub record_count: usize,
}

impl ExtractionResult {
    pub fn success(extracted_data: Value, source: impl Into<String>, elapsed_ms: u64) -> Self {
        let record_count = record_count(&extracted_data);
        Self {
            extracted_data,
            source: source.into(),
            status: ResultStatus::Success,
            elapsed_ms,
            record_count,
        }
    }
}

/// Output of the transfer engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferResult {
    pub transfer_id: String,
    pub destination: String,
    pub status: ResultStatus,
    pub elapsed_ms: u64,
    /// Encoded payload size in bytes.
    pub bytes: u64,
    pub details: Value,
}

pub fn record_count(value: &Value) -> usize {
    match value {
        Value::Null => 0,
        Value::Array(items) => items.len(),
        _ => 1,
    }
}

/// Short type name used in logs and validation messages.
pub fn shape_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "text",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

/// Fixed timestamp format: RFC 3339, UTC, millisecond precision, `Z` suffix.
pub fn format_timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Reads a JSON mapping of text values as ordered pairs.
pub(crate) fn string_pairs<'de, D>(deserializer: D) -> Result<Vec<(String, String)>, D::Error>
where
    D: Deserializer<'de>,
{
    let map = Map::<String, Value>::deserialize(deserializer)?;
    map.into_iter()
        .map(|(key, value)| match value {
            Value::String(text) => Ok((key, text)),
            other => Err(serde::de::Error::custom(format!(
                "expected text for '{key}', got {}",
                shape_name(&other)
            ))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_count_follows_shape() {
        assert_eq!(record_count(&Value::Null), 0);
        assert_eq!(record_count(&json!([1, 2, 3])), 3);
        assert_eq!(record_count(&json!({"a": 1})), 1);
    }

    #[test]
    fn extraction_result_serializes_lowercase_status() {
        let result = ExtractionResult::success(json!([]), "provided_data", 3);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["record_count"], 0);
    }
}
