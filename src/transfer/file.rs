use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::json;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::{Delivery, Envelope};
use crate::types::Value;
use crate::{EtlError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum FileFormat {
    #[default]
    Json,
    Ndjson,
    Txt,
    Csv,
    Yaml,
}

impl TryFrom<String> for FileFormat {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        match value.to_ascii_lowercase().as_str() {
            "json" => Ok(FileFormat::Json),
            "ndjson" | "jsonl" => Ok(FileFormat::Ndjson),
            "txt" | "text" => Ok(FileFormat::Txt),
            "csv" => Ok(FileFormat::Csv),
            "yaml" | "yml" => Ok(FileFormat::Yaml),
            _ => Err(format!("unsupported file format: {value}")),
        }
    }
}

impl FileFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileFormat::Json => "json",
            FileFormat::Ndjson => "ndjson",
            FileFormat::Txt => "txt",
            FileFormat::Csv => "csv",
            FileFormat::Yaml => "yaml",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileConfig {
    pub file_path: PathBuf,
    #[serde(default)]
    pub format: FileFormat,
    /// Add a record to the end of the file instead of replacing it.
    #[serde(default)]
    pub append: bool,
}

/// Encodes the value, then writes it. Encoding errors never touch the file.
pub(crate) async fn write(config: &FileConfig, envelope: &Envelope, data: &Value) -> Result<Delivery> {
    let path = &config.file_path;
    let has_content = config.append && file_len(path).await > 0;
    let content = encode(config.format, envelope, data, has_content)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| EtlError::transfer_io(parent, e))?;
    }

    let mut options = OpenOptions::new();
    options.create(true);
    if config.append {
        options.append(true);
    } else {
        options.write(true).truncate(true);
    }
    let mut file = options
        .open(path)
        .await
        .map_err(|e| EtlError::transfer_io(path, e))?;
    file.write_all(content.as_bytes())
        .await
        .map_err(|e| EtlError::transfer_io(path, e))?;
    file.flush().await.map_err(|e| EtlError::transfer_io(path, e))?;
    drop(file);

    let file_size = file_len(path).await;
    debug!(path = %path.display(), file_size, append = config.append, "file written");

    Ok(Delivery {
        bytes: content.len() as u64,
        details: json!({
            "file_path": path.display().to_string(),
            "file_format": config.format.as_str(),
            "file_size": file_size,
            "append_mode": config.append,
        }),
    })
}

async fn file_len(path: &Path) -> u64 {
    fs::metadata(path).await.map(|m| m.len()).unwrap_or(0)
}

/// `appending` is true when the new record lands after existing content.
fn encode(format: FileFormat, envelope: &Envelope, data: &Value, appending: bool) -> Result<String> {
    let separator = if appending { "\n" } else { "" };
    let content = match format {
        FileFormat::Json => {
            let body = serde_json::to_string_pretty(&envelope.wrap(data, None))?;
            format!("{separator}{body}")
        }
        FileFormat::Ndjson => {
            let line = serde_json::to_string(&envelope.wrap(data, None))?;
            format!("{line}\n")
        }
        FileFormat::Txt => {
            let rendered = match data {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            format!(
                "{separator}Transfer ID: {}\nTimestamp: {}\nData: {rendered}\n",
                envelope.transfer_id, envelope.timestamp
            )
        }
        FileFormat::Csv => encode_csv(data, !appending)?,
        FileFormat::Yaml => {
            let doc = serde_yaml::to_string(&envelope.wrap(data, None))
                .map_err(|e| EtlError::validation(format!("cannot encode value as YAML: {e}")))?;
            if appending {
                format!("---\n{doc}")
            } else {
                doc
            }
        }
    };
    Ok(content)
}

/// Sequence of mappings to CSV. Columns come from the first record; missing
/// cells are empty and keys outside the header are dropped.
fn encode_csv(data: &Value, with_header: bool) -> Result<String> {
    let records = data
        .as_array()
        .filter(|items| items.iter().all(Value::is_object))
        .ok_or_else(|| {
            EtlError::validation("CSV format requires data to be a list of mappings")
        })?;

    let Some(first) = records.first().and_then(Value::as_object) else {
        return Ok(String::new());
    };
    let columns: Vec<&String> = first.keys().collect();

    let mut out = String::new();
    if with_header {
        push_row(&mut out, columns.iter().map(|c| c.to_string()));
    }
    for record in records.iter().filter_map(Value::as_object) {
        push_row(
            &mut out,
            columns
                .iter()
                .map(|column| record.get(column.as_str()).map(csv_cell).unwrap_or_default()),
        );
    }
    Ok(out)
}

fn push_row(out: &mut String, cells: impl Iterator<Item = String>) {
    let row: Vec<String> = cells.map(|cell| quote_csv(&cell)).collect();
    out.push_str(&row.join(","));
    out.push('\n');
}

fn csv_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn quote_csv(cell: &str) -> String {
    if cell.contains(&[',', '"', '\n', '\r'][..]) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope() -> Envelope {
        Envelope {
            transfer_id: "transfer_t1".into(),
            timestamp: "2024-01-01T00:00:00.000Z".into(),
        }
    }

    #[test]
    fn format_names_parse_case_insensitively() {
        assert_eq!(FileFormat::try_from("JSON".to_string()).unwrap(), FileFormat::Json);
        assert_eq!(FileFormat::try_from("yml".to_string()).unwrap(), FileFormat::Yaml);
        assert!(FileFormat::try_from("xml".to_string()).is_err());
    }

    #[test]
    fn csv_header_from_first_record() {
        let out = encode_csv(&json!([{"a": 1, "b": "x,y"}, {"b": "q\"r", "a": null}]), true).unwrap();
        assert_eq!(out, "a,b\n1,\"x,y\"\n,\"q\"\"r\"\n");
    }

    #[test]
    fn csv_without_header_when_appending() {
        let out = encode_csv(&json!([{"a": 1}]), false).unwrap();
        assert_eq!(out, "1\n");
    }

    #[test]
    fn csv_rejects_non_tabular_data() {
        assert!(matches!(encode_csv(&json!({"a": 1}), true), Err(EtlError::Validation(_))));
        assert!(matches!(encode_csv(&json!([1, 2]), true), Err(EtlError::Validation(_))));
        assert_eq!(encode_csv(&json!([]), true).unwrap(), "");
    }

    #[test]
    fn txt_renders_text_verbatim() {
        let out = encode(FileFormat::Txt, &envelope(), &json!("hello"), false).unwrap();
        assert_eq!(
            out,
            "Transfer ID: transfer_t1\nTimestamp: 2024-01-01T00:00:00.000Z\nData: hello\n"
        );
        let appended = encode(FileFormat::Txt, &envelope(), &json!("hello"), true).unwrap();
        assert!(appended.starts_with("\nTransfer ID"));
    }

    #[test]
    fn ndjson_is_one_compact_line() {
        let out = encode(FileFormat::Ndjson, &envelope(), &json!({"a": [1, 2]}), true).unwrap();
        assert_eq!(out.lines().count(), 1);
        assert!(out.ends_with('\n'));
        let parsed: Value = serde_json::from_str(out.trim_end()).unwrap();
        assert_eq!(parsed["data"], json!({"a": [1, 2]}));
    }

    #[test]
    fn yaml_documents_are_separated_when_appending() {
        let first = encode(FileFormat::Yaml, &envelope(), &json!({"a": 1}), false).unwrap();
        assert!(first.contains("transfer_id: transfer_t1"));
        let next = encode(FileFormat::Yaml, &envelope(), &json!({"a": 1}), true).unwrap();
        assert!(next.starts_with("---\n"));
    }
}
