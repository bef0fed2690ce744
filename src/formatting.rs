use std::fmt::Write as FmtWrite;
use std::io::{self, IsTerminal};
use std::path::Path;
use std::process::ExitCode;

use etl_lib::{ErrorPayload, EtlError};
use serde::Serialize;
use serde_json::json;

use crate::cli::OutputFormat;

/// Write a response body in the requested format.
pub fn write_output<T: Serialize>(
    body: &T,
    format: OutputFormat,
    output: Option<&Path>,
) -> Result<(), EtlError> {
    let content = match format {
        OutputFormat::Json => serde_json::to_string(body)?,
        OutputFormat::Pretty => serde_json::to_string_pretty(body)?,
    };
    emit(&content, output)?;
    Ok(())
}

/// Render an error and return the fatal exit code.
pub fn render_error(err: EtlError, format: OutputFormat, output: Option<&Path>) -> ExitCode {
    let payload = err.to_payload();
    tracing::debug!(kind = ?payload.kind, "request failed: {}", payload.message);

    let human = format == OutputFormat::Pretty && output.is_none() && io::stdout().is_terminal();
    let content = if human {
        format_error_pretty(&payload, true)
    } else {
        let envelope = json!({ "status": "error", "error": payload });
        let rendered = match format {
            OutputFormat::Json => serde_json::to_string(&envelope),
            OutputFormat::Pretty => serde_json::to_string_pretty(&envelope),
        };
        rendered.unwrap_or_else(|_| "{\"status\":\"error\"}".into())
    };

    if let Err(write_err) = emit(&content, output) {
        eprintln!("Failed to write error output: {}", write_err);
        println!("{content}");
    }

    ExitCode::from(2)
}

fn emit(content: &str, output: Option<&Path>) -> io::Result<()> {
    match output {
        Some(path) => std::fs::write(path, content),
        None => {
            println!("{content}");
            Ok(())
        }
    }
}

/// Format an error for a terminal.
pub fn format_error_pretty(payload: &ErrorPayload, colorize: bool) -> String {
    let mut buf = String::new();
    let header = color("[ERROR]", "31", colorize);
    writeln!(buf, "{} {} ({})", header, payload.message, payload.status).ok();
    if let Some(remediation) = &payload.remediation {
        writeln!(buf, "Hint: {}", remediation).ok();
    }
    buf
}

/// Apply ANSI color codes when enabled.
fn color(text: &str, code: &str, colorize: bool) -> String {
    if colorize {
        format!("\x1b[{}m{}\x1b[0m", code, text)
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn render_error_always_returns_fatal_exit_code() {
        let code = render_error(
            EtlError::Config("boom".to_string()),
            OutputFormat::Json,
            None,
        );
        assert_eq!(code, ExitCode::from(2));
    }

    #[test]
    fn render_error_writes_envelope_to_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("err.json");
        render_error(
            EtlError::UnsupportedDestination("ftp".into()),
            OutputFormat::Json,
            Some(&path),
        );
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["status"], "error");
        assert_eq!(written["error"]["kind"], "unsupported_destination");
        assert_eq!(written["error"]["status"], 400);
    }

    #[test]
    fn format_error_pretty_includes_hint() {
        let payload = EtlError::validation("bad input").to_payload();
        let pretty = format_error_pretty(&payload, false);
        assert!(pretty.contains("[ERROR] Validation error: bad input (422)"));
        assert!(pretty.contains("Hint: "));
    }

    #[test]
    fn write_output_pretty_to_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.json");
        write_output(&json!({"a": 1}), OutputFormat::Pretty, Some(&path)).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\n  \"a\": 1\n}");
    }
}
