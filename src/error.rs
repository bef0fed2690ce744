use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EtlError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Navigation to {url} timed out after {timeout:?}")]
    ExtractionTimeout { url: String, timeout: Duration },

    #[error("Extraction from {url} failed: {message}")]
    ExtractionNetwork { url: String, message: String },

    #[error("Delivery failed (status: {status:?}): {message}")]
    TransferDelivery {
        status: Option<u16>,
        message: String,
    },

    #[error("Unable to write {path}: {source}")]
    TransferIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported destination: {0}")]
    UnsupportedDestination(String),

    #[error("Browser session closed")]
    SessionClosed,

    #[error("Browser not available: {0}")]
    BrowserUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EtlError {
    pub fn validation(message: impl Into<String>) -> Self {
        EtlError::Validation(message.into())
    }

    pub fn delivery(status: Option<u16>, message: impl Into<String>) -> Self {
        EtlError::TransferDelivery {
            status,
            message: message.into(),
        }
    }

    pub fn network(url: impl Into<String>, message: impl Into<String>) -> Self {
        EtlError::ExtractionNetwork {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn transfer_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EtlError::TransferIo {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EtlError::Validation(_) => ErrorKind::Validation,
            EtlError::ExtractionTimeout { .. } => ErrorKind::ExtractionTimeout,
            EtlError::ExtractionNetwork { .. } => ErrorKind::ExtractionNetwork,
            EtlError::TransferDelivery { .. } => ErrorKind::TransferDelivery,
            EtlError::TransferIo { .. } => ErrorKind::TransferIo,
            EtlError::UnsupportedDestination(_) => ErrorKind::UnsupportedDestination,
            EtlError::SessionClosed => ErrorKind::SessionClosed,
            EtlError::BrowserUnavailable(_) => ErrorKind::BrowserUnavailable,
            EtlError::Config(_) => ErrorKind::Config,
            EtlError::Serialization(_) => ErrorKind::Serialization,
            EtlError::Io(_) => ErrorKind::Io,
        }
    }

    /// Stable status an HTTP front end should answer with for this error.
    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::UnsupportedDestination | ErrorKind::Serialization => {
                StatusCode::BAD_REQUEST
            }
            ErrorKind::ExtractionTimeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::ExtractionNetwork | ErrorKind::TransferDelivery => StatusCode::BAD_GATEWAY,
            ErrorKind::SessionClosed | ErrorKind::BrowserUnavailable => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ErrorKind::TransferIo | ErrorKind::Config | ErrorKind::Io => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        let remediation = match self {
            EtlError::Validation(_) => "Check the request payload against the documented shapes.",
            EtlError::ExtractionTimeout { .. } => {
                "Increase the navigation timeout or make sure the page loads without blocking."
            }
            EtlError::ExtractionNetwork { .. } => {
                "Check that the URL is reachable and the selectors/actions match the page."
            }
            EtlError::TransferDelivery { status: Some(_), .. } => {
                "Inspect the upstream response; the orchestrator may retry the transfer."
            }
            EtlError::TransferDelivery { status: None, .. } => {
                "Check connectivity/proxy to the destination and retry."
            }
            EtlError::TransferIo { .. } => "Check the file path and write permissions.",
            EtlError::UnsupportedDestination(_) => "Use one of: webhook, api, file.",
            EtlError::SessionClosed => {
                "The browser session was shut down; restart the process to extract from URLs."
            }
            EtlError::BrowserUnavailable(_) => {
                "Install Chromium or set ETL_CHROME_EXECUTABLE; collection extraction still works."
            }
            EtlError::Config(_) => "Check the config file (TOML) and ETL_* environment variables.",
            EtlError::Serialization(_) => "Check that the input is valid JSON.",
            EtlError::Io(_) => "Check file paths/permissions.",
        };
        ErrorPayload {
            kind: self.kind(),
            status: self.status_code().as_u16(),
            message: self.to_string(),
            remediation: Some(remediation.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    ExtractionTimeout,
    ExtractionNetwork,
    TransferDelivery,
    TransferIo,
    UnsupportedDestination,
    SessionClosed,
    BrowserUnavailable,
    Config,
    Serialization,
    Io,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub kind: ErrorKind,
    pub status: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_error_keeps_upstream_status() {
        let err = EtlError::delivery(Some(500), "internal error");
        let payload = err.to_payload();

        assert_eq!(payload.kind, ErrorKind::TransferDelivery);
        assert_eq!(payload.status, 502);
        assert!(payload.message.contains("Some(500)"));
        assert!(payload.message.contains("internal error"));
    }

    #[test]
    fn connection_failure_suggests_connectivity_check() {
        let err = EtlError::delivery(None, "connection refused");
        let remediation = err.to_payload().remediation.unwrap_or_default();
        assert!(
            remediation.to_ascii_lowercase().contains("connectivity"),
            "expected connectivity remediation, got: {remediation}"
        );
    }

    #[test]
    fn timeout_maps_to_gateway_timeout() {
        let err = EtlError::ExtractionTimeout {
            url: "https://example.com".into(),
            timeout: Duration::from_secs(30),
        };
        assert_eq!(err.kind(), ErrorKind::ExtractionTimeout);
        assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn unsupported_destination_is_client_error() {
        let err = EtlError::UnsupportedDestination("ftp".into());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        let remediation = err.to_payload().remediation.unwrap_or_default();
        assert!(remediation.contains("webhook"));
    }

    #[test]
    fn session_closed_is_service_unavailable() {
        assert_eq!(
            EtlError::SessionClosed.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(EtlError::SessionClosed.kind(), ErrorKind::SessionClosed);
    }

    #[test]
    fn error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::TransferIo).unwrap();
        assert_eq!(json, "\"transfer_io\"");
    }

    #[test]
    fn transfer_io_display_names_path() {
        let err = EtlError::transfer_io(
            "/nope/out.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let rendered = err.to_string();
        assert!(rendered.contains("/nope/out.json"));
        assert!(rendered.contains("denied"));
    }
}
