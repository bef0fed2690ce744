//! Transfer engine.
//!
//! Delivers a value to one destination kind. The set of kinds is closed
//! ([`DestinationKind`]); each kind parses its own options into a typed
//! [`TransferConfig`] variant before any I/O happens, so a bad destination
//! name or a missing parameter never leaves a half-written file or a stray
//! request behind.
//!
//! There are no retries here. A failed delivery is reported with the upstream
//! status so the calling orchestrator can decide.

mod file;
mod http;

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::TransferSettings;
use crate::types::{format_timestamp, Map, ResultStatus, TransferResult, Value};
use crate::{EtlError, Result};

pub use file::{FileConfig, FileFormat};
pub use http::{ApiAuth, ApiConfig, HttpMethod, WebhookConfig};

/// Response bodies kept in transfer details are cut to this many characters.
pub const RESPONSE_PREVIEW_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationKind {
    Webhook,
    Api,
    File,
}

impl DestinationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DestinationKind::Webhook => "webhook",
            DestinationKind::Api => "api",
            DestinationKind::File => "file",
        }
    }
}

impl fmt::Display for DestinationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DestinationKind {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "webhook" => Ok(DestinationKind::Webhook),
            "api" => Ok(DestinationKind::Api),
            "file" => Ok(DestinationKind::File),
            _ => Err(EtlError::UnsupportedDestination(s.to_string())),
        }
    }
}

/// Destination options, already checked for the chosen kind.
#[derive(Debug, Clone)]
pub enum TransferConfig {
    Webhook(WebhookConfig),
    Api(ApiConfig),
    File(FileConfig),
}

impl TransferConfig {
    pub fn parse(kind: DestinationKind, options: Option<&Value>) -> Result<Self> {
        let options = options.unwrap_or(&Value::Null);
        match kind {
            DestinationKind::Webhook => {
                let config: WebhookConfig = parse_options(kind, options)?;
                config.validate()?;
                Ok(TransferConfig::Webhook(config))
            }
            DestinationKind::Api => {
                let config: ApiConfig = parse_options(kind, options)?;
                config.validate()?;
                Ok(TransferConfig::Api(config))
            }
            DestinationKind::File => Ok(TransferConfig::File(parse_options(kind, options)?)),
        }
    }

    pub fn kind(&self) -> DestinationKind {
        match self {
            TransferConfig::Webhook(_) => DestinationKind::Webhook,
            TransferConfig::Api(_) => DestinationKind::Api,
            TransferConfig::File(_) => DestinationKind::File,
        }
    }
}

fn parse_options<T: for<'de> Deserialize<'de>>(kind: DestinationKind, options: &Value) -> Result<T> {
    if options.is_null() {
        return Err(EtlError::validation(format!(
            "transfer_config is required for {kind} destination"
        )));
    }
    T::deserialize(options)
        .map_err(|e| EtlError::validation(format!("invalid {kind} transfer_config: {e}")))
}

/// Identity and time stamp shared by every encoding of one transfer.
#[derive(Debug, Clone)]
pub(crate) struct Envelope {
    pub transfer_id: String,
    pub timestamp: String,
}

impl Envelope {
    fn new() -> Self {
        Self {
            transfer_id: new_transfer_id(),
            timestamp: format_timestamp(Utc::now()),
        }
    }

    /// `{transfer_id, timestamp, data}` with `extra` merged over it.
    pub(crate) fn wrap(&self, data: &Value, extra: Option<&Map<String, Value>>) -> Value {
        let mut map = Map::new();
        map.insert("transfer_id".into(), Value::String(self.transfer_id.clone()));
        map.insert("timestamp".into(), Value::String(self.timestamp.clone()));
        map.insert("data".into(), data.clone());
        if let Some(extra) = extra {
            for (key, value) in extra {
                map.insert(key.clone(), value.clone());
            }
        }
        Value::Object(map)
    }
}

pub fn new_transfer_id() -> String {
    format!("transfer_{}", uuid::Uuid::new_v4().simple())
}

/// What a destination reports back after a successful delivery.
pub(crate) struct Delivery {
    pub bytes: u64,
    pub details: Value,
}

/// Runs transfers. Holds one pooled HTTP client for webhook and api deliveries.
#[derive(Debug, Clone)]
pub struct TransferEngine {
    http: Client,
    default_timeout: Duration,
}

impl TransferEngine {
    pub fn new(settings: &TransferSettings) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("etlkit/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| EtlError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            default_timeout: settings.webhook_timeout,
        })
    }

    /// Resolves `destination`, checks `options`, then delivers.
    pub async fn transfer(
        &self,
        data: &Value,
        destination: &str,
        options: Option<&Value>,
    ) -> Result<TransferResult> {
        let kind: DestinationKind = destination.parse()?;
        let config = TransferConfig::parse(kind, options)?;
        self.deliver(data, &config).await
    }

    pub async fn deliver(&self, data: &Value, config: &TransferConfig) -> Result<TransferResult> {
        let started = Instant::now();
        let envelope = Envelope::new();
        debug!(transfer_id = %envelope.transfer_id, destination = %config.kind(), "starting transfer");

        let delivery = match config {
            TransferConfig::Webhook(webhook) => {
                http::send_webhook(&self.http, self.default_timeout, webhook, &envelope, data)
                    .await?
            }
            TransferConfig::Api(api) => {
                http::send_api(&self.http, self.default_timeout, api, &envelope, data).await?
            }
            TransferConfig::File(file) => file::write(file, &envelope, data).await?,
        };

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            transfer_id = %envelope.transfer_id,
            destination = %config.kind(),
            bytes = delivery.bytes,
            elapsed_ms,
            "transfer completed"
        );
        Ok(TransferResult {
            transfer_id: envelope.transfer_id,
            destination: config.kind().to_string(),
            status: ResultStatus::Success,
            elapsed_ms,
            bytes: delivery.bytes,
            details: delivery.details,
        })
    }
}
