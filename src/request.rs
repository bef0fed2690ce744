//! Request and response payloads at the service boundary.
//!
//! A front end (HTTP handler, CLI, queue consumer) deserializes one of the
//! request types, calls the matching engine and serializes the response
//! envelope. Failures go out as [`crate::ErrorPayload`].

use serde::{Deserialize, Serialize};

use crate::extract::ExtractionConfig;
use crate::transform::RuleSet;
use crate::types::{ExtractionResult, TransferResult, Value};
use crate::Result;

const SUCCESS: &str = "success";

#[derive(Debug, Clone, Deserialize)]
pub struct TransformRequest {
    pub data: Value,
    #[serde(default)]
    pub transformation_rules: Option<RuleSet>,
}

impl TransformRequest {
    pub fn rules(&self) -> RuleSet {
        self.transformation_rules.clone().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformResponse {
    pub status: String,
    pub original_data: Value,
    pub transformed_data: Value,
}

impl TransformResponse {
    pub fn success(original_data: Value, transformed_data: Value) -> Self {
        Self {
            status: SUCCESS.to_string(),
            original_data,
            transformed_data,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractRequest {
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub source_data: Option<Value>,
    #[serde(default)]
    pub extraction_config: Option<Value>,
}

impl ExtractRequest {
    /// Exactly one of `source_url` and `source_data` must be set.
    pub fn into_config(self) -> Result<ExtractionConfig> {
        ExtractionConfig::from_parts(
            self.source_url,
            self.source_data,
            self.extraction_config.as_ref(),
        )
    }
}

/// The result already carries `status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractResponse {
    #[serde(flatten)]
    pub result: ExtractionResult,
}

impl From<ExtractionResult> for ExtractResponse {
    fn from(result: ExtractionResult) -> Self {
        Self { result }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransferRequest {
    pub data: Value,
    pub destination: String,
    #[serde(default)]
    pub transfer_config: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferResponse {
    #[serde(flatten)]
    pub result: TransferResult,
}

impl From<TransferResult> for TransferResponse {
    fn from(result: TransferResult) -> Self {
        Self { result }
    }
}
