//! Extraction engine.
//!
//! Two independent paths share the [`ExtractionResult`] contract:
//!
//! - [`collection`] filters and projects an in-memory value; it never touches
//!   the browser and never fails once its options are parsed.
//! - [`web`] renders a URL on a page borrowed from the shared
//!   [`BrowserManager`] and reads it through selector rules.

pub mod collection;
pub mod web;

use std::sync::Arc;
use std::time::Instant;

use serde::Deserialize;
use tracing::info;

use crate::browser::BrowserManager;
use crate::types::{ExtractionResult, Value};
use crate::{EtlError, Result};

pub use collection::{CollectionConfig, ListSelection, RecordFilter};
pub use web::{Capture, CaptureFormat, PageAction, WebConfig};

/// Source label for in-memory extraction.
pub const PROVIDED_DATA_SOURCE: &str = "provided_data";

/// One extraction job: either in-memory records or a URL to render.
#[derive(Debug, Clone)]
pub enum ExtractionConfig {
    Collection { data: Value, options: CollectionConfig },
    Web { url: String, options: WebConfig },
}

impl ExtractionConfig {
    /// Builds a job from the request fields. Exactly one source must be set;
    /// `options` is parsed for the mode that source selects.
    pub fn from_parts(
        source_url: Option<String>,
        source_data: Option<Value>,
        options: Option<&Value>,
    ) -> Result<Self> {
        match (source_url, source_data) {
            (Some(_), Some(_)) => Err(EtlError::validation(
                "provide either source_url or source_data, not both",
            )),
            (None, None) => Err(EtlError::validation(
                "either source_url or source_data must be provided",
            )),
            (Some(url), None) => {
                url::Url::parse(&url)
                    .map_err(|e| EtlError::validation(format!("invalid source_url '{url}': {e}")))?;
                Ok(ExtractionConfig::Web {
                    url,
                    options: parse_options(options, "web extraction")?,
                })
            }
            (None, Some(data)) => Ok(ExtractionConfig::Collection {
                data,
                options: parse_options(options, "collection extraction")?,
            }),
        }
    }
}

fn parse_options<T>(options: Option<&Value>, what: &str) -> Result<T>
where
    T: Default + for<'de> Deserialize<'de>,
{
    match options {
        None | Some(Value::Null) => Ok(T::default()),
        Some(value) => T::deserialize(value)
            .map_err(|e| EtlError::validation(format!("invalid {what} config: {e}"))),
    }
}

/// Runs extraction jobs. Web jobs share the injected browser session.
#[derive(Clone)]
pub struct ExtractionEngine {
    browser: Arc<BrowserManager>,
}

impl ExtractionEngine {
    pub fn new(browser: Arc<BrowserManager>) -> Self {
        Self { browser }
    }

    pub async fn extract(&self, config: ExtractionConfig) -> Result<ExtractionResult> {
        match config {
            ExtractionConfig::Collection { data, options } => {
                Ok(extract_collection(data, &options))
            }
            ExtractionConfig::Web { url, options } => self.extract_web(&url, &options).await,
        }
    }

    /// Renders `url` and reads it. The page is released on every exit path;
    /// if this future is dropped the page guard closes it in the background.
    pub async fn extract_web(&self, url: &str, options: &WebConfig) -> Result<ExtractionResult> {
        let started = Instant::now();
        let guard = self.browser.acquire_page().await?;
        let outcome = web::scrape(guard.page(), url, options, self.browser.options()).await;
        guard.release().await;

        let data = outcome?;
        let result = ExtractionResult::success(data, url, elapsed_ms(started));
        info!(source = %url, elapsed_ms = result.elapsed_ms, "web extraction finished");
        Ok(result)
    }
}

/// Collection extraction needs no engine state.
pub fn extract_collection(data: Value, options: &CollectionConfig) -> ExtractionResult {
    let started = Instant::now();
    let extracted = collection::extract(data, options);
    let result = ExtractionResult::success(extracted, PROVIDED_DATA_SOURCE, elapsed_ms(started));
    info!(
        records = result.record_count,
        "collection extraction finished"
    );
    result
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn both_sources_is_a_validation_error() {
        let err = ExtractionConfig::from_parts(
            Some("https://example.com".into()),
            Some(json!([1])),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, EtlError::Validation(_)));
    }

    #[test]
    fn no_source_is_a_validation_error() {
        let err = ExtractionConfig::from_parts(None, None, None).unwrap_err();
        assert!(matches!(err, EtlError::Validation(_)));
    }

    #[test]
    fn malformed_url_is_rejected_before_browsing() {
        let err = ExtractionConfig::from_parts(Some("not a url".into()), None, None).unwrap_err();
        assert!(matches!(err, EtlError::Validation(_)));
    }

    #[test]
    fn malformed_options_are_rejected() {
        let err = ExtractionConfig::from_parts(
            None,
            Some(json!([1])),
            Some(&json!({"extract_keys": "name"})),
        )
        .unwrap_err();
        assert!(matches!(err, EtlError::Validation(_)));
    }

    #[test]
    fn data_source_selects_collection_mode() {
        let config = ExtractionConfig::from_parts(
            None,
            Some(json!([{"a": 1}])),
            Some(&json!({"extract_list": {"first": 1}})),
        )
        .unwrap();
        match config {
            ExtractionConfig::Collection { options, .. } => {
                assert_eq!(options.extract_list.and_then(|l| l.first), Some(1))
            }
            other => panic!("unexpected mode: {other:?}"),
        }
    }

    #[test]
    fn collection_result_reports_source_and_count() {
        let result = extract_collection(json!([1, 2, 3]), &CollectionConfig::default());
        assert_eq!(result.source, PROVIDED_DATA_SOURCE);
        assert_eq!(result.record_count, 3);
    }
}
