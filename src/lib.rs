//! ETL Kit Library
//!
//! Rule-driven extract, transform and transfer engines meant to sit behind a
//! thin front end (an HTTP service, the bundled `etl` CLI, a job runner).
//! Every operation is request-in, value-out; the only shared state is the
//! headless browser session used by web extraction.
//!
//! # Module Overview
//!
//! - [`transform`] - typed rule sets applied to values in a fixed order
//! - [`extract`] - collection filtering and browser-based web extraction
//! - [`browser`] - the shared browser session and page capability traits
//! - [`transfer`] - webhook, api and file delivery
//! - [`request`] - boundary request/response payloads
//! - [`config`] - configuration file and environment overrides
//! - [`error`] - error taxonomy with stable client-facing status codes
//!
//! # Example
//!
//! ```
//! use etl_lib::{transform, RuleSet};
//! use serde_json::json;
//!
//! let rules = RuleSet::from_value(&json!({
//!     "uppercase": true,
//!     "prefix": ">>> ",
//!     "suffix": " <<<"
//! }));
//! assert_eq!(transform(json!("hello world"), &rules), json!(">>> HELLO WORLD <<<"));
//! ```

pub mod browser;
pub mod config;
pub mod error;
pub mod extract;
pub mod logging;
pub mod request;
pub mod transfer;
pub mod transform;
pub mod types;

pub use browser::{
    BrowserError, BrowserLauncher, BrowserManager, BrowserOptions, BrowserPage, BrowserSession,
    ChromiumLauncher, PageGuard, PageLink, PageMetadata, ScrollTarget, SessionStatus,
    DEFAULT_NAVIGATION_TIMEOUT, DEFAULT_SETTLE_TIMEOUT,
};
pub use config::Config;
pub use error::{ErrorKind, ErrorPayload, EtlError, Result};
pub use extract::{
    extract_collection, CollectionConfig, ExtractionConfig, ExtractionEngine, WebConfig,
};
pub use request::{
    ExtractRequest, ExtractResponse, TransferRequest, TransferResponse, TransformRequest,
    TransformResponse,
};
pub use transfer::{DestinationKind, TransferConfig, TransferEngine};
pub use transform::{transform, Rule, RuleSet};
pub use types::{ExtractionResult, ResultStatus, TransferResult, Value};
