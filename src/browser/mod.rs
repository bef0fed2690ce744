//! Headless browser automation for web extraction.
//!
//! One long-lived browser session is shared by every web-extraction request.
//! The session is launched lazily on first use and closed once at shutdown.
//!
//! # Module Structure
//!
//! - [`manager`] - session lifecycle, single-flight start, scoped page acquisition
//! - [`chromium`] - chromiumoxide-backed launcher, session and page
//!
//! The capability traits below are the seam between the two; tests plug in an
//! in-memory backend through the same traits.
//!
//! # Example
//!
//! ```no_run
//! use etl_lib::{BrowserManager, BrowserOptions};
//!
//! # async fn example() -> etl_lib::Result<()> {
//! let manager = BrowserManager::chromium(BrowserOptions::default());
//! let guard = manager.acquire_page().await?;
//! guard.page().goto("https://example.com").await.ok();
//! guard.release().await;
//! manager.stop().await;
//! # Ok(())
//! # }
//! ```

mod chromium;
mod manager;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::BrowserSettings;
use crate::types::Map;

pub use chromium::ChromiumLauncher;
pub use manager::{BrowserManager, PageGuard, SessionStatus};

/// Default timeout for page navigation.
pub const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for waiting until a page settles after navigation.
pub const DEFAULT_SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration options for the browser session.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// Whether to run in headless mode.
    pub headless: bool,
    /// Timeout for page navigation.
    pub navigation_timeout: Duration,
    /// Timeout for the post-navigation settle wait.
    pub settle_timeout: Duration,
    /// Explicit Chromium binary; auto-detected when `None`.
    pub chrome_executable: Option<PathBuf>,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: true,
            navigation_timeout: DEFAULT_NAVIGATION_TIMEOUT,
            settle_timeout: DEFAULT_SETTLE_TIMEOUT,
            chrome_executable: None,
        }
    }
}

impl From<&BrowserSettings> for BrowserOptions {
    fn from(settings: &BrowserSettings) -> Self {
        Self {
            headless: settings.headless,
            navigation_timeout: settings.navigation_timeout,
            settle_timeout: settings.settle_timeout,
            chrome_executable: settings.chrome_executable.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("failed to launch browser: {0}")]
    Launch(String),
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("no element matches selector '{0}'")]
    SelectorNotFound(String),
    #[error("page operation failed: {0}")]
    Page(String),
}

/// Title, description and every named `<meta>` tag of a page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLink {
    pub text: String,
    pub href: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollTarget {
    Top,
    Bottom,
    Down(u32),
    Up(u32),
}

/// Launches the underlying browser process.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, options: &BrowserOptions)
        -> Result<Arc<dyn BrowserSession>, BrowserError>;
}

/// A running browser that hands out pages.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn new_page(&self) -> Result<Arc<dyn BrowserPage>, BrowserError>;
    async fn close(&self) -> Result<(), BrowserError>;
}

/// A single page (tab). Timeouts are applied by the caller.
#[async_trait]
pub trait BrowserPage: Send + Sync {
    async fn goto(&self, url: &str) -> Result<(), BrowserError>;
    async fn wait_for_settle(&self) -> Result<(), BrowserError>;
    async fn current_url(&self) -> Result<Option<String>, BrowserError>;
    /// Text of the first element matching `selector`, `None` when nothing matches.
    async fn select_text(&self, selector: &str) -> Result<Option<String>, BrowserError>;
    async fn has_selector(&self, selector: &str) -> Result<bool, BrowserError>;
    async fn title(&self) -> Result<Option<String>, BrowserError>;
    async fn body_text(&self) -> Result<String, BrowserError>;
    async fn html(&self) -> Result<String, BrowserError>;
    async fn metadata(&self) -> Result<PageMetadata, BrowserError>;
    async fn links(&self) -> Result<Vec<PageLink>, BrowserError>;
    async fn click(&self, selector: &str) -> Result<(), BrowserError>;
    async fn type_text(&self, selector: &str, text: &str) -> Result<(), BrowserError>;
    async fn press_key(&self, key: &str) -> Result<(), BrowserError>;
    async fn scroll(&self, target: ScrollTarget) -> Result<(), BrowserError>;
    async fn close(&self) -> Result<(), BrowserError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn browser_options_default_values() {
        let opts = BrowserOptions::default();
        assert!(opts.headless);
        assert_eq!(opts.navigation_timeout, DEFAULT_NAVIGATION_TIMEOUT);
        assert_eq!(opts.settle_timeout, DEFAULT_SETTLE_TIMEOUT);
        assert!(opts.chrome_executable.is_none());
    }

    #[test]
    fn browser_options_from_settings() {
        let settings = BrowserSettings {
            headless: false,
            navigation_timeout: Duration::from_secs(5),
            settle_timeout: Duration::from_secs(2),
            chrome_executable: Some(PathBuf::from("/usr/bin/chromium")),
        };
        let opts = BrowserOptions::from(&settings);
        assert!(!opts.headless);
        assert_eq!(opts.navigation_timeout, Duration::from_secs(5));
        assert_eq!(opts.settle_timeout, Duration::from_secs(2));
        assert_eq!(
            opts.chrome_executable,
            Some(PathBuf::from("/usr/bin/chromium"))
        );
    }

    #[test]
    fn metadata_deserializes_without_tags() {
        let meta: PageMetadata =
            serde_json::from_str(r#"{"title":"T","description":null}"#).unwrap();
        assert_eq!(meta.title.as_deref(), Some("T"));
        assert!(meta.tags.is_empty());
    }
}
