use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::browser::{BrowserError, BrowserOptions, BrowserPage, ScrollTarget};
use crate::types::{string_pairs, Map, Value};
use crate::{EtlError, Result};

const DEFAULT_MAX_LINKS: usize = 50;
const TEXT_PREVIEW_CHARS: usize = 1000;
const SELECTOR_POLL: Duration = Duration::from_millis(100);

/// Web extraction options.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Result key to CSS selector. Empty means the default title/text extraction.
    #[serde(deserialize_with = "string_pairs")]
    pub selectors: Vec<(String, String)>,
    pub extract_meta: bool,
    pub extract_links: bool,
    pub max_links: usize,
    /// Run in order after the page settles, before anything is read.
    pub actions: Vec<PageAction>,
    pub capture: Option<Capture>,
    pub navigation_timeout_ms: Option<u64>,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            selectors: Vec::new(),
            extract_meta: false,
            extract_links: false,
            max_links: DEFAULT_MAX_LINKS,
            actions: Vec::new(),
            capture: None,
            navigation_timeout_ms: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PageAction {
    Click {
        selector: String,
    },
    Type {
        selector: String,
        #[serde(default)]
        text: String,
    },
    Press {
        #[serde(default = "default_key")]
        key: String,
    },
    Scroll {
        #[serde(default)]
        direction: ScrollDirection,
        #[serde(default)]
        amount: Option<ScrollAmount>,
    },
    Wait {
        #[serde(default = "default_wait_ms")]
        duration_ms: u64,
    },
    WaitForSelector {
        selector: String,
        #[serde(default = "default_selector_timeout_ms")]
        timeout_ms: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    #[default]
    Down,
    Up,
}

/// Pixels, or any keyword (`"end"`, `"top"`) for scrolling to the edge.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ScrollAmount {
    Pixels(u32),
    Edge(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureFormat {
    Html,
    Text,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Capture {
    pub format: CaptureFormat,
    #[serde(default)]
    pub max_chars: Option<usize>,
}

fn default_key() -> String {
    "Enter".to_string()
}

fn default_wait_ms() -> u64 {
    1000
}

fn default_selector_timeout_ms() -> u64 {
    5000
}

impl PageAction {
    pub fn name(&self) -> &'static str {
        match self {
            PageAction::Click { .. } => "click",
            PageAction::Type { .. } => "type",
            PageAction::Press { .. } => "press",
            PageAction::Scroll { .. } => "scroll",
            PageAction::Wait { .. } => "wait",
            PageAction::WaitForSelector { .. } => "wait_for_selector",
        }
    }

    async fn run(&self, page: &dyn BrowserPage) -> std::result::Result<(), BrowserError> {
        match self {
            PageAction::Click { selector } => page.click(selector).await,
            PageAction::Type { selector, text } => page.type_text(selector, text).await,
            PageAction::Press { key } => page.press_key(key).await,
            PageAction::Scroll { direction, amount } => {
                let target = match (direction, amount) {
                    (ScrollDirection::Down, Some(ScrollAmount::Pixels(px))) => {
                        ScrollTarget::Down(*px)
                    }
                    (ScrollDirection::Up, Some(ScrollAmount::Pixels(px))) => ScrollTarget::Up(*px),
                    (ScrollDirection::Down, _) => ScrollTarget::Bottom,
                    (ScrollDirection::Up, _) => ScrollTarget::Top,
                };
                page.scroll(target).await
            }
            PageAction::Wait { duration_ms } => {
                tokio::time::sleep(Duration::from_millis(*duration_ms)).await;
                Ok(())
            }
            PageAction::WaitForSelector {
                selector,
                timeout_ms,
            } => wait_for_selector(page, selector, Duration::from_millis(*timeout_ms)).await,
        }
    }
}

async fn wait_for_selector(
    page: &dyn BrowserPage,
    selector: &str,
    timeout: Duration,
) -> std::result::Result<(), BrowserError> {
    let poll = async {
        loop {
            if page.has_selector(selector).await? {
                return Ok(());
            }
            tokio::time::sleep(SELECTOR_POLL).await;
        }
    };
    match tokio::time::timeout(timeout, poll).await {
        Ok(result) => result,
        Err(_) => Err(BrowserError::SelectorNotFound(selector.to_string())),
    }
}

/// Navigates `page` to `url` and reads it according to `config`.
///
/// The caller owns the page and releases it whatever this returns.
pub async fn scrape(
    page: &dyn BrowserPage,
    url: &str,
    config: &WebConfig,
    options: &BrowserOptions,
) -> Result<Value> {
    let timeout = config
        .navigation_timeout_ms
        .map(Duration::from_millis)
        .unwrap_or(options.navigation_timeout);

    match tokio::time::timeout(timeout, page.goto(url)).await {
        Err(_) => {
            return Err(EtlError::ExtractionTimeout {
                url: url.to_string(),
                timeout,
            })
        }
        Ok(Err(err)) => return Err(EtlError::network(url, err.to_string())),
        Ok(Ok(())) => {}
    }

    match tokio::time::timeout(options.settle_timeout, page.wait_for_settle()).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(url, "page did not settle: {err}"),
        Err(_) => warn!(url, timeout = ?options.settle_timeout, "page settle timed out, reading anyway"),
    }

    for (index, action) in config.actions.iter().enumerate() {
        debug!(step = index + 1, action = action.name(), "running page action");
        action.run(page).await.map_err(|err| {
            EtlError::network(
                url,
                format!("action {} ({}) failed: {err}", index + 1, action.name()),
            )
        })?;
    }

    let query_failed = |err: BrowserError| EtlError::network(url, err.to_string());
    let mut data = Map::new();

    if config.selectors.is_empty() {
        let title = page.title().await.map_err(query_failed)?;
        let text = page.body_text().await.map_err(query_failed)?;
        let final_url = page
            .current_url()
            .await
            .map_err(query_failed)?
            .unwrap_or_else(|| url.to_string());
        data.insert("title".into(), title.map(Value::String).unwrap_or(Value::Null));
        data.insert("text_content".into(), Value::String(preview(&text)));
        data.insert("url".into(), Value::String(final_url));
    } else {
        for (key, selector) in &config.selectors {
            let value = match page.select_text(selector).await {
                Ok(Some(text)) => Value::String(text),
                Ok(None) => {
                    debug!(selector = %selector, "selector matched nothing");
                    Value::Null
                }
                Err(err) => {
                    warn!(selector = %selector, "failed to read selector: {err}");
                    Value::Null
                }
            };
            data.insert(key.clone(), value);
        }
    }

    if config.extract_meta {
        let meta = page.metadata().await.map_err(query_failed)?;
        data.insert("meta".into(), serde_json::to_value(meta)?);
    }

    if config.extract_links {
        let mut links = page.links().await.map_err(query_failed)?;
        links.truncate(config.max_links);
        data.insert("links".into(), serde_json::to_value(links)?);
    }

    if let Some(capture) = &config.capture {
        let (key, content) = match capture.format {
            CaptureFormat::Html => ("html", page.html().await.map_err(query_failed)?),
            CaptureFormat::Text => ("text", page.body_text().await.map_err(query_failed)?),
        };
        let content = match capture.max_chars {
            Some(max) => content.chars().take(max).collect(),
            None => content,
        };
        data.insert(key.into(), Value::String(content));
    }

    Ok(Value::Object(data))
}

fn preview(text: &str) -> String {
    if text.chars().count() > TEXT_PREVIEW_CHARS {
        let mut cut: String = text.chars().take(TEXT_PREVIEW_CHARS).collect();
        cut.push_str("...");
        cut
    } else {
        text.to_string()
    }
}
