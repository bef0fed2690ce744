//! Chromium backend using chromiumoxide.

use std::sync::Arc;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::debug;

use super::{
    BrowserError, BrowserLauncher, BrowserOptions, BrowserPage, BrowserSession, PageLink,
    PageMetadata, ScrollTarget,
};

const META_SCRIPT: &str = r#"JSON.stringify((() => {
  const tags = {};
  document.querySelectorAll('meta').forEach((m) => {
    const name = m.getAttribute('name') || m.getAttribute('property');
    const content = m.getAttribute('content');
    if (name && content !== null) tags[name] = content;
  });
  const desc = document.querySelector('meta[name="description"]');
  return {
    title: document.title || null,
    description: desc ? desc.getAttribute('content') : null,
    tags,
  };
})())"#;

const LINKS_SCRIPT: &str = r#"JSON.stringify(Array.from(document.querySelectorAll('a[href]'))
  .map((a) => ({ text: (a.textContent || '').trim(), href: a.href }))
  .filter((l) => l.text && l.href))"#;

/// Launches a local Chromium through the DevTools protocol.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChromiumLauncher;

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(
        &self,
        options: &BrowserOptions,
    ) -> Result<Arc<dyn BrowserSession>, BrowserError> {
        let mut builder = BrowserConfig::builder()
            .request_timeout(options.navigation_timeout)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking");
        if !options.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &options.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(BrowserError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!("browser handler event error: {err}");
                }
            }
        });

        Ok(Arc::new(ChromiumSession {
            browser: RwLock::new(browser),
            handler_task,
        }))
    }
}

/// Pages open under the read lock; only shutdown takes the write lock.
struct ChromiumSession {
    browser: RwLock<Browser>,
    handler_task: JoinHandle<()>,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn new_page(&self) -> Result<Arc<dyn BrowserPage>, BrowserError> {
        let page = self
            .browser
            .read()
            .await
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::Page(format!("failed to open page: {e}")))?;
        Ok(Arc::new(ChromiumPage { page }))
    }

    async fn close(&self) -> Result<(), BrowserError> {
        let mut browser = self.browser.write().await;
        let closed = browser
            .close()
            .await
            .map_err(|e| BrowserError::Page(format!("failed to close browser: {e}")));
        if closed.is_ok() {
            match browser.wait().await {
                Ok(status) => debug!(?status, "browser process exited"),
                Err(err) => debug!("waiting for browser process failed: {err}"),
            }
        }
        self.handler_task.abort();
        closed.map(|_| ())
    }
}

struct ChromiumPage {
    page: Page,
}

impl ChromiumPage {
    /// Evaluates a script that returns `JSON.stringify(...)` and decodes it.
    async fn eval_json<T: DeserializeOwned>(&self, script: &str) -> Result<T, BrowserError> {
        let raw: String = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::Page(e.to_string()))?
            .into_value()
            .map_err(|e| BrowserError::Page(format!("unexpected script result: {e:?}")))?;
        serde_json::from_str(&raw).map_err(|e| BrowserError::Page(e.to_string()))
    }

    async fn eval_unit(&self, script: &str) -> Result<(), BrowserError> {
        self.page
            .evaluate(script)
            .await
            .map(|_| ())
            .map_err(|e| BrowserError::Page(e.to_string()))
    }
}

fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

#[async_trait]
impl BrowserPage for ChromiumPage {
    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        self.page
            .goto(url)
            .await
            .map(|_| ())
            .map_err(|e| BrowserError::Navigation(e.to_string()))
    }

    async fn wait_for_settle(&self) -> Result<(), BrowserError> {
        self.page
            .wait_for_navigation()
            .await
            .map(|_| ())
            .map_err(|e| BrowserError::Navigation(e.to_string()))
    }

    async fn current_url(&self) -> Result<Option<String>, BrowserError> {
        self.page
            .url()
            .await
            .map_err(|e| BrowserError::Page(e.to_string()))
    }

    async fn select_text(&self, selector: &str) -> Result<Option<String>, BrowserError> {
        let script = format!(
            "JSON.stringify((() => {{ const el = document.querySelector({}); \
             return el ? (el.textContent || '').trim() : null; }})())",
            js_string(selector)
        );
        self.eval_json(&script).await
    }

    async fn has_selector(&self, selector: &str) -> Result<bool, BrowserError> {
        let script = format!(
            "JSON.stringify(document.querySelector({}) !== null)",
            js_string(selector)
        );
        self.eval_json(&script).await
    }

    async fn title(&self) -> Result<Option<String>, BrowserError> {
        self.page
            .get_title()
            .await
            .map_err(|e| BrowserError::Page(e.to_string()))
    }

    async fn body_text(&self) -> Result<String, BrowserError> {
        self.eval_json("JSON.stringify(document.body ? document.body.innerText : '')")
            .await
    }

    async fn html(&self) -> Result<String, BrowserError> {
        self.page
            .content()
            .await
            .map_err(|e| BrowserError::Page(e.to_string()))
    }

    async fn metadata(&self) -> Result<PageMetadata, BrowserError> {
        self.eval_json(META_SCRIPT).await
    }

    async fn links(&self) -> Result<Vec<PageLink>, BrowserError> {
        self.eval_json(LINKS_SCRIPT).await
    }

    async fn click(&self, selector: &str) -> Result<(), BrowserError> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| BrowserError::SelectorNotFound(selector.to_string()))?;
        element
            .click()
            .await
            .map(|_| ())
            .map_err(|e| BrowserError::Page(e.to_string()))
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<(), BrowserError> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| BrowserError::SelectorNotFound(selector.to_string()))?;
        element
            .click()
            .await
            .map_err(|e| BrowserError::Page(e.to_string()))?;
        element
            .type_str(text)
            .await
            .map(|_| ())
            .map_err(|e| BrowserError::Page(e.to_string()))
    }

    async fn press_key(&self, key: &str) -> Result<(), BrowserError> {
        let element = self
            .page
            .find_element("body")
            .await
            .map_err(|_| BrowserError::SelectorNotFound("body".to_string()))?;
        element
            .press_key(key)
            .await
            .map(|_| ())
            .map_err(|e| BrowserError::Page(e.to_string()))
    }

    async fn scroll(&self, target: ScrollTarget) -> Result<(), BrowserError> {
        let script = match target {
            ScrollTarget::Top => "window.scrollTo(0, 0)".to_string(),
            ScrollTarget::Bottom => "window.scrollTo(0, document.body.scrollHeight)".to_string(),
            ScrollTarget::Down(amount) => format!("window.scrollBy(0, {amount})"),
            ScrollTarget::Up(amount) => format!("window.scrollBy(0, -{amount})"),
        };
        self.eval_unit(&script).await
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.page
            .clone()
            .close()
            .await
            .map_err(|e| BrowserError::Page(e.to_string()))
    }
}
