//! Browser session lifecycle.
//!
//! This module provides the `BrowserManager` that owns the single shared
//! browser session and hands out pages through `PageGuard`s.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::chromium::ChromiumLauncher;
use super::{BrowserLauncher, BrowserOptions, BrowserPage, BrowserSession};
use crate::{EtlError, Result};

enum SessionState {
    Uninitialized,
    Ready(Arc<dyn BrowserSession>),
    Failed(String),
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Uninitialized,
    Ready,
    Failed,
    Closed,
}

/// Owns the process-wide browser session.
///
/// The state mutex is held only while the session is launched or closed, so
/// concurrent first requests share one launch while page work never queues
/// behind it.
pub struct BrowserManager {
    launcher: Arc<dyn BrowserLauncher>,
    options: BrowserOptions,
    state: Mutex<SessionState>,
    active_pages: Arc<AtomicUsize>,
    launch_attempts: AtomicUsize,
}

impl BrowserManager {
    /// Creates a manager that will launch through `launcher` on first use.
    pub fn new(launcher: Arc<dyn BrowserLauncher>, options: BrowserOptions) -> Self {
        Self {
            launcher,
            options,
            state: Mutex::new(SessionState::Uninitialized),
            active_pages: Arc::new(AtomicUsize::new(0)),
            launch_attempts: AtomicUsize::new(0),
        }
    }

    /// Creates a manager backed by a local Chromium.
    pub fn chromium(options: BrowserOptions) -> Self {
        Self::new(Arc::new(ChromiumLauncher), options)
    }

    pub fn options(&self) -> &BrowserOptions {
        &self.options
    }

    /// Launches the session if it is not running yet. Idempotent.
    pub async fn start(&self) -> Result<()> {
        self.session().await.map(|_| ())
    }

    async fn session(&self) -> Result<Arc<dyn BrowserSession>> {
        let mut state = self.state.lock().await;
        match &*state {
            SessionState::Ready(session) => return Ok(Arc::clone(session)),
            SessionState::Failed(message) => {
                return Err(EtlError::BrowserUnavailable(message.clone()))
            }
            SessionState::Closed => return Err(EtlError::SessionClosed),
            SessionState::Uninitialized => {}
        }

        self.launch_attempts.fetch_add(1, Ordering::Relaxed);
        info!(headless = self.options.headless, "launching browser session");
        match self.launcher.launch(&self.options).await {
            Ok(session) => {
                *state = SessionState::Ready(Arc::clone(&session));
                info!("browser session ready");
                Ok(session)
            }
            Err(err) => {
                let message = err.to_string();
                warn!("browser launch failed, web extraction disabled: {message}");
                *state = SessionState::Failed(message.clone());
                Err(EtlError::BrowserUnavailable(message))
            }
        }
    }

    /// Opens a page on the shared session, launching it first if needed.
    ///
    /// The returned guard must be released; dropping it closes the page in the
    /// background instead.
    pub async fn acquire_page(&self) -> Result<PageGuard> {
        let session = self.session().await?;
        match session.new_page().await {
            Ok(page) => {
                self.active_pages.fetch_add(1, Ordering::Relaxed);
                Ok(PageGuard {
                    page,
                    active_pages: Arc::clone(&self.active_pages),
                    released: false,
                })
            }
            Err(err) => {
                if self.status().await == SessionStatus::Closed {
                    Err(EtlError::SessionClosed)
                } else {
                    Err(EtlError::BrowserUnavailable(err.to_string()))
                }
            }
        }
    }

    /// Closes the session. Later acquisitions fail with `SessionClosed`.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        let previous = std::mem::replace(&mut *state, SessionState::Closed);
        if let SessionState::Ready(session) = previous {
            let open = self.active_pages.load(Ordering::Relaxed);
            if open > 0 {
                warn!(open_pages = open, "closing browser session with pages still open");
            }
            match session.close().await {
                Ok(()) => info!("browser session closed"),
                Err(err) => warn!("browser session did not close cleanly: {err}"),
            }
        }
    }

    pub async fn status(&self) -> SessionStatus {
        match &*self.state.lock().await {
            SessionState::Uninitialized => SessionStatus::Uninitialized,
            SessionState::Ready(_) => SessionStatus::Ready,
            SessionState::Failed(_) => SessionStatus::Failed,
            SessionState::Closed => SessionStatus::Closed,
        }
    }

    pub async fn is_available(&self) -> bool {
        self.status().await == SessionStatus::Ready
    }

    /// Pages acquired and not yet released.
    pub fn active_pages(&self) -> usize {
        self.active_pages.load(Ordering::Relaxed)
    }

    /// How many times a launch was attempted.
    pub fn launch_attempts(&self) -> usize {
        self.launch_attempts.load(Ordering::Relaxed)
    }
}

/// A page borrowed from the shared session.
pub struct PageGuard {
    page: Arc<dyn BrowserPage>,
    active_pages: Arc<AtomicUsize>,
    released: bool,
}

impl PageGuard {
    pub fn page(&self) -> &dyn BrowserPage {
        self.page.as_ref()
    }

    /// Closes the page and waits for it.
    pub async fn release(mut self) {
        self.released = true;
        self.active_pages.fetch_sub(1, Ordering::Relaxed);
        if let Err(err) = self.page.close().await {
            debug!("page close failed: {err}");
        }
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.active_pages.fetch_sub(1, Ordering::Relaxed);
        let page = Arc::clone(&self.page);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = page.close().await {
                        debug!("page close after drop failed: {err}");
                    }
                });
            }
            Err(_) => debug!("no runtime to close dropped page; it goes with the session"),
        }
    }
}
