//! Headless-browser page rendering (feature `browser`).
//!
//! Some documentation sites ship an empty shell and hydrate everything
//! client-side; for those, plain GETs return nothing useful. This module
//! provides [`BrowserSource`], a [`PageSource`] implementation backed by
//! one shared headless Chromium process.
//!
//! Lifecycle contract: the browser is launched once before the first
//! render and torn down exactly once at run end via
//! [`BrowserSource::close`], regardless of how the run went. Each render
//! gets a fresh page that is closed before the call returns.
//!
//! Image, font, and media subresources are blocked to keep renders fast;
//! the page's own scripts still run.

use crate::fetcher::PageSource;
use crate::{Error, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{EnableParams, SetBlockedUrLsParams};
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Hard deadline for one render, navigation included.
const RENDER_TIMEOUT: Duration = Duration::from_secs(30);

/// Subresource URL patterns blocked during rendering.
const BLOCKED_PATTERNS: &[&str] = &[
    "*.png", "*.jpg", "*.jpeg", "*.gif", "*.svg", "*.webp", "*.ico", "*.woff", "*.woff2",
    "*.ttf", "*.otf", "*.mp4", "*.webm", "*.mp3", "*.avif",
];

/// Page source rendering through a shared headless Chromium.
///
/// `None` in the slot means the browser has been closed; renders after
/// close fail instead of silently relaunching.
pub struct BrowserSource {
    browser: Mutex<Option<Browser>>,
    handler_task: Mutex<Option<JoinHandle<()>>>,
    user_agent: String,
}

impl BrowserSource {
    /// Launch the shared browser process.
    pub async fn launch(user_agent: &str) -> Result<Self> {
        let config = BrowserConfig::builder()
            .no_sandbox()
            .window_size(1920, 1080)
            .build()
            .map_err(Error::Render)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| Error::Render(format!("browser launch failed: {e}")))?;

        // The handler drives the CDP connection; it runs until the
        // browser closes.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "browser handler event error");
                }
            }
        });

        info!("headless browser launched for JavaScript rendering");
        Ok(Self {
            browser: Mutex::new(Some(browser)),
            handler_task: Mutex::new(Some(handler_task)),
            user_agent: user_agent.to_string(),
        })
    }

    /// Close the browser process. Idempotent; later renders fail.
    pub async fn close(&self) -> Result<()> {
        let Some(mut browser) = self.browser.lock().await.take() else {
            return Ok(());
        };
        browser
            .close()
            .await
            .map_err(|e| Error::Render(format!("browser close failed: {e}")))?;
        let _ = browser.wait().await;
        if let Some(task) = self.handler_task.lock().await.take() {
            let _ = task.await;
        }
        info!("headless browser closed");
        Ok(())
    }

    async fn render(&self, url: &str) -> Result<String> {
        let page = {
            let guard = self.browser.lock().await;
            let browser = guard
                .as_ref()
                .ok_or_else(|| Error::Render("browser already closed".to_string()))?;
            browser
                .new_page("about:blank")
                .await
                .map_err(|e| Error::Render(format!("new page failed: {e}")))?
        };

        let result = async {
            page.set_user_agent(self.user_agent.as_str())
                .await
                .map_err(|e| Error::Render(format!("set user agent failed: {e}")))?;

            page.execute(EnableParams::default())
                .await
                .map_err(|e| Error::Render(format!("network enable failed: {e}")))?;
            page.execute(SetBlockedUrLsParams {
                urls: BLOCKED_PATTERNS.iter().map(ToString::to_string).collect(),
            })
            .await
            .map_err(|e| Error::Render(format!("subresource blocking failed: {e}")))?;

            page.goto(url)
                .await
                .map_err(|e| Error::Render(format!("navigation failed: {e}")))?;
            page.wait_for_navigation()
                .await
                .map_err(|e| Error::Render(format!("network idle wait failed: {e}")))?;
            page.content()
                .await
                .map_err(|e| Error::Render(format!("content read failed: {e}")))
        }
        .await;

        // The page closes on every exit path; a leaked page keeps the
        // browser holding its renderer process.
        if let Err(e) = page.close().await {
            warn!(url, error = %e, "page close failed");
        }

        result
    }
}

#[async_trait]
impl PageSource for BrowserSource {
    async fn fetch_html(&self, url: &str) -> Result<String> {
        debug!(url, "rendering with headless browser");
        match tokio::time::timeout(RENDER_TIMEOUT, self.render(url)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(format!(
                "render exceeded {}s for {url}",
                RENDER_TIMEOUT.as_secs()
            ))),
        }
    }
}
