//! Chromium adapter (chromiumoxide)
//!
//! One browser process is shared by all renders and launched on first use.
//! Every render opens its own page and closes it again, whatever the result.

use async_trait::async_trait;
use chromiumoxide::browser::Browser;
use chromiumoxide::page::Page;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use super::{RenderError, RenderedPage, Renderer};
use crate::browser_setup::launch_browser;
use crate::config::ArchiveConfig;
use crate::crawl_engine::with_step_timeout;
use crate::utils::HTML_CONTENT_TYPE;

struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
}

/// Closes its page on drop if `close` was never reached (timeouts, panics)
struct PageGuard {
    page: Option<Page>,
    label: String,
}

impl PageGuard {
    fn new(page: Page, label: String) -> Self {
        Self {
            page: Some(page),
            label,
        }
    }

    fn page(&self) -> Option<&Page> {
        self.page.as_ref()
    }

    async fn close(mut self) {
        if let Some(page) = self.page.take()
            && let Err(e) = page.close().await
        {
            debug!("Closing page for {} failed: {e}", self.label);
        }
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        let Some(page) = self.page.take() else {
            return;
        };
        let label = std::mem::take(&mut self.label);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = page.close().await {
                    debug!("Deferred close of page for {label} failed: {e}");
                }
            });
        }
    }
}

pub struct ChromiumRenderer {
    headless: bool,
    user_data_dir: PathBuf,
    user_agent: String,
    navigation_timeout: Duration,
    session: RwLock<Option<BrowserSession>>,
}

impl ChromiumRenderer {
    #[must_use]
    pub fn new(
        headless: bool,
        user_data_dir: PathBuf,
        user_agent: impl Into<String>,
        navigation_timeout: Duration,
    ) -> Self {
        Self {
            headless,
            user_data_dir,
            user_agent: user_agent.into(),
            navigation_timeout,
            session: RwLock::new(None),
        }
    }

    /// Renderer with the profile directory from `config`, or a per-process
    /// temp directory when none is configured
    #[must_use]
    pub fn from_config(config: &ArchiveConfig) -> Self {
        let user_data_dir = config.chrome_data_dir().cloned().unwrap_or_else(|| {
            std::env::temp_dir().join(format!("autorag_chrome_{}", std::process::id()))
        });
        Self::new(
            config.headless(),
            user_data_dir,
            config.user_agent(),
            config.navigation_timeout(),
        )
    }

    /// Open a blank page, launching (or relaunching) the browser if needed
    async fn open_page(&self) -> Result<Page, RenderError> {
        {
            let session = self.session.read().await;
            if let Some(session) = session.as_ref() {
                match session.browser.new_page("about:blank").await {
                    Ok(page) => return Ok(page),
                    Err(e) => warn!("Browser refused a new page, relaunching: {e}"),
                }
            }
        }

        let mut session = self.session.write().await;
        // Another render may have relaunched while we waited for the lock.
        if let Some(current) = session.as_ref()
            && let Ok(page) = current.browser.new_page("about:blank").await
        {
            return Ok(page);
        }
        if let Some(stale) = session.take() {
            stale.handler.abort();
        }

        info!("Launching browser for rendering");
        let (browser, handler) = launch_browser(self.headless, &self.user_data_dir, &self.user_agent)
            .await
            .map_err(|e| RenderError::Browser(format!("{e:#}")))?;
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| RenderError::Browser(e.to_string()))?;
        *session = Some(BrowserSession { browser, handler });
        Ok(page)
    }

    async fn load(&self, page: &Page, url: &Url) -> Result<RenderedPage, RenderError> {
        let navigation_failed = |e: chromiumoxide::error::CdpError| RenderError::Navigation {
            url: url.to_string(),
            message: e.to_string(),
        };

        with_step_timeout(
            async { page.goto(url.as_str()).await.map_err(navigation_failed) },
            self.navigation_timeout,
            |after| RenderError::Timeout {
                operation: "navigation",
                after,
            },
        )
        .await?;

        with_step_timeout(
            async { page.wait_for_navigation().await.map_err(navigation_failed) },
            self.navigation_timeout,
            |after| RenderError::Timeout {
                operation: "page load",
                after,
            },
        )
        .await?;

        let html = page
            .content()
            .await
            .map_err(|e| RenderError::Browser(format!("reading page content: {e}")))?;

        let final_url = page
            .url()
            .await
            .ok()
            .flatten()
            .and_then(|raw| Url::parse(&raw).ok())
            .unwrap_or_else(|| url.clone());

        let document_type = match page.evaluate("document.contentType").await {
            Ok(result) => result.into_value::<String>().ok(),
            Err(e) => {
                debug!("Could not read document.contentType for {url}: {e}");
                None
            }
        };
        let content_type = match document_type.as_deref() {
            None | Some("text/html") => HTML_CONTENT_TYPE.to_string(),
            Some(other) => other.to_string(),
        };

        Ok(RenderedPage {
            html,
            final_url,
            content_type,
        })
    }

    /// Close the browser and remove its profile directory
    ///
    /// Safe to call more than once; the next render launches a new browser.
    pub async fn shutdown(&self) {
        let Some(mut session) = self.session.write().await.take() else {
            return;
        };

        if let Err(e) = session.browser.close().await {
            warn!("Failed to close browser cleanly: {e}");
        }
        if let Err(e) = session.browser.wait().await {
            warn!("Failed to wait for browser exit: {e}");
        }
        session.handler.abort();

        if let Err(e) = tokio::fs::remove_dir_all(&self.user_data_dir).await {
            debug!(
                "Could not remove browser profile {}: {e}",
                self.user_data_dir.display()
            );
        }
        info!("Browser shut down");
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn render(&self, url: &Url) -> Result<RenderedPage, RenderError> {
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(RenderError::InvalidUrl(url.to_string()));
        }

        let guard = PageGuard::new(self.open_page().await?, url.to_string());
        let result = match guard.page() {
            Some(page) => self.load(page, url).await,
            None => Err(RenderError::Browser("page already closed".into())),
        };
        guard.close().await;

        match &result {
            Ok(page) => debug!("Rendered {url} ({} bytes)", page.len()),
            Err(e) => debug!("Render of {url} failed: {e}"),
        }
        result
    }
}
