//! Test utilities shared by the autorag_crawler integration tests

use async_trait::async_trait;
use autorag_crawler::archive_store::{
    ArchiveRecord, ArchiveStore, InMemoryArchiveStore, PutOutcome, StoreError,
};
use autorag_crawler::config::{ArchiveConfig, ArchiveConfigBuilder, Complete};
use autorag_crawler::fingerprint::Fingerprint;
use autorag_crawler::renderer::{RenderError, RenderedPage, Renderer};
use mockito::{Mock, Server};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use url::Url;

/// Configuration with immediate retries and short timeouts
#[allow(dead_code)]
pub fn test_config(archive_dir: &Path) -> ArchiveConfig {
    test_config_with(archive_dir, "https://confidence.sh", |builder| builder)
}

#[allow(dead_code)]
pub fn test_config_with(
    archive_dir: &Path,
    live_origin: &str,
    customize: impl FnOnce(ArchiveConfigBuilder<Complete>) -> ArchiveConfigBuilder<Complete>,
) -> ArchiveConfig {
    let builder = ArchiveConfig::builder()
        .live_origin(live_origin)
        .worker_origin("http://localhost:8787")
        .archive_dir(archive_dir)
        .max_attempts(3)
        .retry_delays_ms(0, 0)
        .render_timeout_secs(5)
        .persist_timeout_secs(5);
    customize(builder)
        .build()
        .expect("Failed to create test config")
}

#[allow(dead_code)]
pub fn url(raw: &str) -> Url {
    Url::parse(raw).expect("test URL")
}

/// HTML the scripted renderer produces for `url`
#[allow(dead_code)]
pub fn rendered_html(url: &Url) -> String {
    format!("<!DOCTYPE html><html><head><title>{url}</title></head><body>{url}</body></html>")
}

/// Renderer that replays scripted results, then renders successfully
///
/// Every call is counted and the requested URL recorded.
#[derive(Default)]
pub struct ScriptedRenderer {
    calls: AtomicU32,
    requested: Mutex<Vec<Url>>,
    script: Mutex<VecDeque<Result<String, RenderError>>>,
    fallback_error: Option<RenderError>,
    delay: Duration,
}

#[allow(dead_code)]
impl ScriptedRenderer {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn always_failing(error: RenderError) -> Self {
        Self {
            fallback_error: Some(error),
            ..Self::default()
        }
    }

    pub fn scripted(results: Vec<Result<String, RenderError>>) -> Self {
        Self {
            script: Mutex::new(results.into()),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requested(&self) -> Vec<Url> {
        self.requested.lock().clone()
    }
}

#[async_trait]
impl Renderer for ScriptedRenderer {
    async fn render(&self, url: &Url) -> Result<RenderedPage, RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().push(url.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let scripted = self.script.lock().pop_front();
        let html = match scripted {
            Some(result) => result?,
            None => match &self.fallback_error {
                Some(error) => return Err(error.clone()),
                None => rendered_html(url),
            },
        };

        Ok(RenderedPage {
            html,
            final_url: url.clone(),
            content_type: "text/html; charset=utf-8".to_string(),
        })
    }
}

/// In-memory store wrapper with call counters and fault injection
#[derive(Default)]
pub struct InstrumentedStore {
    pub inner: Arc<InMemoryArchiveStore>,
    heads: AtomicU32,
    puts: AtomicU32,
    failing_heads: AtomicU32,
    hold_puts: bool,
    put_entered: Notify,
}

#[allow(dead_code)]
impl InstrumentedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Share `inner` with other stores (a restarted process sees the same data)
    pub fn over(inner: Arc<InMemoryArchiveStore>) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    /// Fail the next `count` `head` calls with an I/O error
    pub fn failing_heads(self, count: u32) -> Self {
        self.failing_heads.store(count, Ordering::SeqCst);
        self
    }

    /// Never complete a `put_if_absent`; simulates a crash mid-write
    pub fn holding_puts(mut self) -> Self {
        self.hold_puts = true;
        self
    }

    pub fn heads(&self) -> u32 {
        self.heads.load(Ordering::SeqCst)
    }

    pub fn puts(&self) -> u32 {
        self.puts.load(Ordering::SeqCst)
    }

    /// Resolves once a held `put_if_absent` has started
    pub async fn put_started(&self) {
        self.put_entered.notified().await;
    }
}

#[async_trait]
impl ArchiveStore for InstrumentedStore {
    async fn head(&self, key: &Fingerprint) -> Result<bool, StoreError> {
        self.heads.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failing_heads.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_heads.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::Io {
                key: key.to_string(),
                source: std::io::Error::other("injected head failure"),
            });
        }
        self.inner.head(key).await
    }

    async fn put_if_absent(
        &self,
        key: &Fingerprint,
        content: &[u8],
        content_type: &str,
    ) -> Result<PutOutcome, StoreError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.hold_puts {
            self.put_entered.notify_one();
            std::future::pending::<()>().await;
        }
        self.inner.put_if_absent(key, content, content_type).await
    }

    async fn get(&self, key: &Fingerprint) -> Result<Option<ArchiveRecord>, StoreError> {
        self.inner.get(key).await
    }
}

/// Creates a mock endpoint that returns HTML content
#[allow(dead_code)]
pub async fn create_html_mock(server: &mut Server, path: &str, html: &str) -> Mock {
    server
        .mock("GET", path)
        .with_status(200)
        .with_header("content-type", "text/html; charset=utf-8")
        .with_body(html)
        .create_async()
        .await
}
