//! Type-safe builder for `ArchiveConfig` using the typestate pattern
//!
//! The live origin, worker origin and archive directory are required and must
//! be supplied in that order; `build()` only exists once all three are set.

use anyhow::{Result, anyhow, bail};
use std::marker::PhantomData;
use std::path::PathBuf;
use url::Url;

use super::types::ArchiveConfig;
use crate::fingerprint::KeyPolicy;
use crate::utils::{
    CHROME_USER_AGENT, DEFAULT_ARCHIVE_SUFFIX, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_CONTENT_BYTES,
    DEFAULT_NAVIGATION_TIMEOUT_SECS, DEFAULT_PERSIST_TIMEOUT_SECS, DEFAULT_PROXY_TIMEOUT_SECS,
    DEFAULT_MAX_DEFERRED_SUBMITS, DEFAULT_QUEUE_CAPACITY, DEFAULT_RENDER_TIMEOUT_SECS, DEFAULT_RETRY_BASE_DELAY_MS,
    DEFAULT_RETRY_MAX_DELAY_MS, DEFAULT_WORKER_CONCURRENCY,
};

/// Parse an origin string, adding `https://` when no scheme is present
fn parse_origin(raw: &str, what: &str) -> Result<Url> {
    let normalized = if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };

    let url = Url::parse(&normalized).map_err(|e| anyhow!("Invalid {what} '{raw}': {e}"))?;
    if url.host_str().is_none() {
        bail!("Invalid {what} '{raw}': no host");
    }
    if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
        bail!("Invalid {what} '{raw}': an origin must not carry a path, query or fragment");
    }
    Ok(url)
}

// Type states for the builder
pub struct WithLiveOrigin;
pub struct WithWorkerOrigin;
pub struct Complete;

pub struct ArchiveConfigBuilder<State = ()> {
    pub(crate) live_origin: Option<String>,
    pub(crate) worker_origin: Option<String>,
    pub(crate) archive_dir: Option<PathBuf>,
    pub(crate) archive_suffix: String,
    pub(crate) key_policy: KeyPolicy,
    pub(crate) compress_archives: bool,
    pub(crate) max_attempts: u32,
    pub(crate) retry_base_delay_ms: u64,
    pub(crate) retry_max_delay_ms: u64,
    pub(crate) render_timeout_secs: u64,
    pub(crate) navigation_timeout_secs: u64,
    pub(crate) persist_timeout_secs: u64,
    pub(crate) proxy_timeout_secs: u64,
    pub(crate) headless: bool,
    pub(crate) chrome_data_dir: Option<PathBuf>,
    pub(crate) queue_capacity: usize,
    pub(crate) max_deferred_submits: usize,
    pub(crate) worker_concurrency: usize,
    pub(crate) max_content_bytes: usize,
    pub(crate) user_agent: String,
    pub(crate) _phantom: PhantomData<State>,
}

impl Default for ArchiveConfigBuilder<()> {
    fn default() -> Self {
        Self {
            live_origin: None,
            worker_origin: None,
            archive_dir: None,
            archive_suffix: DEFAULT_ARCHIVE_SUFFIX.to_string(),
            key_policy: KeyPolicy::default(),
            compress_archives: false,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            retry_max_delay_ms: DEFAULT_RETRY_MAX_DELAY_MS,
            render_timeout_secs: DEFAULT_RENDER_TIMEOUT_SECS,
            navigation_timeout_secs: DEFAULT_NAVIGATION_TIMEOUT_SECS,
            persist_timeout_secs: DEFAULT_PERSIST_TIMEOUT_SECS,
            proxy_timeout_secs: DEFAULT_PROXY_TIMEOUT_SECS,
            headless: true,
            chrome_data_dir: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_deferred_submits: DEFAULT_MAX_DEFERRED_SUBMITS,
            worker_concurrency: DEFAULT_WORKER_CONCURRENCY,
            max_content_bytes: DEFAULT_MAX_CONTENT_BYTES,
            user_agent: CHROME_USER_AGENT.to_string(),
            _phantom: PhantomData,
        }
    }
}

impl ArchiveConfig {
    /// Create a builder for configuring an `ArchiveConfig` with a fluent interface
    #[must_use]
    pub fn builder() -> ArchiveConfigBuilder<()> {
        ArchiveConfigBuilder::default()
    }
}

impl<State> ArchiveConfigBuilder<State> {
    fn into_state<Next>(self) -> ArchiveConfigBuilder<Next> {
        ArchiveConfigBuilder {
            live_origin: self.live_origin,
            worker_origin: self.worker_origin,
            archive_dir: self.archive_dir,
            archive_suffix: self.archive_suffix,
            key_policy: self.key_policy,
            compress_archives: self.compress_archives,
            max_attempts: self.max_attempts,
            retry_base_delay_ms: self.retry_base_delay_ms,
            retry_max_delay_ms: self.retry_max_delay_ms,
            render_timeout_secs: self.render_timeout_secs,
            navigation_timeout_secs: self.navigation_timeout_secs,
            persist_timeout_secs: self.persist_timeout_secs,
            proxy_timeout_secs: self.proxy_timeout_secs,
            headless: self.headless,
            chrome_data_dir: self.chrome_data_dir,
            queue_capacity: self.queue_capacity,
            max_deferred_submits: self.max_deferred_submits,
            worker_concurrency: self.worker_concurrency,
            max_content_bytes: self.max_content_bytes,
            user_agent: self.user_agent,
            _phantom: PhantomData,
        }
    }

    #[must_use]
    pub fn archive_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.archive_suffix = suffix.into();
        self
    }

    #[must_use]
    pub fn key_policy(mut self, policy: KeyPolicy) -> Self {
        self.key_policy = policy;
        self
    }

    #[must_use]
    pub fn compress_archives(mut self, compress: bool) -> Self {
        self.compress_archives = compress;
        self
    }

    #[must_use]
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    #[must_use]
    pub fn retry_delays_ms(mut self, base: u64, max: u64) -> Self {
        self.retry_base_delay_ms = base;
        self.retry_max_delay_ms = max;
        self
    }

    #[must_use]
    pub fn render_timeout_secs(mut self, secs: u64) -> Self {
        self.render_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn navigation_timeout_secs(mut self, secs: u64) -> Self {
        self.navigation_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn persist_timeout_secs(mut self, secs: u64) -> Self {
        self.persist_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn proxy_timeout_secs(mut self, secs: u64) -> Self {
        self.proxy_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    #[must_use]
    pub fn chrome_data_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.chrome_data_dir = dir;
        self
    }

    #[must_use]
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Cap on submits parked behind a full queue (0 drops them immediately)
    #[must_use]
    pub fn max_deferred_submits(mut self, max: usize) -> Self {
        self.max_deferred_submits = max;
        self
    }

    #[must_use]
    pub fn worker_concurrency(mut self, workers: usize) -> Self {
        self.worker_concurrency = workers;
        self
    }

    #[must_use]
    pub fn max_content_bytes(mut self, bytes: usize) -> Self {
        self.max_content_bytes = bytes;
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

impl ArchiveConfigBuilder<()> {
    pub fn live_origin(mut self, origin: impl Into<String>) -> ArchiveConfigBuilder<WithLiveOrigin> {
        self.live_origin = Some(origin.into());
        self.into_state()
    }
}

impl ArchiveConfigBuilder<WithLiveOrigin> {
    pub fn worker_origin(
        mut self,
        origin: impl Into<String>,
    ) -> ArchiveConfigBuilder<WithWorkerOrigin> {
        self.worker_origin = Some(origin.into());
        self.into_state()
    }
}

impl ArchiveConfigBuilder<WithWorkerOrigin> {
    pub fn archive_dir(mut self, dir: impl Into<PathBuf>) -> ArchiveConfigBuilder<Complete> {
        self.archive_dir = Some(dir.into());
        self.into_state()
    }
}

impl ArchiveConfigBuilder<Complete> {
    /// Validate and build the configuration
    ///
    /// # Errors
    ///
    /// Returns an error when an origin is malformed, the archive suffix is not
    /// a filesystem-safe extension, or a numeric limit is zero.
    pub fn build(self) -> Result<ArchiveConfig> {
        let live_origin = parse_origin(
            self.live_origin.as_deref().unwrap_or_default(),
            "live origin",
        )?;
        let worker_origin = parse_origin(
            self.worker_origin.as_deref().unwrap_or_default(),
            "worker origin",
        )?;

        let archive_dir = self
            .archive_dir
            .ok_or_else(|| anyhow!("Archive directory is required"))?;
        let archive_dir = if archive_dir.is_absolute() {
            archive_dir
        } else {
            std::env::current_dir()
                .map_err(|e| anyhow!("Failed to resolve current directory: {e}"))?
                .join(archive_dir)
        };

        let suffix_ok = self.archive_suffix.len() > 1
            && self.archive_suffix.starts_with('.')
            && self.archive_suffix[1..]
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.');
        if !suffix_ok {
            bail!(
                "Invalid archive suffix '{}': expected something like '.html'",
                self.archive_suffix
            );
        }

        if self.max_attempts == 0 {
            bail!("max_attempts must be at least 1");
        }
        if self.retry_base_delay_ms > self.retry_max_delay_ms {
            bail!(
                "retry base delay ({}ms) exceeds the maximum delay ({}ms)",
                self.retry_base_delay_ms,
                self.retry_max_delay_ms
            );
        }
        if self.queue_capacity == 0 {
            bail!("queue_capacity must be at least 1");
        }
        if !(1..=256).contains(&self.worker_concurrency) {
            bail!(
                "worker_concurrency must be between 1 and 256, got {}",
                self.worker_concurrency
            );
        }
        if self.max_content_bytes == 0 {
            bail!("max_content_bytes must be greater than zero");
        }
        if self.render_timeout_secs == 0
            || self.navigation_timeout_secs == 0
            || self.persist_timeout_secs == 0
            || self.proxy_timeout_secs == 0
        {
            bail!("timeouts must be at least one second");
        }

        Ok(ArchiveConfig {
            live_origin,
            worker_origin,
            archive_dir,
            archive_suffix: self.archive_suffix,
            key_policy: self.key_policy,
            compress_archives: self.compress_archives,
            max_attempts: self.max_attempts,
            retry_base_delay_ms: self.retry_base_delay_ms,
            retry_max_delay_ms: self.retry_max_delay_ms,
            render_timeout_secs: self.render_timeout_secs,
            navigation_timeout_secs: self.navigation_timeout_secs,
            persist_timeout_secs: self.persist_timeout_secs,
            proxy_timeout_secs: self.proxy_timeout_secs,
            headless: self.headless,
            chrome_data_dir: self.chrome_data_dir,
            queue_capacity: self.queue_capacity,
            max_deferred_submits: self.max_deferred_submits,
            worker_concurrency: self.worker_concurrency,
            max_content_bytes: self.max_content_bytes,
            user_agent: self.user_agent,
        })
    }
}
