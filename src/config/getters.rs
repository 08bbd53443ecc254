//! Getter methods for `ArchiveConfig`

use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use super::types::ArchiveConfig;
use crate::crawl_engine::RetryPolicy;
use crate::fingerprint::{Fingerprinter, KeyPolicy};

impl ArchiveConfig {
    #[must_use]
    pub fn live_origin(&self) -> &Url {
        &self.live_origin
    }

    #[must_use]
    pub fn worker_origin(&self) -> &Url {
        &self.worker_origin
    }

    #[must_use]
    pub fn archive_dir(&self) -> &PathBuf {
        &self.archive_dir
    }

    #[must_use]
    pub fn archive_suffix(&self) -> &str {
        &self.archive_suffix
    }

    #[must_use]
    pub fn key_policy(&self) -> KeyPolicy {
        self.key_policy
    }

    #[must_use]
    pub fn compress_archives(&self) -> bool {
        self.compress_archives
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn headless(&self) -> bool {
        self.headless
    }

    #[must_use]
    pub fn chrome_data_dir(&self) -> Option<&PathBuf> {
        self.chrome_data_dir.as_ref()
    }

    #[must_use]
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    #[must_use]
    pub fn max_deferred_submits(&self) -> usize {
        self.max_deferred_submits
    }

    #[must_use]
    pub fn worker_concurrency(&self) -> usize {
        self.worker_concurrency
    }

    #[must_use]
    pub fn max_content_bytes(&self) -> usize {
        self.max_content_bytes
    }

    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    #[must_use]
    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }

    #[must_use]
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    #[must_use]
    pub fn persist_timeout(&self) -> Duration {
        Duration::from_secs(self.persist_timeout_secs)
    }

    #[must_use]
    pub fn proxy_timeout(&self) -> Duration {
        Duration::from_secs(self.proxy_timeout_secs)
    }

    /// Retry policy applied to every retryable step of a run
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.retry_base_delay_ms),
            Duration::from_millis(self.retry_max_delay_ms),
        )
    }

    /// Fingerprinter honoring the configured suffix and key policy
    #[must_use]
    pub fn fingerprinter(&self) -> Fingerprinter {
        Fingerprinter::new(self.archive_suffix.clone(), self.key_policy)
    }
}
