//! JSON configuration file support
//!
//! Every field is optional; whatever is present overrides the builder
//! defaults, and command-line flags override the file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::builder::ArchiveConfigBuilder;
use crate::fingerprint::KeyPolicy;

/// On-disk shape of the configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub live_origin: Option<String>,
    pub worker_origin: Option<String>,
    pub archive_dir: Option<PathBuf>,
    pub archive_suffix: Option<String>,
    pub key_policy: Option<KeyPolicy>,
    pub compress_archives: Option<bool>,
    pub max_attempts: Option<u32>,
    pub retry_base_delay_ms: Option<u64>,
    pub retry_max_delay_ms: Option<u64>,
    pub render_timeout_secs: Option<u64>,
    pub navigation_timeout_secs: Option<u64>,
    pub persist_timeout_secs: Option<u64>,
    pub proxy_timeout_secs: Option<u64>,
    pub headless: Option<bool>,
    pub chrome_data_dir: Option<PathBuf>,
    pub queue_capacity: Option<usize>,
    pub max_deferred_submits: Option<usize>,
    pub worker_concurrency: Option<usize>,
    pub max_content_bytes: Option<usize>,
    pub user_agent: Option<String>,
}

impl ConfigFile {
    /// Load a configuration file from disk
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or is not valid JSON for this shape.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Apply the optional (non-origin) settings onto a builder
    #[must_use]
    pub fn apply<S>(&self, mut builder: ArchiveConfigBuilder<S>) -> ArchiveConfigBuilder<S> {
        if let Some(suffix) = &self.archive_suffix {
            builder = builder.archive_suffix(suffix.clone());
        }
        if let Some(policy) = self.key_policy {
            builder = builder.key_policy(policy);
        }
        if let Some(compress) = self.compress_archives {
            builder = builder.compress_archives(compress);
        }
        if let Some(attempts) = self.max_attempts {
            builder = builder.max_attempts(attempts);
        }
        if self.retry_base_delay_ms.is_some() || self.retry_max_delay_ms.is_some() {
            let base = self.retry_base_delay_ms.unwrap_or(builder.retry_base_delay_ms);
            let max = self.retry_max_delay_ms.unwrap_or(builder.retry_max_delay_ms);
            builder = builder.retry_delays_ms(base, max);
        }
        if let Some(secs) = self.render_timeout_secs {
            builder = builder.render_timeout_secs(secs);
        }
        if let Some(secs) = self.navigation_timeout_secs {
            builder = builder.navigation_timeout_secs(secs);
        }
        if let Some(secs) = self.persist_timeout_secs {
            builder = builder.persist_timeout_secs(secs);
        }
        if let Some(secs) = self.proxy_timeout_secs {
            builder = builder.proxy_timeout_secs(secs);
        }
        if let Some(headless) = self.headless {
            builder = builder.headless(headless);
        }
        if self.chrome_data_dir.is_some() {
            builder = builder.chrome_data_dir(self.chrome_data_dir.clone());
        }
        if let Some(capacity) = self.queue_capacity {
            builder = builder.queue_capacity(capacity);
        }
        if let Some(max) = self.max_deferred_submits {
            builder = builder.max_deferred_submits(max);
        }
        if let Some(workers) = self.worker_concurrency {
            builder = builder.worker_concurrency(workers);
        }
        if let Some(bytes) = self.max_content_bytes {
            builder = builder.max_content_bytes(bytes);
        }
        if let Some(user_agent) = &self.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        builder
    }
}
