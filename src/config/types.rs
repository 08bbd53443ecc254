//! Core configuration types for the archiver
//!
//! `ArchiveConfig` replaces the compiled-in origin constants of a typical
//! single-site worker: everything the gateway, orchestrator and adapters need
//! is passed in at construction time.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

use crate::fingerprint::KeyPolicy;

/// Main configuration struct for mirroring and archiving
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Origin being mirrored; canonical URLs and archive keys use it.
    pub(crate) live_origin: Url,

    /// Origin the gateway is reachable at. Links in proxied HTML that point
    /// at the live origin are rewritten to this one.
    pub(crate) worker_origin: Url,

    /// Root directory of the filesystem archive store.
    ///
    /// **INVARIANT:** Always an absolute path (normalized in builder).
    pub(crate) archive_dir: PathBuf,

    /// Fixed suffix identifying the archive format (default `.html`)
    pub(crate) archive_suffix: String,

    pub(crate) key_policy: KeyPolicy,

    /// Gzip archived pages (`<key>.gz`, metadata in the gzip header comment)
    pub(crate) compress_archives: bool,

    /// Attempt budget per retryable step (check, render, persist)
    ///
    /// Default: 3
    pub(crate) max_attempts: u32,

    /// First retry delay in milliseconds, doubled per attempt
    pub(crate) retry_base_delay_ms: u64,

    /// Cap on the retry delay in milliseconds
    pub(crate) retry_max_delay_ms: u64,

    /// Timeout in seconds for one whole render call
    ///
    /// Default: 60 seconds
    pub(crate) render_timeout_secs: u64,

    /// Timeout in seconds for `page.goto()` and the load wait that follows
    ///
    /// Prevents hangs on slow DNS, long-polling pages or infinite JS loops.
    ///
    /// Default: 30 seconds
    pub(crate) navigation_timeout_secs: u64,

    /// Timeout in seconds for each archive store call
    pub(crate) persist_timeout_secs: u64,

    /// Timeout in seconds for the gateway's live fetch
    pub(crate) proxy_timeout_secs: u64,

    pub(crate) headless: bool,

    /// Chrome user data directory; a per-process temp dir when unset
    pub(crate) chrome_data_dir: Option<PathBuf>,

    /// Capacity of the submit channel between gateway and workers
    pub(crate) queue_capacity: usize,

    /// Submits allowed to wait on a full queue; beyond this they are dropped
    pub(crate) max_deferred_submits: usize,

    /// Maximum concurrent orchestration runs
    pub(crate) worker_concurrency: usize,

    /// Rendered documents larger than this are rejected without retry
    pub(crate) max_content_bytes: usize,

    pub(crate) user_agent: String,
}
