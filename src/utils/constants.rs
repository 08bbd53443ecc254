//! Shared configuration constants for the archiver
//!
//! Default values used by the config builder and the adapters so the
//! numbers live in one place.

/// Origin the gateway mirrors and the archive keys are derived from
pub const DEFAULT_LIVE_ORIGIN: &str = "https://confidence.sh";

/// Origin the gateway itself is reachable at; outbound links are rewritten to it
pub const DEFAULT_WORKER_ORIGIN: &str = "http://localhost:8787";

/// Suffix appended to every archive key (identifies the archive format)
pub const DEFAULT_ARCHIVE_SUFFIX: &str = ".html";

/// Content type recorded for rendered pages
pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Default attempt budget for each retryable step of a run
///
/// A URL whose renderer call keeps failing is attempted exactly this many
/// times before the run is reported as failed.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// First retry delay; doubled on each further attempt
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 500;

/// Upper bound for the exponential retry delay
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 30_000;

/// Bound on a whole render (open session, navigate, serialize DOM)
pub const DEFAULT_RENDER_TIMEOUT_SECS: u64 = 60;

/// Bound on `page.goto()` and the subsequent load wait
pub const DEFAULT_NAVIGATION_TIMEOUT_SECS: u64 = 30;

/// Bound on a single archive store call
pub const DEFAULT_PERSIST_TIMEOUT_SECS: u64 = 30;

/// Bound on the live fetch the gateway answers its caller with
pub const DEFAULT_PROXY_TIMEOUT_SECS: u64 = 30;

/// Pending crawl requests buffered between `submit` and the workers
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Submits waiting on a full queue before further requests are dropped
pub const DEFAULT_MAX_DEFERRED_SUBMITS: usize = 4096;

/// Concurrent orchestration runs
pub const DEFAULT_WORKER_CONCURRENCY: usize = 4;

/// Rendered documents above this size are rejected (16 MiB)
pub const DEFAULT_MAX_CONTENT_BYTES: usize = 16 * 1024 * 1024;

/// Slug bytes kept before the digest when keys carry a digest
pub const MAX_SLUG_LEN: usize = 180;

/// Chrome user agent presented by the renderer and the proxy fetch
///
/// Chrome 132 stable. Bump alongside the managed Chromium revision.
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36";
