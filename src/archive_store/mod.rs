//! Archive store capability
//!
//! The store is the only shared mutable resource of the crawler and its
//! conditional write is the only cross-run synchronization point: whatever
//! the backend, `put_if_absent` must behave as an atomic "insert if absent"
//! and report a collision instead of overwriting.

mod compression;
mod fs_store;
mod http_store;
mod memory;

pub use compression::{ArchiveMetadata, sanitize_content_type};
pub use fs_store::FsArchiveStore;
pub use http_store::HttpArchiveStore;
pub use memory::InMemoryArchiveStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::crawl_engine::Retryable;
use crate::fingerprint::Fingerprint;

/// An archived page; immutable once created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveRecord {
    pub fingerprint: Fingerprint,
    pub content: Vec<u8>,
    pub content_type: String,
    pub archived_at: DateTime<Utc>,
}

/// Result of a conditional write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Created,
    AlreadyExists,
}

/// Errors reported by archive store adapters
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on archive key {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("archive key {0:?} is not a valid object name")]
    InvalidKey(String),

    #[error("archive store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("archive store returned HTTP {status} for {key}")]
    UnexpectedStatus { status: u16, key: String },

    #[error("archive record {key} is unreadable: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("archive store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("archive store background task failed: {0}")]
    Task(String),
}

impl StoreError {
    pub(crate) fn io(key: &str, source: std::io::Error) -> Self {
        Self::Io {
            key: key.to_string(),
            source,
        }
    }
}

impl Retryable for StoreError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Io { .. } | Self::Http(_) | Self::Timeout(_) | Self::Task(_) => true,
            Self::UnexpectedStatus { status, .. } => *status >= 500 || *status == 429,
            Self::InvalidKey(_) | Self::Corrupt { .. } => false,
        }
    }
}

/// Content-addressed durable storage keyed by fingerprint
#[async_trait]
pub trait ArchiveStore: Send + Sync {
    /// Whether a record exists for `key`
    async fn head(&self, key: &Fingerprint) -> Result<bool, StoreError>;

    /// Create the record for `key` unless one already exists
    ///
    /// Must be atomic with respect to concurrent callers: of any number of
    /// racing writers for one key, exactly one observes `Created`.
    async fn put_if_absent(
        &self,
        key: &Fingerprint,
        content: &[u8],
        content_type: &str,
    ) -> Result<PutOutcome, StoreError>;

    /// Read a record back
    async fn get(&self, key: &Fingerprint) -> Result<Option<ArchiveRecord>, StoreError>;
}

/// Reject keys that could escape a directory or object prefix
pub(crate) fn validate_key(key: &Fingerprint) -> Result<&str, StoreError> {
    let raw = key.as_str();
    let ok = !raw.is_empty()
        && raw != "."
        && raw != ".."
        && !raw.starts_with('.')
        && raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        Ok(raw)
    } else {
        Err(StoreError::InvalidKey(raw.to_string()))
    }
}
