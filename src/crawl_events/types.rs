//! Event type definitions for run lifecycle reporting
//!
//! Archival is fire-and-forget from the caller's point of view; these events
//! are how outcomes become observable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;
use uuid::Uuid;

use crate::crawl_engine::{CrawlPhase, RunOutcome};
use crate::fingerprint::Fingerprint;

/// Reason for event bus shutdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShutdownReason {
    /// All submitted work has drained
    Drained,
    Error(String),
    Cancelled,
}

/// Events emitted while requests are dispatched and runs progress
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CrawlEvent {
    /// A request was accepted onto the dispatch queue
    RequestQueued {
        url: Url,
        timestamp: DateTime<Utc>,
    },
    /// A request could not be turned into a run
    RequestDropped {
        url: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    RunStarted {
        run_id: Uuid,
        url: Url,
        fingerprint: Fingerprint,
        timestamp: DateTime<Utc>,
    },
    PhaseChanged {
        run_id: Uuid,
        fingerprint: Fingerprint,
        from: CrawlPhase,
        to: CrawlPhase,
        timestamp: DateTime<Utc>,
    },
    RunCompleted {
        run_id: Uuid,
        url: Url,
        fingerprint: Fingerprint,
        outcome: RunOutcome,
        attempts: u32,
        duration: Duration,
        timestamp: DateTime<Utc>,
    },
    /// Subscribers should exit their event loops when receiving this event.
    Shutdown {
        reason: ShutdownReason,
        timestamp: DateTime<Utc>,
    },
}

/// Helper functions for creating common events
impl CrawlEvent {
    #[must_use]
    pub fn request_queued(url: Url) -> Self {
        Self::RequestQueued {
            url,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn request_dropped(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RequestDropped {
            url: url.into(),
            reason: reason.into(),
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn run_started(run_id: Uuid, url: Url, fingerprint: Fingerprint) -> Self {
        Self::RunStarted {
            run_id,
            url,
            fingerprint,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn phase_changed(
        run_id: Uuid,
        fingerprint: Fingerprint,
        from: CrawlPhase,
        to: CrawlPhase,
    ) -> Self {
        Self::PhaseChanged {
            run_id,
            fingerprint,
            from,
            to,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn run_completed(
        run_id: Uuid,
        url: Url,
        fingerprint: Fingerprint,
        outcome: RunOutcome,
        attempts: u32,
        duration: Duration,
    ) -> Self {
        Self::RunCompleted {
            run_id,
            url,
            fingerprint,
            outcome,
            attempts,
            duration,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn shutdown(reason: ShutdownReason) -> Self {
        Self::Shutdown {
            reason,
            timestamp: Utc::now(),
        }
    }

    /// Run the event belongs to, if any
    #[must_use]
    pub fn run_id(&self) -> Option<Uuid> {
        match self {
            Self::RunStarted { run_id, .. }
            | Self::PhaseChanged { run_id, .. }
            | Self::RunCompleted { run_id, .. } => Some(*run_id),
            _ => None,
        }
    }

    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::RequestQueued { timestamp, .. }
            | Self::RequestDropped { timestamp, .. }
            | Self::RunStarted { timestamp, .. }
            | Self::PhaseChanged { timestamp, .. }
            | Self::RunCompleted { timestamp, .. }
            | Self::Shutdown { timestamp, .. } => *timestamp,
        }
    }
}
