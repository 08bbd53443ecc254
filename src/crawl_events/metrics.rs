use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::crawl_engine::{RunOutcome, SkipReason};

/// Event bus counters using lock-free atomic operations.
#[derive(Debug, Clone, Default)]
pub struct EventBusMetrics {
    pub events_published: Arc<AtomicU64>,
    /// Published while nobody was subscribed
    pub events_dropped: Arc<AtomicU64>,
}

impl EventBusMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_published(&self) {
        self.events_published.fetch_add(1, Ordering::SeqCst);
    }

    pub fn increment_dropped(&self) {
        self.events_dropped.fetch_add(1, Ordering::SeqCst);
    }

    #[must_use]
    pub fn published(&self) -> u64 {
        self.events_published.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.events_dropped.load(Ordering::SeqCst)
    }
}

/// Per-orchestrator run counters.
///
/// Individual counter reads are atomic; use `snapshot()` for a view of all
/// counters at once.
#[derive(Debug, Default)]
pub struct RunMetrics {
    runs_started: AtomicU64,
    archived: AtomicU64,
    skipped_existing: AtomicU64,
    skipped_race: AtomicU64,
    failed: AtomicU64,
    render_attempts: AtomicU64,
    store_attempts: AtomicU64,
}

impl RunMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_started(&self) {
        self.runs_started.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_render_attempts(&self, attempts: u32) {
        self.render_attempts
            .fetch_add(u64::from(attempts), Ordering::SeqCst);
    }

    pub fn record_store_attempts(&self, attempts: u32) {
        self.store_attempts
            .fetch_add(u64::from(attempts), Ordering::SeqCst);
    }

    pub fn record_outcome(&self, outcome: &RunOutcome) {
        let counter = match outcome {
            RunOutcome::Archived => &self.archived,
            RunOutcome::Skipped {
                reason: SkipReason::AlreadyArchived,
            } => &self.skipped_existing,
            RunOutcome::Skipped {
                reason: SkipReason::LostRace,
            } => &self.skipped_race,
            RunOutcome::Failed { .. } => &self.failed,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    #[must_use]
    pub fn snapshot(&self) -> RunMetricsSnapshot {
        RunMetricsSnapshot {
            runs_started: self.runs_started.load(Ordering::SeqCst),
            archived: self.archived.load(Ordering::SeqCst),
            skipped_existing: self.skipped_existing.load(Ordering::SeqCst),
            skipped_race: self.skipped_race.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            render_attempts: self.render_attempts.load(Ordering::SeqCst),
            store_attempts: self.store_attempts.load(Ordering::SeqCst),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunMetricsSnapshot {
    pub runs_started: u64,
    pub archived: u64,
    pub skipped_existing: u64,
    pub skipped_race: u64,
    pub failed: u64,
    pub render_attempts: u64,
    pub store_attempts: u64,
}

impl RunMetricsSnapshot {
    #[must_use]
    pub fn completed(&self) -> u64 {
        self.archived + self.skipped_existing + self.skipped_race + self.failed
    }

    /// Runs started but not yet finished
    #[must_use]
    pub fn in_flight(&self) -> u64 {
        self.runs_started.saturating_sub(self.completed())
    }

    /// Fraction of completed runs that did not fail
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        let completed = self.completed();
        if completed == 0 {
            return 1.0;
        }
        (completed - self.failed) as f64 / completed as f64
    }
}
