//! Core types for orchestration runs.
//!
//! This module contains the request handed from the gateway to the workers,
//! the per-run state machine (`CrawlPhase`/`CrawlRun`) and the terminal
//! `RunOutcome` every run reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;
use uuid::Uuid;

use crate::fingerprint::Fingerprint;

/// A request to archive one URL, created per dispatch and consumed once
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlRequest {
    pub url: Url,
    pub requested_at: DateTime<Utc>,
}

impl CrawlRequest {
    #[must_use]
    pub fn new(url: Url) -> Self {
        Self {
            url,
            requested_at: Utc::now(),
        }
    }
}

/// Phases of one orchestration run
///
/// `Checking → {Skipped | Rendering} → Persisting → {Done | Skipped}`, with
/// `Failed` reachable from every non-terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CrawlPhase {
    Checking,
    Rendering,
    Persisting,
    Done,
    Skipped,
    Failed,
}

impl CrawlPhase {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Skipped | Self::Failed)
    }

    /// Whether the state machine allows moving from `self` to `next`
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Checking, Self::Rendering | Self::Skipped)
            | (Self::Rendering, Self::Persisting)
            | (Self::Persisting, Self::Done | Self::Skipped) => true,
            (current, Self::Failed) => !current.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Checking => "CHECKING",
            Self::Rendering => "RENDERING",
            Self::Persisting => "PERSISTING",
            Self::Done => "DONE",
            Self::Skipped => "SKIPPED",
            Self::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Ephemeral state of one orchestration attempt
#[derive(Debug, Clone)]
pub struct CrawlRun {
    pub id: Uuid,
    pub fingerprint: Fingerprint,
    pub phase: CrawlPhase,
    /// Step attempts made so far across all phases of this run
    pub attempts: u32,
}

impl CrawlRun {
    #[must_use]
    pub fn new(fingerprint: Fingerprint) -> Self {
        Self {
            id: Uuid::new_v4(),
            fingerprint,
            phase: CrawlPhase::Checking,
            attempts: 0,
        }
    }

    /// Move to `next`, returning the phase left behind
    ///
    /// Illegal transitions are a programming error; they trip a debug
    /// assertion and are otherwise applied as requested.
    pub fn advance(&mut self, next: CrawlPhase) -> CrawlPhase {
        debug_assert!(
            self.phase.can_transition_to(next),
            "illegal run transition {} -> {next}",
            self.phase
        );
        std::mem::replace(&mut self.phase, next)
    }
}

/// Why a run ended without archiving
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The store already held a record at CHECKING time
    AlreadyArchived,
    /// Another run created the record between our check and our write
    LostRace,
}

/// Details of an unrecoverable run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReason {
    /// Phase the run was in when it gave up
    pub phase: CrawlPhase,
    /// Attempts spent on the failing step
    pub attempts: u32,
    /// `true` when the retry budget ran out, `false` for a permanent error
    pub exhausted: bool,
    pub message: String,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.exhausted {
            "retry budget exhausted"
        } else {
            "permanent failure"
        };
        write!(
            f,
            "{} during {} after {} attempt(s): {}",
            kind, self.phase, self.attempts, self.message
        )
    }
}

/// Terminal result of `orchestrate`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    Archived,
    Skipped { reason: SkipReason },
    Failed { reason: FailureReason },
}

impl RunOutcome {
    /// Archived and skipped runs both leave exactly one record behind
    #[must_use]
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    #[must_use]
    pub fn is_archived(&self) -> bool {
        matches!(self, Self::Archived)
    }

    #[must_use]
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }

    #[must_use]
    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            Self::Failed { reason } => Some(reason),
            _ => None,
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Archived => f.write_str("archived"),
            Self::Skipped {
                reason: SkipReason::AlreadyArchived,
            } => f.write_str("skipped (already archived)"),
            Self::Skipped {
                reason: SkipReason::LostRace,
            } => f.write_str("skipped (archived concurrently)"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_transitions() {
        use CrawlPhase::*;
        assert!(Checking.can_transition_to(Rendering));
        assert!(Checking.can_transition_to(Skipped));
        assert!(Rendering.can_transition_to(Persisting));
        assert!(Persisting.can_transition_to(Done));
        assert!(Persisting.can_transition_to(Skipped));
        assert!(Rendering.can_transition_to(Failed));

        assert!(!Checking.can_transition_to(Persisting));
        assert!(!Rendering.can_transition_to(Skipped));
        assert!(!Done.can_transition_to(Failed));
        assert!(!Skipped.can_transition_to(Rendering));
    }

    #[test]
    fn outcome_serializes_tagged() {
        let outcome = RunOutcome::Skipped {
            reason: SkipReason::LostRace,
        };
        let json = serde_json::to_value(&outcome).expect("serialize");
        assert_eq!(json["outcome"], "skipped");
        assert_eq!(json["reason"], "lost_race");
    }
}
