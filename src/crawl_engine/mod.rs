//! Crawl Engine Module
//!
//! The per-URL archive run: its state machine, the bounded step runner it
//! executes steps with, and the orchestrator tying renderer and store
//! together.

// Sub-modules
pub mod crawl_types;
pub mod orchestrator;
pub mod single_flight;
pub mod step_runner;
pub mod timeout;

// Re-export crawl types
pub use crawl_types::{
    CrawlPhase, CrawlRequest, CrawlRun, FailureReason, RunOutcome, SkipReason,
};

pub use orchestrator::CrawlOrchestrator;
pub use single_flight::{FlightClaim, FlightGroup};
pub use step_runner::{RetryPolicy, Retryable, StepFailure, StepSuccess, run_step};
pub use timeout::with_step_timeout;
