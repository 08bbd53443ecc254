//! Run lifecycle events and counters
//!
//! The gateway and orchestrator publish onto a `CrawlEventBus`; observers
//! (the CLI, tests) subscribe to learn the outcome of fire-and-forget work.

pub mod bus;
pub mod errors;
pub mod metrics;
pub mod types;

pub use bus::{CrawlEventBus, DEFAULT_EVENT_CAPACITY, next_event};
pub use errors::EventBusError;
pub use metrics::{EventBusMetrics, RunMetrics, RunMetricsSnapshot};
pub use types::{CrawlEvent, ShutdownReason};
