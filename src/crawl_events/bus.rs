//! Broadcast bus for run lifecycle events
//!
//! Publishing never blocks: the channel drops the oldest buffered event when
//! full, and slow receivers see `ReceiverLagged`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Notify, broadcast};

use super::errors::EventBusError;
use super::metrics::EventBusMetrics;
use super::types::{CrawlEvent, ShutdownReason};

/// Default number of events buffered per receiver
pub const DEFAULT_EVENT_CAPACITY: usize = 1000;

/// Event bus shared by the gateway, orchestrator and observers
///
/// Clones share one channel, metrics and shutdown signal.
#[derive(Debug, Clone)]
pub struct CrawlEventBus {
    sender: broadcast::Sender<CrawlEvent>,
    metrics: EventBusMetrics,
    shutdown: Arc<Notify>,
    shutdown_flag: Arc<AtomicBool>,
}

impl Default for CrawlEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl CrawlEventBus {
    /// Create a bus buffering at most `capacity` events (minimum 1)
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            metrics: EventBusMetrics::new(),
            shutdown: Arc::new(Notify::new()),
            shutdown_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Publish an event to all current subscribers
    ///
    /// # Returns
    /// * `Ok(usize)` - Number of subscribers that received the event
    /// * `Err(EventBusError::NoSubscribers)` - Nobody is listening; the event is dropped
    pub fn publish(&self, event: CrawlEvent) -> Result<usize, EventBusError> {
        if let Ok(count) = self.sender.send(event) {
            self.metrics.increment_published();
            Ok(count)
        } else {
            self.metrics.increment_dropped();
            log::trace!("Dropped event: no active subscribers");
            Err(EventBusError::NoSubscribers)
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CrawlEvent> {
        self.sender.subscribe()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    #[must_use]
    pub fn metrics(&self) -> &EventBusMetrics {
        &self.metrics
    }

    /// Publish a `Shutdown` event and wake everyone in `wait_for_shutdown`
    ///
    /// Idempotent: only the first call publishes.
    pub fn shutdown(&self, reason: ShutdownReason) {
        if self.shutdown_flag.swap(true, Ordering::SeqCst) {
            return;
        }
        log::debug!("Event bus shutting down: {reason:?}");
        let _ = self.publish(CrawlEvent::shutdown(reason));
        self.shutdown.notify_waiters();
    }

    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown_flag.load(Ordering::SeqCst)
    }

    /// Resolve once `shutdown` has been called on this bus or any clone
    pub async fn wait_for_shutdown(&self) {
        let notified = self.shutdown.notified();
        if self.is_shutdown() {
            return;
        }
        notified.await;
    }
}

/// Receive the next event, mapping channel errors onto `EventBusError`
///
/// # Errors
///
/// `ReceiverLagged` when events were overwritten before being read (the
/// receiver stays usable), `Shutdown` once every sender is gone.
pub async fn next_event(
    receiver: &mut broadcast::Receiver<CrawlEvent>,
) -> Result<CrawlEvent, EventBusError> {
    receiver.recv().await.map_err(|e| match e {
        broadcast::error::RecvError::Lagged(missed) => EventBusError::ReceiverLagged(missed),
        broadcast::error::RecvError::Closed => EventBusError::Shutdown,
    })
}
