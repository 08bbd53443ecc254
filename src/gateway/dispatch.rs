//! Fire-and-forget handoff from the gateway to the worker pool
//!
//! `submit` never waits: a full queue hands the send to a task spawned on the
//! gateway's runtime, so callers see backpressure only as extra tasks, never
//! as latency. Deferred sends are capped; past the cap requests are dropped.

use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use log::{debug, error, warn};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{Semaphore, mpsc};

use crate::crawl_engine::{CrawlOrchestrator, CrawlRequest};

/// Why a request did not make it onto the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub(crate) enum SubmitRejected {
    #[error("gateway is shut down")]
    Closed,
    #[error("dispatch backlog is full")]
    Saturated,
}

/// Sending half of the dispatch queue; closed exactly once on shutdown
pub(crate) struct DispatchQueue {
    sender: RwLock<Option<mpsc::Sender<CrawlRequest>>>,
    runtime: Handle,
    deferred: Arc<Semaphore>,
}

impl DispatchQueue {
    /// Must be called inside the runtime deferred sends should run on
    pub(crate) fn new(
        capacity: usize,
        max_deferred: usize,
    ) -> (Self, mpsc::Receiver<CrawlRequest>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (
            Self {
                sender: RwLock::new(Some(sender)),
                runtime: Handle::current(),
                deferred: Arc::new(Semaphore::new(max_deferred)),
            },
            receiver,
        )
    }

    /// Enqueue without blocking
    ///
    /// Callable from any thread, inside a runtime or not.
    pub(crate) fn submit(&self, request: CrawlRequest) -> Result<(), SubmitRejected> {
        let Some(sender) = self.sender.read().clone() else {
            return Err(SubmitRejected::Closed);
        };

        match sender.try_send(request) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(request)) => {
                let Ok(permit) = Arc::clone(&self.deferred).try_acquire_owned() else {
                    warn!("Dispatch backlog full, dropping {}", request.url);
                    return Err(SubmitRejected::Saturated);
                };
                debug!("Dispatch queue full, deferring {}", request.url);
                self.runtime.spawn(async move {
                    let _permit = permit;
                    let url = request.url.clone();
                    if sender.send(request).await.is_err() {
                        warn!("Dispatch queue closed before {url} could be queued");
                    }
                });
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SubmitRejected::Closed),
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.sender.read().is_none()
    }

    /// Stop accepting requests; deferred sends already spawned still land
    pub(crate) fn close(&self) {
        self.sender.write().take();
    }
}

/// Drain `receiver`, running at most `concurrency` orchestrations at a time
///
/// Returns once the queue is closed, every sender is gone, and all in-flight
/// runs have finished.
pub(crate) async fn run_workers(
    mut receiver: mpsc::Receiver<CrawlRequest>,
    orchestrator: Arc<CrawlOrchestrator>,
    concurrency: usize,
) {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut in_flight = FuturesUnordered::new();

    while let Some(request) = receiver.recv().await {
        let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
            break;
        };
        let orchestrator = Arc::clone(&orchestrator);
        in_flight.push(tokio::spawn(async move {
            let _permit = permit;
            orchestrator.orchestrate_request(&request).await
        }));

        // Reap whatever already finished without waiting on the rest.
        while let Some(Some(joined)) = in_flight.next().now_or_never() {
            log_join(joined);
        }
    }

    debug!("Dispatch queue drained, waiting for {} run(s)", in_flight.len());
    while let Some(joined) = in_flight.next().await {
        log_join(joined);
    }
}

fn log_join<T>(joined: Result<T, tokio::task::JoinError>) {
    if let Err(e) = joined {
        error!("Archive run task failed: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn request(path: &str) -> CrawlRequest {
        CrawlRequest::new(Url::parse(&format!("https://confidence.sh/{path}")).expect("url"))
    }

    #[tokio::test]
    async fn deferred_sends_are_capped() {
        let (queue, mut receiver) = DispatchQueue::new(1, 2);

        assert_eq!(queue.submit(request("queued")), Ok(()));
        assert_eq!(queue.submit(request("deferred-1")), Ok(()));
        assert_eq!(queue.submit(request("deferred-2")), Ok(()));
        assert_eq!(
            queue.submit(request("overflow")),
            Err(SubmitRejected::Saturated)
        );

        queue.close();
        assert_eq!(queue.submit(request("late")), Err(SubmitRejected::Closed));

        let mut delivered = Vec::new();
        while let Some(request) = receiver.recv().await {
            delivered.push(request.url.path().to_string());
        }
        delivered.sort();
        assert_eq!(delivered, vec!["/deferred-1", "/deferred-2", "/queued"]);
    }
}
