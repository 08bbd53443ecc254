//! Dispatch gateway: the entry point requests arrive at
//!
//! For each request the gateway derives the canonical live URL, hands an
//! archive request to the worker pool without waiting for it, and fetches
//! the live page for the caller. Archival never affects the response.

mod dispatch;
mod proxy;

pub use proxy::{LiveProxy, ProxyResponse};

use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use url::Url;

use crate::config::ArchiveConfig;
use crate::crawl_engine::{CrawlOrchestrator, CrawlRequest};
use crate::crawl_events::{CrawlEvent, CrawlEventBus, ShutdownReason};
use crate::utils::{canonicalize_request_url, is_valid_url};
use dispatch::{DispatchQueue, SubmitRejected, run_workers};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("cannot handle {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("live origin request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("live response exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("link rewriting failed: {0}")]
    Rewrite(String),
}

pub struct Gateway {
    live_origin: Url,
    queue: DispatchQueue,
    proxy: LiveProxy,
    event_bus: Option<Arc<CrawlEventBus>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl Gateway {
    /// Spawn the worker pool and return a gateway feeding it
    ///
    /// Must be called inside a tokio runtime; workers and deferred submits
    /// run on it. Events go to the orchestrator's bus, if it has one.
    ///
    /// # Errors
    ///
    /// Fails if the proxy's HTTP client cannot be built.
    pub fn start(
        config: &ArchiveConfig,
        orchestrator: Arc<CrawlOrchestrator>,
    ) -> Result<Self, GatewayError> {
        let proxy = LiveProxy::new(config)?;
        let (queue, receiver) =
            DispatchQueue::new(config.queue_capacity(), config.max_deferred_submits());
        let event_bus = orchestrator.event_bus().cloned();
        let dispatcher = tokio::spawn(run_workers(
            receiver,
            orchestrator,
            config.worker_concurrency(),
        ));

        info!(
            "Gateway started: {} workers, queue capacity {}",
            config.worker_concurrency(),
            config.queue_capacity()
        );
        Ok(Self {
            live_origin: config.live_origin().clone(),
            queue,
            proxy,
            event_bus,
            dispatcher: Mutex::new(Some(dispatcher)),
        })
    }

    /// Canonical live URL for a request that reached the gateway
    ///
    /// # Errors
    ///
    /// Rejects anything that is not an absolute `http`/`https` URL.
    pub fn canonicalize(&self, request_url: &Url) -> Result<Url, GatewayError> {
        if !is_valid_url(request_url.as_str()) {
            return Err(GatewayError::InvalidUrl {
                url: request_url.to_string(),
                reason: "only http(s) URLs with a host can be mirrored".into(),
            });
        }
        canonicalize_request_url(request_url, &self.live_origin).map_err(|e| {
            GatewayError::InvalidUrl {
                url: request_url.to_string(),
                reason: e.to_string(),
            }
        })
    }

    /// Queue the canonical form of `request_url` for archival
    ///
    /// Never blocks and never fails the caller: unusable URLs are logged and
    /// dropped. Returns whether the request was accepted. Callable from any
    /// thread once the gateway has started.
    pub fn submit(&self, request_url: &str) -> bool {
        let canonical = Url::parse(request_url)
            .map_err(|e| e.to_string())
            .and_then(|url| self.canonicalize(&url).map_err(|e| e.to_string()));

        match canonical {
            Ok(url) => self.submit_canonical(url),
            Err(reason) => {
                warn!("Not archiving {request_url}: {reason}");
                self.emit(CrawlEvent::request_dropped(request_url, reason));
                false
            }
        }
    }

    fn submit_canonical(&self, url: Url) -> bool {
        match self.queue.submit(CrawlRequest::new(url.clone())) {
            Ok(()) => {
                debug!("Queued {url} for archival");
                self.emit(CrawlEvent::request_queued(url));
                true
            }
            Err(rejected) => {
                if rejected == SubmitRejected::Closed {
                    debug!("Not archiving {url}: {rejected}");
                }
                self.emit(CrawlEvent::request_dropped(url.as_str(), rejected.to_string()));
                false
            }
        }
    }

    /// Serve one request: queue archival, then fetch and rewrite the live page
    ///
    /// # Errors
    ///
    /// Only proxy errors surface; archival outcomes are reported as events.
    pub async fn handle(&self, request_url: &Url) -> Result<ProxyResponse, GatewayError> {
        let canonical = self.canonicalize(request_url)?;
        self.submit_canonical(canonical.clone());
        self.proxy.fetch(&canonical).await
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.queue.is_closed()
    }

    /// Stop accepting requests and wait for queued and in-flight runs
    ///
    /// Idempotent.
    pub async fn shutdown(&self) {
        self.queue.close();
        let Some(dispatcher) = self.dispatcher.lock().await.take() else {
            return;
        };
        if let Err(e) = dispatcher.await {
            warn!("Dispatcher task ended abnormally: {e}");
        }
        if let Some(bus) = &self.event_bus {
            bus.shutdown(ShutdownReason::Drained);
        }
        info!("Gateway drained and shut down");
    }

    fn emit(&self, event: CrawlEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.publish(event);
        }
    }
}
