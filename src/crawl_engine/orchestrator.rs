//! Crawl orchestration: one URL through CHECKING, RENDERING and PERSISTING
//!
//! Within one orchestrator, runs for the same fingerprint are single-flight:
//! a duplicate waits until the active run finishes and then re-checks the
//! store. Runs in other processes are not coordinated; the store's
//! conditional write decides which one creates the record, and the loser
//! ends as SKIPPED.

use log::{debug, info, warn};
use std::fmt::Display;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

use super::crawl_types::{
    CrawlPhase, CrawlRequest, CrawlRun, FailureReason, RunOutcome, SkipReason,
};
use super::single_flight::FlightGroup;
use super::step_runner::{RetryPolicy, StepFailure, StepSuccess, run_step};
use super::timeout::with_step_timeout;
use crate::archive_store::{ArchiveStore, PutOutcome, StoreError};
use crate::config::ArchiveConfig;
use crate::crawl_events::{CrawlEvent, CrawlEventBus, RunMetrics, RunMetricsSnapshot};
use crate::fingerprint::Fingerprinter;
use crate::renderer::{RenderError, RenderedPage, Renderer};
use crate::utils::same_origin;

pub struct CrawlOrchestrator {
    renderer: Arc<dyn Renderer>,
    store: Arc<dyn ArchiveStore>,
    fingerprinter: Fingerprinter,
    retry_policy: RetryPolicy,
    render_timeout: Duration,
    persist_timeout: Duration,
    max_content_bytes: usize,
    event_bus: Option<Arc<CrawlEventBus>>,
    metrics: Arc<RunMetrics>,
    flights: FlightGroup,
}

impl CrawlOrchestrator {
    #[must_use]
    pub fn new(
        config: &ArchiveConfig,
        renderer: Arc<dyn Renderer>,
        store: Arc<dyn ArchiveStore>,
    ) -> Self {
        Self {
            renderer,
            store,
            fingerprinter: config.fingerprinter(),
            retry_policy: config.retry_policy(),
            render_timeout: config.render_timeout(),
            persist_timeout: config.persist_timeout(),
            max_content_bytes: config.max_content_bytes(),
            event_bus: None,
            metrics: Arc::new(RunMetrics::new()),
            flights: FlightGroup::new(),
        }
    }

    #[must_use]
    pub fn with_event_bus(mut self, event_bus: Arc<CrawlEventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    #[must_use]
    pub fn fingerprinter(&self) -> &Fingerprinter {
        &self.fingerprinter
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn ArchiveStore> {
        &self.store
    }

    #[must_use]
    pub fn event_bus(&self) -> Option<&Arc<CrawlEventBus>> {
        self.event_bus.as_ref()
    }

    #[must_use]
    pub fn metrics(&self) -> RunMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub async fn orchestrate_request(&self, request: &CrawlRequest) -> RunOutcome {
        let queued_for = chrono::Utc::now() - request.requested_at;
        debug!(
            "Picked up {} after {}ms in queue",
            request.url,
            queued_for.num_milliseconds()
        );
        self.orchestrate(&request.url).await
    }

    /// Archive `url` unless it already is
    ///
    /// Never panics or returns an error: every run ends in a `RunOutcome`.
    /// Safe to call any number of times, concurrently, for the same URL.
    pub async fn orchestrate(&self, url: &Url) -> RunOutcome {
        let started = Instant::now();
        let mut run = CrawlRun::new(self.fingerprinter.fingerprint(url));
        self.metrics.record_started();
        debug!("Run {} started for {url} as {}", run.id, run.fingerprint);
        self.emit(CrawlEvent::run_started(
            run.id,
            url.clone(),
            run.fingerprint.clone(),
        ));

        let outcome = self.drive(&mut run, url).await;

        self.metrics.record_outcome(&outcome);
        match &outcome {
            RunOutcome::Failed { reason } => warn!("Run {} for {url} failed: {reason}", run.id),
            other => info!("Run {} for {url}: {other}", run.id),
        }
        self.emit(CrawlEvent::run_completed(
            run.id,
            url.clone(),
            run.fingerprint.clone(),
            outcome.clone(),
            run.attempts,
            started.elapsed(),
        ));
        outcome
    }

    async fn drive(&self, run: &mut CrawlRun, url: &Url) -> RunOutcome {
        if let Err(e) = self.fingerprinter.fingerprint_checked(url) {
            return self.fail_with(run, 0, false, e.to_string());
        }
        let key = run.fingerprint.clone();

        // Held until the run ends, so duplicates never render concurrently.
        let _claim = self.flights.claim(&key).await;

        // CHECKING
        let checked = run_step("is page archived", &self.retry_policy, |_| {
            with_step_timeout(self.store.head(&key), self.persist_timeout, StoreError::Timeout)
        })
        .await;
        self.metrics.record_store_attempts(step_attempts(&checked));
        let exists = match settle(run, checked) {
            Ok(exists) => exists,
            Err(failure) => return self.fail(run, &failure),
        };
        if exists {
            self.transition(run, CrawlPhase::Skipped);
            return RunOutcome::Skipped {
                reason: SkipReason::AlreadyArchived,
            };
        }

        // RENDERING
        self.transition(run, CrawlPhase::Rendering);
        let rendered = run_step("render webpage", &self.retry_policy, |_| self.render_once(url)).await;
        self.metrics.record_render_attempts(step_attempts(&rendered));
        let page = match settle(run, rendered) {
            Ok(page) => page,
            Err(failure) => return self.fail(run, &failure),
        };
        if !same_origin(&page.final_url, url) {
            warn!("{url} redirected off-origin to {}", page.final_url);
        } else if page.final_url != *url {
            debug!("{url} rendered from {}", page.final_url);
        }

        // PERSISTING
        self.transition(run, CrawlPhase::Persisting);
        let persisted = run_step("save page to archive", &self.retry_policy, |_| {
            with_step_timeout(
                self.store
                    .put_if_absent(&key, page.html.as_bytes(), &page.content_type),
                self.persist_timeout,
                StoreError::Timeout,
            )
        })
        .await;
        self.metrics.record_store_attempts(step_attempts(&persisted));
        match settle(run, persisted) {
            Ok(PutOutcome::Created) => {
                self.transition(run, CrawlPhase::Done);
                RunOutcome::Archived
            }
            Ok(PutOutcome::AlreadyExists) => {
                self.transition(run, CrawlPhase::Skipped);
                RunOutcome::Skipped {
                    reason: SkipReason::LostRace,
                }
            }
            Err(failure) => self.fail(run, &failure),
        }
    }

    /// One render attempt, bounded by the render timeout and size limit
    async fn render_once(&self, url: &Url) -> Result<RenderedPage, RenderError> {
        let page = with_step_timeout(self.renderer.render(url), self.render_timeout, |after| {
            RenderError::Timeout {
                operation: "render",
                after,
            }
        })
        .await?;

        if page.len() > self.max_content_bytes {
            return Err(RenderError::Rejected(format!(
                "{} bytes exceeds the {} byte limit",
                page.len(),
                self.max_content_bytes
            )));
        }
        Ok(page)
    }

    fn transition(&self, run: &mut CrawlRun, next: CrawlPhase) {
        let from = run.advance(next);
        debug!("Run {} ({}): {from} -> {next}", run.id, run.fingerprint);
        self.emit(CrawlEvent::phase_changed(
            run.id,
            run.fingerprint.clone(),
            from,
            next,
        ));
    }

    fn fail<E: Display>(&self, run: &mut CrawlRun, failure: &StepFailure<E>) -> RunOutcome {
        self.fail_with(
            run,
            failure.attempts(),
            failure.is_exhausted(),
            failure.error().to_string(),
        )
    }

    fn fail_with(
        &self,
        run: &mut CrawlRun,
        attempts: u32,
        exhausted: bool,
        message: String,
    ) -> RunOutcome {
        let reason = FailureReason {
            phase: run.phase,
            attempts,
            exhausted,
            message,
        };
        self.transition(run, CrawlPhase::Failed);
        RunOutcome::Failed { reason }
    }

    fn emit(&self, event: CrawlEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.publish(event);
        }
    }
}

fn step_attempts<T, E>(result: &Result<StepSuccess<T>, StepFailure<E>>) -> u32 {
    match result {
        Ok(success) => success.attempts,
        Err(failure) => failure.attempts(),
    }
}

/// Add a step's attempts to the run and unwrap its value
fn settle<T, E>(
    run: &mut CrawlRun,
    result: Result<StepSuccess<T>, StepFailure<E>>,
) -> Result<T, StepFailure<E>> {
    run.attempts += step_attempts(&result);
    result.map(|success| success.value)
}
