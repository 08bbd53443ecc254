//! Gateway: proxy responses, link rewriting and fire-and-forget archival

use autorag_crawler::archive_store::{ArchiveStore, InMemoryArchiveStore};
use autorag_crawler::config::{ArchiveConfigBuilder, Complete};
use autorag_crawler::crawl_engine::{CrawlOrchestrator, CrawlPhase};
use autorag_crawler::crawl_events::{CrawlEvent, CrawlEventBus};
use autorag_crawler::gateway::{Gateway, GatewayError};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

mod common;
use common::{ScriptedRenderer, create_html_mock, test_config_with, url};

struct Harness {
    gateway: Gateway,
    store: Arc<InMemoryArchiveStore>,
    renderer: Arc<ScriptedRenderer>,
    orchestrator: Arc<CrawlOrchestrator>,
    bus: Arc<CrawlEventBus>,
    _archive_dir: TempDir,
}

fn start(live_origin: &str, queue_capacity: usize) -> Harness {
    start_with(live_origin, ScriptedRenderer::ok(), |b| {
        b.queue_capacity(queue_capacity).worker_concurrency(2)
    })
}

fn start_with(
    live_origin: &str,
    renderer: ScriptedRenderer,
    customize: impl FnOnce(ArchiveConfigBuilder<Complete>) -> ArchiveConfigBuilder<Complete>,
) -> Harness {
    let archive_dir = TempDir::new().unwrap();
    let config = test_config_with(archive_dir.path(), live_origin, customize);
    let store = Arc::new(InMemoryArchiveStore::new());
    let renderer = Arc::new(renderer);
    let bus = Arc::new(CrawlEventBus::new(256));
    let orchestrator = Arc::new(
        CrawlOrchestrator::new(&config, renderer.clone(), store.clone())
            .with_event_bus(Arc::clone(&bus)),
    );
    let gateway = Gateway::start(&config, Arc::clone(&orchestrator)).unwrap();
    Harness {
        gateway,
        store,
        renderer,
        orchestrator,
        bus,
        _archive_dir: archive_dir,
    }
}

#[tokio::test]
async fn html_is_rewritten_and_archived() {
    let mut server = mockito::Server::new_async().await;
    let live = server.url();
    let page = format!(
        r#"<html><body><a href="{live}/pricing">Pricing</a><img src="{live}/logo.png"><a href="https://example.com/">out</a></body></html>"#
    );
    let mock = create_html_mock(&mut server, "/docs", &page).await;

    let harness = start(&live, 16);
    let response = harness
        .gateway
        .handle(&url("http://localhost:8787/docs"))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(response.status, 200);
    assert!(response.is_html());
    assert_eq!(response.rewritten_links, 2);
    let body = response.text();
    assert!(body.contains(r#"href="http://localhost:8787/pricing""#));
    assert!(body.contains(r#"src="http://localhost:8787/logo.png""#));
    assert!(body.contains(r#"href="https://example.com/""#));

    harness.gateway.shutdown().await;
    assert_eq!(harness.store.len(), 1);
    assert_eq!(
        harness.renderer.requested(),
        vec![url(&format!("{live}/docs"))]
    );
}

#[tokio::test]
async fn non_html_passes_through_untouched() {
    let mut server = mockito::Server::new_async().await;
    let live = server.url();
    let body = format!(r#"{{"next":"{live}/page/2"}}"#);
    server
        .mock("GET", "/api/data.json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(&body)
        .create_async()
        .await;

    let harness = start(&live, 16);
    let response = harness
        .gateway
        .handle(&url("http://localhost:8787/api/data.json"))
        .await
        .unwrap();

    assert!(!response.is_html());
    assert_eq!(response.rewritten_links, 0);
    assert_eq!(response.body, body.into_bytes());
    harness.gateway.shutdown().await;
}

#[tokio::test]
async fn upstream_status_is_passed_through() {
    let mut server = mockito::Server::new_async().await;
    let live = server.url();
    server
        .mock("GET", "/missing")
        .with_status(404)
        .with_header("content-type", "text/html")
        .with_body("<html><body>gone</body></html>")
        .create_async()
        .await;

    let harness = start(&live, 16);
    let response = harness
        .gateway
        .handle(&url("http://localhost:8787/missing"))
        .await
        .unwrap();

    assert_eq!(response.status, 404);
    harness.gateway.shutdown().await;
}

#[tokio::test]
async fn shutdown_drains_a_saturated_queue() {
    let harness = start("https://confidence.sh", 1);

    for path in ["a", "b", "c", "d", "e"] {
        assert!(harness.gateway.submit(&format!("http://localhost:8787/{path}")));
    }
    harness.gateway.shutdown().await;

    assert_eq!(harness.store.len(), 5);
    assert_eq!(harness.orchestrator.metrics().archived, 5);
    assert!(harness.bus.is_shutdown());
}

#[tokio::test]
async fn duplicate_submits_archive_once() {
    let harness = start("https://confidence.sh", 16);

    for _ in 0..6 {
        assert!(harness.gateway.submit("http://localhost:8787/docs#intro"));
    }
    harness.gateway.shutdown().await;

    assert_eq!(harness.store.len(), 1);
    let metrics = harness.orchestrator.metrics();
    assert_eq!(metrics.archived, 1);
    assert_eq!(metrics.completed(), 6);
    assert_eq!(metrics.failed, 0);
}

#[tokio::test]
async fn unusable_requests_are_dropped() {
    let harness = start("https://confidence.sh", 16);
    let mut events = harness.bus.subscribe();

    assert!(!harness.gateway.submit("not a url"));
    assert!(!harness.gateway.submit("mailto:team@confidence.sh"));

    harness.gateway.shutdown().await;
    assert!(harness.gateway.is_shut_down());
    assert!(!harness.gateway.submit("http://localhost:8787/late"));

    let mut dropped = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, CrawlEvent::RequestDropped { .. }) {
            dropped += 1;
        }
    }
    assert_eq!(dropped, 3);
    assert!(harness.store.is_empty());
}

#[tokio::test]
async fn shutdown_is_idempotent() {
    let harness = start("https://confidence.sh", 4);
    harness.gateway.submit("http://localhost:8787/");
    harness.gateway.shutdown().await;
    harness.gateway.shutdown().await;
    assert_eq!(harness.store.len(), 1);
}

#[tokio::test]
async fn canonical_url_uses_the_live_origin() {
    let harness = start("https://confidence.sh", 4);

    let canonical = harness
        .gateway
        .canonicalize(&url("http://localhost:8787/docs/intro?lang=en"))
        .unwrap();
    assert_eq!(canonical.as_str(), "https://confidence.sh/docs/intro?lang=en");

    let rejected = harness.gateway.canonicalize(&url("ftp://localhost/file"));
    assert!(matches!(rejected, Err(GatewayError::InvalidUrl { .. })));

    harness.gateway.shutdown().await;
    assert!(harness.renderer.requested().is_empty());
    let key = harness.orchestrator.fingerprinter().fingerprint(&canonical);
    assert!(!harness.store.head(&key).await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn duplicate_requests_never_render_concurrently() {
    let harness = start_with(
        "https://confidence.sh",
        ScriptedRenderer::ok().with_delay(Duration::from_millis(100)),
        |b| b.queue_capacity(16).worker_concurrency(4),
    );
    let mut events = harness.bus.subscribe();

    for _ in 0..4 {
        assert!(harness.gateway.submit("http://localhost:8787/docs"));
    }
    harness.gateway.shutdown().await;

    let mut active = 0_i32;
    let mut max_active = 0_i32;
    while let Ok(event) = events.try_recv() {
        if let CrawlEvent::PhaseChanged { from, to, .. } = event {
            if to == CrawlPhase::Rendering {
                active += 1;
            } else if matches!(from, CrawlPhase::Rendering | CrawlPhase::Persisting)
                && to.is_terminal()
            {
                active -= 1;
            }
            max_active = max_active.max(active);
        }
    }

    assert_eq!(max_active, 1);
    assert_eq!(active, 0);
    assert_eq!(harness.renderer.calls(), 1);
    assert_eq!(harness.store.len(), 1);
    let metrics = harness.orchestrator.metrics();
    assert_eq!(metrics.archived, 1);
    assert_eq!(metrics.skipped_existing, 3);
}

#[test]
fn submit_works_from_threads_outside_the_runtime() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap();
    let harness = runtime.block_on(async {
        start_with(
            "https://confidence.sh",
            ScriptedRenderer::ok().with_delay(Duration::from_millis(20)),
            |b| b.queue_capacity(1).worker_concurrency(1),
        )
    });

    let accepted = std::thread::scope(|scope| {
        scope
            .spawn(|| {
                ["a", "b", "c", "d", "e"]
                    .iter()
                    .filter(|path| {
                        harness
                            .gateway
                            .submit(&format!("http://localhost:8787/{path}"))
                    })
                    .count()
            })
            .join()
            .unwrap()
    });
    assert_eq!(accepted, 5);

    runtime.block_on(harness.gateway.shutdown());
    assert_eq!(harness.store.len(), 5);
}

#[tokio::test]
async fn saturated_backlog_drops_instead_of_spawning() {
    let harness = start_with(
        "https://confidence.sh",
        ScriptedRenderer::ok().with_delay(Duration::from_millis(200)),
        |b| b.queue_capacity(1).worker_concurrency(1).max_deferred_submits(0),
    );
    let mut events = harness.bus.subscribe();

    let accepted = (0..10)
        .filter(|i| harness.gateway.submit(&format!("http://localhost:8787/{i}")))
        .count();
    harness.gateway.shutdown().await;

    assert!(accepted < 10, "a full queue with no backlog must drop");
    assert_eq!(harness.store.len(), accepted);

    let mut saturated = 0;
    while let Ok(event) = events.try_recv() {
        if let CrawlEvent::RequestDropped { reason, .. } = event
            && reason.contains("backlog")
        {
            saturated += 1;
        }
    }
    assert_eq!(saturated, 10 - accepted);
}
