pub mod archive_store;
pub mod browser_setup;
pub mod config;
pub mod crawl_engine;
pub mod crawl_events;
pub mod fingerprint;
pub mod gateway;
pub mod link_rewriter;
pub mod renderer;
pub mod utils;

pub use archive_store::{
    ArchiveRecord, ArchiveStore, FsArchiveStore, HttpArchiveStore, InMemoryArchiveStore,
    PutOutcome, StoreError,
};
pub use config::{ArchiveConfig, ArchiveConfigBuilder, ConfigFile};
pub use crawl_engine::{
    CrawlOrchestrator, CrawlPhase, CrawlRequest, CrawlRun, FailureReason, RetryPolicy,
    RunOutcome, SkipReason,
};
pub use crawl_events::{CrawlEvent, CrawlEventBus, RunMetricsSnapshot};
pub use fingerprint::{Fingerprint, Fingerprinter, KeyPolicy, fingerprint};
pub use gateway::{Gateway, GatewayError, ProxyResponse};
pub use link_rewriter::OriginRewriter;
pub use renderer::{ChromiumRenderer, RenderError, RenderedPage, Renderer};
