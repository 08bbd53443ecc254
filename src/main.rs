//! `autorag-crawler`: mirror a live site and archive rendered pages once each

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

use autorag_crawler::archive_store::{ArchiveStore, FsArchiveStore};
use autorag_crawler::crawl_events::{CrawlEvent, CrawlEventBus, EventBusError, next_event};
use autorag_crawler::renderer::{ChromiumRenderer, Renderer};
use autorag_crawler::utils::{DEFAULT_LIVE_ORIGIN, DEFAULT_WORKER_ORIGIN};
use autorag_crawler::{ArchiveConfig, ConfigFile, CrawlOrchestrator, Gateway};

const DEFAULT_ARCHIVE_DIR: &str = "archive";

#[derive(Parser, Debug)]
#[command(name = "autorag-crawler", version)]
#[command(about = "Mirror a live site and archive each rendered page exactly once")]
struct Cli {
    #[command(flatten)]
    options: GlobalOptions,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct GlobalOptions {
    /// JSON configuration file; flags override its values
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    archive_dir: Option<PathBuf>,

    #[arg(long, global = true)]
    live_origin: Option<String>,

    #[arg(long, global = true)]
    worker_origin: Option<String>,

    #[arg(long, global = true)]
    max_attempts: Option<u32>,

    /// Show the browser window instead of running headless
    #[arg(long, global = true)]
    headful: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the archive key for each URL
    Fingerprint {
        #[arg(required = true)]
        urls: Vec<Url>,
    },
    /// Archive URLs through the gateway and report each outcome
    Archive {
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Print the rewritten live page for a request URL, archiving it in the background
    Proxy { url: Url },
}

fn load_config(options: &GlobalOptions) -> Result<ArchiveConfig> {
    let file = match &options.config {
        Some(path) => ConfigFile::load(path)?,
        None => ConfigFile::default(),
    };

    let live_origin = options
        .live_origin
        .clone()
        .or_else(|| file.live_origin.clone())
        .unwrap_or_else(|| DEFAULT_LIVE_ORIGIN.to_string());
    let worker_origin = options
        .worker_origin
        .clone()
        .or_else(|| file.worker_origin.clone())
        .unwrap_or_else(|| DEFAULT_WORKER_ORIGIN.to_string());
    let archive_dir = options
        .archive_dir
        .clone()
        .or_else(|| file.archive_dir.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ARCHIVE_DIR));

    let mut builder = file.apply(
        ArchiveConfig::builder()
            .live_origin(live_origin)
            .worker_origin(worker_origin)
            .archive_dir(archive_dir),
    );
    if let Some(attempts) = options.max_attempts {
        builder = builder.max_attempts(attempts);
    }
    if options.headful {
        builder = builder.headless(false);
    }
    builder.build().context("Invalid configuration")
}

struct Pipeline {
    renderer: Arc<ChromiumRenderer>,
    orchestrator: Arc<CrawlOrchestrator>,
    gateway: Gateway,
    bus: Arc<CrawlEventBus>,
}

impl Pipeline {
    fn start(config: &ArchiveConfig) -> Result<Self> {
        let bus = Arc::new(CrawlEventBus::default());
        let renderer = Arc::new(ChromiumRenderer::from_config(config));
        let store: Arc<dyn ArchiveStore> = Arc::new(FsArchiveStore::from_config(config));
        let orchestrator = Arc::new(
            CrawlOrchestrator::new(config, Arc::clone(&renderer) as Arc<dyn Renderer>, store)
                .with_event_bus(Arc::clone(&bus)),
        );
        let gateway = Gateway::start(config, Arc::clone(&orchestrator))?;
        Ok(Self {
            renderer,
            orchestrator,
            gateway,
            bus,
        })
    }

    /// Drain the gateway, close the browser, and fail if any run failed
    async fn finish(self) -> Result<()> {
        self.gateway.shutdown().await;
        self.renderer.shutdown().await;

        let metrics = self.orchestrator.metrics();
        info!(
            "{} archived, {} already archived, {} archived concurrently, {} failed",
            metrics.archived, metrics.skipped_existing, metrics.skipped_race, metrics.failed
        );
        if metrics.failed > 0 {
            return Err(anyhow!("{} archive run(s) failed", metrics.failed));
        }
        Ok(())
    }
}

async fn archive(config: &ArchiveConfig, urls: &[String]) -> Result<()> {
    let pipeline = Pipeline::start(config)?;
    let mut events = pipeline.bus.subscribe();

    let reporter = tokio::spawn(async move {
        loop {
            match next_event(&mut events).await {
                Ok(CrawlEvent::RunCompleted {
                    url,
                    fingerprint,
                    outcome,
                    ..
                }) => println!("{outcome}\t{fingerprint}\t{url}"),
                Ok(CrawlEvent::RequestDropped { url, reason, .. }) => {
                    println!("dropped\t{url}\t{reason}");
                }
                Ok(CrawlEvent::Shutdown { .. }) | Err(EventBusError::Shutdown) => break,
                Ok(_) => {}
                Err(e) => warn!("Event stream: {e}"),
            }
        }
    });

    for url in urls {
        pipeline.gateway.submit(url);
    }

    let result = pipeline.finish().await;
    reporter.await.context("Outcome reporter failed")?;
    result
}

async fn proxy(config: &ArchiveConfig, url: &Url) -> Result<()> {
    let pipeline = Pipeline::start(config)?;

    let response = pipeline.gateway.handle(url).await;
    match &response {
        Ok(response) => {
            info!(
                "HTTP {} ({}), {} link(s) rewritten",
                response.status,
                response.content_type.as_deref().unwrap_or("no content type"),
                response.rewritten_links
            );
            std::io::stdout()
                .write_all(&response.body)
                .context("Failed to write response body")?;
        }
        Err(e) => warn!("Proxy fetch failed: {e}"),
    }

    pipeline.finish().await?;
    response.map(|_| ()).map_err(Into::into)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,chromiumoxide=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.options)?;

    match cli.command {
        Command::Fingerprint { urls } => {
            let fingerprinter = config.fingerprinter();
            for url in urls {
                println!("{}\t{url}", fingerprinter.fingerprint(&url));
            }
            Ok(())
        }
        Command::Archive { urls } => archive(&config, &urls).await,
        Command::Proxy { url } => proxy(&config, &url).await,
    }
}
