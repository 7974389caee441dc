mod metrics;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reelsync_core::{
    load_config, validate_config, CatalogCache, CatalogError, ConnectivityError, ConnectivityGate,
    CrawlCoordinator, DownloadOrchestrator, HttpFetcher, JsonCatalogCache, JsonStatusStore,
    MediaFetcher, OrchestratorConfig, OrchestratorError, PageRenderer, ProcessRenderer,
    RunOptions, SanitizedConfig, StatusStore, StreamOverrides,
};

const EXIT_OK: i32 = 0;
const EXIT_FAILURE: i32 = 1;
const EXIT_AUTH_LOST: i32 = 2;
const EXIT_CATALOG_DRIFT: i32 = 3;
const EXIT_GUARD_EXHAUSTED: i32 = 4;
const EXIT_INTERRUPTED: i32 = 130;

/// Mirror a member site's video catalog to disk.
#[derive(Debug, Parser)]
#[command(name = "reelsync", version, about)]
struct Cli {
    /// Configuration file
    #[arg(long, env = "REELSYNC_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    /// Download items already marked DONE again
    #[arg(long)]
    redownload_done: bool,

    /// Leave items that previously ended in ERROR alone
    #[arg(long)]
    ignore_broken: bool,

    /// Recrawl the catalog even if the cached snapshot is fresh
    #[arg(long)]
    refresh_catalog: bool,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,

    /// Write Prometheus metrics to this file when the run ends
    #[arg(long)]
    metrics_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let default_directive = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let started = Instant::now();
    let code = tokio::select! {
        result = run(&cli) => match result {
            Ok(()) => EXIT_OK,
            Err(e) => {
                error!("Fatal error: {:#}", e);
                exit_code(&e)
            }
        },
        _ = shutdown_signal() => {
            warn!("Interrupted, stopping renderer and exiting");
            EXIT_INTERRUPTED
        }
    };

    if let Some(path) = &cli.metrics_file {
        metrics::RUN_DURATION.set(started.elapsed().as_secs_f64());
        metrics::RUN_EXIT_CODE.set(i64::from(code));
        metrics::RUN_FINISHED.set(chrono::Utc::now().timestamp());
        if let Err(e) = write_metrics(path).await {
            error!("Failed to write metrics to {:?}: {:#}", path, e);
        }
    }

    std::process::exit(code);
}

async fn run(cli: &Cli) -> Result<()> {
    // Load configuration
    info!("Loading configuration from {:?}", cli.config);
    let config = load_config(&cli.config)
        .with_context(|| format!("Failed to load config from {:?}", cli.config))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    let sanitized = SanitizedConfig::from(&config);
    info!(
        "Configuration loaded: {}",
        serde_json::to_string(&sanitized).unwrap_or_default()
    );
    warn!(
        "Stream downloads are saved as raw .ts transport streams; \
         convert them with an external tool if your player needs .mp4"
    );

    let overrides = StreamOverrides::load(&config.paths.stream_overrides).with_context(|| {
        format!(
            "Failed to load stream overrides from {:?}",
            config.paths.stream_overrides
        )
    })?;
    info!(count = overrides.len(), "Stream overrides loaded");

    let download_dir = &config.paths.download_dir;
    tokio::fs::create_dir_all(download_dir)
        .await
        .with_context(|| format!("Failed to create download directory {:?}", download_dir))?;

    let store = Arc::new(JsonStatusStore::new(config.paths.status_db_path()));
    let records = store
        .load(false)
        .with_context(|| format!("Failed to read status database {:?}", store.path()))?;
    info!(records = records.len(), path = ?store.path(), "Status database loaded");

    let cache = Arc::new(JsonCatalogCache::new(config.paths.catalog_cache_path()));

    let gate = ConnectivityGate::from_config(&config.connectivity);
    gate.wait_until_reachable().await?;

    let fetcher: Arc<dyn MediaFetcher> =
        Arc::new(HttpFetcher::from_config(&config.http).context("Failed to build HTTP client")?);

    // Start the renderer and wait for the member login
    let renderer = Arc::new(
        ProcessRenderer::spawn(&config.renderer).context("Failed to start renderer helper")?,
    );
    let mut session = renderer.session();
    if !session.is_authenticated() {
        info!("Waiting for the renderer to report an authenticated session");
    }
    if !session.wait_until_authenticated().await {
        renderer.shutdown().await;
        return Err(anyhow!("renderer exited before the session was authenticated"));
    }
    info!("Session authenticated");

    let result = sync_catalog(
        cli,
        &config,
        Arc::clone(&renderer),
        session,
        store.clone(),
        cache,
        gate,
        fetcher,
        overrides,
    )
    .await;

    renderer.shutdown().await;

    // Report what is left even when the run was cut short.
    if let Err(e) = print_pending_review(store.as_ref()) {
        warn!("Could not summarize pending items: {:#}", e);
    }
    result
}

#[allow(clippy::too_many_arguments)]
async fn sync_catalog(
    cli: &Cli,
    config: &reelsync_core::Config,
    renderer: Arc<ProcessRenderer>,
    session: reelsync_core::SessionState,
    store: Arc<JsonStatusStore>,
    cache: Arc<JsonCatalogCache>,
    gate: ConnectivityGate,
    fetcher: Arc<dyn MediaFetcher>,
    overrides: StreamOverrides,
) -> Result<()> {
    let crawler = CrawlCoordinator::new(
        Arc::clone(&renderer) as Arc<dyn PageRenderer>,
        cache as Arc<dyn CatalogCache>,
        config.crawl.clone(),
    );
    let items = crawler
        .load(cli.refresh_catalog)
        .await
        .context("Failed to enumerate the catalog")?;
    info!(items = items.len(), "Catalog ready");

    let orchestrator = DownloadOrchestrator::new(
        OrchestratorConfig::from_config(config),
        store as Arc<dyn StatusStore>,
        renderer as Arc<dyn PageRenderer>,
        session,
        gate,
        fetcher,
    )
    .with_direct_config(config.direct.clone())
    .with_stream_config(config.stream.clone())
    .with_overrides(overrides);

    let options = RunOptions {
        redownload_done: cli.redownload_done,
        ignore_broken: cli.ignore_broken,
    };
    let summary = orchestrator
        .run(&items, &options)
        .await
        .context("Download run aborted")?;

    info!(
        processed = summary.processed,
        done = summary.done,
        failed = summary.failed,
        skipped = summary.skipped,
        "Run complete"
    );
    Ok(())
}

/// Print every record that did not end in DONE.
fn print_pending_review(store: &dyn StatusStore) -> Result<()> {
    let pending = store
        .pending_review()
        .context("Failed to read status database")?;
    metrics::PENDING_REVIEW.set(pending.len() as i64);

    if pending.is_empty() {
        info!("Every known item is DONE");
        return Ok(());
    }

    println!("{} item(s) need attention:", pending.len());
    for record in &pending {
        println!("[{}] {} -> {}", record.status, record.label(), record.url);
    }
    Ok(())
}

/// Map a fatal error to the process exit code.
fn exit_code(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<OrchestratorError>() {
            if e.is_auth_lost() {
                return EXIT_AUTH_LOST;
            }
            if e.is_connectivity() {
                return EXIT_GUARD_EXHAUSTED;
            }
        }
        if let Some(e) = cause.downcast_ref::<CatalogError>() {
            if e.is_structural() {
                return EXIT_CATALOG_DRIFT;
            }
            if matches!(e, CatalogError::PageLimitExceeded { .. }) {
                return EXIT_GUARD_EXHAUSTED;
            }
        }
        if cause.downcast_ref::<ConnectivityError>().is_some() {
            return EXIT_GUARD_EXHAUSTED;
        }
    }
    EXIT_FAILURE
}

async fn write_metrics(path: &Path) -> Result<()> {
    let text = metrics::render()?;
    tokio::fs::write(path, text)
        .await
        .with_context(|| format!("Failed to write {:?}", path))
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use reelsync_core::RendererError;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_parse() {
        let cli = Cli::try_parse_from([
            "reelsync",
            "--config",
            "/etc/reelsync.toml",
            "--redownload-done",
            "--ignore-broken",
            "--metrics-file",
            "/tmp/reelsync.prom",
        ])
        .unwrap();

        assert_eq!(cli.config, PathBuf::from("/etc/reelsync.toml"));
        assert!(cli.redownload_done);
        assert!(cli.ignore_broken);
        assert!(!cli.refresh_catalog);
        assert_eq!(cli.metrics_file, Some(PathBuf::from("/tmp/reelsync.prom")));
    }

    #[test]
    fn test_exit_codes() {
        let auth = anyhow::Error::new(OrchestratorError::AuthenticationLost).context("run aborted");
        assert_eq!(exit_code(&auth), EXIT_AUTH_LOST);

        let drift = anyhow::Error::new(CatalogError::Renderer {
            page: 1,
            source: RendererError::StructureDrift("no .catalog-grid".to_string()),
        })
        .context("Failed to enumerate the catalog");
        assert_eq!(exit_code(&drift), EXIT_CATALOG_DRIFT);

        let bridge = anyhow::Error::new(CatalogError::Renderer {
            page: 1,
            source: RendererError::Unavailable("exited".to_string()),
        });
        assert_eq!(exit_code(&bridge), EXIT_FAILURE);

        let limit = anyhow::Error::new(CatalogError::PageLimitExceeded { max_pages: 50 });
        assert_eq!(exit_code(&limit), EXIT_GUARD_EXHAUSTED);

        let offline = anyhow::Error::new(ConnectivityError::Unreachable { attempts: 5 });
        assert_eq!(exit_code(&offline), EXIT_GUARD_EXHAUSTED);

        let offline_mid_run = anyhow::Error::new(OrchestratorError::Connectivity(
            ConnectivityError::Unreachable { attempts: 5 },
        ));
        assert_eq!(exit_code(&offline_mid_run), EXIT_GUARD_EXHAUSTED);

        assert_eq!(exit_code(&anyhow!("config missing")), EXIT_FAILURE);
    }
}
