use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scrapeflow_core::{
    create_publisher, load_config, validate_config, ActionExtractor, CatalogLister,
    DocumentFetcher, Dispatcher, HttpFetcher, InstanceStore, ListerConfig, ScrapeOrchestrator,
    ScrapeWorkflow, SqliteInstanceStore,
};
use scrapeflow_server::api::create_router;
use scrapeflow_server::state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("SCRAPEFLOW_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Database path: {:?}", config.database.path);
    info!("Connector index: {}", config.scraper.index_url);

    // Create SQLite instance store
    let store: Arc<dyn InstanceStore> = Arc::new(
        SqliteInstanceStore::new(&config.database.path)
            .context("Failed to create instance store")?,
    );
    info!("Instance store initialized");

    // Create document fetcher
    let fetcher: Arc<dyn DocumentFetcher> = Arc::new(
        HttpFetcher::new(&config.scraper).context("Failed to create HTTP client")?,
    );

    let lister = CatalogLister::new(&ListerConfig::new(&config.scraper.index_url))
        .context("Invalid catalog lister configuration")?;
    let dispatcher = Dispatcher::new(config.orchestrator.max_concurrent_extractions);

    let mut workflow = ScrapeWorkflow::new(fetcher, lister, ActionExtractor::default(), dispatcher);

    // Create publisher if configured
    match &config.publisher {
        Some(publisher_config) => {
            let publisher =
                create_publisher(publisher_config).context("Failed to create publisher")?;
            info!("Publishing snapshots via {}", publisher.name());
            workflow = workflow.with_publisher(publisher);
        }
        None => info!("No publisher configured, snapshots are not published"),
    }

    // Create orchestrator
    let orchestrator = Arc::new(ScrapeOrchestrator::new(Arc::clone(&store), workflow));
    if config.orchestrator.resume_on_start {
        let resumed = orchestrator
            .start()
            .context("Failed to resume unfinished instances")?;
        info!("Scrape orchestrator started ({} instances resumed)", resumed);
    } else {
        orchestrator.start_fresh();
        info!("Scrape orchestrator started without resuming");
    }

    // Create app state
    let state = Arc::new(AppState::new(config.clone(), Arc::clone(&orchestrator)));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Stopping orchestrator...");
    orchestrator.stop().await;
    info!("Server shut down");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
