//! EEG stream service - background producer and HTTP API.
//!
//! Run with: `cargo run -p eegstream-service`

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use eegstream_service::lifecycle::is_primary_process;
use eegstream_service::{AppState, Config, StartOutcome};
use eegstream_store::Store;

/// EEG stream service - background producer and cursor-based HTTP API.
#[derive(Parser, Debug)]
#[command(name = "eegstream-service")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address (overrides config).
    #[arg(short, long)]
    bind: Option<String>,

    /// Database path (overrides config).
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Disable the background producer (API only mode).
    #[arg(long)]
    no_producer: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("eegstream_service=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default().unwrap_or_default(),
    };

    // Override config with CLI args
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(db_path) = args.database {
        config.storage.path = db_path;
    }
    config.validate()?;

    // Open the database
    info!("Opening database at {:?}", config.storage.path);
    let store = Store::open_with_schema(
        &config.storage.path,
        config.storage.schema_script.as_deref(),
    )?;

    let addr: SocketAddr = config.server.bind.parse()?;
    let primary = !args.no_producer
        && config.producer.enabled
        && is_primary_process(config.producer.primary_env.as_deref());

    let state = AppState::new(store, config);

    // Start the background producer
    match state.lifecycle.start_once(primary).await {
        StartOutcome::Started => {}
        StartOutcome::AlreadyStarted => info!("Producer already running"),
        StartOutcome::NotPrimary => info!("Background producer disabled"),
        StartOutcome::Stopped => info!("Producer already stopped"),
    }

    let app = eegstream_service::app(Arc::clone(&state))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped, waiting for producer");
    state.lifecycle.stop().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
