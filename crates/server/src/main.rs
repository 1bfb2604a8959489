use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use beeb_core::{
    load_config, validate_config, Activities, BbcCatalogue, BroadcastBus, Config, FsObjectStore,
    LocalScheduler, LogFormat, ObjectStore,
};
use beeb_server::{api::create_router, state::AppState};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

/// `RUST_LOG` wins over the configured level.
fn init_logging(config: Option<&Config>) {
    let level = config
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|| "info".to_string());
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("{},tower_http=debug", level).into());

    let fmt_layer = match config.map(|c| c.logging.format) {
        Some(LogFormat::Json) => tracing_subscriber::fmt::layer().json().boxed(),
        _ => tracing_subscriber::fmt::layer().boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

async fn run() -> Result<()> {
    // Determine config path
    let config_path = std::env::var("BEEB_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Logging depends on the config, so load it first
    let loaded = load_config(&config_path);
    init_logging(loaded.as_ref().ok());

    info!("Loading configuration from {:?}", config_path);
    let config =
        loaded.with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        version = VERSION,
        config_hash = &config_hash[..16],
        "Configuration loaded successfully"
    );

    // Message bus for progress logs and upload notices
    let bus = BroadcastBus::new(config.bus.capacity);

    // Object store; the bucket must already exist
    let store = FsObjectStore::new(&config.store.root);
    let bucket_found = store
        .bucket_exists(&config.store.bucket)
        .await
        .context("Failed to check bucket")?;
    if !bucket_found {
        bail!(
            "Bucket {:?} does not exist under {:?}",
            config.store.bucket,
            config.store.root
        );
    }
    info!(bucket = %config.store.bucket, "Object store ready");

    let catalogue = BbcCatalogue::new(&config.catalogue).context("Failed to create catalogue client")?;
    info!(base_url = %config.catalogue.base_url, "Catalogue client initialized");

    let activities = Arc::new(Activities::new(
        config.downloader.clone(),
        Arc::new(bus.clone()),
        Arc::new(store),
        Arc::new(catalogue),
        config.store.bucket.clone(),
    ));

    let scheduler = LocalScheduler::new();
    let addr = SocketAddr::new(config.server.host, config.server.port);
    let state = Arc::new(AppState::new(
        config,
        bus.clone(),
        scheduler.clone(),
        activities,
    ));
    let app = create_router(state);

    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!(
        running = scheduler.running_count(),
        "Server shutting down, closing message bus"
    );
    bus.close();

    Ok(())
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
            Ok(mut sig) => {
                sig.recv().await;
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
