// src/main.rs - Cover host daemon
use std::sync::Arc;

use clap::Parser;
use cover_rf_sync::config;
use cover_rf_sync::host;
use cover_rf_sync::script::{LogScriptInvoker, ProcessScriptInvoker, ScriptInvoker};
use cover_rf_sync::sensor::SensorBus;
use cover_rf_sync::web;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "cover-host", version, about = "Simulated-position host for RF-controlled covers")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "covers.toml")]
    config: String,

    /// Override the listen address from the configuration
    #[arg(short, long)]
    listen: Option<String>,

    /// Log filter, e.g. `info` or `cover_rf_sync=debug`
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log script invocations instead of running them
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("Starting cover host");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Loading configuration from: {}", args.config);

    let config = config::load_config(&args.config).map_err(|e| {
        tracing::error!("Failed to load config from '{}': {}", args.config, e);
        tracing::error!("Please ensure the configuration file exists and is properly formatted");
        Box::new(e) as Box<dyn std::error::Error + Send + Sync + 'static>
    })?;

    if config.covers.is_empty() {
        tracing::warn!("No covers configured");
    }
    for cover in &config.covers {
        tracing::info!(
            "Cover: {} ({}) open {}s / close {}s, tolerance {:.1}%",
            cover.name,
            cover.entity_id(),
            cover.open_duration_secs(),
            cover.close_duration_secs(),
            cover.tolerance()
        );
    }

    let invoker: Arc<dyn ScriptInvoker> = if args.dry_run {
        Arc::new(LogScriptInvoker)
    } else {
        Arc::new(ProcessScriptInvoker)
    };
    let bus = SensorBus::default();
    let (registry, tasks) = host::spawn_all(&config, &bus, invoker);

    let app = web::api::create_router(registry.clone(), bus);
    let listen = args.listen.unwrap_or_else(|| config.server.listen.clone());
    let listener = tokio::net::TcpListener::bind(&listen).await?;
    tracing::info!("Web API listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutdown requested");
        })
        .await?;

    registry.shutdown().await;
    for task in tasks {
        if let Err(e) = task.await {
            tracing::warn!("Cover task ended abnormally: {}", e);
        }
    }
    tracing::info!("Cover host stopped");
    Ok(())
}
