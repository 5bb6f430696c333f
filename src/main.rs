use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use offer_watch::api::routes::{router, ApiState};
use offer_watch::app::App;
use offer_watch::config::Config;
use offer_watch::error::Result;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let app = App::start(&cfg, shutdown_rx).await?;

    // Import scheduler (background, every IMPORT_INTERVAL_MINUTES)
    let scheduler_task = if let Some(every) = cfg.import_interval() {
        let scheduler = Arc::clone(&app.scheduler);
        Some(tokio::spawn(async move { scheduler.run(every).await }))
    } else {
        warn!("IMPORT_INTERVAL_MINUTES=0; scheduled imports disabled, use POST /imports/run");
        None
    };

    // HTTP API server
    let api_state = ApiState {
        store: app.store.clone(),
        scheduler: Arc::clone(&app.scheduler),
        offer_tx: app.offer_tx.clone(),
        health: Arc::clone(&app.health),
    };
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, router(api_state))
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await?;

    if let Some(task) = scheduler_task {
        if let Err(e) = task.await {
            warn!("Import scheduler task ended abnormally: {e}");
        }
    }
    app.drain().await;
    info!("Shutdown complete");

    Ok(())
}

/// Resolves on Ctrl-C and flips the shared shutdown flag, which also cancels
/// an in-flight import between templates.
async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
    }
    info!("Shutdown requested");
    let _ = shutdown_tx.send(true);
}
