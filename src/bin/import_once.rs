//! Runs every active import template once, waits for the resulting offers to
//! be matched, and exits.

use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

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

    let cancel = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Cancellation requested; stopping after the current template");
            let _ = shutdown_tx.send(true);
        }
    });

    let summary = app.scheduler.run_guarded().await.unwrap_or_default();
    cancel.abort();

    let health = app.health.clone();
    app.drain().await;

    let counters = health.snapshot();
    info!(
        templates_attempted = summary.templates_attempted,
        templates_succeeded = summary.templates_succeeded,
        offers_emitted = summary.offers_emitted,
        elements_skipped = summary.elements_skipped,
        cancelled = summary.cancelled,
        offers_processed = counters.offers_processed,
        offers_failed = counters.offers_failed,
        notifications_emitted = counters.notifications_emitted,
        "Import finished",
    );

    Ok(())
}
