use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{watch, Mutex};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::api::health::HealthState;
use crate::importer::runner::ImportRunner;
use crate::types::RunSummary;

/// Single-flight wrapper around an [`ImportRunner`].
///
/// Scheduled ticks and on-demand triggers share one guard, so at most one
/// run is active at a time. A trigger that finds a run in progress is
/// rejected instead of queued.
pub struct ImportScheduler {
    runner: ImportRunner,
    guard: Mutex<()>,
    health: Arc<HealthState>,
    shutdown: watch::Receiver<bool>,
}

impl ImportScheduler {
    pub fn new(runner: ImportRunner, health: Arc<HealthState>, shutdown: watch::Receiver<bool>) -> Self {
        Self { runner, guard: Mutex::new(()), health, shutdown }
    }

    /// Run once unless a run is already active, in which case `None`.
    pub async fn run_guarded(&self) -> Option<RunSummary> {
        let Ok(_running) = self.guard.try_lock() else {
            warn!("Import run requested while another run is active; skipping");
            return None;
        };

        self.health.set_import_running(true);
        let summary = self.runner.run_once(&self.shutdown).await;
        self.health.set_import_running(false);
        self.health.set_last_import_at(Utc::now().timestamp().max(0) as u64);

        Some(summary)
    }

    /// Run immediately, then every `every`, until shutdown is signalled.
    pub async fn run(self: Arc<Self>, every: Duration) {
        info!("Starting import scheduler with interval: {:?}", every);

        let mut shutdown = self.shutdown.clone();
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if *shutdown.borrow() {
                        break;
                    }
                    self.run_guarded().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Import scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::importer::feed::FeedSource;
    use crate::importer::runner::{OfferSink, TemplateStore};
    use crate::types::{ImportTemplate, Offer};
    use async_trait::async_trait;
    use chrono::DateTime;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct OneTemplate;

    #[async_trait]
    impl TemplateStore for OneTemplate {
        async fn active_templates(&self) -> Result<Vec<ImportTemplate>> {
            Ok(vec![ImportTemplate {
                id: 1,
                name: "slow".into(),
                source_url: "feed://slow".into(),
                mapping_schema: r#"{"ProductName":"title"}"#.into(),
                is_active: true,
                last_run_at: None,
                created_at: Utc::now(),
            }])
        }

        async fn mark_template_run(&self, _id: i64, _at: DateTime<Utc>) -> Result<()> {
            Ok(())
        }
    }

    struct SlowFeed {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FeedSource for SlowFeed {
        async fn fetch(&self, _url: &str) -> Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(json!([{"title": "x"}]))
        }
    }

    struct NullSink;

    #[async_trait]
    impl OfferSink for NullSink {
        async fn emit(&self, _offer: Offer) -> Result<()> {
            Ok(())
        }
    }

    fn scheduler(feed: Arc<SlowFeed>, shutdown: watch::Receiver<bool>) -> Arc<ImportScheduler> {
        let runner = ImportRunner::new(Arc::new(OneTemplate), feed, Arc::new(NullSink));
        Arc::new(ImportScheduler::new(runner, Arc::new(HealthState::new()), shutdown))
    }

    #[tokio::test]
    async fn overlapping_runs_are_rejected() {
        let feed = Arc::new(SlowFeed { calls: AtomicUsize::new(0) });
        let (_tx, rx) = watch::channel(false);
        let sched = scheduler(feed.clone(), rx);

        let (a, b) = tokio::join!(sched.run_guarded(), sched.run_guarded());
        assert_eq!(a.is_some() as u8 + b.is_some() as u8, 1);
        assert_eq!(feed.calls.load(Ordering::SeqCst), 1);

        // Guard is released afterwards.
        assert!(sched.run_guarded().await.is_some());
        assert!(!sched.health.import_running());
        assert!(sched.health.snapshot().last_import_at.is_some());
    }

    #[tokio::test]
    async fn scheduler_runs_immediately_and_stops_on_shutdown() {
        let feed = Arc::new(SlowFeed { calls: AtomicUsize::new(0) });
        let (tx, rx) = watch::channel(false);
        let sched = scheduler(feed.clone(), rx);

        let handle = tokio::spawn(sched.clone().run(Duration::from_secs(3600)));
        tokio::time::sleep(Duration::from_millis(250)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(feed.calls.load(Ordering::SeqCst), 1);
    }
}
