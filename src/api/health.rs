//! Shared health state for the /health endpoint.
//! Updated by the offer pipeline, the notification consumer and the import scheduler.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::Serialize;

#[derive(Default)]
pub struct HealthState {
    offers_processed: AtomicU64,
    offers_failed: AtomicU64,
    notifications_emitted: AtomicU64,
    notifications_delivered: AtomicU64,
    /// Unix seconds of the last finished import run (0 = none yet).
    last_import_at: AtomicU64,
    import_running: AtomicBool,
}

#[derive(Debug, Serialize)]
pub struct HealthSnapshot {
    pub status: &'static str,
    pub offers_processed: u64,
    pub offers_failed: u64,
    pub notifications_emitted: u64,
    pub notifications_delivered: u64,
    pub last_import_at: Option<u64>,
    pub import_running: bool,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_offers_processed(&self) {
        self.offers_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_offers_failed(&self) {
        self.offers_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_notifications_emitted(&self, n: u64) {
        self.notifications_emitted.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc_notifications_delivered(&self) {
        self.notifications_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_import_running(&self, v: bool) {
        self.import_running.store(v, Ordering::Relaxed);
    }

    pub fn set_last_import_at(&self, unix_secs: u64) {
        self.last_import_at.store(unix_secs, Ordering::Relaxed);
    }

    pub fn import_running(&self) -> bool {
        self.import_running.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        let last = self.last_import_at.load(Ordering::Relaxed);
        HealthSnapshot {
            status: "ok",
            offers_processed: self.offers_processed.load(Ordering::Relaxed),
            offers_failed: self.offers_failed.load(Ordering::Relaxed),
            notifications_emitted: self.notifications_emitted.load(Ordering::Relaxed),
            notifications_delivered: self.notifications_delivered.load(Ordering::Relaxed),
            last_import_at: (last > 0).then_some(last),
            import_running: self.import_running(),
        }
    }
}
