//! Process wiring shared by the server and the one-shot importer.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::api::health::HealthState;
use crate::config::{Config, CHANNEL_CAPACITY};
use crate::db::SqliteStore;
use crate::error::Result;
use crate::importer::{HttpFeedSource, ImportRunner, ImportScheduler};
use crate::matcher::OfferMatcher;
use crate::notify::{notification_consumer, OfferPipeline};
use crate::types::Offer;
use crate::wishlist::{CacheBackend, MemoryCache, RedisCache, WishlistReader};

pub struct App {
    pub store: SqliteStore,
    pub reader: Arc<WishlistReader>,
    pub health: Arc<HealthState>,
    pub offer_tx: mpsc::Sender<Offer>,
    pub scheduler: Arc<ImportScheduler>,
    pipeline: JoinHandle<()>,
    notifier: JoinHandle<()>,
}

impl App {
    /// Open the store, pick a cache backend and spawn the offer pipeline and
    /// notification consumer. `shutdown` doubles as the import cancel flag.
    pub async fn start(cfg: &Config, shutdown: watch::Receiver<bool>) -> Result<Self> {
        let store = SqliteStore::connect(&cfg.db_path).await?;

        let cache: Arc<dyn CacheBackend> = match &cfg.redis_url {
            Some(url) => {
                info!("Wishlist cache: redis at {url}");
                Arc::new(RedisCache::new(url)?)
            }
            None => {
                warn!("REDIS_URL not set; using in-process wishlist cache");
                Arc::new(MemoryCache::new())
            }
        };
        let reader = Arc::new(WishlistReader::new(cache, Arc::new(store.clone())));
        let health = Arc::new(HealthState::new());

        // --- Channels ---
        let (offer_tx, offer_rx) = mpsc::channel::<Offer>(CHANNEL_CAPACITY);
        let (notification_tx, notification_rx) = mpsc::channel(CHANNEL_CAPACITY);

        // --- Spawn tasks ---
        let pipeline = OfferPipeline::new(
            Arc::new(store.clone()),
            Arc::clone(&reader),
            OfferMatcher::new(cfg.word_match_threshold),
            notification_tx,
            Arc::clone(&health),
        );
        let pipeline = tokio::spawn(async move { pipeline.run(offer_rx).await });
        let notifier = tokio::spawn(notification_consumer(notification_rx, Arc::clone(&health)));

        let feed = HttpFeedSource::new(Duration::from_secs(cfg.fetch_timeout_secs), cfg.max_feed_bytes)?;
        let runner = ImportRunner::new(Arc::new(store.clone()), Arc::new(feed), Arc::new(offer_tx.clone()));
        let scheduler = Arc::new(ImportScheduler::new(runner, Arc::clone(&health), shutdown));

        Ok(Self { store, reader, health, offer_tx, scheduler, pipeline, notifier })
    }

    /// Close the offer channel and wait until every queued offer and
    /// notification has been handled.
    ///
    /// The scheduler's runner holds its own sender, so the pipeline only
    /// drains once the scheduler (and any task holding it) is dropped too.
    pub async fn drain(self) {
        let Self { offer_tx, scheduler, pipeline, notifier, .. } = self;
        drop(offer_tx);
        drop(scheduler);

        if let Err(e) = pipeline.await {
            warn!("Offer pipeline task ended abnormally: {e}");
        }
        if let Err(e) = notifier.await {
            warn!("Notification consumer task ended abnormally: {e}");
        }
        info!("Pipeline drained");
    }
}
