use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::api::health::HealthState;
use crate::error::{AppError, Result};
use crate::matcher::OfferMatcher;
use crate::notify::formatter::format_notification;
use crate::types::{MatchNotification, Offer};
use crate::wishlist::WishlistReader;

/// Append-only offer persistence.
#[async_trait]
pub trait OfferStore: Send + Sync {
    /// Insert one offer and return its row id.
    async fn save_offer(&self, offer: &Offer) -> Result<i64>;
}

/// Consumes offers: persist, match against every wishlist, forward matches.
///
/// A failure on one offer is logged and never blocks the next one.
pub struct OfferPipeline {
    store: Arc<dyn OfferStore>,
    reader: Arc<WishlistReader>,
    matcher: OfferMatcher,
    notification_tx: mpsc::Sender<MatchNotification>,
    health: Arc<HealthState>,
}

impl OfferPipeline {
    pub fn new(
        store: Arc<dyn OfferStore>,
        reader: Arc<WishlistReader>,
        matcher: OfferMatcher,
        notification_tx: mpsc::Sender<MatchNotification>,
        health: Arc<HealthState>,
    ) -> Self {
        Self { store, reader, matcher, notification_tx, health }
    }

    pub async fn run(self, mut offer_rx: mpsc::Receiver<Offer>) {
        while let Some(offer) = offer_rx.recv().await {
            match self.handle_offer(&offer).await {
                Ok(n) => {
                    self.health.inc_offers_processed();
                    if n > 0 {
                        info!(notifications = n, "Sent {n} notifications for offer: {}", offer.product_name);
                    }
                }
                Err(e) => {
                    self.health.inc_offers_failed();
                    error!(product = %offer.product_name, "Offer processing failed: {e}");
                }
            }
        }
        debug!("Offer channel closed; pipeline stopped");
    }

    /// Returns the number of notifications forwarded. Store and wishlist
    /// read errors fail this offer only.
    pub async fn handle_offer(&self, offer: &Offer) -> Result<usize> {
        debug!(source = %offer.source, "Processing offer: {} - R$ {:.2}", offer.product_name, offer.price);

        self.store.save_offer(offer).await?;

        let criteria = self.reader.get_all().await?;
        let notifications = self.matcher.match_offer(offer, &criteria);
        let count = notifications.len();

        for notification in notifications {
            self.notification_tx
                .send(notification)
                .await
                .map_err(|e| AppError::ChannelSend(e.to_string()))?;
        }
        self.health.add_notifications_emitted(count as u64);

        Ok(count)
    }
}

/// Formats and logs each notification, counting it as delivered. Delivery to
/// the user is handled by whatever reads these logs or replaces this consumer.
pub async fn notification_consumer(mut rx: mpsc::Receiver<MatchNotification>, health: Arc<HealthState>) {
    while let Some(notification) = rx.recv().await {
        let text = format_notification(&notification);
        info!(
            event = "NOTIFY",
            telegram_id = notification.telegram_id,
            wishlist_id = notification.wishlist_id,
            match_type = %notification.match_type,
            "{text}",
        );
        health.inc_notifications_delivered();
    }
    debug!("Notification channel closed; consumer stopped");
}
