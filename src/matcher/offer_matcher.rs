use tracing::info;

use crate::config::DEFAULT_WORD_MATCH_THRESHOLD;
use crate::matcher::name_gate::names_match;
use crate::types::{MatchKind, MatchNotification, Offer, WishlistCriterion};

/// Matches offers against wishlist criteria.
///
/// Stateless apart from its policy: safe to share across tasks and to call
/// concurrently for independent offers.
#[derive(Debug, Clone, Copy)]
pub struct OfferMatcher {
    word_match_threshold: f64,
}

impl Default for OfferMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_WORD_MATCH_THRESHOLD)
    }
}

impl OfferMatcher {
    pub fn new(word_match_threshold: f64) -> Self {
        Self { word_match_threshold }
    }

    /// One notification per criterion that passes the name gate and at least
    /// one of its thresholds. Output order follows `criteria`, but callers
    /// must not rely on it.
    pub fn match_offer(&self, offer: &Offer, criteria: &[WishlistCriterion]) -> Vec<MatchNotification> {
        criteria
            .iter()
            .filter_map(|criterion| {
                let kind = self.evaluate(offer, criterion)?;
                info!(
                    event = "MATCH",
                    telegram_id = criterion.telegram_id,
                    wishlist_id = criterion.id,
                    match_type = %kind,
                    "Match found: '{}' for user {} ({kind})",
                    offer.product_name,
                    criterion.telegram_id,
                );
                Some(MatchNotification {
                    telegram_id: criterion.telegram_id,
                    product_name: offer.product_name.clone(),
                    price: offer.price,
                    original_price: offer.original_price,
                    discount_percentage: offer.discount_percentage,
                    cashback_percentage: offer.cashback_percentage,
                    wishlist_id: criterion.id,
                    match_type: kind,
                })
            })
            .collect()
    }

    /// Price is checked first, discount second; when both hold the later
    /// check wins, so the result is `Discount`.
    fn evaluate(&self, offer: &Offer, criterion: &WishlistCriterion) -> Option<MatchKind> {
        if !names_match(&offer.product_name, &criterion.product_name, self.word_match_threshold) {
            return None;
        }

        let mut kind = None;

        if let Some(target) = criterion.target_price {
            if offer.price > 0.0 && offer.price <= target {
                kind = Some(MatchKind::Price);
            }
        }

        if let Some(min_discount) = criterion.discount_percentage {
            if offer.discount_percentage > 0 && offer.discount_percentage >= min_discount {
                kind = Some(MatchKind::Discount);
            }
        }

        kind
    }
}
