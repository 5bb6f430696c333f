use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::mapper::path::{clamp_decimal, clamp_percentage};

// ---------------------------------------------------------------------------
// Offer
// ---------------------------------------------------------------------------

/// One observed product listing, in the ingestion wire shape.
///
/// Prices of `0.0` and percentages of `0` mean "unknown"/"none".
/// `discount_percentage` is internal: never serialized, and left at zero when
/// the source does not carry it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    #[serde(rename = "titulo")]
    pub product_name: String,
    #[serde(default)]
    pub price: f64,
    #[serde(rename = "oldPrice", default)]
    pub original_price: f64,
    #[serde(default)]
    pub details: String,
    #[serde(rename = "percentCashback", default)]
    pub cashback_percentage: u8,
    #[serde(skip)]
    pub discount_percentage: u8,
    #[serde(default)]
    pub source: String,
    #[serde(default = "Utc::now")]
    pub received_at: DateTime<Utc>,
}

impl Offer {
    pub fn new(product_name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            product_name: product_name.into(),
            price: 0.0,
            original_price: 0.0,
            details: String::new(),
            cashback_percentage: 0,
            discount_percentage: 0,
            source: source.into(),
            received_at: Utc::now(),
        }
    }

    /// Force prices and percentages into their valid ranges, replacing
    /// anything out of range with the "unknown" zero value.
    pub fn normalize(&mut self) {
        self.price = clamp_decimal(self.price);
        self.original_price = clamp_decimal(self.original_price);
        self.cashback_percentage = clamp_percentage(i64::from(self.cashback_percentage));
        self.discount_percentage = clamp_percentage(i64::from(self.discount_percentage));
    }
}

// ---------------------------------------------------------------------------
// Wishlist criteria
// ---------------------------------------------------------------------------

/// One user's standing rule. Read-only to this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WishlistCriterion {
    pub id: i64,
    pub telegram_id: i64,
    pub product_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_percentage: Option<u8>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Match notifications
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Price,
    Discount,
}

impl std::fmt::Display for MatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchKind::Price => write!(f, "price"),
            MatchKind::Discount => write!(f, "discount"),
        }
    }
}

/// One criterion satisfied by one offer. Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchNotification {
    pub telegram_id: i64,
    pub product_name: String,
    pub price: f64,
    pub original_price: f64,
    pub discount_percentage: u8,
    pub cashback_percentage: u8,
    pub wishlist_id: i64,
    pub match_type: MatchKind,
}

// ---------------------------------------------------------------------------
// Import templates
// ---------------------------------------------------------------------------

/// A named mapping schema plus its remote source and run state.
/// `mapping_schema` is the raw JSON text; it is validated when created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportTemplate {
    pub id: i64,
    pub name: String,
    pub source_url: String,
    pub mapping_schema: String,
    pub is_active: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Payload for creating a template.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTemplate {
    pub name: String,
    pub source_url: String,
    pub mapping_schema: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// Outcome of one import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub templates_attempted: usize,
    pub templates_succeeded: usize,
    pub offers_emitted: usize,
    /// Elements that failed mapping or emission and were skipped.
    pub elements_skipped: usize,
    /// True when the run stopped early on the shutdown flag.
    pub cancelled: bool,
}
