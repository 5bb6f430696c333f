//! Database row types for the tables in `migrations/`.

use chrono::{DateTime, Utc};

use crate::types::{ImportTemplate, WishlistCriterion};

#[derive(Debug, sqlx::FromRow)]
pub struct WishlistRow {
    pub id: i64,
    pub telegram_id: i64,
    pub product_name: String,
    pub target_price: Option<f64>,
    pub discount_percentage: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl From<WishlistRow> for WishlistCriterion {
    fn from(row: WishlistRow) -> Self {
        Self {
            id: row.id,
            telegram_id: row.telegram_id,
            product_name: row.product_name,
            target_price: row.target_price,
            // Out-of-range thresholds are treated as undefined.
            discount_percentage: row
                .discount_percentage
                .and_then(|d| u8::try_from(d).ok())
                .filter(|d| *d <= 100),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct TemplateRow {
    pub id: i64,
    pub name: String,
    pub source_url: String,
    pub mapping_schema: String,
    pub is_active: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<TemplateRow> for ImportTemplate {
    fn from(row: TemplateRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            source_url: row.source_url,
            mapping_schema: row.mapping_schema,
            is_active: row.is_active,
            last_run_at: row.last_run_at,
            created_at: row.created_at,
        }
    }
}
