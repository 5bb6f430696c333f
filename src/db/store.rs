use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;

use crate::db::models::{TemplateRow, WishlistRow};
use crate::error::Result;
use crate::importer::runner::TemplateStore;
use crate::mapper::MappingSchema;
use crate::notify::pipeline::OfferStore;
use crate::types::{ImportTemplate, NewTemplate, Offer, WishlistCriterion};
use crate::wishlist::WishlistStore;

const WISHLIST_COLUMNS: &str =
    "id, telegram_id, product_name, target_price, discount_percentage, created_at";

const TEMPLATE_COLUMNS: &str =
    "id, name, source_url, mapping_schema, is_active, last_run_at, created_at";

/// SQLite-backed authoritative store for offers, wishlists and templates.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database file and apply migrations.
    pub async fn connect(db_path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{db_path}"))?
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;
        let store = Self::from_pool(pool).await?;
        info!("Database ready at {db_path}");
        Ok(store)
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    /// Single-connection in-memory database; every pooled connection to
    /// `sqlite::memory:` would otherwise see its own empty database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::from_pool(pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn list_templates(&self) -> Result<Vec<ImportTemplate>> {
        let rows: Vec<TemplateRow> = sqlx::query_as(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM import_templates ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ImportTemplate::from).collect())
    }

    /// Insert a template. The schema must parse as a flat field mapping;
    /// this is the only place it is validated.
    pub async fn create_template(&self, new: NewTemplate) -> Result<ImportTemplate> {
        MappingSchema::parse(&new.mapping_schema)?;

        let created_at = Utc::now();
        let id = sqlx::query(
            r#"
            INSERT INTO import_templates (name, source_url, mapping_schema, is_active, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&new.name)
        .bind(&new.source_url)
        .bind(&new.mapping_schema)
        .bind(new.is_active)
        .bind(created_at)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        info!(template_id = id, name = %new.name, "Created import template");

        Ok(ImportTemplate {
            id,
            name: new.name,
            source_url: new.source_url,
            mapping_schema: new.mapping_schema,
            is_active: new.is_active,
            last_run_at: None,
            created_at,
        })
    }
}

impl SqliteStore {
    pub async fn get_template(&self, template_id: i64) -> Result<Option<ImportTemplate>> {
        let row: Option<TemplateRow> = sqlx::query_as(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM import_templates WHERE id = ?"
        ))
        .bind(template_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ImportTemplate::from))
    }

    /// Replace name, source, schema and active flag. The schema is validated
    /// as on create; run history is kept. `None` when the id does not exist.
    pub async fn update_template(&self, template_id: i64, update: NewTemplate) -> Result<Option<ImportTemplate>> {
        MappingSchema::parse(&update.mapping_schema)?;

        let affected = sqlx::query(
            r#"
            UPDATE import_templates
            SET name = ?, source_url = ?, mapping_schema = ?, is_active = ?
            WHERE id = ?
            "#,
        )
        .bind(&update.name)
        .bind(&update.source_url)
        .bind(&update.mapping_schema)
        .bind(update.is_active)
        .bind(template_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if affected == 0 {
            return Ok(None);
        }
        info!(template_id, name = %update.name, active = update.is_active, "Updated import template");
        self.get_template(template_id).await
    }

    /// Returns false when the id does not exist.
    pub async fn delete_template(&self, template_id: i64) -> Result<bool> {
        let affected = sqlx::query("DELETE FROM import_templates WHERE id = ?")
            .bind(template_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if affected > 0 {
            info!(template_id, "Deleted import template");
        }
        Ok(affected > 0)
    }
}

#[async_trait]
impl OfferStore for SqliteStore {
    async fn save_offer(&self, offer: &Offer) -> Result<i64> {
        let id = sqlx::query(
            r#"
            INSERT INTO offers (
                product_name, price, original_price, details,
                discount_percentage, cashback_percentage, source, received_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&offer.product_name)
        .bind(offer.price)
        .bind(offer.original_price)
        .bind(&offer.details)
        .bind(i64::from(offer.discount_percentage))
        .bind(i64::from(offer.cashback_percentage))
        .bind(&offer.source)
        .bind(offer.received_at)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        Ok(id)
    }
}

#[async_trait]
impl WishlistStore for SqliteStore {
    async fn all_criteria(&self) -> Result<Vec<WishlistCriterion>> {
        let rows: Vec<WishlistRow> = sqlx::query_as(&format!(
            "SELECT {WISHLIST_COLUMNS} FROM wishlists ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(WishlistCriterion::from).collect())
    }

    async fn criteria_for_user(&self, telegram_id: i64) -> Result<Vec<WishlistCriterion>> {
        let rows: Vec<WishlistRow> = sqlx::query_as(&format!(
            "SELECT {WISHLIST_COLUMNS} FROM wishlists WHERE telegram_id = ? ORDER BY created_at DESC, id DESC"
        ))
        .bind(telegram_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(WishlistCriterion::from).collect())
    }
}

#[async_trait]
impl TemplateStore for SqliteStore {
    async fn active_templates(&self) -> Result<Vec<ImportTemplate>> {
        let rows: Vec<TemplateRow> = sqlx::query_as(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM import_templates WHERE is_active = 1 ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ImportTemplate::from).collect())
    }

    async fn mark_template_run(&self, template_id: i64, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE import_templates SET last_run_at = ? WHERE id = ?")
            .bind(at)
            .bind(template_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
