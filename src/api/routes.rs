use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::warn;

use crate::api::health::{HealthSnapshot, HealthState};
use crate::db::SqliteStore;
use crate::error::{AppError, MappingError};
use crate::importer::ImportScheduler;
use crate::types::{ImportTemplate, NewTemplate, Offer};

/// Source recorded on offers posted without one.
const API_SOURCE: &str = "api";

#[derive(Clone)]
pub struct ApiState {
    pub store: SqliteStore,
    pub scheduler: Arc<ImportScheduler>,
    pub offer_tx: mpsc::Sender<Offer>,
    pub health: Arc<HealthState>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/imports/run", post(run_import))
        .route("/offers", post(post_offer))
        .route("/templates", get(list_templates).post(create_template))
        .route(
            "/templates/:id",
            get(get_template).put(update_template).delete(delete_template),
        )
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_health(State(state): State<ApiState>) -> Json<HealthSnapshot> {
    Json(state.health.snapshot())
}

async fn run_import(State(state): State<ApiState>) -> Response {
    match state.scheduler.run_guarded().await {
        Some(summary) => Json(summary).into_response(),
        None => (StatusCode::CONFLICT, "an import run is already active").into_response(),
    }
}

async fn post_offer(
    State(state): State<ApiState>,
    Json(mut offer): Json<Offer>,
) -> Result<StatusCode, AppError> {
    if offer.product_name.trim().is_empty() {
        return Err(MappingError::MissingRequiredField("ProductName").into());
    }
    if offer.source.is_empty() {
        offer.source = API_SOURCE.to_string();
    }
    offer.normalize();
    offer.received_at = Utc::now();

    // Never block the request on a saturated pipeline.
    state.offer_tx.try_send(offer).map_err(|e| {
        warn!("Offer channel rejected API offer: {e}");
        AppError::ChannelSend(e.to_string())
    })?;

    Ok(StatusCode::ACCEPTED)
}

async fn list_templates(State(state): State<ApiState>) -> Result<Json<Vec<ImportTemplate>>, AppError> {
    Ok(Json(state.store.list_templates().await?))
}

async fn create_template(
    State(state): State<ApiState>,
    Json(new): Json<NewTemplate>,
) -> Result<(StatusCode, Json<ImportTemplate>), AppError> {
    let template = state.store.create_template(new).await?;
    Ok((StatusCode::CREATED, Json(template)))
}

async fn get_template(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<Json<ImportTemplate>, AppError> {
    state
        .store
        .get_template(id)
        .await?
        .map(Json)
        .ok_or_else(|| template_not_found(id))
}

/// Full replacement; also how a template is switched on or off.
async fn update_template(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    Json(update): Json<NewTemplate>,
) -> Result<Json<ImportTemplate>, AppError> {
    state
        .store
        .update_template(id, update)
        .await?
        .map(Json)
        .ok_or_else(|| template_not_found(id))
}

async fn delete_template(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if state.store.delete_template(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(template_not_found(id))
    }
}

fn template_not_found(id: i64) -> AppError {
    AppError::NotFound(format!("import template {id}"))
}
