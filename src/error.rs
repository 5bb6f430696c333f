use axum::{http::StatusCode, response::IntoResponse};
use thiserror::Error;

/// Failures of the field mapper. Both are skipped at the batch level.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("required field {0} is empty after mapping")]
    MissingRequiredField(&'static str),

    #[error("invalid mapping schema: {0}")]
    Schema(String),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed {url} returned status {status}")]
    Fetch { url: String, status: u16 },

    #[error("Feed {url} exceeds {limit} bytes")]
    FeedTooLarge { url: String, limit: usize },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Channel send error: {0}")]
    ChannelSend(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// True for errors that came from the remote feed rather than from us.
    pub fn is_fetch(&self) -> bool {
        matches!(self, AppError::Fetch { .. } | AppError::FeedTooLarge { .. } | AppError::Http(_))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::Mapping(_) | AppError::Json(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Fetch { .. } | AppError::FeedTooLarge { .. } | AppError::Http(_) => StatusCode::BAD_GATEWAY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ChannelSend(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}
