use std::time::Duration;

use crate::error::{AppError, Result};

/// Wishlist cache entries expire after this many seconds unless invalidated first.
pub const WISHLIST_CACHE_TTL_SECS: u64 = 300;

/// Cache key holding every active wishlist criterion.
pub const WISHLIST_ALL_KEY: &str = "wishlists:all";

/// Prefix of the per-user cache key: `wishlist:{telegram_id}`.
pub const WISHLIST_USER_KEY_PREFIX: &str = "wishlist:";

/// Source recorded on imported offers whose schema does not map `Source`.
pub const DEFAULT_IMPORT_SOURCE: &str = "s3-import";

/// Channel capacity for offers and notifications between tasks.
pub const CHANNEL_CAPACITY: usize = 1024;

/// Fraction of a criterion's words that must overlap the offer name for the
/// name gate to pass. Compared with `>=` against an exact fraction.
pub const DEFAULT_WORD_MATCH_THRESHOLD: f64 = 0.5;

/// Default scheduler interval between import runs (minutes).
pub const DEFAULT_IMPORT_INTERVAL_MINUTES: u64 = 60;

/// Longest scheduler period honoured (one year); larger values are capped so
/// timer deadlines stay representable.
pub const MAX_IMPORT_INTERVAL_MINUTES: u64 = 365 * 24 * 60;

/// Default bound on a single remote feed fetch (seconds).
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Default cap on a feed response body (bytes).
pub const DEFAULT_MAX_FEED_BYTES: usize = 16 * 1024 * 1024;

pub fn wishlist_user_key(telegram_id: i64) -> String {
    format!("{WISHLIST_USER_KEY_PREFIX}{telegram_id}")
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    /// Redis connection string (REDIS_URL). `None` selects the in-process cache.
    pub redis_url: Option<String>,
    pub api_port: u16,
    /// Minutes between scheduled import runs (IMPORT_INTERVAL_MINUTES). 0 disables the scheduler.
    pub import_interval_minutes: u64,
    /// Timeout applied to every feed fetch (FETCH_TIMEOUT_SECS)
    pub fetch_timeout_secs: u64,
    /// Name-gate word overlap threshold (WORD_MATCH_THRESHOLD)
    pub word_match_threshold: f64,
    /// Largest feed body accepted (MAX_FEED_BYTES)
    pub max_feed_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let word_match_threshold = std::env::var("WORD_MATCH_THRESHOLD")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|t| (0.0..=1.0).contains(t))
            .unwrap_or(DEFAULT_WORD_MATCH_THRESHOLD);

        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "offer_watch.db".to_string()),
            redis_url: std::env::var("REDIS_URL")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            import_interval_minutes: std::env::var("IMPORT_INTERVAL_MINUTES")
                .unwrap_or_else(|_| DEFAULT_IMPORT_INTERVAL_MINUTES.to_string())
                .parse::<u64>()
                .unwrap_or(DEFAULT_IMPORT_INTERVAL_MINUTES),
            fetch_timeout_secs: std::env::var("FETCH_TIMEOUT_SECS")
                .unwrap_or_else(|_| DEFAULT_FETCH_TIMEOUT_SECS.to_string())
                .parse::<u64>()
                .unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS),
            word_match_threshold,
            max_feed_bytes: std::env::var("MAX_FEED_BYTES")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_MAX_FEED_BYTES),
        })
    }

    /// Scheduler period, or `None` when scheduled imports are disabled.
    pub fn import_interval(&self) -> Option<Duration> {
        (self.import_interval_minutes > 0)
            .then(|| Duration::from_secs(self.import_interval_minutes.min(MAX_IMPORT_INTERVAL_MINUTES) * 60))
    }
}
