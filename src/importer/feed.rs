use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::{AppError, Result};

/// Fetches a remote feed document.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Value>;
}

/// HTTP(S) feed fetcher. Every request is bounded by the configured timeout,
/// and bodies larger than `max_bytes` are rejected without being buffered.
#[derive(Clone)]
pub struct HttpFeedSource {
    client: reqwest::Client,
    max_bytes: usize,
}

impl HttpFeedSource {
    pub fn new(timeout: Duration, max_bytes: usize) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, max_bytes })
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self, url: &str) -> Result<Value> {
        let mut resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::Fetch { url: url.to_string(), status: status.as_u16() });
        }

        let too_large = || AppError::FeedTooLarge { url: url.to_string(), limit: self.max_bytes };
        if resp.content_length().is_some_and(|len| len > self.max_bytes as u64) {
            return Err(too_large());
        }

        // Content-Length may be absent or wrong; enforce the cap while reading.
        let mut body = Vec::new();
        while let Some(chunk) = resp.chunk().await? {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }

        debug!(url, bytes = body.len(), "Fetched feed document");
        Ok(serde_json::from_slice(&body)?)
    }
}
