//! URL shortener adapter (TinyURL create API).
//!
//! One attempt per URL, no retry. A failure here drops only the headline
//! being shortened, never the whole cycle.
use std::time::Duration;
use thiserror::Error;

const SHORTEN_TIMEOUT: Duration = Duration::from_secs(20);
const MAX_RESPONSE_SIZE: u64 = 4 * 1024; // short URLs are tiny; anything bigger is wrong

#[derive(Debug, Error)]
pub enum ShortenError {
    #[error("Request timed out after 20s")]
    Timeout,
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Shortener returned an empty or oversized response")]
    BadResponse,
}

/// Client for the shortening service.
pub struct Shortener {
    client: reqwest::Client,
    base_url: String,
}

impl Shortener {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Shorten one long URL. Single attempt; the service answers the short
    /// URL as a plain-text body.
    pub async fn shorten(&self, url: &str) -> Result<String, ShortenError> {
        let endpoint = format!("{}/api-create.php", self.base_url);
        let request = self.client.get(&endpoint).query(&[("url", url)]);

        let response = tokio::time::timeout(SHORTEN_TIMEOUT, request.send())
            .await
            .map_err(|_| ShortenError::Timeout)?
            .map_err(ShortenError::Network)?;

        if !response.status().is_success() {
            return Err(ShortenError::HttpStatus(response.status().as_u16()));
        }

        if let Some(len) = response.content_length() {
            if len > MAX_RESPONSE_SIZE {
                return Err(ShortenError::BadResponse);
            }
        }

        let short = response.text().await.map_err(ShortenError::Network)?;
        let short = short.trim();
        if short.is_empty() || short.len() as u64 > MAX_RESPONSE_SIZE {
            return Err(ShortenError::BadResponse);
        }
        Ok(short.to_string())
    }
}
