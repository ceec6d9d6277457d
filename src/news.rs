//! News API client: one live request per topic, no caching.
//!
//! Queries a newsapi.org-style endpoint (`/v2/everything?q=<topic>`) and
//! maps the JSON `articles` array into [`Headline`] values. Articles missing
//! a title or URL are kept with an `"N/A"` placeholder rather than dropped.
use futures::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Placeholder emitted when an article lacks a title or URL.
pub const FIELD_PLACEHOLDER: &str = "N/A";

/// Errors that can occur while fetching headlines for one topic.
///
/// All of these are non-fatal to the digest cycle: the caller logs the error
/// and treats the topic as having produced zero headlines.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code (other than 429, which is
    /// handled as backoff-and-continue, not an error)
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the 30-second timeout
    #[error("Request timed out")]
    Timeout,
    /// Response body was not the expected JSON shape
    #[error("Parse error: {0}")]
    Parse(String),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
}

/// A single fetched headline. Transient — produced by [`NewsApi::fetch`] and
/// consumed within one digest cycle, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Headline {
    pub title: String,
    pub source_url: String,
}

/// Client for the news search API.
pub struct NewsApi {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    rate_limit_backoff: Duration,
}

impl NewsApi {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: SecretString,
        rate_limit_backoff: Duration,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key,
            rate_limit_backoff,
        }
    }

    /// Fetch headlines for one topic.
    ///
    /// # Behavior
    ///
    /// - Each call is a live request with a 30-second timeout; there is no
    ///   caching across calls.
    /// - HTTP 429 sleeps the configured fixed backoff and returns an empty
    ///   list. The caller moves on to the next topic or cycle; there is no
    ///   within-call retry.
    /// - Articles missing `title` or `url` are emitted with
    ///   [`FIELD_PLACEHOLDER`], matching the upstream's lenient contract.
    ///
    /// # Errors
    ///
    /// - [`FetchError::HttpStatus`] - Non-2xx response other than 429
    /// - [`FetchError::Network`] / [`FetchError::Timeout`] - Transport failure
    /// - [`FetchError::ResponseTooLarge`] - Body exceeded 10MB
    /// - [`FetchError::Parse`] - Body was not the expected JSON
    pub async fn fetch(&self, topic: &str) -> Result<Vec<Headline>, FetchError> {
        let url = format!("{}/v2/everything", self.base_url);
        let request = self
            .client
            .get(&url)
            .query(&[("q", topic), ("apiKey", self.api_key.expose_secret())]);

        let response = tokio::time::timeout(FETCH_TIMEOUT, request.send())
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(FetchError::Network)?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            tracing::warn!(
                topic = %topic,
                backoff_secs = self.rate_limit_backoff.as_secs(),
                "News API rate limited, backing off"
            );
            tokio::time::sleep(self.rate_limit_backoff).await;
            return Ok(Vec::new());
        }

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        let bytes = read_limited_bytes(response, MAX_RESPONSE_SIZE).await?;
        let body: ApiResponse =
            serde_json::from_slice(&bytes).map_err(|e| FetchError::Parse(e.to_string()))?;

        let headlines: Vec<Headline> = body
            .articles
            .into_iter()
            .map(|a| Headline {
                title: a.title.unwrap_or_else(|| FIELD_PLACEHOLDER.to_string()),
                source_url: a.url.unwrap_or_else(|| FIELD_PLACEHOLDER.to_string()),
            })
            .collect();

        tracing::debug!(topic = %topic, count = headlines.len(), "Fetched headlines");
        Ok(headlines)
    }
}

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    articles: Vec<RawArticle>,
}

#[derive(Deserialize)]
struct RawArticle {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
