//! Configuration for the digest bot.
//!
//! Two sources, loaded once at startup and passed explicitly from there on:
//!
//! - An optional TOML file (`headliner.toml` by default) for tunables and
//!   data paths. A missing file yields `Config::default()`; unknown keys are
//!   ignored with a warning.
//! - Environment variables for credentials (`NEWS_API_KEY`, `BOT_TOKEN`).
//!   Absence of either is fatal at startup.
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The fixed, ordered list of search topics.
///
/// Topics are consumed in this order when composing a digest; the list is
/// deliberately not configurable.
pub const TOPICS: [&str; 10] = [
    "Artificial Intelligence",
    "Machine Learning",
    "Blockchain",
    "Cryptocurrency",
    "Startup",
    "Business",
    "Startup funding",
    "Jobs",
    "IT Jobs",
    "Tech news",
];

/// Maximum number of headlines in a single digest.
pub const MAX_HEADLINES: usize = 5;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid base URL for `{key}`: {reason}")]
    InvalidBaseUrl { key: &'static str, reason: String },

    #[error("Missing required environment variable {0}")]
    MissingEnv(&'static str),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the two flat-file stores (subscribers, sent URLs).
    pub data_dir: PathBuf,

    /// Minutes between scheduled digest broadcasts.
    pub digest_interval_minutes: u64,

    /// Initial pause after a failed cycle before the scheduler retries.
    pub recovery_delay_secs: u64,

    /// Upper bound on the scheduler's recovery backoff.
    pub max_recovery_delay_secs: u64,

    /// Fixed pause after the news API answers 429 for a topic.
    pub rate_limit_backoff_secs: u64,

    /// Base URL of the news API (overridable for tests).
    pub news_api_base: String,

    /// Base URL of the URL-shortening service (overridable for tests).
    pub shortener_base: String,

    /// Base URL of the Telegram Bot API (overridable for tests).
    pub telegram_api_base: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            digest_interval_minutes: 180,
            recovery_delay_secs: 60,
            max_recovery_delay_secs: 900,
            rate_limit_backoff_secs: 30,
            news_api_base: "https://newsapi.org".to_string(),
            shortener_base: "https://tinyurl.com".to_string(),
            telegram_api_base: "https://api.telegram.org".to_string(),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB). Anything larger is rejected rather
    /// than read into memory.
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior), logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        // Parse as a raw table first to detect likely typos
        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = [
                "data_dir",
                "digest_interval_minutes",
                "recovery_delay_secs",
                "max_recovery_delay_secs",
                "rate_limit_backoff_secs",
                "news_api_base",
                "shortener_base",
                "telegram_api_base",
            ];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        tracing::info!(
            path = %path.display(),
            interval_minutes = config.digest_interval_minutes,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Reject base URLs that do not parse as http(s), before any client is
    /// built from them.
    fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("news_api_base", &self.news_api_base),
            ("shortener_base", &self.shortener_base),
            ("telegram_api_base", &self.telegram_api_base),
        ] {
            let parsed = url::Url::parse(value)
                .map_err(|e| ConfigError::InvalidBaseUrl { key, reason: e.to_string() })?;
            match parsed.scheme() {
                "http" | "https" => {}
                scheme => {
                    return Err(ConfigError::InvalidBaseUrl {
                        key,
                        reason: format!("unsupported scheme `{scheme}`"),
                    })
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// Credentials
// ============================================================================

/// API credentials, read from the environment at startup.
///
/// Custom Debug impl masks both secrets to prevent leakage in logs, error
/// messages, and debug output.
#[derive(Clone)]
pub struct Credentials {
    /// News API key (`NEWS_API_KEY`).
    pub news_api_key: SecretString,
    /// Telegram bot token (`BOT_TOKEN`).
    pub bot_token: SecretString,
}

impl Credentials {
    /// Read both credentials from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnv`] naming the first absent variable;
    /// the caller treats this as startup-fatal.
    pub fn from_env() -> Result<Self, ConfigError> {
        let news_api_key = std::env::var("NEWS_API_KEY")
            .map_err(|_| ConfigError::MissingEnv("NEWS_API_KEY"))?;
        let bot_token =
            std::env::var("BOT_TOKEN").map_err(|_| ConfigError::MissingEnv("BOT_TOKEN"))?;
        Ok(Self {
            news_api_key: SecretString::from(news_api_key),
            bot_token: SecretString::from(bot_token),
        })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("news_api_key", &"[REDACTED]")
            .field("bot_token", &"[REDACTED]")
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
