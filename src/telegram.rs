//! Minimal Telegram Bot API client: outbound `sendMessage` and inbound
//! `getUpdates` long polling.
//!
//! Only the two methods this bot needs are wrapped; both go through a plain
//! reqwest client against a configurable base URL so tests can point at a
//! mock server.
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

const SEND_TIMEOUT: Duration = Duration::from_secs(20);

/// Extra headroom on top of the long-poll window before the client gives up.
const POLL_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum BotError {
    #[error("Request timed out")]
    Timeout,
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    /// Non-2xx response; carries Telegram's `description` when the body had one.
    #[error("Telegram API error: status {status}, description {description:?}")]
    Api {
        status: u16,
        description: Option<String>,
    },
    #[error("Unexpected response body: {0}")]
    Parse(String),
}

/// One inbound update from `getUpdates`.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Deserialize)]
struct UpdatesEnvelope {
    ok: bool,
    #[serde(default)]
    result: Vec<Update>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize)]
struct SendEnvelope {
    #[serde(default)]
    description: Option<String>,
}

/// Telegram Bot API client.
pub struct Bot {
    client: reqwest::Client,
    base_url: String,
    token: SecretString,
}

impl Bot {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, token: SecretString) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            token,
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token.expose_secret(), method)
    }

    /// Send one Markdown message to one chat.
    ///
    /// # Errors
    ///
    /// Transport failures and non-2xx responses surface as [`BotError`];
    /// the error carries Telegram's `description` field when present so a
    /// blocked bot or an invalid chat id is distinguishable in the logs.
    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), BotError> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "Markdown",
        });

        let request = self.client.post(self.method_url("sendMessage")).json(&body);
        let response = tokio::time::timeout(SEND_TIMEOUT, request.send())
            .await
            .map_err(|_| BotError::Timeout)?
            .map_err(BotError::Network)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let description = response
                .json::<SendEnvelope>()
                .await
                .ok()
                .and_then(|e| e.description);
            return Err(BotError::Api {
                status,
                description,
            });
        }
        Ok(())
    }

    /// Long-poll for new updates.
    ///
    /// `offset` should be one past the highest `update_id` already handled;
    /// `poll_secs` is how long Telegram may hold the request open.
    pub async fn get_updates(&self, offset: i64, poll_secs: u64) -> Result<Vec<Update>, BotError> {
        let request = self.client.get(self.method_url("getUpdates")).query(&[
            ("offset", offset.to_string()),
            ("timeout", poll_secs.to_string()),
        ]);

        let response = tokio::time::timeout(Duration::from_secs(poll_secs) + POLL_GRACE, request.send())
            .await
            .map_err(|_| BotError::Timeout)?
            .map_err(BotError::Network)?;

        if !response.status().is_success() {
            return Err(BotError::Api {
                status: response.status().as_u16(),
                description: None,
            });
        }

        let envelope: UpdatesEnvelope = response
            .json()
            .await
            .map_err(|e| BotError::Parse(e.to_string()))?;
        if !envelope.ok {
            return Err(BotError::Api {
                status: 200,
                description: envelope.description,
            });
        }
        Ok(envelope.result)
    }

    /// Send `text` to each recipient in turn.
    ///
    /// A failure for one recipient is logged and recorded but never aborts
    /// delivery to the rest; there is no retry within the cycle. Returns the
    /// per-recipient outcome in input order.
    pub async fn broadcast(
        &self,
        text: &str,
        recipients: &[String],
    ) -> Vec<(String, Result<(), BotError>)> {
        let mut outcomes = Vec::with_capacity(recipients.len());
        for chat_id in recipients {
            let result = self.send_message(chat_id, text).await;
            if let Err(e) = &result {
                tracing::warn!(chat_id = %chat_id, error = %e, "Failed to send digest to recipient");
            }
            outcomes.push((chat_id.clone(), result));
        }

        let failed = outcomes.iter().filter(|(_, r)| r.is_err()).count();
        tracing::info!(
            recipients = recipients.len(),
            failed = failed,
            "Broadcast complete"
        );
        outcomes
    }
}
