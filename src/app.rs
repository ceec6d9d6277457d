//! Application wiring and the two long-running activities: the scheduler
//! loop (time-driven) and the command listener (event-driven).
//!
//! Both drive the same fetch → compose → shorten → broadcast → persist cycle
//! and run concurrently; the store task is the only shared mutable state
//! between them.
use crate::config::{Config, Credentials, TOPICS};
use crate::digest::{self, DigestEntry};
use crate::news::NewsApi;
use crate::shorten::Shortener;
use crate::store::StoreHandle;
use crate::telegram::{Bot, Update};
use anyhow::{Context, Result};
use std::time::Duration;

/// Reply sent synchronously on `/start`, before the one-off digest runs.
pub const SUBSCRIBE_CONFIRMATION: &str =
    "You will now receive tech news updates every 3 hours.";

/// How long Telegram may hold a `getUpdates` request open.
const LISTENER_POLL_SECS: u64 = 50;

/// Pause after a failed `getUpdates` before polling again.
const LISTENER_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Result of one digest cycle.
#[derive(Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A digest went out; `failed` recipients are already logged.
    Sent {
        headlines: usize,
        delivered: usize,
        failed: usize,
    },
    /// Every topic was exhausted without an unseen headline surviving
    /// shortening. Informational, not an error — nothing was sent or
    /// persisted.
    NoNewContent,
    /// Nobody to send to (and no explicit target was given).
    NoSubscribers,
}

/// Scheduler states: healthy cadence vs. backed-off recovery after a failed
/// cycle. Retries are unlimited; the backoff is what's bounded.
enum SchedulerState {
    Running,
    Recovering { attempt: u32 },
}

pub struct App {
    config: Config,
    news: NewsApi,
    shortener: Shortener,
    bot: Bot,
    store: StoreHandle,
}

impl App {
    /// Wire up all clients from immutable config and credentials. The
    /// reqwest client is shared across the three HTTP collaborators.
    pub fn new(
        config: Config,
        credentials: &Credentials,
        client: reqwest::Client,
        store: StoreHandle,
    ) -> Self {
        let news = NewsApi::new(
            client.clone(),
            config.news_api_base.clone(),
            credentials.news_api_key.clone(),
            Duration::from_secs(config.rate_limit_backoff_secs),
        );
        let shortener = Shortener::new(client.clone(), config.shortener_base.clone());
        let bot = Bot::new(
            client,
            config.telegram_api_base.clone(),
            credentials.bot_token.clone(),
        );
        Self {
            config,
            news,
            shortener,
            bot,
            store,
        }
    }

    /// Run one full digest cycle.
    ///
    /// With `target = Some(chat_id)` the digest goes only to that chat (the
    /// subscribe path); with `None` it goes to every known subscriber (the
    /// scheduled path).
    ///
    /// Failure containment: a fetch failure costs one topic, a shorten
    /// failure costs one headline, a send failure costs one recipient. The
    /// surviving headlines' source URLs are recorded as sent once the
    /// broadcast has been attempted.
    ///
    /// # Errors
    ///
    /// Only store access can fail the cycle as a whole; the scheduler
    /// recovers from that with backoff rather than terminating.
    pub async fn run_cycle(&self, target: Option<&str>) -> Result<CycleOutcome> {
        let recipients: Vec<String> = match target {
            Some(chat_id) => vec![chat_id.to_string()],
            None => {
                let subscribers = self
                    .store
                    .subscribers()
                    .await
                    .context("Failed to load subscribers")?;
                subscribers.into_iter().collect()
            }
        };
        if recipients.is_empty() {
            tracing::info!("No subscribers registered, skipping cycle");
            return Ok(CycleOutcome::NoSubscribers);
        }

        let sent_urls = self
            .store
            .sent_urls()
            .await
            .context("Failed to load sent URLs")?;

        let selected = digest::compose(&self.news, &TOPICS, &sent_urls).await;
        if selected.is_empty() {
            tracing::info!("No new headlines found");
            return Ok(CycleOutcome::NoNewContent);
        }

        // Shorten each selected headline; a shortener failure drops that one
        // headline and leaves its URL unrecorded, so it stays eligible for a
        // later cycle.
        let mut entries = Vec::with_capacity(selected.len());
        for headline in selected {
            match self.shortener.shorten(&headline.source_url).await {
                Ok(short_url) => entries.push(DigestEntry {
                    title: headline.title,
                    source_url: headline.source_url,
                    short_url,
                }),
                Err(e) => {
                    tracing::warn!(
                        url = %headline.source_url,
                        error = %e,
                        "Shortening failed, dropping headline"
                    );
                }
            }
        }
        if entries.is_empty() {
            tracing::info!("All selected headlines dropped during shortening");
            return Ok(CycleOutcome::NoNewContent);
        }

        let message = digest::render(&entries);
        let outcomes = self.bot.broadcast(&message, &recipients).await;
        let failed = outcomes.iter().filter(|(_, r)| r.is_err()).count();

        let consumed: Vec<String> = entries.into_iter().map(|e| e.source_url).collect();
        let headlines = consumed.len();
        self.store
            .record_sent(consumed)
            .await
            .context("Failed to record sent URLs")?;

        Ok(CycleOutcome::Sent {
            headlines,
            delivered: outcomes.len() - failed,
            failed,
        })
    }

    /// Time-driven loop: broadcast to all subscribers, sleep the configured
    /// interval, repeat forever. A failed cycle moves the loop into
    /// `Recovering` with exponential, capped backoff instead of terminating.
    pub async fn run_scheduler(&self) {
        let interval = Duration::from_secs(self.config.digest_interval_minutes * 60);
        let mut state = SchedulerState::Running;

        loop {
            match self.run_cycle(None).await {
                Ok(outcome) => {
                    tracing::info!(outcome = ?outcome, "Scheduled cycle complete");
                    state = SchedulerState::Running;
                    tokio::time::sleep(interval).await;
                }
                Err(e) => {
                    let attempt = match state {
                        SchedulerState::Running => 0,
                        SchedulerState::Recovering { attempt } => attempt.saturating_add(1),
                    };
                    let delay = recovery_delay(
                        self.config.recovery_delay_secs,
                        self.config.max_recovery_delay_secs,
                        attempt,
                    );
                    tracing::error!(
                        error = %e,
                        attempt = attempt,
                        retry_in_secs = delay.as_secs(),
                        "Digest cycle failed, recovering"
                    );
                    state = SchedulerState::Recovering { attempt };
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Event-driven loop: long-poll `getUpdates` and react to `/start`
    /// commands. Transport failures pause briefly and re-poll; they are
    /// never fatal.
    pub async fn run_listener(&self) {
        let mut offset = 0i64;
        loop {
            match self.bot.get_updates(offset, LISTENER_POLL_SECS).await {
                Ok(updates) => {
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        if let Err(e) = self.handle_update(update).await {
                            tracing::warn!(error = %e, "Failed to handle update");
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        retry_in_secs = LISTENER_RETRY_DELAY.as_secs(),
                        "getUpdates failed, retrying"
                    );
                    tokio::time::sleep(LISTENER_RETRY_DELAY).await;
                }
            }
        }
    }

    /// React to one inbound update. Anything that is not a `/start` command
    /// is ignored.
    ///
    /// On `/start`: register the sender (idempotent), confirm synchronously,
    /// then run a one-off digest cycle addressed only to them. The
    /// confirmation goes out regardless of the ensuing digest outcome.
    pub async fn handle_update(&self, update: Update) -> Result<()> {
        let Some(message) = update.message else {
            return Ok(());
        };
        let Some(text) = message.text.as_deref() else {
            return Ok(());
        };
        if !is_start_command(text) {
            return Ok(());
        }

        let chat_id = message.chat.id.to_string();
        let newly_added = self
            .store
            .add_subscriber(&chat_id)
            .await
            .context("Failed to save subscriber")?;
        tracing::info!(chat_id = %chat_id, newly_added = newly_added, "Subscribe command");

        if let Err(e) = self.bot.send_message(&chat_id, SUBSCRIBE_CONFIRMATION).await {
            tracing::warn!(chat_id = %chat_id, error = %e, "Failed to send confirmation");
        }

        match self.run_cycle(Some(&chat_id)).await {
            Ok(outcome) => {
                tracing::info!(chat_id = %chat_id, outcome = ?outcome, "Welcome digest cycle complete");
            }
            Err(e) => {
                tracing::warn!(chat_id = %chat_id, error = %e, "Welcome digest cycle failed");
            }
        }
        Ok(())
    }
}

/// Exponential recovery backoff, capped at `max_secs`.
fn recovery_delay(base_secs: u64, max_secs: u64, attempt: u32) -> Duration {
    let factor = 2u64.saturating_pow(attempt.min(20));
    Duration::from_secs(base_secs.saturating_mul(factor).min(max_secs))
}

/// `/start` optionally carries the bot's username (`/start@SomeBot`) in
/// group chats, and may be followed by a deep-link payload.
fn is_start_command(text: &str) -> bool {
    let first = text.split_whitespace().next().unwrap_or("");
    first == "/start" || first.starts_with("/start@")
}
