// Telegram Bot API transport: getUpdates long polling and sendMessage.
//
// The poller forwards each text message as an [`IncomingMessage`] over an
// mpsc channel; replies go back through the [`Outbound`] trait so the
// message-handling loop can be tested without the network.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// How long to wait after a failed getUpdates call before polling again.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(3);

/// Extra slack on top of the long-poll timeout before the HTTP request
/// itself is abandoned.
const POLL_HTTP_SLACK: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Transport-facing types
// ---------------------------------------------------------------------------

/// One inbound text message, reduced to what the message handler needs.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingMessage {
    pub chat_id: i64,
    pub user_id: i64,
    pub user_name: String,
    pub text: String,
}

/// Outbound reply delivery. Implemented by [`BotClient`] for production and
/// by in-memory recorders in tests.
#[async_trait]
pub trait Outbound {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Bot API wire types
// ---------------------------------------------------------------------------

/// Envelope every Bot API method returns.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl User {
    /// Display name: first name, plus the last name when present.
    pub fn full_name(&self) -> String {
        match &self.last_name {
            Some(last) => format!("{} {}", self.first_name, last),
            None => self.first_name.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// BotClient
// ---------------------------------------------------------------------------

/// Thin Telegram Bot API client.
#[derive(Clone)]
pub struct BotClient {
    http: reqwest::Client,
    base_url: String,
}

impl BotClient {
    /// Create a client for the public Bot API.
    pub fn new(token: &str) -> Self {
        Self::with_base_url(TELEGRAM_API_BASE, token)
    }

    /// Create a client against an alternate API host (tests, proxies).
    pub fn with_base_url(base: &str, token: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");
        Self {
            http,
            base_url: format!("{base}/bot{token}"),
        }
    }

    /// Long-poll for updates after `offset`, blocking server-side for up to
    /// `timeout_secs`. Returns the (possibly empty) batch of updates.
    pub async fn get_updates(&self, offset: Option<i64>, timeout_secs: u64) -> Result<Vec<Update>> {
        let body = serde_json::json!({
            "timeout": timeout_secs,
            "offset": offset,
            "allowed_updates": ["message"],
        });

        let response: ApiResponse<Vec<Update>> = self
            .http
            .post(format!("{}/getUpdates", self.base_url))
            .timeout(Duration::from_secs(timeout_secs) + POLL_HTTP_SLACK)
            .json(&body)
            .send()
            .await
            .context("getUpdates request failed")?
            .json()
            .await
            .context("failed to decode getUpdates response")?;

        if !response.ok {
            bail!(
                "getUpdates rejected: {}",
                response.description.unwrap_or_else(|| "unknown error".into())
            );
        }
        Ok(response.result.unwrap_or_default())
    }

    /// Send a plain-text message to `chat_id`.
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let body = serde_json::json!({ "chat_id": chat_id, "text": text });

        let response: ApiResponse<serde_json::Value> = self
            .http
            .post(format!("{}/sendMessage", self.base_url))
            .json(&body)
            .send()
            .await
            .context("sendMessage request failed")?
            .json()
            .await
            .context("failed to decode sendMessage response")?;

        if !response.ok {
            bail!(
                "sendMessage rejected: {}",
                response.description.unwrap_or_else(|| "unknown error".into())
            );
        }
        Ok(())
    }
}

#[async_trait]
impl Outbound for BotClient {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()> {
        self.send_message(chat_id, text).await
    }
}

// ---------------------------------------------------------------------------
// Polling loop
// ---------------------------------------------------------------------------

/// Poll the Bot API forever, forwarding text messages through `tx`.
///
/// Polling errors are logged and retried after a short delay; the loop only
/// exits when the receiver side of `tx` is dropped (the handler stopped).
pub async fn run(
    client: BotClient,
    poll_timeout_secs: u64,
    tx: mpsc::Sender<IncomingMessage>,
) -> Result<()> {
    let mut offset: Option<i64> = None;

    loop {
        let updates = match client.get_updates(offset, poll_timeout_secs).await {
            Ok(updates) => updates,
            Err(e) => {
                warn!("polling failed: {e:#}");
                tokio::time::sleep(POLL_RETRY_DELAY).await;
                continue;
            }
        };

        offset = next_offset(offset, &updates);

        for update in updates {
            let Some(msg) = incoming_from_update(update) else {
                continue;
            };
            debug!(chat_id = msg.chat_id, "message received");
            if tx.send(msg).await.is_err() {
                return Ok(());
            }
        }
    }
}

/// Advance the getUpdates offset past every update in `batch`.
pub fn next_offset(current: Option<i64>, batch: &[Update]) -> Option<i64> {
    batch
        .iter()
        .map(|u| u.update_id + 1)
        .chain(current)
        .max()
}

/// Reduce one update to an [`IncomingMessage`]. Updates without a text body
/// or a sender (channel posts, service messages, media) are dropped.
pub fn incoming_from_update(update: Update) -> Option<IncomingMessage> {
    let message = update.message?;
    let from = message.from?;
    let text = message.text?;
    Some(IncomingMessage {
        chat_id: message.chat.id,
        user_id: from.id,
        user_name: from.full_name(),
        text,
    })
}
