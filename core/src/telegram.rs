//! Telegram Bot API transport.
//!
//! The rest of the crate only sees [`ChatTransport`]; this module supplies
//! the production implementation plus the wire types for the two calls the
//! control plane makes (`getUpdates` long-poll and `sendMessage`).

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::error::Result;
use crate::error::WardenErr;

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Slack beyond the server-side long-poll wait before the HTTP request
/// itself is abandoned.
const POLL_GRACE: Duration = Duration::from_secs(30);
const SEND_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub chat: Option<Chat>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// Operator-side seam. Production is [`TelegramClient`]; tests use a
/// recording fake.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// One long-poll cycle starting at `offset`.
    async fn fetch_updates(&self, offset: i64) -> Result<Vec<Update>>;

    /// Deliver `text`, chunking as needed. Must tolerate arbitrary length.
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    ok: bool,
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    poll_timeout_seconds: u64,
    max_message_chars: usize,
}

impl TelegramClient {
    pub fn new(token: &str, poll_timeout_seconds: u64, max_message_chars: usize) -> Result<Self> {
        Self::with_base_url(token, poll_timeout_seconds, max_message_chars, TELEGRAM_API_BASE)
    }

    /// Same client against an arbitrary API base; integration tests point
    /// this at a local mock server.
    pub fn with_base_url(
        token: &str,
        poll_timeout_seconds: u64,
        max_message_chars: usize,
        base_url: &str,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            poll_timeout_seconds,
            max_message_chars,
        })
    }

    async fn call<T: DeserializeOwned + Default>(
        &self,
        method: &str,
        payload: &serde_json::Value,
        timeout: Duration,
    ) -> Result<T> {
        let url = format!("{}/bot{}/{}", self.base_url, self.token, method);
        let response = self
            .http
            .post(url)
            .timeout(timeout)
            .json(payload)
            .send()
            .await?;
        let envelope: ApiEnvelope<T> = response.json().await?;
        if !envelope.ok {
            return Err(WardenErr::Telegram(
                envelope
                    .description
                    .unwrap_or_else(|| format!("{method} returned ok=false")),
            ));
        }
        envelope
            .result
            .ok_or_else(|| WardenErr::Telegram(format!("{method} returned no result")))
    }
}

#[async_trait]
impl ChatTransport for TelegramClient {
    async fn fetch_updates(&self, offset: i64) -> Result<Vec<Update>> {
        let payload = json!({
            "timeout": self.poll_timeout_seconds,
            "offset": offset,
            "allowed_updates": ["message"],
        });
        self.call(
            "getUpdates",
            &payload,
            Duration::from_secs(self.poll_timeout_seconds) + POLL_GRACE,
        )
        .await
    }

    async fn send_message(&self, chat_id: &str, text: &str) -> Result<()> {
        for chunk in chunk_text(text, self.max_message_chars) {
            let payload = json!({
                "chat_id": chat_id,
                "text": chunk,
                "disable_web_page_preview": true,
            });
            let _: serde_json::Value = self.call("sendMessage", &payload, SEND_TIMEOUT).await?;
        }
        Ok(())
    }
}

/// Split `text` into chunks of at most `max_chars` characters, preferring
/// newline boundaries so multi-part replies stay readable.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }
    let mut parts = Vec::new();
    let mut rest = text;
    while rest.chars().count() > max_chars {
        let limit = rest
            .char_indices()
            .nth(max_chars)
            .map(|(idx, _)| idx)
            .unwrap_or(rest.len());
        let cut = rest[..limit].rfind('\n').unwrap_or(limit);
        parts.push(rest[..cut].trim_end().to_string());
        rest = rest[cut..].trim_start();
    }
    if !rest.is_empty() {
        parts.push(rest.to_string());
    }
    parts
}
