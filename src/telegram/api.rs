//! Minimal Telegram Bot API client: `getUpdates` and `sendMessage`.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Timeout for a single `sendMessage` call.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(15);

/// Extra time on top of the long-poll wait before `getUpdates` gives up.
pub const FETCH_MARGIN: Duration = Duration::from_secs(10);

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Chat {
    pub id: i64,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct IncomingMessage {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

/// One entry of a `getUpdates` result. Non-message updates have no `message`.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
}

impl Update {
    pub fn chat_id(&self) -> Option<i64> {
        self.message.as_ref().map(|m| m.chat.id)
    }

    /// Message text, empty for stickers, photos and other non-text content.
    pub fn text(&self) -> &str {
        self.message
            .as_ref()
            .and_then(|m| m.text.as_deref())
            .unwrap_or("")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseMode {
    Html,
    Plain,
}

#[derive(Deserialize, Debug)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<i64>,
}

/// The two Bot API calls the relay needs.
#[async_trait]
pub trait MessagingBackend: Send + Sync {
    /// Long-poll for updates with `update_id >= offset`.
    async fn get_updates(&self, offset: i64, timeout: Duration) -> Result<Vec<Update>>;

    async fn send_message(&self, chat_id: i64, text: &str, mode: ParseMode) -> Result<()>;
}

/// Bot API over HTTPS with form-encoded POST bodies.
pub struct TelegramApi {
    client: Client,
    base_url: String,
}

impl TelegramApi {
    pub fn new(token: &str) -> Self {
        Self::with_base_url(token, DEFAULT_API_BASE)
    }

    pub fn with_base_url(token: &str, api_base: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: format!("{}/bot{}", api_base.trim_end_matches('/'), token),
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        form: &[(&str, String)],
        timeout: Duration,
    ) -> Result<T> {
        // The token is part of the URL; keep it out of error messages.
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, method))
            .form(form)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| Error::Http(e.without_url()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Http(e.without_url()))?;

        decode_response(method, status, &body)
    }
}

fn decode_response<T: DeserializeOwned>(
    method: &str,
    status: reqwest::StatusCode,
    body: &str,
) -> Result<T> {
    let parsed: ApiResponse<T> = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(e) if status.is_success() => return Err(Error::Json(e)),
        Err(_) => {
            return Err(Error::Telegram(format!("{} failed: HTTP {}", method, status)));
        }
    };

    if !parsed.ok {
        return Err(Error::TelegramRejected {
            method: method.to_string(),
            code: parsed.error_code.unwrap_or(i64::from(status.as_u16())),
            description: parsed
                .description
                .unwrap_or_else(|| "no description".to_string()),
        });
    }

    parsed
        .result
        .ok_or_else(|| Error::Telegram(format!("{} returned no result", method)))
}

#[async_trait]
impl MessagingBackend for TelegramApi {
    async fn get_updates(&self, offset: i64, timeout: Duration) -> Result<Vec<Update>> {
        let form = [
            ("offset", offset.to_string()),
            ("timeout", timeout.as_secs().to_string()),
            ("allowed_updates", r#"["message"]"#.to_string()),
        ];
        self.call("getUpdates", &form, timeout + FETCH_MARGIN).await
    }

    async fn send_message(&self, chat_id: i64, text: &str, mode: ParseMode) -> Result<()> {
        let mut form = vec![("chat_id", chat_id.to_string()), ("text", text.to_string())];
        if mode == ParseMode::Html {
            form.push(("parse_mode", "HTML".to_string()));
        }
        let _sent: serde_json::Value = self.call("sendMessage", &form, SEND_TIMEOUT).await?;
        Ok(())
    }
}
