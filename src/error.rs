//! Error types for relaybot.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Telegram error: {0}")]
    Telegram(String),

    #[error("Telegram error: {method} failed ({code}): {description}")]
    TelegramRejected {
        method: String,
        code: i64,
        description: String,
    },

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Short class name used when a fault is rendered back to the chat.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "ConfigError",
            Error::Io(_) => "IoError",
            Error::Json(_) => "JsonError",
            Error::Http(e) if e.is_timeout() => "Timeout",
            Error::Http(_) => "HttpError",
            Error::Telegram(_) | Error::TelegramRejected { .. } => "TelegramError",
            Error::Other(_) => "Error",
        }
    }

    /// Telegram refused the HTML markup of a message.
    pub fn is_markup_rejection(&self) -> bool {
        matches!(
            self,
            Error::TelegramRejected { code: 400, description, .. }
                if description.contains("can't parse entities")
        )
    }

    /// Client errors (4xx other than rate limiting) fail the same way on every attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::TelegramRejected { code, .. } => !(400..500).contains(code) || *code == 429,
            _ => true,
        }
    }
}
