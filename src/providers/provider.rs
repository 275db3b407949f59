//! Completion backend trait and the Messages API wire types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Parse error: {0}")]
    ParseError(String),
}

pub type Result<T> = std::result::Result<T, ProviderError>;

impl ProviderError {
    /// Short class name shown to the user next to the message.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::ApiError(_) => "ApiError",
            ProviderError::HttpError(e) if e.is_timeout() => "Timeout",
            ProviderError::HttpError(e) if e.is_connect() => "ConnectError",
            ProviderError::HttpError(_) => "HttpError",
            ProviderError::ParseError(_) => "ParseError",
        }
    }

    /// The message without the class prefix `Display` adds.
    pub fn detail(&self) -> String {
        match self {
            ProviderError::ApiError(msg) | ProviderError::ParseError(msg) => msg.clone(),
            ProviderError::HttpError(e) => e.to_string(),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Message {
    pub role: String,
    pub content: String,
}

/// Body of a single-turn `/v1/messages` request.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub max_tokens: u32,
    pub system: String,
    pub messages: Vec<Message>,
}

impl CompletionRequest {
    pub fn single_turn(
        model: impl Into<String>,
        max_tokens: u32,
        system: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            max_tokens,
            system: system.into(),
            messages: vec![Message {
                role: "user".to_string(),
                content: user.into(),
            }],
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ApiErrorBody {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub message: String,
}

/// Either an `error` object or a list of content blocks.
#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
pub struct CompletionResponse {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub error: Option<ApiErrorBody>,
}

impl CompletionResponse {
    /// All text blocks joined with newlines, `None` if there were none.
    pub fn text(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .content
            .iter()
            .filter(|b| b.kind == "text")
            .filter_map(|b| b.text.as_deref())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n"))
        }
    }
}

/// Something that answers one completion request.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_to_messages_shape() {
        let req = CompletionRequest::single_turn("m", 1024, "sys", "ctx\nquestion");
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "model": "m",
                "max_tokens": 1024,
                "system": "sys",
                "messages": [{"role": "user", "content": "ctx\nquestion"}],
            })
        );
    }

    #[test]
    fn text_joins_only_text_blocks() {
        let resp: CompletionResponse = serde_json::from_value(serde_json::json!({
            "content": [
                {"type": "text", "text": "first"},
                {"type": "tool_use", "id": "x", "name": "t", "input": {}},
                {"type": "text", "text": "second"}
            ]
        }))
        .unwrap();
        assert_eq!(resp.text().as_deref(), Some("first\nsecond"));
    }

    #[test]
    fn error_payload_parses() {
        let resp: CompletionResponse = serde_json::from_value(serde_json::json!({
            "type": "error",
            "error": {"type": "overloaded_error", "message": "Overloaded"}
        }))
        .unwrap();
        let err = resp.error.unwrap();
        assert_eq!(err.kind, "overloaded_error");
        assert_eq!(err.message, "Overloaded");
        assert!(resp.content.is_empty());
    }
}
