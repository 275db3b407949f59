//! Anthropic Messages API backend.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::provider::{CompletionBackend, CompletionRequest, CompletionResponse, ProviderError, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const API_VERSION: &str = "2023-06-01";

/// Upper bound on one completion round trip.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

pub struct ClaudeApi {
    client: Client,
    api_key: String,
    base_url: String,
}

impl ClaudeApi {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl CompletionBackend for ClaudeApi {
    fn name(&self) -> &str {
        "claude"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .timeout(REQUEST_TIMEOUT)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        tracing::debug!("Claude API responded {} ({} bytes)", status, body.len());

        parse_response(status, &body)
    }
}

/// Interpret a Messages API body.
///
/// An `error` object is passed through so the caller can show its type and
/// message; only bodies that are not JSON at all become errors here.
fn parse_response(status: reqwest::StatusCode, body: &str) -> Result<CompletionResponse> {
    match serde_json::from_str::<CompletionResponse>(body) {
        Ok(parsed) if status.is_success() || parsed.error.is_some() => Ok(parsed),
        Ok(_) => Err(ProviderError::ApiError(format!(
            "HTTP {}: {}",
            status,
            snippet(body)
        ))),
        Err(e) if status.is_success() => Err(ProviderError::ParseError(e.to_string())),
        Err(_) => Err(ProviderError::ApiError(format!(
            "HTTP {}: {}",
            status,
            snippet(body)
        ))),
    }
}

fn snippet(body: &str) -> String {
    body.chars().take(200).collect()
}
