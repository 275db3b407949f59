//! Free-form questions: workspace context plus one completion call.

use std::fmt;
use std::sync::Arc;

use crate::config::Settings;
use crate::context;
use crate::exec::Executor;
use crate::telegram::escape_html;

use super::claude::ClaudeApi;
use super::provider::{CompletionBackend, CompletionRequest, CompletionResponse};

pub const NOT_CONFIGURED: &str = "ANTHROPIC_API_KEY is not configured.";
pub const NO_RESPONSE: &str = "(no response)";

/// Result of [`QueryClient::ask`]. Every variant renders to displayable text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    Answer(String),
    NotConfigured,
    Failed(String),
}

impl QueryOutcome {
    pub fn is_answer(&self) -> bool {
        matches!(self, QueryOutcome::Answer(_))
    }

    pub fn into_text(self) -> String {
        match self {
            QueryOutcome::Answer(text) | QueryOutcome::Failed(text) => text,
            QueryOutcome::NotConfigured => NOT_CONFIGURED.to_string(),
        }
    }

    /// Text for an HTML-mode reply. Answers are already Telegram HTML; error
    /// text may carry raw upstream bodies and is escaped.
    pub fn into_html(self) -> String {
        match self {
            QueryOutcome::Failed(text) => escape_html(&text),
            other => other.into_text(),
        }
    }

    fn from_response(response: CompletionResponse) -> Self {
        if let Some(err) = response.error {
            return QueryOutcome::Failed(format!("API error {}: {}", err.kind, err.message));
        }
        QueryOutcome::Answer(response.text().unwrap_or_else(|| NO_RESPONSE.to_string()))
    }
}

impl fmt::Display for QueryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryOutcome::Answer(text) | QueryOutcome::Failed(text) => f.write_str(text),
            QueryOutcome::NotConfigured => f.write_str(NOT_CONFIGURED),
        }
    }
}

/// Fixed instruction sent with every question.
pub fn system_prompt(settings: &Settings) -> String {
    format!(
        "Assistant for the {} project ({}). \
         Answer in {}, concisely, based on the project context line that opens the user's message. \
         Telegram HTML format only: <b>, <i>, <code>, <pre>. Max 3500 chars.",
        settings.project_name,
        settings.workspace.display(),
        settings.language
    )
}

pub struct QueryClient {
    backend: Option<Arc<dyn CompletionBackend>>,
    executor: Arc<dyn Executor>,
    model: String,
    max_tokens: u32,
    system: String,
}

impl QueryClient {
    pub fn new(
        backend: Option<Arc<dyn CompletionBackend>>,
        executor: Arc<dyn Executor>,
        settings: &Settings,
    ) -> Self {
        Self {
            backend,
            executor,
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            system: system_prompt(settings),
        }
    }

    /// Client backed by the Messages API, or an unconfigured one without a key.
    pub fn from_settings(settings: &Settings, executor: Arc<dyn Executor>) -> Self {
        let backend = settings
            .api_key
            .as_deref()
            .map(|key| Arc::new(ClaudeApi::new(key)) as Arc<dyn CompletionBackend>);
        Self::new(backend, executor, settings)
    }

    /// Answer a free-form question. Never fails; errors come back as text.
    pub async fn ask(&self, question: &str) -> QueryOutcome {
        let Some(backend) = &self.backend else {
            tracing::warn!("Free-form question received but no API key is configured");
            return QueryOutcome::NotConfigured;
        };

        let ctx = context::gather(self.executor.as_ref()).await;
        let request = CompletionRequest::single_turn(
            &self.model,
            self.max_tokens,
            &self.system,
            format!("{}\n{}", ctx, question),
        );

        tracing::info!("Asking {} ({})", backend.name(), self.model);
        match backend.complete(&request).await {
            Ok(response) => {
                let outcome = QueryOutcome::from_response(response);
                if let QueryOutcome::Failed(ref msg) = outcome {
                    tracing::warn!("{} returned an error: {}", backend.name(), msg);
                }
                outcome
            }
            Err(e) => {
                tracing::error!("{} request failed: {}: {}", backend.name(), e.kind(), e);
                QueryOutcome::Failed(format!("Error: {}: {}", e.kind(), e.detail()))
            }
        }
    }
}
