//! Remote model providers.

pub mod claude;
pub mod provider;
pub mod query;

pub use claude::ClaudeApi;
pub use provider::{CompletionBackend, CompletionRequest, CompletionResponse, ProviderError, Result};
pub use query::{QueryClient, QueryOutcome};
