//! Routes one inbound message to a fixed command or to the model.

use std::sync::Arc;
use tokio::task::JoinError;

use crate::commands::{command_token, CommandRegistry, FixedCommand, HELP_TOKEN};
use crate::providers::QueryClient;

use super::outbound::{escape_html, Outbound};

/// Where a message goes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    Help,
    Command(FixedCommand),
    Query,
}

/// Classify a message by its first token. `None` for blank text.
pub fn classify(text: &str, registry: &CommandRegistry) -> Option<Route> {
    let token = command_token(text)?;
    if token == HELP_TOKEN {
        return Some(Route::Help);
    }
    Some(match registry.lookup(&token) {
        Some(cmd) => Route::Command(cmd),
        None => Route::Query,
    })
}

pub struct Dispatcher {
    outbound: Outbound,
    registry: Arc<CommandRegistry>,
    query: Arc<QueryClient>,
}

impl Dispatcher {
    pub fn new(outbound: Outbound, registry: Arc<CommandRegistry>, query: Arc<QueryClient>) -> Self {
        Self {
            outbound,
            registry,
            query,
        }
    }

    pub fn outbound(&self) -> &Outbound {
        &self.outbound
    }

    /// Handle one message end to end. Nothing raised below this point escapes.
    pub async fn handle(&self, text: &str) {
        let Some(route) = classify(text, &self.registry) else {
            tracing::debug!("Dropping blank message");
            return;
        };

        match route {
            Route::Help => {
                self.outbound.send(&self.registry.help_text()).await;
            }
            Route::Command(cmd) => self.run_command(cmd).await,
            Route::Query => self.run_query(text).await,
        }
    }

    async fn run_command(&self, cmd: FixedCommand) {
        let title = cmd.title();
        self.outbound
            .send(&format!("⏳ <b>{}</b>…", escape_html(title)))
            .await;

        // Run on its own task so a panic inside the command is contained.
        let registry = Arc::clone(&self.registry);
        let output = match tokio::spawn(async move { registry.execute(cmd).await }).await {
            Ok(output) => output,
            Err(e) => {
                let fault = describe_fault(e);
                tracing::error!("{} crashed: {}", cmd.token(), fault);
                format!("(error) {}", fault)
            }
        };

        tracing::info!("{} finished ({} chars)", cmd.token(), output.chars().count());
        self.outbound.send_formatted(&output, title).await;
    }

    async fn run_query(&self, text: &str) {
        self.outbound.send("🤔 Querying Claude…").await;

        let query = Arc::clone(&self.query);
        let question = text.to_string();
        match tokio::spawn(async move { query.ask(&question).await }).await {
            Ok(outcome) => {
                self.outbound.send(&outcome.into_html()).await;
            }
            Err(e) => {
                let fault = describe_fault(e);
                tracing::error!("Query crashed: {}", fault);
                self.outbound
                    .send(&format!(
                        "❌ Error processing message: {}",
                        escape_html(&fault)
                    ))
                    .await;
            }
        }
    }
}

/// Human-readable description of a task that did not finish.
fn describe_fault(e: JoinError) -> String {
    if e.is_panic() {
        let payload = e.into_panic();
        if let Some(msg) = payload.downcast_ref::<&str>() {
            return format!("panic: {}", msg);
        }
        if let Some(msg) = payload.downcast_ref::<String>() {
            return format!("panic: {}", msg);
        }
        return "panic".to_string();
    }
    e.to_string()
}
