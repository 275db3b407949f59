//! CLI commands for relaybot using clap.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;

use crate::commands::{command_token, CommandRegistry};
use crate::config::{Settings, SettingsArgs};
use crate::exec::{Executor, ProcessExecutor};
use crate::providers::{QueryClient, QueryOutcome};
use crate::telegram::{self, MessagingBackend, Outbound, TelegramApi};

/// relaybot - drive a git workspace and ask Claude about it from Telegram.
#[derive(Parser)]
#[command(name = "relaybot")]
#[command(version)]
#[command(about = "Telegram relay for a git workspace", long_about = None)]
pub struct Commands {
    #[command(flatten)]
    pub settings: SettingsArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Poll Telegram and answer the authorized chat until interrupted
    Run,

    /// Send one message to the authorized chat
    Send {
        /// Message to send (Telegram HTML unless --plain)
        message: String,

        /// Send without HTML parsing
        #[arg(long)]
        plain: bool,
    },

    /// Ask Claude a question about the workspace and print the answer
    Ask {
        #[arg(required = true)]
        question: Vec<String>,
    },

    /// Run a fixed command locally and print its output
    Exec {
        /// Command token, e.g. /status or status
        command: String,
    },
}

impl Commands {
    /// Run the command.
    pub async fn run(&self) -> Result<()> {
        let settings = Settings::from_args(&self.settings)?;
        match &self.command {
            Command::Run => cmd_run(&settings).await,
            Command::Send { message, plain } => cmd_send(&settings, message, *plain).await,
            Command::Ask { question } => cmd_ask(&settings, &question.join(" ")).await,
            Command::Exec { command } => cmd_exec(&settings, command).await,
        }
    }
}

async fn cmd_run(settings: &Settings) -> Result<()> {
    telegram::run_daemon(settings).await?;
    Ok(())
}

async fn cmd_send(settings: &Settings, message: &str, plain: bool) -> Result<()> {
    let (token, chat_id) = settings.require_telegram()?;
    let backend: Arc<dyn MessagingBackend> = Arc::new(TelegramApi::new(token));
    let outbound = Outbound::new(backend, chat_id, settings.max_message_len);

    let delivered = if plain {
        outbound.send_plain(message).await
    } else {
        outbound.send(message).await
    };
    if !delivered {
        bail!("Message was not delivered, see the log for details");
    }
    println!("Sent to chat {}", chat_id);
    Ok(())
}

async fn cmd_ask(settings: &Settings, question: &str) -> Result<()> {
    let executor: Arc<dyn Executor> = Arc::new(ProcessExecutor::new(&settings.workspace));
    let client = QueryClient::from_settings(settings, executor);

    match client.ask(question).await {
        QueryOutcome::Answer(text) => {
            println!("{}", text);
            Ok(())
        }
        other => bail!("{}", other),
    }
}

async fn cmd_exec(settings: &Settings, command: &str) -> Result<()> {
    let executor: Arc<dyn Executor> = Arc::new(ProcessExecutor::new(&settings.workspace));
    let registry = CommandRegistry::new(
        executor,
        settings.test_command.clone(),
        settings.project_name.clone(),
    );

    let token = normalize_token(command);
    let Some(cmd) = registry.lookup(&token) else {
        bail!(
            "Unknown command {:?}; expected one of: {}",
            command,
            crate::commands::FixedCommand::ALL
                .iter()
                .map(|c| c.token())
                .collect::<Vec<_>>()
                .join(", ")
        );
    };

    println!("{}", registry.execute(cmd).await);
    Ok(())
}

/// `status`, `/status` and `/Status@bot` all name the same command.
fn normalize_token(raw: &str) -> String {
    let trimmed = raw.trim();
    let slashed = if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    };
    command_token(&slashed).unwrap_or(slashed)
}
