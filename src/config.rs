//! Configuration for relaybot.
//!
//! Everything is read once from flags or the environment into [`Settings`],
//! which is then handed to each component. Nothing else looks at the
//! environment.

use clap::Args;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::Error;
pub type Result<T> = std::result::Result<T, Error>;

pub const DEFAULT_MODEL: &str = "claude-haiku-4-5-20251001";
pub const DEFAULT_MAX_TOKENS: u32 = 1024;
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 4000;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_PROBE_ADDR: &str = "8.8.8.8:53";
pub const DEFAULT_TEST_COMMAND: &str = "cargo test";

/// Get the relaybot data directory (logs, offset file).
pub fn data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("com", "relaybot", "relaybot")
        .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;

    Ok(dirs.data_dir().to_path_buf())
}

/// Default location of the persisted update cursor.
pub fn default_offset_path() -> PathBuf {
    data_dir()
        .map(|d| d.join("offset"))
        .unwrap_or_else(|_| PathBuf::from(".relaybot_offset"))
}

/// Flags shared by every subcommand, each bound to an environment variable.
#[derive(Args, Debug, Clone, Default)]
pub struct SettingsArgs {
    /// Telegram bot token
    #[arg(long, global = true, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    pub bot_token: Option<String>,

    /// The only chat allowed to talk to the bot
    #[arg(long, global = true, env = "TELEGRAM_CHAT_ID", allow_hyphen_values = true)]
    pub chat_id: Option<i64>,

    /// Anthropic API key; free-form questions are disabled without it
    #[arg(long, global = true, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Git workspace the fixed commands run in
    #[arg(long, global = true, env = "RELAYBOT_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Project name used in the announcement and the model prompt
    #[arg(long, global = true, env = "RELAYBOT_PROJECT_NAME")]
    pub project_name: Option<String>,

    /// File holding the update cursor
    #[arg(long, global = true, env = "RELAYBOT_OFFSET_FILE")]
    pub offset_file: Option<PathBuf>,

    /// Seconds to wait between polls
    #[arg(long, global = true, env = "RELAYBOT_POLL_INTERVAL")]
    pub poll_interval: Option<u64>,

    /// Maximum characters per outgoing message
    #[arg(long, global = true, env = "RELAYBOT_MAX_MESSAGE_LEN")]
    pub max_message_len: Option<usize>,

    /// Model used for free-form questions
    #[arg(long, global = true, env = "RELAYBOT_MODEL")]
    pub model: Option<String>,

    /// Output token ceiling for the model
    #[arg(long, global = true, env = "RELAYBOT_MAX_TOKENS")]
    pub max_tokens: Option<u32>,

    /// Language the model answers in
    #[arg(long, global = true, env = "RELAYBOT_LANGUAGE")]
    pub language: Option<String>,

    /// Command behind /tests, split on whitespace
    #[arg(long, global = true, env = "RELAYBOT_TEST_COMMAND")]
    pub test_command: Option<String>,

    /// host:port used to check that the network is up
    #[arg(long, global = true, env = "RELAYBOT_PROBE_ADDR")]
    pub probe_addr: Option<String>,
}

/// Immutable runtime settings.
#[derive(Clone, Debug)]
pub struct Settings {
    pub bot_token: Option<String>,
    pub chat_id: Option<i64>,
    pub api_key: Option<String>,
    pub workspace: PathBuf,
    pub project_name: String,
    pub offset_file: PathBuf,
    pub poll_interval: Duration,
    pub max_message_len: usize,
    pub model: String,
    pub max_tokens: u32,
    pub language: String,
    pub test_command: Vec<String>,
    pub probe_addr: String,
}

impl Settings {
    /// Build settings from parsed flags, filling in defaults.
    pub fn from_args(args: &SettingsArgs) -> Result<Self> {
        let workspace = match &args.workspace {
            Some(path) => path.clone(),
            None => std::env::current_dir()?,
        };
        if !workspace.is_dir() {
            return Err(Error::Config(format!(
                "Workspace {} is not a directory",
                workspace.display()
            )));
        }

        let project_name = args
            .project_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| project_name_from(&workspace));

        let test_command = split_command(
            args.test_command.as_deref().unwrap_or(DEFAULT_TEST_COMMAND),
        );
        if test_command.is_empty() {
            return Err(Error::Config("RELAYBOT_TEST_COMMAND is empty".to_string()));
        }

        let max_message_len = args.max_message_len.unwrap_or(DEFAULT_MAX_MESSAGE_LEN);
        if max_message_len < 100 {
            return Err(Error::Config(format!(
                "RELAYBOT_MAX_MESSAGE_LEN must be at least 100, got {}",
                max_message_len
            )));
        }

        Ok(Self {
            bot_token: non_empty(args.bot_token.clone()),
            chat_id: args.chat_id,
            api_key: non_empty(args.api_key.clone()),
            workspace,
            project_name,
            offset_file: args.offset_file.clone().unwrap_or_else(default_offset_path),
            poll_interval: Duration::from_secs(
                args.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
            ),
            max_message_len,
            model: non_empty(args.model.clone()).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: args.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            language: non_empty(args.language.clone()).unwrap_or_else(|| "English".to_string()),
            test_command,
            probe_addr: non_empty(args.probe_addr.clone())
                .unwrap_or_else(|| DEFAULT_PROBE_ADDR.to_string()),
        })
    }

    /// Bot token and authorized chat, both required to talk to Telegram.
    pub fn require_telegram(&self) -> Result<(&str, i64)> {
        match (self.bot_token.as_deref(), self.chat_id) {
            (Some(token), Some(chat_id)) => Ok((token, chat_id)),
            _ => Err(Error::Config(
                "TELEGRAM_BOT_TOKEN and TELEGRAM_CHAT_ID are required".to_string(),
            )),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: None,
            api_key: None,
            workspace: PathBuf::from("."),
            project_name: "workspace".to_string(),
            offset_file: default_offset_path(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            language: "English".to_string(),
            test_command: split_command(DEFAULT_TEST_COMMAND),
            probe_addr: DEFAULT_PROBE_ADDR.to_string(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn split_command(command: &str) -> Vec<String> {
    command.split_whitespace().map(ToString::to_string).collect()
}

fn project_name_from(workspace: &std::path::Path) -> String {
    workspace
        .canonicalize()
        .ok()
        .as_deref()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "workspace".to_string())
}
