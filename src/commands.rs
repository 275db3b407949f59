//! Fixed bot commands that run locally against the workspace.

use std::sync::Arc;
use std::time::Duration;

use crate::exec::{ExecOutput, Executor, DEFAULT_TIMEOUT};
use crate::telegram::escape_html;

/// The test suite gets more room than the git commands.
pub const TESTS_TIMEOUT: Duration = Duration::from_secs(120);

pub const HELP_TOKEN: &str = "/help";

/// A registered command token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FixedCommand {
    Status,
    Log,
    Branch,
    Diff,
    Tests,
}

impl FixedCommand {
    pub const ALL: [FixedCommand; 5] = [
        FixedCommand::Status,
        FixedCommand::Log,
        FixedCommand::Branch,
        FixedCommand::Diff,
        FixedCommand::Tests,
    ];

    pub fn token(&self) -> &'static str {
        match self {
            FixedCommand::Status => "/status",
            FixedCommand::Log => "/git",
            FixedCommand::Branch => "/branch",
            FixedCommand::Diff => "/diff",
            FixedCommand::Tests => "/tests",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            FixedCommand::Status => "Git Status",
            FixedCommand::Log => "Git Log",
            FixedCommand::Branch => "Branch Info",
            FixedCommand::Diff => "Git Diff",
            FixedCommand::Tests => "Test Suite",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            FixedCommand::Status => "git status + branch + last commit",
            FixedCommand::Log => "last 15 commits",
            FixedCommand::Branch => "branch + divergence from origin",
            FixedCommand::Diff => "git diff --stat HEAD",
            FixedCommand::Tests => "run the test suite",
        }
    }
}

/// First whitespace-delimited token, lowercased.
///
/// Telegram appends `@BotName` to commands picked from the menu in group
/// chats; that suffix is dropped so `/status@MyBot` matches `/status`.
pub fn command_token(text: &str) -> Option<String> {
    let token = text.split_whitespace().next()?.to_lowercase();
    if token.starts_with('/') {
        if let Some((cmd, _bot)) = token.split_once('@') {
            return Some(cmd.to_string());
        }
    }
    Some(token)
}

/// Maps command tokens to local operations.
pub struct CommandRegistry {
    executor: Arc<dyn Executor>,
    test_command: Vec<String>,
    project_name: String,
}

impl CommandRegistry {
    pub fn new(
        executor: Arc<dyn Executor>,
        test_command: Vec<String>,
        project_name: impl Into<String>,
    ) -> Self {
        Self {
            executor,
            test_command,
            project_name: project_name.into(),
        }
    }

    pub fn lookup(&self, token: &str) -> Option<FixedCommand> {
        FixedCommand::ALL.into_iter().find(|c| c.token() == token)
    }

    /// Static capability listing for `/help`, in Telegram HTML.
    pub fn help_text(&self) -> String {
        let mut help = format!(
            "<b>{} Bot</b>: quick commands\n\n",
            escape_html(&self.project_name)
        );
        for cmd in FixedCommand::ALL {
            help.push_str(&format!("{:<8} - {}\n", cmd.token(), cmd.description()));
        }
        help.push_str(&format!("{:<8} - this message\n", HELP_TOKEN));
        help.push_str("\n<i>You can also just write a question and Claude will answer.</i>");
        help
    }

    /// Run a command to completion. Failures end up in the returned text.
    pub async fn execute(&self, cmd: FixedCommand) -> String {
        match cmd {
            FixedCommand::Status => self.status().await,
            FixedCommand::Log => self
                .git(&["log", "--oneline", "-15"])
                .await
                .render(),
            FixedCommand::Branch => self.branch().await,
            FixedCommand::Diff => {
                let diff = self.git(&["diff", "--stat", "HEAD"]).await;
                or_placeholder(&diff, "(no changes)")
            }
            FixedCommand::Tests => {
                let argv: Vec<&str> = self.test_command.iter().map(String::as_str).collect();
                self.executor.run(&argv, TESTS_TIMEOUT).await.render()
            }
        }
    }

    async fn git(&self, args: &[&str]) -> ExecOutput {
        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push("git");
        argv.extend_from_slice(args);
        self.executor.run(&argv, DEFAULT_TIMEOUT).await
    }

    async fn status(&self) -> String {
        let branch = self.git(&["branch", "--show-current"]).await.render();
        let last = self.git(&["log", "--oneline", "-1"]).await.render();
        let status = self.git(&["status", "--short"]).await;
        format!(
            "Branch: {}\nLast commit: {}\n\n{}",
            branch,
            last,
            or_placeholder(&status, "(working tree clean)")
        )
    }

    async fn branch(&self) -> String {
        let branch = self.git(&["branch", "--show-current"]).await;
        let Some(name) = branch.stdout().map(str::trim) else {
            return format!("Branch: {}", or_placeholder(&branch, "(detached HEAD)"));
        };

        let range = format!("origin/{}...HEAD", name);
        let counts = self
            .git(&["rev-list", "--left-right", "--count", &range])
            .await;
        let divergence = match counts.stdout().and_then(parse_divergence) {
            Some((behind, ahead)) => format!("behind {}, ahead {}", behind, ahead),
            None => counts.render(),
        };
        format!("Branch: {}\nDivergence from origin: {}", name, divergence)
    }
}

/// `placeholder` for a clean run that printed nothing, rendered output otherwise.
fn or_placeholder(output: &ExecOutput, placeholder: &str) -> String {
    match output {
        ExecOutput::Completed { success: true, .. } if output.stdout().is_none() => {
            placeholder.to_string()
        }
        other => other.render(),
    }
}

/// Parse `git rev-list --left-right --count` output: "<behind>\t<ahead>".
fn parse_divergence(raw: &str) -> Option<(u64, u64)> {
    let mut parts = raw.split_whitespace();
    let behind = parts.next()?.parse().ok()?;
    let ahead = parts.next()?.parse().ok()?;
    Some((behind, ahead))
}
