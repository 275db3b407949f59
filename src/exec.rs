//! Local command execution inside the workspace.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Placeholder shown when a command printed nothing.
pub const NO_OUTPUT: &str = "(no output)";

/// Default timeout for a fixed command.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Outcome of running one local command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecOutput {
    Completed {
        stdout: String,
        stderr: String,
        success: bool,
    },
    TimedOut(Duration),
    Failed(String),
}

impl ExecOutput {
    /// Text shown to the user.
    ///
    /// Stderr is only appended when the command exited non-zero. Leading
    /// whitespace is kept: it is meaningful in `git status --short`.
    pub fn render(&self) -> String {
        match self {
            ExecOutput::Completed { stdout, stderr, success } => {
                let out = stdout.trim_start_matches(['\r', '\n']).trim_end();
                let err = stderr.trim();
                if !*success && !err.is_empty() {
                    if out.trim().is_empty() {
                        format!("STDERR:\n{}", err)
                    } else {
                        format!("{}\nSTDERR:\n{}", out, err)
                    }
                } else if out.trim().is_empty() {
                    NO_OUTPUT.to_string()
                } else {
                    out.to_string()
                }
            }
            ExecOutput::TimedOut(after) => format!("timed out after {}s", after.as_secs()),
            ExecOutput::Failed(e) => format!("error: {}", e),
        }
    }

    /// Stdout of a successful run without trailing whitespace, if it printed anything.
    pub fn stdout(&self) -> Option<&str> {
        match self {
            ExecOutput::Completed { stdout, success: true, .. } => {
                let out = stdout.trim_start_matches(['\r', '\n']).trim_end();
                (!out.trim_start().is_empty()).then_some(out)
            }
            _ => None,
        }
    }
}

/// Runs argument vectors with a bounded wait.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn run(&self, argv: &[&str], timeout: Duration) -> ExecOutput;
}

/// Spawns real processes in a fixed working directory.
pub struct ProcessExecutor {
    workdir: PathBuf,
}

impl ProcessExecutor {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }
}

#[async_trait]
impl Executor for ProcessExecutor {
    async fn run(&self, argv: &[&str], timeout: Duration) -> ExecOutput {
        let Some((program, args)) = argv.split_first() else {
            return ExecOutput::Failed("empty command".to_string());
        };

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!("exec {:?} in {}", argv, self.workdir.display());

        match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(Ok(output)) => ExecOutput::Completed {
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                success: output.status.success(),
            },
            Ok(Err(e)) => {
                tracing::warn!("Failed to run {}: {}", program, e);
                ExecOutput::Failed(e.to_string())
            }
            Err(_) => {
                tracing::warn!("{} timed out after {}s", program, timeout.as_secs());
                ExecOutput::TimedOut(timeout)
            }
        }
    }
}
