//! Compact workspace snapshot sent along with free-form questions.

use std::time::Duration;

use crate::exec::Executor;

/// Hard cap on the context line, in characters.
pub const CONTEXT_LIMIT: usize = 280;

/// Per-probe timeout.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

const COMMIT_SUMMARY_LIMIT: usize = 55;

/// Counts derived from `git status --porcelain`.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DirtyCounts {
    pub modified: usize,
    pub untracked: usize,
}

impl DirtyCounts {
    pub fn from_porcelain(raw: &str) -> Self {
        raw.lines()
            .filter(|l| !l.is_empty())
            .fold(Self::default(), |mut acc, line| {
                if line.starts_with("??") {
                    acc.untracked += 1;
                } else {
                    acc.modified += 1;
                }
                acc
            })
    }
}

/// Build the one-line context: branch, last commit, tracked files, dirty counts.
///
/// Probes that fail contribute `?` instead of aborting the snapshot.
pub async fn gather(executor: &dyn Executor) -> String {
    let branch = executor
        .run(&["git", "branch", "--show-current"], PROBE_TIMEOUT)
        .await;
    let last = executor
        .run(&["git", "log", "--oneline", "-1"], PROBE_TIMEOUT)
        .await;
    let files = executor.run(&["git", "ls-files"], PROBE_TIMEOUT).await;
    let dirty = executor
        .run(&["git", "status", "--porcelain"], PROBE_TIMEOUT)
        .await;

    let branch = branch.stdout().map(str::trim).unwrap_or("?");
    let last: String = last
        .stdout()
        .unwrap_or("?")
        .chars()
        .take(COMMIT_SUMMARY_LIMIT)
        .collect();
    let files = files
        .stdout()
        .map(|out| out.lines().count().to_string())
        .unwrap_or_else(|| "?".to_string());
    let counts = match &dirty {
        crate::exec::ExecOutput::Completed { stdout, success: true, .. } => {
            DirtyCounts::from_porcelain(stdout)
        }
        _ => DirtyCounts::default(),
    };

    let ctx = format!(
        "branch:{} commit:{} files:{} mod:{} new:{}",
        branch, last, files, counts.modified, counts.untracked
    );
    ctx.chars().take(CONTEXT_LIMIT).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::ExecOutput;
    use crate::testing::FakeExecutor;

    #[test]
    fn porcelain_counts() {
        let counts = DirtyCounts::from_porcelain(" M a.rs\nM  b.rs\n?? c.rs\n?? d/\n\n");
        assert_eq!(counts, DirtyCounts { modified: 2, untracked: 2 });
    }

    #[tokio::test]
    async fn context_summarizes_workspace() {
        let exec = FakeExecutor::default()
            .with("git branch --show-current", "main\n")
            .with("git log --oneline -1", "abc123 add ELA detector\n")
            .with("git ls-files", "a.rs\nb.rs\nc.rs\n")
            .with("git status --porcelain", " M a.rs\n?? new.rs\n");

        let ctx = gather(&exec).await;
        assert_eq!(ctx, "branch:main commit:abc123 add ELA detector files:3 mod:1 new:1");
        assert!(exec.calls().iter().all(|(_, t)| *t == PROBE_TIMEOUT));
    }

    #[tokio::test]
    async fn failed_probes_degrade_to_placeholders() {
        let exec = FakeExecutor::default()
            .with_output("git branch --show-current", ExecOutput::TimedOut(PROBE_TIMEOUT))
            .with_output("git log --oneline -1", ExecOutput::Failed("no git".into()));

        let ctx = gather(&exec).await;
        assert_eq!(ctx, "branch:? commit:? files:? mod:0 new:0");
    }

    #[tokio::test]
    async fn context_is_capped() {
        let long_branch = "b".repeat(400);
        let exec = FakeExecutor::default()
            .with("git branch --show-current", &long_branch)
            .with("git log --oneline -1", &"c".repeat(200));

        let ctx = gather(&exec).await;
        assert_eq!(ctx.chars().count(), CONTEXT_LIMIT);
        assert!(ctx.starts_with("branch:bbbb"));
    }
}
