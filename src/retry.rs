//! Bounded retry with a fixed delay between attempts.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// How many times to try an operation and how long to wait in between.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub const fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    /// Outbound Telegram sends: 3 attempts, 2s apart.
    pub const fn send() -> Self {
        Self::new(3, Duration::from_secs(2))
    }

    /// Startup reachability probe: 60 attempts, 1s apart.
    pub const fn network() -> Self {
        Self::new(60, Duration::from_secs(1))
    }

    /// Run `op` until it succeeds or the attempts run out.
    ///
    /// Each failure is logged with `label`. The delay is applied between
    /// attempts only, never after the last one. Returns the last error.
    pub async fn run<T, E, F, Fut>(&self, label: &str, op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.run_if(label, op, |_| true).await
    }

    /// Like [`RetryPolicy::run`], but stops early on errors `retryable` rejects.
    pub async fn run_if<T, E, F, Fut, P>(&self, label: &str, mut op: F, retryable: P) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        P: Fn(&E) -> bool,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    tracing::warn!("{} attempt {}/{} failed: {}", label, attempt, attempts, e);
                    if attempt >= attempts || !retryable(&e) {
                        return Err(e);
                    }
                }
            }
            attempt += 1;
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }
    }
}
