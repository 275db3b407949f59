//! The polling loop: network wait, fetch, cursor bookkeeping, dispatch.

use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;

use crate::commands::CommandRegistry;
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::exec::{Executor, ProcessExecutor};
use crate::providers::QueryClient;
use crate::retry::RetryPolicy;

use super::api::{MessagingBackend, TelegramApi};
use super::cursor::CursorStore;
use super::dispatcher::Dispatcher;
use super::outbound::{escape_html, Outbound};

/// Server-side long-poll wait passed to `getUpdates`.
pub const LONG_POLL: Duration = Duration::from_secs(5);

const PROBE_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Try a TCP connect to `addr` until it works or the policy runs out.
pub async fn wait_for_network(addr: &str, policy: RetryPolicy) -> bool {
    let probe = policy
        .run("Network probe", move || async move {
            match tokio::time::timeout(PROBE_CONNECT_TIMEOUT, TcpStream::connect(addr)).await {
                Ok(Ok(_)) => Ok(()),
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => Err(format!("no answer from {} within 3s", addr)),
            }
        })
        .await;
    probe.is_ok()
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn interrupted() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
                return;
            }
            Err(e) => tracing::warn!("Cannot listen for SIGTERM: {}", e),
        }
    }
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Drives `getUpdates` for the single authorized chat.
pub struct Poller {
    backend: Arc<dyn MessagingBackend>,
    cursor: CursorStore,
    offset: i64,
    authorized_chat: i64,
    dispatcher: Dispatcher,
    interval: Duration,
}

impl Poller {
    pub fn new(
        backend: Arc<dyn MessagingBackend>,
        cursor: CursorStore,
        authorized_chat: i64,
        dispatcher: Dispatcher,
        interval: Duration,
    ) -> Self {
        Self {
            backend,
            cursor,
            offset: 0,
            authorized_chat,
            dispatcher,
            interval,
        }
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Restore the persisted offset.
    pub fn load_cursor(&mut self) {
        self.offset = self.cursor.load();
        tracing::info!(
            "Resuming from update offset {} ({})",
            self.offset,
            self.cursor.path().display()
        );
    }

    /// One fetch and everything it returned. Returns how many messages were dispatched.
    ///
    /// The offset moves past each update and is saved before the update is
    /// acted on, so a message that crashes the process is not fetched again.
    /// A failed save is logged; the in-memory offset still advances.
    pub async fn poll_once(&mut self) -> Result<usize> {
        let updates = self.backend.get_updates(self.offset, LONG_POLL).await?;
        let mut handled = 0;

        for update in updates {
            let next = (update.update_id + 1).max(self.offset);
            self.offset = next;
            if let Err(e) = self.cursor.save(next) {
                tracing::error!(
                    "Failed to persist offset {} to {}: {}",
                    next,
                    self.cursor.path().display(),
                    e
                );
            }

            match update.chat_id() {
                Some(chat) if chat == self.authorized_chat => {}
                other => {
                    tracing::info!(
                        "Ignoring update {} from unauthorized chat {:?}",
                        update.update_id,
                        other
                    );
                    continue;
                }
            }

            let text = update.text();
            if text.trim().is_empty() {
                tracing::debug!("Skipping update {} without text", update.update_id);
                continue;
            }

            tracing::info!("Message: {:?}", text);
            self.dispatcher.handle(text).await;
            handled += 1;
        }

        Ok(handled)
    }

    /// Loop until `shutdown` flips to true.
    ///
    /// Errors inside an iteration are logged and the loop carries on after the
    /// usual interval. Shutdown is only noticed between iterations.
    pub async fn run(&mut self, announcement: &str, mut shutdown: watch::Receiver<bool>) {
        self.dispatcher.outbound().send(announcement).await;
        self.load_cursor();

        loop {
            if *shutdown.borrow() {
                break;
            }

            if let Err(e) = self.poll_once().await {
                tracing::error!("Error in poll loop: {}: {}", e.kind(), e);
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                Ok(()) = shutdown.changed() => {}
            }
        }

        self.dispatcher.outbound().send("🔴 Bot stopped.").await;
        tracing::info!("Stopped at offset {}", self.offset);
    }
}

/// Start the daemon: validate config, wait for the network, then poll forever.
///
/// Returns an error only for fatal startup conditions.
pub async fn run_daemon(settings: &Settings) -> Result<()> {
    let (token, chat_id) = settings.require_telegram()?;

    tracing::info!(
        "Starting relaybot for {} ({}), model {}",
        settings.project_name,
        settings.workspace.display(),
        settings.model
    );
    if settings.api_key.is_none() {
        tracing::warn!("ANTHROPIC_API_KEY not set; free-form questions will be refused");
    }

    tracing::info!("Waiting for network via {}", settings.probe_addr);
    if !wait_for_network(&settings.probe_addr, RetryPolicy::network()).await {
        return Err(Error::Other(format!(
            "Network not available after {} attempts, aborting",
            RetryPolicy::network().attempts
        )));
    }
    tracing::info!("Network available");

    let backend: Arc<dyn MessagingBackend> = Arc::new(TelegramApi::new(token));
    let executor: Arc<dyn Executor> = Arc::new(ProcessExecutor::new(&settings.workspace));
    let outbound = Outbound::new(Arc::clone(&backend), chat_id, settings.max_message_len);
    let registry = Arc::new(CommandRegistry::new(
        Arc::clone(&executor),
        settings.test_command.clone(),
        settings.project_name.clone(),
    ));
    let query = Arc::new(QueryClient::from_settings(settings, executor));
    let dispatcher = Dispatcher::new(outbound, registry, query);

    let mut poller = Poller::new(
        backend,
        CursorStore::new(&settings.offset_file),
        chat_id,
        dispatcher,
        settings.poll_interval,
    );

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        interrupted().await;
        tracing::info!("Interrupt received, stopping after the current iteration");
        let _ = stop_tx.send(true);
    });

    poller.run(&startup_announcement(settings), stop_rx).await;
    Ok(())
}

fn startup_announcement(settings: &Settings) -> String {
    let mode = if settings.api_key.is_some() {
        "Claude-powered"
    } else {
        "commands only"
    };
    format!(
        "🟢 <b>{} Bot</b> ({}) started at {}.\nUse /help or just write a question.",
        escape_html(&settings.project_name),
        mode,
        chrono::Local::now().format("%Y-%m-%d %H:%M")
    )
}
