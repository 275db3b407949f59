//! In-memory stand-ins for the process, Telegram and model seams.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::exec::{ExecOutput, Executor};
use crate::providers::provider::{
    CompletionBackend, CompletionRequest, CompletionResponse, ProviderError,
};
use crate::telegram::api::{Chat, IncomingMessage, MessagingBackend, ParseMode, Update};
use crate::telegram::cursor::CursorStore;

/// Canned outputs keyed by the space-joined argv. Unknown commands fail.
#[derive(Default)]
pub struct FakeExecutor {
    outputs: HashMap<String, ExecOutput>,
    calls: Mutex<Vec<(String, Duration)>>,
}

impl FakeExecutor {
    pub fn with(self, command: &str, stdout: &str) -> Self {
        self.with_output(
            command,
            ExecOutput::Completed {
                stdout: stdout.to_string(),
                stderr: String::new(),
                success: true,
            },
        )
    }

    pub fn with_output(mut self, command: &str, output: ExecOutput) -> Self {
        self.outputs.insert(command.to_string(), output);
        self
    }

    pub fn calls(&self) -> Vec<(String, Duration)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Executor for FakeExecutor {
    async fn run(&self, argv: &[&str], timeout: Duration) -> ExecOutput {
        let key = argv.join(" ");
        self.calls.lock().unwrap().push((key.clone(), timeout));
        self.outputs
            .get(&key)
            .cloned()
            .unwrap_or_else(|| ExecOutput::Failed(format!("unexpected command: {}", key)))
    }
}

pub struct PanickingExecutor;

#[async_trait]
impl Executor for PanickingExecutor {
    async fn run(&self, _argv: &[&str], _timeout: Duration) -> ExecOutput {
        panic!("executor exploded");
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub chat_id: i64,
    pub text: String,
    pub mode: ParseMode,
    /// Persisted offset at the moment of sending, when a cursor is watched.
    pub cursor_at_send: i64,
}

/// Scripted `getUpdates` batches and a record of every delivered message.
///
/// Once the script runs out, fetches return no updates.
#[derive(Default)]
pub struct FakeTelegram {
    batches: Mutex<VecDeque<std::result::Result<Vec<Update>, String>>>,
    fetch_offsets: Mutex<Vec<i64>>,
    failing_sends: Mutex<usize>,
    send_attempts: Mutex<usize>,
    sent: Mutex<Vec<SentMessage>>,
    cursor: Option<PathBuf>,
    reject_markup: Option<String>,
}

impl FakeTelegram {
    pub fn update(update_id: i64, chat_id: i64, text: &str) -> Update {
        Update {
            update_id,
            message: Some(IncomingMessage {
                chat: Chat { id: chat_id },
                text: Some(text.to_string()),
            }),
        }
    }

    pub fn non_message(update_id: i64) -> Update {
        Update {
            update_id,
            message: None,
        }
    }

    pub fn with_batch(self, updates: Vec<Update>) -> Self {
        self.batches.lock().unwrap().push_back(Ok(updates));
        self
    }

    pub fn with_fetch_error(self, description: &str) -> Self {
        self.batches
            .lock()
            .unwrap()
            .push_back(Err(description.to_string()));
        self
    }

    /// The next `n` sends fail.
    pub fn failing_sends(self, n: usize) -> Self {
        *self.failing_sends.lock().unwrap() = n;
        self
    }

    /// HTML sends containing `needle` are refused like malformed markup.
    pub fn rejecting_markup(mut self, needle: &str) -> Self {
        self.reject_markup = Some(needle.to_string());
        self
    }

    pub fn watching_cursor(mut self, path: PathBuf) -> Self {
        self.cursor = Some(path);
        self
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn send_attempts(&self) -> usize {
        *self.send_attempts.lock().unwrap()
    }

    pub fn fetch_offsets(&self) -> Vec<i64> {
        self.fetch_offsets.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagingBackend for FakeTelegram {
    async fn get_updates(&self, offset: i64, _timeout: Duration) -> Result<Vec<Update>> {
        self.fetch_offsets.lock().unwrap().push(offset);
        match self.batches.lock().unwrap().pop_front() {
            Some(Ok(updates)) => Ok(updates),
            Some(Err(description)) => Err(Error::Telegram(description)),
            None => Ok(Vec::new()),
        }
    }

    async fn send_message(&self, chat_id: i64, text: &str, mode: ParseMode) -> Result<()> {
        *self.send_attempts.lock().unwrap() += 1;
        {
            let mut failing = self.failing_sends.lock().unwrap();
            if *failing > 0 {
                *failing -= 1;
                return Err(Error::Telegram("sendMessage failed (502): Bad Gateway".into()));
            }
        }
        if let Some(needle) = &self.reject_markup {
            if mode == ParseMode::Html && text.contains(needle.as_str()) {
                return Err(Error::TelegramRejected {
                    method: "sendMessage".to_string(),
                    code: 400,
                    description: "Bad Request: can't parse entities: can't find end tag".to_string(),
                });
            }
        }

        let cursor_at_send = self
            .cursor
            .as_ref()
            .map(|path| CursorStore::new(path).load())
            .unwrap_or(0);
        self.sent.lock().unwrap().push(SentMessage {
            chat_id,
            text: text.to_string(),
            mode,
            cursor_at_send,
        });
        Ok(())
    }
}

/// Answers every request with the same response, or fails once with an error.
pub struct FakeCompletion {
    response: Option<CompletionResponse>,
    error: Mutex<Option<ProviderError>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl FakeCompletion {
    pub fn replying(body: serde_json::Value) -> Self {
        Self {
            response: Some(serde_json::from_value(body).unwrap()),
            error: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: ProviderError) -> Self {
        Self {
            response: None,
            error: Mutex::new(Some(error)),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionBackend for FakeCompletion {
    fn name(&self) -> &str {
        "fake"
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> std::result::Result<CompletionResponse, ProviderError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(response) = &self.response {
            return Ok(response.clone());
        }
        Err(self
            .error
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| ProviderError::ApiError("no more scripted failures".into())))
    }
}
