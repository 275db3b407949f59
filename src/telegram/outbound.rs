//! Outbound messages to the authorized chat.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

use super::api::{MessagingBackend, ParseMode};

/// Appended when a message had to be cut.
pub const TRUNCATION_MARKER: &str = "\n\n… (truncated)";

const PRE_MARKER: &str = "\n… (truncated)";
const PRE_OPEN: &str = "<pre>";
const PRE_CLOSE: &str = "</pre>";

/// Escape text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Cut `text` to at most `limit` characters, ending with the truncation marker.
///
/// Text already within the limit is returned unchanged, which makes the
/// function idempotent.
pub fn truncate(text: &str, limit: usize) -> String {
    truncate_with(text, limit, TRUNCATION_MARKER)
}

fn truncate_with(text: &str, limit: usize, marker: &str) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let marker_len = marker.chars().count();
    if limit <= marker_len {
        return text.chars().take(limit).collect();
    }
    let mut out: String = text.chars().take(limit - marker_len).collect();
    out.push_str(marker);
    out
}

/// Like [`truncate_with`] for already-escaped HTML: never ends inside an entity.
fn truncate_escaped(escaped: &str, limit: usize) -> String {
    if escaped.chars().count() <= limit {
        return escaped.to_string();
    }
    let marker_len = PRE_MARKER.chars().count();
    let keep = limit.saturating_sub(marker_len);
    let mut head: String = escaped.chars().take(keep).collect();
    if let Some(amp) = head.rfind('&') {
        if !head[amp..].contains(';') {
            head.truncate(amp);
        }
    }
    if limit > marker_len {
        head.push_str(PRE_MARKER);
    }
    head
}

/// Sends to one chat with a length ceiling and bounded retries.
#[derive(Clone)]
pub struct Outbound {
    backend: Arc<dyn MessagingBackend>,
    chat_id: i64,
    max_len: usize,
    retry: RetryPolicy,
}

impl Outbound {
    pub fn new(backend: Arc<dyn MessagingBackend>, chat_id: i64, max_len: usize) -> Self {
        Self {
            backend,
            chat_id,
            max_len,
            retry: RetryPolicy::send(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Send HTML text. Returns whether it was delivered; failures are logged only.
    pub async fn send(&self, text: &str) -> bool {
        self.deliver(text, ParseMode::Html).await
    }

    /// Send text verbatim, without HTML parsing.
    pub async fn send_plain(&self, text: &str) -> bool {
        self.deliver(text, ParseMode::Plain).await
    }

    /// Send command output as a `<pre>` block under a bold title.
    ///
    /// The body is escaped and cut so that header, markup and body together
    /// stay within the ceiling.
    pub async fn send_formatted(&self, output: &str, title: &str) -> bool {
        let header = if title.is_empty() {
            String::new()
        } else {
            format!("<b>{}</b>\n\n", escape_html(title))
        };
        let overhead = header.chars().count() + PRE_OPEN.len() + PRE_CLOSE.len();
        let budget = self.max_len.saturating_sub(overhead);
        let body = truncate_escaped(&escape_html(output), budget);

        self.send(&format!("{}{}{}{}", header, PRE_OPEN, body, PRE_CLOSE))
            .await
    }

    /// HTML that Telegram refuses to parse is sent once more as plain text,
    /// so the reply still arrives.
    async fn deliver(&self, text: &str, mode: ParseMode) -> bool {
        let text = truncate(text, self.max_len);

        let result = match self.attempt(&text, mode).await {
            Err(e) if mode == ParseMode::Html && e.is_markup_rejection() => {
                tracing::warn!("Markup rejected, resending as plain text: {}", e);
                self.attempt(&text, ParseMode::Plain).await
            }
            other => other,
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Giving up on message: {}", e);
                false
            }
        }
    }

    async fn attempt(&self, text: &str, mode: ParseMode) -> Result<()> {
        let backend = &self.backend;
        let chat_id = self.chat_id;

        self.retry
            .run_if(
                "sendMessage",
                move || async move { backend.send_message(chat_id, text, mode).await },
                Error::is_retryable,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTelegram;
    use std::time::Duration;

    fn outbound(fake: Arc<FakeTelegram>, max_len: usize) -> Outbound {
        Outbound::new(fake, 42, max_len).with_retry(RetryPolicy::new(3, Duration::ZERO))
    }

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(truncate("hello", 4000), "hello");
    }

    #[test]
    fn long_text_is_cut_to_the_limit_with_marker() {
        let text = "x".repeat(5000);
        let out = truncate(&text, 4000);
        assert_eq!(out.chars().count(), 4000);
        assert!(out.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn truncate_is_idempotent_and_bounded() {
        let samples = [
            String::new(),
            "short".to_string(),
            "ñ".repeat(150),
            "línea\n".repeat(40),
            "🙂".repeat(33),
        ];
        for limit in [0, 1, 5, 15, 16, 17, 50, 100, 4000] {
            for s in &samples {
                let once = truncate(s, limit);
                assert!(once.chars().count() <= limit);
                assert_eq!(truncate(&once, limit), once, "limit {} input {:?}", limit, s);
            }
        }
    }

    #[test]
    fn escape_html_covers_markup_characters() {
        assert_eq!(escape_html("a < b && c > d"), "a &lt; b &amp;&amp; c &gt; d");
    }

    #[test]
    fn escaped_truncation_never_splits_an_entity() {
        let escaped = escape_html(&"<".repeat(100));
        let out = truncate_escaped(&escaped, 40);
        let body = out.trim_end_matches(PRE_MARKER);
        assert!(body.ends_with("&lt;"));
        assert!(out.chars().count() <= 40);
    }

    #[tokio::test]
    async fn send_delivers_html_to_the_configured_chat() {
        let fake = Arc::new(FakeTelegram::default());
        assert!(outbound(fake.clone(), 4000).send("<b>hi</b>").await);

        let sent = fake.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].chat_id, 42);
        assert_eq!(sent[0].text, "<b>hi</b>");
        assert_eq!(sent[0].mode, ParseMode::Html);
    }

    #[tokio::test]
    async fn send_truncates_oversized_text() {
        let fake = Arc::new(FakeTelegram::default());
        outbound(fake.clone(), 200).send(&"y".repeat(1000)).await;

        let sent = fake.sent();
        assert_eq!(sent[0].text.chars().count(), 200);
        assert!(sent[0].text.ends_with(TRUNCATION_MARKER));
    }

    #[tokio::test]
    async fn formatted_send_wraps_escaped_output_under_title() {
        let fake = Arc::new(FakeTelegram::default());
        outbound(fake.clone(), 4000)
            .send_formatted("a -> b\n", "Git Status")
            .await;

        assert_eq!(fake.sent()[0].text, "<b>Git Status</b>\n\n<pre>a -&gt; b\n</pre>");
    }

    #[tokio::test]
    async fn formatted_send_respects_total_budget() {
        let fake = Arc::new(FakeTelegram::default());
        outbound(fake.clone(), 300)
            .send_formatted(&"line <tag>\n".repeat(200), "Pytest")
            .await;

        let text = &fake.sent()[0].text;
        assert!(text.chars().count() <= 300);
        assert!(text.starts_with("<b>Pytest</b>\n\n<pre>"));
        assert!(text.ends_with("… (truncated)</pre>"));
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let fake = Arc::new(FakeTelegram::default().failing_sends(2));
        assert!(outbound(fake.clone(), 4000).send("hi").await);
        assert_eq!(fake.send_attempts(), 3);
        assert_eq!(fake.sent().len(), 1);
    }

    #[tokio::test]
    async fn rejected_markup_falls_back_to_plain_text() {
        let fake = Arc::new(FakeTelegram::default().rejecting_markup("<b>im"));
        let answer = format!("{}<b>important</b>{}", "x".repeat(3970), "y".repeat(30));

        assert!(outbound(fake.clone(), 4000).send(&answer).await);

        let sent = fake.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].mode, ParseMode::Plain);
        assert!(sent[0].text.ends_with(TRUNCATION_MARKER));
        assert_eq!(fake.send_attempts(), 2);
    }

    #[tokio::test]
    async fn well_formed_html_is_not_resent() {
        let fake = Arc::new(FakeTelegram::default().rejecting_markup("<b>im"));
        assert!(outbound(fake.clone(), 4000).send("<b>fine</b>").await);
        assert_eq!(fake.send_attempts(), 1);
        assert_eq!(fake.sent()[0].mode, ParseMode::Html);
    }

    #[tokio::test]
    async fn gives_up_after_retry_budget_without_raising() {
        let fake = Arc::new(FakeTelegram::default().failing_sends(10));
        assert!(!outbound(fake.clone(), 4000).send("hi").await);
        assert_eq!(fake.send_attempts(), 3);
        assert!(fake.sent().is_empty());
    }
}
