//! Telegram side of the relay: Bot API client, cursor, outbound channel,
//! dispatcher and the polling loop.

pub mod api;
pub mod cursor;
pub mod dispatcher;
pub mod outbound;
pub mod poller;

pub use api::{MessagingBackend, ParseMode, TelegramApi, Update};
pub use cursor::CursorStore;
pub use dispatcher::Dispatcher;
pub use outbound::{escape_html, truncate, Outbound};
pub use poller::{run_daemon, Poller};
