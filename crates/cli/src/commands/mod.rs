//! Subcommand implementations.

pub mod admins;
pub mod chat;
pub mod send;
pub mod unread;

use support_chat_client::{ClientConfig, JsonFileStorage, UnreadLedger};

/// Open the durable unread counters configured for this user.
fn open_ledger(config: &ClientConfig) -> UnreadLedger {
    UnreadLedger::open(JsonFileStorage::new(&config.unread_path))
}
