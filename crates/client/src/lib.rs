//! Support Chat Client - sync engine, state store, and backend access.
//!
//! # Architecture
//!
//! ```text
//!   commands ──► runtime (tokio task) ──► snapshots (watch) / events (mpsc)
//!                   │        ▲
//!                   ▼        │
//!               SyncEngine ──┴── ChatBackend (HTTP)
//!                   │
//!            ConversationStore ── UnreadLedger ── JSON file
//! ```
//!
//! - [`config`] - Environment configuration
//! - [`session`] - Bearer token and the user id it carries
//! - [`api`] - Backend trait and the `reqwest` implementation
//! - [`storage`] - Durable unread counters
//! - [`store`] - In-memory chat state and render snapshots
//! - [`sync`] - Polling, unread, and notification rules
//! - [`runtime`] - Timers and request dispatch around the engine

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod config;
pub mod runtime;
pub mod session;
pub mod storage;
pub mod store;
pub mod sync;

use thiserror::Error;
use tracing::{info, warn};

pub use api::{ApiError, ChatBackend, HttpBackend};
pub use config::{ClientConfig, ConfigError};
pub use runtime::{ChatHandle, Command, CommandSender, RuntimeError, SyncIntervals};
pub use session::{Session, SessionError};
pub use storage::{JsonFileStorage, MemoryStorage, StorageError, UnreadLedger, UnreadStorage};
pub use store::{AdminRow, ChatSnapshot, ConversationStore, Viewport};
pub use sync::{ChatEvent, Notice, NoticeLevel, SyncEngine};

/// Top-level client error.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// Build the HTTP backend and start a chat runtime for the configured user.
///
/// Unread counters are read from `config.unread_path`.
///
/// # Errors
///
/// Returns `ClientError::Api` if the HTTP client cannot be built.
pub fn connect(config: &ClientConfig) -> Result<ChatHandle, ClientError> {
    let backend = HttpBackend::new(config)?;
    let session = Session::from_token(config.token.clone());
    if session.token().is_none() {
        warn!("No bearer token configured; conversations cannot be matched to a user");
    }
    let ledger = UnreadLedger::open(JsonFileStorage::new(&config.unread_path));
    let engine = SyncEngine::new(ConversationStore::new(ledger), session.user_id().cloned());

    info!(
        api_url = %config.api_url,
        authenticated = backend.is_authenticated(),
        "Connecting to chat backend"
    );
    Ok(runtime::spawn(engine, backend, SyncIntervals::from(config)))
}
