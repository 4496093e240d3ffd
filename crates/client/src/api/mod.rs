//! Chat backend API.
//!
//! Five REST endpoints, all authenticated with the end-user's bearer token
//! when one is available:
//!
//! | Operation | Method & Path |
//! |---|---|
//! | List admins | `GET api/admin/users/superadmins` |
//! | List all messages for user | `GET api/messages/user` |
//! | Send message | `POST api/messages/user/send` |
//! | Unread summary | `GET api/messages/user/unread` |
//! | Mark read | `PUT api/messages/read/{adminId}` |
//!
//! [`ChatBackend`] is the seam the sync runtime talks to; [`HttpBackend`] is
//! the `reqwest` implementation.

mod client;
mod types;

pub use client::HttpBackend;
pub use types::{Envelope, SendMessageRequest};

use std::future::Future;

use thiserror::Error;

use support_chat_core::{Admin, AdminId, Message, UnreadCounts};

/// Errors that can occur when talking to the chat backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed (connection, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend returned a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Missing or rejected bearer token.
    #[error("Unauthorized")]
    Unauthorized,

    /// Endpoint or resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Backend answered with `success: false`.
    #[error("{endpoint} rejected: {message}")]
    Rejected {
        endpoint: &'static str,
        message: String,
    },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Could not build the request URL.
    #[error("Invalid URL: {0}")]
    Url(String),
}

/// Operations the sync runtime needs from the backend.
///
/// Implementations must be cheap to clone; the runtime clones the backend into
/// every spawned request task.
pub trait ChatBackend: Clone + Send + Sync + 'static {
    /// List the admins the user can talk to.
    fn list_admins(&self) -> impl Future<Output = Result<Vec<Admin>, ApiError>> + Send;

    /// List every message involving the user, across all admins.
    fn list_messages(&self) -> impl Future<Output = Result<Vec<Message>, ApiError>> + Send;

    /// Send a message to an admin; returns the stored message.
    fn send_message(
        &self,
        receiver: &AdminId,
        content: &str,
    ) -> impl Future<Output = Result<Message, ApiError>> + Send;

    /// Per-admin unread counts as tracked by the backend.
    fn unread_summary(&self) -> impl Future<Output = Result<UnreadCounts, ApiError>> + Send;

    /// Mark the conversation with an admin as read.
    fn mark_read(&self, admin: &AdminId) -> impl Future<Output = Result<(), ApiError>> + Send;
}
