//! `support-chat send`: one-shot message.

use thiserror::Error;

use support_chat_client::{ChatBackend, ClientConfig, HttpBackend};
use support_chat_core::AdminId;

/// Errors that can occur when sending from the command line.
#[derive(Debug, Error)]
pub enum SendError {
    /// Admin id argument is blank.
    #[error("Invalid admin id: {0}")]
    InvalidAdmin(#[from] support_chat_core::IdError),

    /// Message text is blank.
    #[error("Message is empty")]
    EmptyMessage,

    /// Backend call failed.
    #[error(transparent)]
    Client(#[from] support_chat_client::ClientError),
}

impl From<support_chat_client::ApiError> for SendError {
    fn from(error: support_chat_client::ApiError) -> Self {
        Self::Client(error.into())
    }
}

/// Send `content` to `admin` and print the stored message id.
pub async fn send(config: &ClientConfig, admin: &str, content: &str) -> Result<(), SendError> {
    let admin = AdminId::parse(admin)?;
    if content.trim().is_empty() {
        return Err(SendError::EmptyMessage);
    }

    let backend = HttpBackend::new(config)?;
    let message = backend.send_message(&admin, content).await?;
    tracing::info!(admin = %admin, message_id = %message.id, "Message sent");

    #[allow(clippy::print_stdout)]
    {
        println!("Sent to {admin} ({})", message.id);
    }
    Ok(())
}
