//! Request and response bodies for the chat backend.

use serde::{Deserialize, Serialize};

use support_chat_core::AdminId;

use super::ApiError;

/// Response wrapper used by every endpoint.
///
/// The admin list returns only `{ data }`; the message endpoints add
/// `success` and sometimes a `message` explaining a failure.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub success: Option<bool>,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> Envelope<T> {
    /// Unwrap the payload, treating `success: false` as a failed call.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Rejected` when the backend reports failure and
    /// `ApiError::Parse` when `data` is missing.
    pub fn into_data(self, endpoint: &'static str) -> Result<T, ApiError> {
        if self.success == Some(false) {
            return Err(ApiError::Rejected {
                endpoint,
                message: self
                    .message
                    .unwrap_or_else(|| "request was not successful".to_string()),
            });
        }

        self.data
            .ok_or_else(|| ApiError::Parse(format!("{endpoint}: response has no data")))
    }
}

/// Body of `POST api/messages/user/send`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub receiver_id: AdminId,
    pub content: String,
}
