//! `reqwest` implementation of [`ChatBackend`].

use std::sync::Arc;

use reqwest::{Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use support_chat_core::{Admin, AdminId, Message, UnreadCounts};

use super::types::{Envelope, SendMessageRequest};
use super::{ApiError, ChatBackend};
use crate::config::ClientConfig;

const ADMINS_PATH: &str = "api/admin/users/superadmins";
const MESSAGES_PATH: &str = "api/messages/user";
const SEND_PATH: &str = "api/messages/user/send";
const UNREAD_PATH: &str = "api/messages/user/unread";
const READ_PATH: &str = "api/messages/read";

/// HTTP client for the chat backend.
///
/// Cheap to clone: the connection pool and token live behind an `Arc`.
#[derive(Clone)]
pub struct HttpBackend {
    inner: Arc<HttpBackendInner>,
}

struct HttpBackendInner {
    client: reqwest::Client,
    base_url: Url,
    token: Option<SecretString>,
}

impl std::fmt::Debug for HttpBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBackend")
            .field("base_url", &self.inner.base_url.as_str())
            .field("token", &self.inner.token.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl HttpBackend {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(HttpBackendInner {
                client,
                base_url: config.api_url.clone(),
                token: config.token.clone(),
            }),
        })
    }

    /// Whether requests carry a bearer token.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.token.is_some()
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        self.inner
            .base_url
            .join(path)
            .map_err(|e| ApiError::Url(e.to_string()))
    }

    /// Build a request, attaching the bearer token when present.
    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.inner.client.request(method, url);
        match &self.inner.token {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }

    /// Send a request and unwrap the `{ success, data }` envelope.
    async fn fetch<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        endpoint: &'static str,
    ) -> Result<T, ApiError> {
        let response = builder.send().await?;
        let envelope: Envelope<T> = self.handle_response(response).await?;
        envelope.into_data(endpoint)
    }

    /// Handle API response and parse JSON.
    async fn handle_response<T: DeserializeOwned>(&self, response: Response) -> Result<T, ApiError> {
        let status = response.status();

        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| ApiError::Parse(format!("Failed to parse response: {e}")));
        }

        Err(self.parse_error(response).await)
    }

    /// Map a non-success response to an error.
    async fn parse_error(&self, response: Response) -> ApiError {
        let status = response.status().as_u16();

        if status == 401 || status == 403 {
            return ApiError::Unauthorized;
        }

        if status == 404 {
            return ApiError::NotFound(response.url().path().to_string());
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        ApiError::Api { status, message }
    }
}

impl ChatBackend for HttpBackend {
    #[instrument(skip(self))]
    async fn list_admins(&self) -> Result<Vec<Admin>, ApiError> {
        let url = self.url(ADMINS_PATH)?;
        let admins: Vec<Admin> = self
            .fetch(self.request(Method::GET, url), "list admins")
            .await?;
        debug!(count = admins.len(), "Fetched admin list");
        Ok(admins)
    }

    #[instrument(skip(self))]
    async fn list_messages(&self) -> Result<Vec<Message>, ApiError> {
        let url = self.url(MESSAGES_PATH)?;
        let messages: Vec<Message> = self
            .fetch(self.request(Method::GET, url), "list messages")
            .await?;
        debug!(count = messages.len(), "Fetched messages");
        Ok(messages)
    }

    #[instrument(skip(self, content), fields(receiver = %receiver, len = content.len()))]
    async fn send_message(&self, receiver: &AdminId, content: &str) -> Result<Message, ApiError> {
        let url = self.url(SEND_PATH)?;
        let body = SendMessageRequest {
            receiver_id: receiver.clone(),
            content: content.to_string(),
        };
        let message: Message = self
            .fetch(self.request(Method::POST, url).json(&body), "send message")
            .await?;
        debug!(message_id = %message.id, "Message sent");
        Ok(message)
    }

    #[instrument(skip(self))]
    async fn unread_summary(&self) -> Result<UnreadCounts, ApiError> {
        let url = self.url(UNREAD_PATH)?;
        self.fetch(self.request(Method::GET, url), "unread summary")
            .await
    }

    #[instrument(skip(self), fields(admin = %admin))]
    async fn mark_read(&self, admin: &AdminId) -> Result<(), ApiError> {
        let mut url = self.url(READ_PATH)?;
        url.path_segments_mut()
            .map_err(|()| ApiError::Url("base URL cannot have path segments".to_string()))?
            .push(admin.as_str());

        let response = self.request(Method::PUT, url).send().await?;
        if response.status().is_success() {
            debug!("Conversation marked as read");
            return Ok(());
        }

        Err(self.parse_error(response).await)
    }
}
