//! Integration tests for the support chat client.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p support-chat-integration-tests
//! ```
//!
//! No external services are needed: [`MockBackend`] serves the five chat
//! endpoints from memory on a random local port, speaking the same JSON the
//! real backend does (`_id` fields, populated `sender`/`receiver` objects,
//! `{ success, data }` envelopes).
//!
//! # Test Categories
//!
//! - `http_backend` - `HttpBackend` against the mock: envelopes, errors, auth
//! - `chat_runtime` - Full runtime: polling, unread persistence, mark-read

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// User the mock serves messages for.
pub const USER_ID: &str = "65f000000000000000000001";

/// JWT-shaped token whose payload carries `{"id": user_id}`.
///
/// The signature is not valid; the client never verifies it.
#[must_use]
pub fn user_token(user_id: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(json!({ "id": user_id, "role": "user" }).to_string());
    format!("{header}.{payload}.signature")
}

/// Admin in backend wire format.
#[must_use]
pub fn admin_json(id: &str, name: &str, email: &str) -> Value {
    json!({ "_id": id, "name": name, "email": email, "role": "superadmin" })
}

/// Message in backend wire format, with populated participants.
#[must_use]
pub fn message_json(id: &str, from_admin: bool, admin: &str, content: &str, created_at: &str) -> Value {
    let (sender, receiver, sender_type) = if from_admin {
        (admin, USER_ID, "superadmin")
    } else {
        (USER_ID, admin, "User")
    };
    json!({
        "_id": id,
        "sender": { "_id": sender, "name": "participant" },
        "receiver": { "_id": receiver, "name": "participant" },
        "senderType": sender_type,
        "content": content,
        "createdAt": created_at,
    })
}

#[derive(Debug, Default)]
struct MockData {
    admins: Vec<Value>,
    messages: Vec<Value>,
    unread: BTreeMap<String, u32>,
    sent: Vec<Value>,
    read: Vec<String>,
    authorization: Vec<Option<String>>,
    required_token: Option<String>,
    fail_status: Option<u16>,
    reject_messages: bool,
}

/// Shared, inspectable state of a running [`MockBackend`].
#[derive(Debug, Clone, Default)]
pub struct MockState {
    inner: Arc<Mutex<MockData>>,
}

impl MockState {
    fn lock(&self) -> MutexGuard<'_, MockData> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_admins(&self, admins: Vec<Value>) {
        self.lock().admins = admins;
    }

    pub fn push_message(&self, message: Value) {
        self.lock().messages.push(message);
    }

    /// Add a message from an admin and bump the backend's unread count.
    pub fn push_admin_message(&self, id: &str, admin: &str, content: &str) {
        let created_at = chrono::Utc::now().to_rfc3339();
        let mut data = self.lock();
        data.messages
            .push(message_json(id, true, admin, content, &created_at));
        *data.unread.entry(admin.to_string()).or_default() += 1;
    }

    pub fn set_unread(&self, admin: &str, count: u32) {
        self.lock().unread.insert(admin.to_string(), count);
    }

    /// Reject requests whose bearer token differs from `token`.
    pub fn require_token(&self, token: &str) {
        self.lock().required_token = Some(token.to_string());
    }

    /// Answer every request with this status.
    pub fn fail_with(&self, status: u16) {
        self.lock().fail_status = Some(status);
    }

    /// Answer the message list with `success: false`.
    pub fn reject_messages(&self) {
        self.lock().reject_messages = true;
    }

    /// Bodies received by the send endpoint.
    #[must_use]
    pub fn sent(&self) -> Vec<Value> {
        self.lock().sent.clone()
    }

    /// Admin ids passed to the mark-read endpoint.
    #[must_use]
    pub fn read_calls(&self) -> Vec<String> {
        self.lock().read.clone()
    }

    /// `Authorization` header of every request, in arrival order.
    #[must_use]
    pub fn authorization_headers(&self) -> Vec<Option<String>> {
        self.lock().authorization.clone()
    }

    /// Record the request and apply configured failures.
    fn admit(&self, headers: &HeaderMap) -> Result<(), Response> {
        let authorization = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let mut data = self.lock();
        data.authorization.push(authorization.clone());

        if let Some(status) = data.fail_status {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            return Err((status, "mock failure").into_response());
        }
        if let Some(token) = &data.required_token {
            if authorization.as_deref() != Some(format!("Bearer {token}").as_str()) {
                return Err((StatusCode::UNAUTHORIZED, "invalid token").into_response());
            }
        }
        Ok(())
    }
}

/// In-process chat backend.
#[derive(Debug)]
pub struct MockBackend {
    pub addr: SocketAddr,
    pub state: MockState,
    shutdown: Option<oneshot::Sender<()>>,
}

impl MockBackend {
    /// Serve the chat endpoints on `127.0.0.1` at a random port.
    pub async fn start() -> Self {
        let state = MockState::default();
        let app = router(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = server.await;
        });

        Self {
            addr,
            state,
            shutdown: Some(shutdown_tx),
        }
    }

    /// Base URL to configure the client with.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}/", self.addr)
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

fn router(state: MockState) -> Router {
    Router::new()
        .route("/api/admin/users/superadmins", get(list_admins))
        .route("/api/messages/user", get(list_messages))
        .route("/api/messages/user/send", post(send_message))
        .route("/api/messages/user/unread", get(unread_summary))
        .route("/api/messages/read/{admin_id}", put(mark_read))
        .with_state(state)
}

async fn list_admins(State(state): State<MockState>, headers: HeaderMap) -> Response {
    if let Err(response) = state.admit(&headers) {
        return response;
    }
    let admins = state.lock().admins.clone();
    Json(json!({ "data": admins })).into_response()
}

async fn list_messages(State(state): State<MockState>, headers: HeaderMap) -> Response {
    if let Err(response) = state.admit(&headers) {
        return response;
    }
    let data = state.lock();
    if data.reject_messages {
        return Json(json!({ "success": false, "message": "User is blocked" })).into_response();
    }
    Json(json!({ "success": true, "data": data.messages })).into_response()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendBody {
    receiver_id: String,
    content: String,
}

async fn send_message(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(body): Json<SendBody>,
) -> Response {
    if let Err(response) = state.admit(&headers) {
        return response;
    }
    let mut data = state.lock();
    data.sent
        .push(json!({ "receiverId": body.receiver_id, "content": body.content }));

    let id = format!("sent-{}", data.sent.len());
    let message = message_json(
        &id,
        false,
        &body.receiver_id,
        &body.content,
        &chrono::Utc::now().to_rfc3339(),
    );
    data.messages.push(message.clone());
    (StatusCode::CREATED, Json(json!({ "success": true, "data": message }))).into_response()
}

async fn unread_summary(State(state): State<MockState>, headers: HeaderMap) -> Response {
    if let Err(response) = state.admit(&headers) {
        return response;
    }
    let unread = state.lock().unread.clone();
    Json(json!({ "success": true, "data": unread })).into_response()
}

async fn mark_read(
    State(state): State<MockState>,
    Path(admin_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(response) = state.admit(&headers) {
        return response;
    }
    let mut data = state.lock();
    data.unread.remove(&admin_id);
    data.read.push(admin_id);
    Json(json!({ "success": true })).into_response()
}
