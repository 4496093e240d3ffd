//! End-user session: bearer token and the user id it carries.
//!
//! The token is issued elsewhere. The user id is read from the JWT payload
//! (`id` or `_id` claim) without verifying the signature; the backend does
//! that on every request. A missing or undecodable token is not fatal: the
//! client simply sends unauthenticated requests and cannot match messages to
//! the user.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use support_chat_core::UserId;

/// Errors that can occur when decoding a session token.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// The token does not have three dot-separated segments.
    #[error("token is not a JWT")]
    Malformed,

    /// The payload segment is not valid base64.
    #[error("token payload is not valid base64")]
    Encoding,

    /// The payload is not JSON or carries no user id claim.
    #[error("token payload has no user id claim")]
    MissingClaim,
}

#[derive(Deserialize)]
struct Claims {
    id: Option<UserId>,
    #[serde(rename = "_id")]
    underscore_id: Option<UserId>,
}

/// Decode the user id from a JWT's payload.
///
/// # Errors
///
/// Returns `SessionError` if the token is not a JWT, the payload is not
/// base64 JSON, or neither `id` nor `_id` is present.
pub fn decode_user_id(token: &str) -> Result<UserId, SessionError> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_)) => payload.trim_end_matches('='),
        _ => return Err(SessionError::Malformed),
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| STANDARD_NO_PAD.decode(payload))
        .map_err(|_| SessionError::Encoding)?;

    let claims: Claims = serde_json::from_slice(&bytes).map_err(|_| SessionError::MissingClaim)?;
    claims
        .id
        .or(claims.underscore_id)
        .ok_or(SessionError::MissingClaim)
}

/// The authenticated (or anonymous) end-user.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone, Default)]
pub struct Session {
    token: Option<SecretString>,
    user_id: Option<UserId>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("user_id", &self.user_id)
            .finish()
    }
}

impl Session {
    /// Build a session from an optional bearer token.
    #[must_use]
    pub fn from_token(token: Option<SecretString>) -> Self {
        let user_id = token.as_ref().and_then(|token| {
            decode_user_id(token.expose_secret())
                .inspect_err(|e| warn!(error = %e, "Could not read user id from token"))
                .ok()
        });
        Self { token, user_id }
    }

    /// Bearer token, if any.
    #[must_use]
    pub const fn token(&self) -> Option<&SecretString> {
        self.token.as_ref()
    }

    /// User id decoded from the token.
    #[must_use]
    pub const fn user_id(&self) -> Option<&UserId> {
        self.user_id.as_ref()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn jwt(payload: &str) -> String {
        format!(
            "{}.{}.signature",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#),
            URL_SAFE_NO_PAD.encode(payload)
        )
    }

    #[test]
    fn test_decode_id_claim() {
        let token = jwt(r#"{"id":"65f0aa","role":"user"}"#);
        assert_eq!(decode_user_id(&token).unwrap(), UserId::new("65f0aa"));
    }

    #[test]
    fn test_decode_underscore_id_claim() {
        let token = jwt(r#"{"_id":1234}"#);
        assert_eq!(decode_user_id(&token).unwrap(), UserId::new("1234"));
    }

    #[test]
    fn test_id_preferred_over_underscore_id() {
        let token = jwt(r#"{"id":"a","_id":"b"}"#);
        assert_eq!(decode_user_id(&token).unwrap(), UserId::new("a"));
    }

    #[test]
    fn test_malformed_tokens() {
        assert_eq!(decode_user_id("abc"), Err(SessionError::Malformed));
        assert_eq!(decode_user_id("a.!!!.c"), Err(SessionError::Encoding));
        assert_eq!(
            decode_user_id(&jwt(r#"{"sub":"x"}"#)),
            Err(SessionError::MissingClaim)
        );
    }

    #[test]
    fn test_session_with_bad_token_has_no_user() {
        let session = Session::from_token(Some(SecretString::from("garbage".to_string())));
        assert!(session.token().is_some());
        assert!(session.user_id().is_none());
    }

    #[test]
    fn test_session_without_token() {
        let session = Session::from_token(None);
        assert!(session.token().is_none());
        assert!(session.user_id().is_none());
    }

    #[test]
    fn test_debug_redacts_token() {
        let session = Session::from_token(Some(SecretString::from(jwt(r#"{"id":"u1"}"#))));
        let debug = format!("{session:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(debug.contains("u1"));
    }
}
