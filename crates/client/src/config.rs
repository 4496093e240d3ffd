//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SUPPORT_CHAT_API_URL` - Base URL of the chat backend (e.g., `https://shop.example`)
//!
//! ## Optional
//! - `SUPPORT_CHAT_TOKEN` - Bearer token for the end-user session. Without it
//!   requests are sent unauthenticated.
//! - `SUPPORT_CHAT_UNREAD_PATH` - File holding the durable unread counters
//!   (default: `$HOME/.support-chat/unread_messages.json`)
//! - `SUPPORT_CHAT_MESSAGE_POLL_SECS` - Conversation poll interval (default: 5)
//! - `SUPPORT_CHAT_REFRESH_SECS` - Admin list and unread summary refresh interval (default: 30)
//! - `SUPPORT_CHAT_REQUEST_TIMEOUT_SECS` - Per-request HTTP timeout (default: 15)

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const DEFAULT_MESSAGE_POLL_SECS: &str = "5";
const DEFAULT_REFRESH_SECS: &str = "30";
const DEFAULT_REQUEST_TIMEOUT_SECS: &str = "15";
const UNREAD_FILE_NAME: &str = "unread_messages.json";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Support chat client configuration.
///
/// Implements `Debug` manually to redact the bearer token.
#[derive(Clone)]
pub struct ClientConfig {
    /// Backend base URL, always ending in `/` so relative joins keep the path prefix
    pub api_url: Url,
    /// Bearer token for the end-user session
    pub token: Option<SecretString>,
    /// Durable unread counter file
    pub unread_path: PathBuf,
    /// How often the selected conversation is polled
    pub message_poll_interval: Duration,
    /// How often the admin list and unread summary are refreshed
    pub refresh_interval: Duration,
    /// Per-request HTTP timeout
    pub request_timeout: Duration,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_url", &self.api_url.as_str())
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("unread_path", &self.unread_path)
            .field("message_poll_interval", &self.message_poll_interval)
            .field("refresh_interval", &self.refresh_interval)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url = lookup("SUPPORT_CHAT_API_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("SUPPORT_CHAT_API_URL".to_string()))?;
        let api_url = parse_base_url(&api_url)
            .map_err(|e| ConfigError::InvalidEnvVar("SUPPORT_CHAT_API_URL".to_string(), e))?;

        let token = lookup("SUPPORT_CHAT_TOKEN")
            .filter(|token| !token.trim().is_empty())
            .map(SecretString::from);

        let unread_path = lookup("SUPPORT_CHAT_UNREAD_PATH").map_or_else(
            || default_unread_path(lookup("HOME")),
            PathBuf::from,
        );

        let message_poll_interval = parse_seconds(
            "SUPPORT_CHAT_MESSAGE_POLL_SECS",
            lookup("SUPPORT_CHAT_MESSAGE_POLL_SECS"),
            DEFAULT_MESSAGE_POLL_SECS,
        )?;
        let refresh_interval = parse_seconds(
            "SUPPORT_CHAT_REFRESH_SECS",
            lookup("SUPPORT_CHAT_REFRESH_SECS"),
            DEFAULT_REFRESH_SECS,
        )?;
        let request_timeout = parse_seconds(
            "SUPPORT_CHAT_REQUEST_TIMEOUT_SECS",
            lookup("SUPPORT_CHAT_REQUEST_TIMEOUT_SECS"),
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?;

        Ok(Self {
            api_url,
            token,
            unread_path,
            message_poll_interval,
            refresh_interval,
            request_timeout,
        })
    }

    /// Override the bearer token.
    #[must_use]
    pub fn with_token(mut self, token: SecretString) -> Self {
        self.token = Some(token);
        self
    }
}

/// Parse a base URL and make sure its path ends with `/`.
fn parse_base_url(raw: &str) -> Result<Url, String> {
    let mut url = Url::parse(raw.trim()).map_err(|e| e.to_string())?;
    if url.cannot_be_a_base() {
        return Err("URL cannot be used as a base".to_string());
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn parse_seconds(key: &str, value: Option<String>, default: &str) -> Result<Duration, ConfigError> {
    let raw = value.unwrap_or_else(|| default.to_string());
    let secs = raw
        .trim()
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if secs == 0 {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be greater than zero".to_string(),
        ));
    }
    Ok(Duration::from_secs(secs))
}

fn default_unread_path(home: Option<String>) -> PathBuf {
    home.map_or_else(
        || PathBuf::from(UNREAD_FILE_NAME),
        |home| PathBuf::from(home).join(".support-chat").join(UNREAD_FILE_NAME),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<ClientConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ClientConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_missing_api_url() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(key) if key == "SUPPORT_CHAT_API_URL"));
    }

    #[test]
    fn test_defaults() {
        let config = load(&[
            ("SUPPORT_CHAT_API_URL", "https://shop.example"),
            ("HOME", "/home/khach"),
        ])
        .unwrap();

        assert_eq!(config.api_url.as_str(), "https://shop.example/");
        assert!(config.token.is_none());
        assert_eq!(config.message_poll_interval, Duration::from_secs(5));
        assert_eq!(config.refresh_interval, Duration::from_secs(30));
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert_eq!(
            config.unread_path,
            PathBuf::from("/home/khach/.support-chat/unread_messages.json")
        );
    }

    #[test]
    fn test_base_path_gets_trailing_slash() {
        let config = load(&[("SUPPORT_CHAT_API_URL", "https://shop.example/backend")]).unwrap();
        assert_eq!(config.api_url.as_str(), "https://shop.example/backend/");
        assert_eq!(
            config.api_url.join("api/messages/user").unwrap().as_str(),
            "https://shop.example/backend/api/messages/user"
        );
    }

    #[test]
    fn test_invalid_url() {
        let err = load(&[("SUPPORT_CHAT_API_URL", "not a url")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(_, _)));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let err = load(&[
            ("SUPPORT_CHAT_API_URL", "https://shop.example"),
            ("SUPPORT_CHAT_MESSAGE_POLL_SECS", "0"),
        ])
        .unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidEnvVar(key, _) if key == "SUPPORT_CHAT_MESSAGE_POLL_SECS")
        );
    }

    #[test]
    fn test_blank_token_is_none() {
        let config = load(&[
            ("SUPPORT_CHAT_API_URL", "https://shop.example"),
            ("SUPPORT_CHAT_TOKEN", "  "),
        ])
        .unwrap();
        assert!(config.token.is_none());
    }

    #[test]
    fn test_token_is_redacted_in_debug() {
        let config = load(&[
            ("SUPPORT_CHAT_API_URL", "https://shop.example"),
            ("SUPPORT_CHAT_TOKEN", "eyJhbGciOi.secret.sig"),
        ])
        .unwrap();
        assert_eq!(
            config.token.as_ref().unwrap().expose_secret(),
            "eyJhbGciOi.secret.sig"
        );
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("secret.sig"));
    }

    #[test]
    fn test_unread_path_without_home() {
        let config = load(&[("SUPPORT_CHAT_API_URL", "https://shop.example")]).unwrap();
        assert_eq!(config.unread_path, PathBuf::from("unread_messages.json"));
    }
}
