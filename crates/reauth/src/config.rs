//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ClientError;

/// Environment variable that overrides [`ClientConfig::base_url`].
pub const BASE_URL_ENV: &str = "REAUTH_BASE_URL";

/// Configuration for a [`Client`](crate::Client).
///
/// Every field has a default matching the marketplace backend's layout,
/// so most callers only set `base_url`:
///
/// ```rust
/// use reauth::ClientConfig;
///
/// let config = ClientConfig {
///     base_url: "https://market.example.com/api".into(),
///     ..ClientConfig::default()
/// };
/// assert_eq!(config.refresh_path, "/auth/token");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL relative request targets are resolved against.
    pub base_url: String,

    /// Path of the renewal endpoint (`POST`, answers `{"accessToken": ..}`).
    pub refresh_path: String,

    /// Path of the server-side logout endpoint.
    pub logout_path: String,

    /// Route the user is sent to after session teardown.
    pub login_route: String,

    /// Timeout applied to every request, the renewal call included.
    /// `None` (the default) waits indefinitely.
    pub request_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000/api".to_string(),
            refresh_path: "/auth/token".to_string(),
            logout_path: "/auth/logout".to_string(),
            login_route: reauth_session::DEFAULT_LOGIN_ROUTE.to_string(),
            request_timeout: None,
        }
    }
}

impl ClientConfig {
    /// Default config with `base_url` taken from `REAUTH_BASE_URL` when set.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(base_url) = lookup(BASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
            config.base_url = base_url.trim().to_string();
        }
        config
    }

    /// Checks the config is usable.
    ///
    /// # Errors
    /// [`ClientError::InvalidConfig`] if `base_url` is empty or not
    /// `http(s)://`, or if a path/route doesn't start with `/`.
    pub fn validated(self) -> Result<Self, ClientError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ClientError::InvalidConfig(format!(
                "base_url must be an http(s) URL, got {:?}",
                self.base_url
            )));
        }
        for (name, value) in [
            ("refresh_path", &self.refresh_path),
            ("logout_path", &self.logout_path),
            ("login_route", &self.login_route),
        ] {
            if !value.starts_with('/') {
                return Err(ClientError::InvalidConfig(format!(
                    "{name} must start with '/', got {value:?}"
                )));
            }
        }
        Ok(self)
    }
}
