//! Transport abstraction layer for reauth.
//!
//! Provides the [`Transport`] trait: the capability of performing one
//! network call for a [`RequestEnvelope`] and returning whatever the
//! backend answered. The client facade and the refresh coordinator are
//! written against this trait only, so tests can drive them with a
//! scripted in-process transport.
//!
//! # Feature Flags
//!
//! - `http` (default): [`HttpTransport`] via `reqwest`

mod error;
#[cfg(feature = "http")]
mod http;

pub use error::TransportError;
#[cfg(feature = "http")]
pub use http::{HttpTransport, HttpTransportBuilder};

use std::future::Future;

use reauth_protocol::{RequestEnvelope, Response};

/// Performs outbound calls.
///
/// Implementations must return a [`Response`] for every status code the
/// backend produces, 4xx and 5xx included. `Err` is reserved for
/// connectivity-level failures.
///
/// The returned future is `Send` so that calls can be issued from spawned
/// Tokio tasks (the refresh coordinator runs the renewal call in one).
pub trait Transport: Send + Sync + 'static {
    /// Sends the request and waits for the complete response.
    fn send(
        &self,
        request: &RequestEnvelope,
    ) -> impl Future<Output = Result<Response, TransportError>> + Send;
}

/// Joins a request target onto a base URL.
///
/// Absolute `http://` / `https://` targets are returned unchanged. Relative
/// targets are appended with exactly one `/` in between, so a base of
/// `http://host/api` keeps its `/api` prefix (which `Url::join` would drop).
pub fn resolve_target(base_url: &str, target: &str) -> String {
    if target.starts_with("http://") || target.starts_with("https://") {
        return target.to_string();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        target.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_target_keeps_base_path() {
        assert_eq!(
            resolve_target("http://localhost:5000/api", "/auth/token"),
            "http://localhost:5000/api/auth/token"
        );
    }

    #[test]
    fn test_resolve_target_normalizes_slashes() {
        assert_eq!(
            resolve_target("http://localhost:5000/api/", "project/projects/open"),
            "http://localhost:5000/api/project/projects/open"
        );
        assert_eq!(
            resolve_target("http://localhost:5000/api/", "//bid/bids"),
            "http://localhost:5000/api/bid/bids"
        );
    }

    #[test]
    fn test_resolve_target_absolute_target_wins() {
        assert_eq!(
            resolve_target("http://localhost:5000/api", "https://other.example/api/auth/me"),
            "https://other.example/api/auth/me"
        );
    }

    #[test]
    fn test_resolve_target_keeps_query_string() {
        assert_eq!(
            resolve_target("http://localhost:5000/api", "/project/projects/open?page=2"),
            "http://localhost:5000/api/project/projects/open?page=2"
        );
    }
}
