/// Errors that can occur in the transport layer.
///
/// Only connectivity-level problems end up here. A 401 or a 500 is a
/// perfectly good [`Response`](reauth_protocol::Response), not an error.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The target couldn't be turned into a valid URL.
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    /// The backend couldn't be reached at all (connection refused, DNS).
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    /// Building the underlying HTTP client failed.
    #[cfg(feature = "http")]
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    /// The request failed after a connection was attempted
    /// (timeout, reset, invalid header, ...).
    #[cfg(feature = "http")]
    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),

    /// Reading the response body failed.
    #[cfg(feature = "http")]
    #[error("failed to read response body: {0}")]
    Body(#[source] reqwest::Error),
}
