//! Unified error type for the reauth client.

use reauth_protocol::{ProtocolError, Response};
use reauth_transport::TransportError;

/// Why a request ended in [`ClientError::AuthExpired`].
///
/// `Clone` because a single renewal outcome is fanned out to every
/// request that was waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExpiryReason {
    /// The request was already replayed with a fresh credential and the
    /// backend still answered 401.
    #[error("credential rejected again after renewal")]
    RetryExhausted,

    /// The renewal endpoint itself answered 401; renewals are never
    /// renewed.
    #[error("renewal endpoint rejected the session")]
    RenewalEndpoint,

    /// The renewal call was refused (401/403): the session is gone.
    #[error("renewal rejected with status {status}")]
    RenewalRejected { status: u16 },

    /// The renewal call failed for any other reason (unreachable backend,
    /// unexpected status, malformed grant).
    #[error("renewal failed: {0}")]
    RenewalFailed(String),

    /// The renewal task ended without reporting an outcome.
    #[error("renewal abandoned before completing")]
    RenewalAbandoned,
}

/// Everything [`Client::send`](crate::Client::send) can fail with.
///
/// Sub-crate errors convert automatically via `#[from]`, so `?` works
/// on transport and codec results.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Connectivity-level failure, surfaced as-is.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A request body couldn't be encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The credential is stale and could not be renewed.
    #[error("authentication expired for {target}: {reason}")]
    AuthExpired { target: String, reason: ExpiryReason },

    /// The backend answered with a non-2xx status other than 401.
    /// The response is preserved untouched.
    #[error("{target} rejected with status {}", .response.status())]
    Rejected { target: String, response: Response },

    /// The client configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ClientError {
    /// Returns the HTTP status behind this error, if there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { response, .. } => Some(response.status()),
            Self::AuthExpired {
                reason: ExpiryReason::RenewalRejected { status },
                ..
            } => Some(*status),
            Self::AuthExpired { .. } => Some(reauth_protocol::STATUS_UNAUTHORIZED),
            _ => None,
        }
    }

    /// Returns `true` if the session has to be re-established.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::AuthExpired { .. })
    }
}
