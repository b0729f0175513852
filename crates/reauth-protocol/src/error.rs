//! Error types for the protocol layer.
//!
//! Each crate in the workspace defines its own error enum. A
//! `ProtocolError` always means a body couldn't be encoded or decoded,
//! never that the network misbehaved.

/// Errors that can occur while encoding or decoding bodies.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: an HTML error page where JSON was expected,
    /// missing required fields, or a truncated body.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The body decoded fine but its content is unusable, e.g. a renewal
    /// grant with an empty access token.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
