//! Request and response types for the reauth client.
//!
//! This crate defines the values that travel through the authenticated
//! request pipeline:
//!
//! - **Types** ([`RequestEnvelope`], [`Response`], [`Credential`],
//!   [`Classification`]): one outbound call, its answer, and the bearer
//!   value used to replay it.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how bodies are converted
//!   to/from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! ```text
//! Client facade (reauth) → Protocol (RequestEnvelope) → Transport (HTTP)
//! ```
//!
//! Nothing in here performs I/O.

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    AUTHORIZATION, CONTENT_TYPE, Classification, Credential, Headers, Method, RenewalGrant,
    RequestEnvelope, Response, STATUS_FORBIDDEN, STATUS_UNAUTHORIZED,
};
