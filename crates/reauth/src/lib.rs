//! # reauth
//!
//! An HTTP client for cookie-session backends that renews an expired
//! access credential transparently.
//!
//! When a request comes back 401, the client asks the backend for a new
//! credential and replays the request with it. If many requests expire at
//! once, only one renewal call is made; the others wait for it and replay
//! in the order they failed. If renewal fails, every waiting request fails
//! with [`ClientError::AuthExpired`] and the session is torn down once.
//!
//! ## Layers
//!
//! ```text
//! Client ──→ Transport (reqwest)
//!   │ 401
//!   └──→ RefreshCoordinator ──→ POST /auth/token
//!            │ failure
//!            └──→ SessionTeardown (clear cookies, go to /login)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use reauth::prelude::*;
//!
//! # async fn run() -> Result<(), ClientError> {
//! let client = Client::builder()
//!     .config(ClientConfig::from_env())
//!     .build()?;
//!
//! let projects = client.get("/project/projects/my").await?;
//! println!("{}", projects.text());
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod error;
mod refresh;

pub use client::{Client, ClientBuilder};
pub use config::{BASE_URL_ENV, ClientConfig};
pub use error::{ClientError, ExpiryReason};
pub use refresh::RefreshCoordinator;

pub use reauth_protocol::{
    Codec, Credential, Headers, JsonCodec, Method, RenewalGrant, RequestEnvelope, Response,
};
pub use reauth_session::{
    ChannelNavigator, LocalTeardown, LogNavigator, Navigator, SessionArtifacts, SessionCookies,
    SessionTeardown,
};
pub use reauth_transport::{HttpTransport, Transport, TransportError};

/// The types most applications need.
pub mod prelude {
    pub use crate::{
        Client, ClientBuilder, ClientConfig, ClientError, Codec, ExpiryReason, JsonCodec,
        Method, Navigator, RequestEnvelope, Response, SessionCookies, SessionTeardown,
        Transport,
    };
}
