//! Session artifacts and teardown for reauth.
//!
//! This crate owns the client side of "the session":
//!
//! 1. **Artifacts**: the cookies the backend hands out, kept in
//!    [`SessionCookies`] so the transport can replay them
//! 2. **Teardown**: the [`SessionTeardown`] hook invoked when
//!    authentication can't be recovered ([`LocalTeardown`] by default)
//! 3. **Navigation**: where the user goes afterwards ([`Navigator`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Client facade (above)  ← invokes teardown after a failed renewal
//!     ↕
//! Session layer (this crate)  ← owns cookies, clears them, redirects
//!     ↕
//! Transport (beside)  ← reads and writes cookies through reqwest's CookieStore
//! ```
//!
//! This crate does not implement authentication, parse session contents,
//! or persist anything to disk.

mod cookies;
mod navigator;
mod teardown;

pub use cookies::{SessionCookies, StoredCookie};
pub use navigator::{ChannelNavigator, LogNavigator, Navigator};
pub use teardown::{DEFAULT_LOGIN_ROUTE, LocalTeardown, SessionTeardown};

/// Local session state that teardown knows how to forget.
pub trait SessionArtifacts: Send + Sync + 'static {
    /// Removes every artifact and returns how many were removed.
    fn clear(&self) -> usize;
}
