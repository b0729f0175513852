//! Session teardown: what happens when authentication can't be recovered.
//!
//! Teardown is the terminal step of the request pipeline. It runs when a
//! renewal attempt fails (or when the renewal endpoint itself answers
//! 401), and it does two things, in this order:
//!
//! 1. forget every session artifact the client can reach (its cookies)
//! 2. send the user to the login route
//!
//! ```text
//! renewal rejected ──→ invalidate() ──→ artifacts.clear() ──→ navigate("/login")
//! ```
//!
//! Whatever the backend still remembers about the session is the
//! backend's business; an explicit server-side logout is a separate
//! operation on the client facade.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::{Navigator, SessionArtifacts};

/// The route users are sent to after teardown, unless configured otherwise.
pub const DEFAULT_LOGIN_ROUTE: &str = "/login";

/// Invoked on unrecoverable authentication failure.
///
/// # Contract
///
/// - **Never fails.** There is no `Result`: by the time teardown runs the
///   request batch has already failed, and there is nobody left to handle
///   a teardown error.
/// - **Idempotent.** Calling it twice must be harmless. The refresh
///   coordinator guarantees one call per failed batch, but separate
///   batches (or an explicit logout) may call it again.
pub trait SessionTeardown: Send + Sync + 'static {
    /// Invalidates local session state and redirects to login.
    fn invalidate(&self);
}

/// The default [`SessionTeardown`]: clear local artifacts, then navigate.
pub struct LocalTeardown {
    artifacts: Arc<dyn SessionArtifacts>,
    navigator: Arc<dyn Navigator>,
    login_route: String,
    invalidations: AtomicU64,
}

impl LocalTeardown {
    /// Creates a teardown handler that redirects to [`DEFAULT_LOGIN_ROUTE`].
    pub fn new(artifacts: Arc<dyn SessionArtifacts>, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            artifacts,
            navigator,
            login_route: DEFAULT_LOGIN_ROUTE.to_string(),
            invalidations: AtomicU64::new(0),
        }
    }

    /// Overrides the login route.
    pub fn with_login_route(mut self, route: impl Into<String>) -> Self {
        self.login_route = route.into();
        self
    }

    /// Returns the route users are sent to.
    pub fn login_route(&self) -> &str {
        &self.login_route
    }

    /// Returns how many times [`invalidate`](SessionTeardown::invalidate)
    /// has run.
    pub fn invalidations(&self) -> u64 {
        self.invalidations.load(Ordering::Relaxed)
    }
}

impl SessionTeardown for LocalTeardown {
    fn invalidate(&self) {
        let invalidation = self.invalidations.fetch_add(1, Ordering::Relaxed) + 1;
        let cleared = self.artifacts.clear();
        tracing::info!(
            cleared,
            invalidation,
            route = %self.login_route,
            "session invalidated"
        );
        self.navigator.navigate(&self.login_route);
    }
}
