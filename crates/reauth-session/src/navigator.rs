//! Navigation hooks: where the user is sent after a session is torn down.
//!
//! In a browser the teardown handler would set `window.location`. A Rust
//! client has no window, so "redirect to login" is delegated to a
//! [`Navigator`] supplied by the embedding application: a desktop app
//! might switch screens, a CLI might print a hint, a test might just
//! record the route.

use tokio::sync::mpsc;

/// Receives "go to this route" requests.
///
/// `navigate` is synchronous and must not fail: it is called from the
/// teardown path, which itself never fails.
pub trait Navigator: Send + Sync + 'static {
    /// Requests navigation to `route` (e.g. `/login`).
    fn navigate(&self, route: &str);
}

/// A [`Navigator`] that only logs the request.
///
/// The default when the embedding application doesn't supply one.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn navigate(&self, route: &str) {
        tracing::warn!(route, "session ended, sign-in required");
    }
}

/// A [`Navigator`] that forwards every route over an unbounded channel.
///
/// The receiving half is handed to whatever drives the UI.
#[derive(Debug, Clone)]
pub struct ChannelNavigator {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelNavigator {
    /// Creates the navigator and the receiver that observes its routes.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Navigator for ChannelNavigator {
    fn navigate(&self, route: &str) {
        if self.tx.send(route.to_string()).is_err() {
            tracing::debug!(route, "navigation receiver dropped");
        }
    }
}
