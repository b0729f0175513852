//! The client facade: the only API application code calls.
//!
//! Every request goes through [`Client::send`], which applies the
//! interception policy:
//!
//! ```text
//!   transport error         → ClientError::Transport (as-is)
//!   2xx                     → Ok(response)
//!   401, first attempt      → RefreshCoordinator::handle_expiry
//!   401, already replayed   → ClientError::AuthExpired (RetryExhausted)
//!   anything else           → ClientError::Rejected (never retried)
//! ```

use std::sync::Arc;

use reauth_protocol::{
    CONTENT_TYPE, Classification, JsonCodec, Method, RequestEnvelope, Response,
    STATUS_UNAUTHORIZED,
};
use reauth_session::{LocalTeardown, LogNavigator, Navigator, SessionCookies, SessionTeardown};
use reauth_transport::{HttpTransport, Transport};
use serde::Serialize;

use crate::{ClientConfig, ClientError, ExpiryReason, RefreshCoordinator};

/// Builds a `POST` with an empty JSON object body.
///
/// Used for the renewal and logout calls, which take no parameters: the
/// session travels in cookies.
pub(crate) fn empty_json_post(target: &str) -> RequestEnvelope {
    RequestEnvelope::post(target)
        .header(CONTENT_TYPE, "application/json")
        .body(b"{}".to_vec())
}

/// Turns a response into the caller's result, without any retry.
///
/// A 401 reaching this point is terminal: the caller only settles a 401
/// once the envelope has already been replayed.
pub(crate) fn settle(envelope: &RequestEnvelope, response: Response) -> Result<Response, ClientError> {
    match response.classify() {
        Classification::Success => Ok(response),
        Classification::AuthExpired => {
            tracing::warn!(
                method = %envelope.method(),
                path = envelope.target(),
                "credential rejected after renewal"
            );
            Err(ClientError::AuthExpired {
                target: envelope.target().to_string(),
                reason: ExpiryReason::RetryExhausted,
            })
        }
        Classification::Rejected => {
            tracing::debug!(
                method = %envelope.method(),
                path = envelope.target(),
                status = response.status(),
                "request rejected"
            );
            Err(ClientError::Rejected {
                target: envelope.target().to_string(),
                response,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// An HTTP client that transparently renews an expired credential.
///
/// Cheap to clone; clones share the transport, the teardown handler and,
/// most importantly, the refresh coordinator, so concurrent requests from
/// any clone renew at most once.
///
/// ```rust,no_run
/// use reauth::prelude::*;
///
/// # async fn run() -> Result<(), ClientError> {
/// let client = Client::builder()
///     .base_url("https://market.example.com/api")
///     .build()?;
///
/// let me = client.get("/auth/me").await?;
/// println!("{}", me.text());
/// # Ok(())
/// # }
/// ```
pub struct Client<T: Transport = HttpTransport, S: SessionTeardown = LocalTeardown> {
    config: Arc<ClientConfig>,
    transport: Arc<T>,
    teardown: Arc<S>,
    coordinator: RefreshCoordinator<T, S>,
    codec: JsonCodec,
}

impl<T: Transport, S: SessionTeardown> Clone for Client<T, S> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            transport: Arc::clone(&self.transport),
            teardown: Arc::clone(&self.teardown),
            coordinator: self.coordinator.clone(),
            codec: self.codec,
        }
    }
}

impl Client {
    /// Starts building a client over HTTP with the default session
    /// handling (cookie jar + [`LocalTeardown`]).
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }
}

impl<T: Transport, S: SessionTeardown> Client<T, S> {
    /// Assembles a client from a custom transport and teardown handler.
    ///
    /// # Errors
    /// [`ClientError::InvalidConfig`] if `config` doesn't validate.
    pub fn from_parts(config: ClientConfig, transport: T, teardown: S) -> Result<Self, ClientError> {
        Self::from_shared(config, Arc::new(transport), Arc::new(teardown))
    }

    /// Like [`from_parts`](Self::from_parts), for parts the caller keeps a
    /// handle to.
    pub fn from_shared(
        config: ClientConfig,
        transport: Arc<T>,
        teardown: Arc<S>,
    ) -> Result<Self, ClientError> {
        let config = config.validated()?;
        let coordinator = RefreshCoordinator::new(
            Arc::clone(&transport),
            Arc::clone(&teardown),
            config.refresh_path.clone(),
        );
        Ok(Self {
            config: Arc::new(config),
            transport,
            teardown,
            coordinator,
            codec: JsonCodec,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn teardown(&self) -> &S {
        &self.teardown
    }

    /// Returns the coordinator shared by every clone of this client.
    pub fn coordinator(&self) -> &RefreshCoordinator<T, S> {
        &self.coordinator
    }

    /// Issues a request, renewing the credential once if it has expired.
    ///
    /// # Errors
    /// - [`ClientError::Transport`] if the backend couldn't be reached
    /// - [`ClientError::Rejected`] for any non-2xx status other than 401,
    ///   with the response untouched
    /// - [`ClientError::AuthExpired`] if the credential couldn't be renewed,
    ///   or the replay was rejected again
    pub async fn send(&self, envelope: RequestEnvelope) -> Result<Response, ClientError> {
        let response = self.transport.send(&envelope).await?;

        if response.status() == STATUS_UNAUTHORIZED && !envelope.retried() {
            tracing::debug!(
                method = %envelope.method(),
                path = envelope.target(),
                "request unauthorized, handing off to refresh coordinator"
            );
            return self.coordinator.handle_expiry(envelope).await;
        }

        settle(&envelope, response)
    }

    pub async fn get(&self, target: &str) -> Result<Response, ClientError> {
        self.send(RequestEnvelope::get(target)).await
    }

    pub async fn delete(&self, target: &str) -> Result<Response, ClientError> {
        self.send(RequestEnvelope::new(Method::Delete, target)).await
    }

    /// `POST`s `body` encoded as JSON.
    pub async fn post_json<B: Serialize>(&self, target: &str, body: &B) -> Result<Response, ClientError> {
        self.send_json(Method::Post, target, body).await
    }

    /// `PUT`s `body` encoded as JSON.
    pub async fn put_json<B: Serialize>(&self, target: &str, body: &B) -> Result<Response, ClientError> {
        self.send_json(Method::Put, target, body).await
    }

    /// `PATCH`es `body` encoded as JSON.
    pub async fn patch_json<B: Serialize>(&self, target: &str, body: &B) -> Result<Response, ClientError> {
        self.send_json(Method::Patch, target, body).await
    }

    async fn send_json<B: Serialize>(
        &self,
        method: Method,
        target: &str,
        body: &B,
    ) -> Result<Response, ClientError> {
        let envelope = RequestEnvelope::new(method, target).json(&self.codec, body)?;
        self.send(envelope).await
    }

    /// Ends the session on the backend, then tears it down locally.
    ///
    /// Local teardown runs whatever the logout call returns; the result of
    /// that call is handed back so the caller can report it.
    pub async fn logout(&self) -> Result<Response, ClientError> {
        let result = self.send(empty_json_post(&self.config.logout_path)).await;
        if let Err(e) = &result {
            tracing::warn!(error = %e, "server-side logout failed");
        }
        self.teardown.invalidate();
        result
    }
}

// ---------------------------------------------------------------------------
// ClientBuilder
// ---------------------------------------------------------------------------

/// Builder for the default [`Client`].
///
/// Wires an [`HttpTransport`] that stores cookies in a [`SessionCookies`]
/// jar, and a [`LocalTeardown`] that clears that jar and navigates to the
/// configured login route.
pub struct ClientBuilder {
    config: ClientConfig,
    navigator: Option<Arc<dyn Navigator>>,
    cookies: Option<Arc<SessionCookies>>,
}

impl ClientBuilder {
    /// Creates a builder with [`ClientConfig::default`].
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            navigator: None,
            cookies: None,
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
        self.config.refresh_path = path.into();
        self
    }

    pub fn logout_path(mut self, path: impl Into<String>) -> Self {
        self.config.logout_path = path.into();
        self
    }

    pub fn login_route(mut self, route: impl Into<String>) -> Self {
        self.config.login_route = route.into();
        self
    }

    pub fn request_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.config.request_timeout = Some(timeout);
        self
    }

    /// Sets where the user is sent after teardown.
    /// Defaults to [`LogNavigator`].
    pub fn navigator(mut self, navigator: impl Navigator) -> Self {
        self.navigator = Some(Arc::new(navigator));
        self
    }

    /// Uses `cookies` as the session jar, so the caller can inspect it.
    /// Defaults to a fresh, empty jar.
    pub fn cookies(mut self, cookies: Arc<SessionCookies>) -> Self {
        self.cookies = Some(cookies);
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    /// - [`ClientError::InvalidConfig`] if the configuration doesn't validate
    /// - [`ClientError::Transport`] if the HTTP client can't be built
    pub fn build(self) -> Result<Client, ClientError> {
        let config = self.config.validated()?;
        let cookies = self.cookies.unwrap_or_default();

        let mut transport = HttpTransport::builder(config.base_url.clone())
            .cookie_store(Arc::clone(&cookies));
        if let Some(timeout) = config.request_timeout {
            transport = transport.timeout(timeout);
        }
        let transport = transport.build()?;

        let navigator: Arc<dyn Navigator> = match self.navigator {
            Some(navigator) => navigator,
            None => Arc::new(LogNavigator),
        };
        let teardown =
            LocalTeardown::new(cookies, navigator).with_login_route(config.login_route.clone());

        tracing::info!(base_url = %config.base_url, "client ready");
        Client::from_parts(config, transport, teardown)
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use reauth_protocol::{AUTHORIZATION, Credential, Headers};

    use super::*;

    fn response(status: u16) -> Response {
        Response::new(status, Headers::new(), "body")
    }

    #[test]
    fn test_empty_json_post_has_json_body() {
        let envelope = empty_json_post("/auth/token");
        assert_eq!(envelope.method(), Method::Post);
        assert_eq!(envelope.target(), "/auth/token");
        assert_eq!(envelope.headers().get(CONTENT_TYPE), Some("application/json"));
        assert_eq!(envelope.body_bytes(), Some(&b"{}"[..]));
        assert!(!envelope.retried());
    }

    #[test]
    fn test_settle_success_returns_response() {
        let envelope = RequestEnvelope::get("/auth/me");
        let result = settle(&envelope, response(204));
        assert_eq!(result.unwrap().status(), 204);
    }

    #[test]
    fn test_settle_unauthorized_is_retry_exhausted() {
        let envelope = RequestEnvelope::get("/auth/me").replay_with(&Credential::new("T2"));
        assert!(envelope.headers().contains(AUTHORIZATION));

        let err = settle(&envelope, response(401)).unwrap_err();

        assert!(matches!(
            err,
            ClientError::AuthExpired {
                reason: ExpiryReason::RetryExhausted,
                ..
            }
        ));
    }

    #[test]
    fn test_settle_other_status_preserves_response() {
        let envelope = RequestEnvelope::get("/project/projects/9");

        let err = settle(&envelope, response(404)).unwrap_err();

        match err {
            ClientError::Rejected { target, response } => {
                assert_eq!(target, "/project/projects/9");
                assert_eq!(response.status(), 404);
                assert_eq!(response.text(), "body");
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let result = Client::builder().base_url("ftp://market.example.com").build();
        assert!(matches!(result, Err(ClientError::InvalidConfig(_))));
    }

    #[test]
    fn test_builder_applies_config_to_parts() {
        let client = Client::builder()
            .base_url("http://127.0.0.1:5999/api")
            .refresh_path("/session/renew")
            .login_route("/signin")
            .build()
            .expect("client should build");

        assert_eq!(client.transport().base_url(), "http://127.0.0.1:5999/api");
        assert_eq!(client.coordinator().refresh_path(), "/session/renew");
        assert_eq!(client.teardown().login_route(), "/signin");
    }
}
