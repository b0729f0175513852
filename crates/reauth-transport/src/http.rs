//! HTTP transport implementation using `reqwest`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reauth_protocol::{Headers, Method, RequestEnvelope, Response};
use reqwest::cookie::CookieStore;

use crate::{Transport, TransportError, resolve_target};

/// Counter for tagging outbound requests in logs.
static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Builder for [`HttpTransport`].
pub struct HttpTransportBuilder {
    base_url: String,
    inner: reqwest::ClientBuilder,
}

impl HttpTransportBuilder {
    /// Applies a timeout to every request, the renewal call included.
    ///
    /// There is no timeout unless this is set.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.inner = self.inner.timeout(timeout);
        self
    }

    /// Attaches a cookie store so ambient session cookies (the refresh
    /// cookie in particular) are stored from responses and sent with
    /// every request.
    pub fn cookie_store<C: CookieStore + 'static>(mut self, store: Arc<C>) -> Self {
        self.inner = self.inner.cookie_provider(store);
        self
    }

    /// Builds the transport.
    pub fn build(self) -> Result<HttpTransport, TransportError> {
        let client = self.inner.build().map_err(TransportError::Build)?;
        tracing::debug!(base_url = %self.base_url, "HTTP transport ready");
        Ok(HttpTransport {
            client,
            base_url: self.base_url,
        })
    }
}

/// A [`Transport`] that talks to the backend over HTTP.
///
/// Cheap to clone: `reqwest::Client` is reference-counted internally.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Starts building a transport for the given base URL
    /// (e.g. `http://localhost:5000/api`).
    pub fn builder(base_url: impl Into<String>) -> HttpTransportBuilder {
        HttpTransportBuilder {
            base_url: base_url.into(),
            inner: reqwest::Client::builder(),
        }
    }

    /// Returns the base URL relative targets are resolved against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, target: &str) -> Result<reqwest::Url, TransportError> {
        let joined = resolve_target(&self.base_url, target);
        reqwest::Url::parse(&joined)
            .map_err(|e| TransportError::InvalidTarget(format!("{joined}: {e}")))
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

fn map_send_error(e: reqwest::Error) -> TransportError {
    if e.is_connect() {
        TransportError::Unreachable(e.to_string())
    } else {
        TransportError::Request(e)
    }
}

impl Transport for HttpTransport {
    async fn send(&self, request: &RequestEnvelope) -> Result<Response, TransportError> {
        let id = NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed);
        let url = self.url_for(request.target())?;
        tracing::debug!(
            id,
            method = %request.method(),
            %url,
            retried = request.retried(),
            "sending request"
        );

        let mut builder = self
            .client
            .request(to_reqwest_method(request.method()), url);
        for (name, value) in request.headers().iter() {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body_bytes() {
            builder = builder.body(body.to_vec());
        }

        let response = builder.send().await.map_err(map_send_error)?;

        let status = response.status().as_u16();
        let mut headers = Headers::new();
        for (name, value) in response.headers() {
            // Non-UTF-8 header values are dropped; nothing downstream
            // reads binary headers.
            if let Ok(value) = value.to_str() {
                headers.append(name.as_str(), value);
            }
        }
        let body = response.bytes().await.map_err(TransportError::Body)?;

        tracing::debug!(id, status, bytes = body.len(), "response received");
        Ok(Response::new(status, headers, body.to_vec()))
    }
}
