//! Core request/response types for the authenticated request pipeline.
//!
//! This module defines every value that crosses the boundary between the
//! client facade and the network:
//!
//! - [`RequestEnvelope`]: one outbound call, including its one-shot
//!   "already retried" marker.
//! - [`Response`]: whatever the backend answered, with any status code.
//! - [`Credential`]: the opaque bearer value handed out by the renewal
//!   endpoint.
//! - [`Classification`]: how a response status is interpreted by the
//!   interception policy.

use std::fmt;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{Codec, ProtocolError};

/// Name of the header that carries the bearer credential.
pub const AUTHORIZATION: &str = "Authorization";

/// Name of the header that describes the request body format.
pub const CONTENT_TYPE: &str = "Content-Type";

// ---------------------------------------------------------------------------
// Method
// ---------------------------------------------------------------------------

/// The HTTP method of an outbound call.
///
/// Only the verbs the marketplace API actually uses are modeled. A closed
/// enum (instead of a free-form string) means a typo like `"PSOT"` is a
/// compile error rather than a confusing 405 from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    /// Returns the upper-case verb as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Headers
// ---------------------------------------------------------------------------

/// An ordered list of HTTP headers.
///
/// Header names are case-insensitive on the wire (`authorization` and
/// `Authorization` are the same header), so every lookup here compares
/// names with `eq_ignore_ascii_case`. The original casing of the first
/// insertion is preserved for display.
///
/// `Debug` is implemented by hand so that credential-bearing headers
/// (`Authorization`, `Cookie`, `Set-Cookie`) never end up in logs.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Creates an empty header list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a header, overwriting any existing header with the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Appends a header without replacing existing ones.
    ///
    /// Used for response headers that may legitimately repeat
    /// (e.g. several `Set-Cookie` lines).
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Returns the first value of the named header, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns `true` if the named header is present.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterates over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Returns the number of header entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no headers.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn is_sensitive(name: &str) -> bool {
    ["authorization", "cookie", "set-cookie"]
        .iter()
        .any(|s| name.eq_ignore_ascii_case(s))
}

impl fmt::Debug for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(name, value)| {
                let shown = if is_sensitive(name) { "<redacted>" } else { value.as_str() };
                (name, shown)
            }))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Credential
// ---------------------------------------------------------------------------

/// An opaque bearer credential returned by a successful renewal.
///
/// The client never persists this value. It exists just long enough for
/// the refresh coordinator to inject it into every request that was
/// blocked on the renewal.
///
/// `Debug` is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wraps a raw bearer token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token. Only call this when building a header.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns the `Authorization` header value: `Bearer <token>`.
    pub fn authorization(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// JSON body of a successful renewal call.
///
/// The backend answers `POST <refresh-path>` with
/// `{ "accessToken": "<token>" }`. Extra fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenewalGrant {
    #[serde(rename = "accessToken")]
    pub access_token: String,
}

impl RenewalGrant {
    /// Converts the grant into a [`Credential`].
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidMessage`] if the token is blank:
    /// a blank bearer would just produce another 401.
    pub fn into_credential(self) -> Result<Credential, ProtocolError> {
        if self.access_token.trim().is_empty() {
            return Err(ProtocolError::InvalidMessage(
                "renewal grant carried an empty access token".into(),
            ));
        }
        Ok(Credential::new(self.access_token))
    }
}

// ---------------------------------------------------------------------------
// RequestEnvelope
// ---------------------------------------------------------------------------

/// Describes one outbound call.
///
/// ```text
/// ┌───────────────────────────────────────────┐
/// │ method:  POST                             │
/// │ target:  /bid/bids                        │  ← relative to base URL
/// │ headers: Content-Type, Authorization, ... │
/// │ body:    {"amount": 120}                  │
/// │ retried: false                            │  ← one-shot marker
/// └───────────────────────────────────────────┘
/// ```
///
/// ## The `retried` marker
///
/// An envelope starts with `retried = false`. The only way to get an
/// envelope with `retried = true` is [`replay_with`](Self::replay_with),
/// which builds a *new* envelope carrying a fresh credential. There is no
/// way to flip the marker back, so a request can be renewed at most once
/// and a second 401 is always terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestEnvelope {
    method: Method,
    target: String,
    headers: Headers,
    body: Option<Vec<u8>>,
    retried: bool,
}

impl RequestEnvelope {
    /// Creates a new envelope with no headers, no body and `retried = false`.
    ///
    /// `target` is either a path relative to the client's base URL
    /// (`/project/projects/my`) or an absolute `http(s)://` URL.
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            headers: Headers::new(),
            body: None,
            retried: false,
        }
    }

    /// Shorthand for `RequestEnvelope::new(Method::Get, target)`.
    pub fn get(target: impl Into<String>) -> Self {
        Self::new(Method::Get, target)
    }

    /// Shorthand for `RequestEnvelope::new(Method::Post, target)`.
    pub fn post(target: impl Into<String>) -> Self {
        Self::new(Method::Post, target)
    }

    /// Sets a header (overwriting an existing one with the same name).
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets a raw body.
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Encodes `value` with the given codec and uses it as the body.
    ///
    /// Also sets `Content-Type: application/json`.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if the value can't be encoded.
    pub fn json<C: Codec, T: Serialize>(
        self,
        codec: &C,
        value: &T,
    ) -> Result<Self, ProtocolError> {
        let bytes = codec.encode(value)?;
        Ok(self.header(CONTENT_TYPE, "application/json").body(bytes))
    }

    /// Builds the replay of this envelope after a successful renewal.
    ///
    /// The returned envelope is identical except that its `Authorization`
    /// header is `Bearer <credential>` and `retried` is `true`. `self` is
    /// not modified, so concurrent replays never alias each other.
    pub fn replay_with(&self, credential: &Credential) -> Self {
        let mut replay = self.clone();
        replay.headers.insert(AUTHORIZATION, credential.authorization());
        replay.retried = true;
        replay
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body_bytes(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Returns `true` if this envelope has already been replayed once.
    pub fn retried(&self) -> bool {
        self.retried
    }

    /// Returns the target's path with any query string or fragment removed.
    ///
    /// For absolute targets the scheme and authority are stripped as well,
    /// so `https://api.example.com/api/auth/token?x=1` yields
    /// `/api/auth/token`.
    pub fn target_path(&self) -> &str {
        let target = self.target.as_str();
        let without_origin = match target.split_once("://") {
            Some((_, rest)) => rest.find('/').map_or("/", |idx| &rest[idx..]),
            None => target,
        };
        let end = without_origin
            .find(['?', '#'])
            .unwrap_or(without_origin.len());
        &without_origin[..end]
    }
}

// ---------------------------------------------------------------------------
// Response & Classification
// ---------------------------------------------------------------------------

/// How the interception policy reads a response status.
///
/// ```text
///   2xx  → Success      returned to the caller as-is
///   401  → AuthExpired  renewed once, then terminal
///   else → Rejected     returned to the caller unmodified, never retried
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Success,
    AuthExpired,
    Rejected,
}

/// Status code the backend uses for a stale or missing credential.
pub const STATUS_UNAUTHORIZED: u16 = 401;

/// Status code the renewal endpoint may use to refuse a renewal.
pub const STATUS_FORBIDDEN: u16 = 403;

/// A response from the backend, with any status code.
///
/// The transport never turns a non-2xx status into an error: it hands back
/// a `Response` and leaves the interpretation to [`classify`](Self::classify).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: u16,
    headers: Headers,
    body: Vec<u8>,
}

impl Response {
    /// Creates a response from its parts.
    pub fn new(status: u16, headers: Headers, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Consumes the response and returns the raw body.
    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// Returns the body as UTF-8 text, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decodes the body with the given codec.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if the body doesn't match `T`.
    pub fn json<C: Codec, T: DeserializeOwned>(&self, codec: &C) -> Result<T, ProtocolError> {
        codec.decode(&self.body)
    }

    /// Returns `true` for any 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Classifies the status for the interception policy.
    pub fn classify(&self) -> Classification {
        if self.is_success() {
            Classification::Success
        } else if self.status == STATUS_UNAUTHORIZED {
            Classification::AuthExpired
        } else {
            Classification::Rejected
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
