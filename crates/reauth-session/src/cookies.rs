//! The client's cookie jar: the session artifacts teardown can reach.
//!
//! The backend keeps the long-lived session in a cookie (typically an
//! `HttpOnly` refresh cookie). The renewal call only works if that cookie
//! rides along, so the HTTP transport is given this jar as its cookie
//! store. When the session is torn down, the jar is emptied.
//!
//! # Why not `reqwest::cookie::Jar`?
//!
//! reqwest's built-in jar can store and replay cookies, but it offers no
//! way to remove them. Teardown has to be able to forget everything, so
//! this crate keeps its own (deliberately small) jar:
//!
//! - cookies are scoped per host (no domain/path matching: the client
//!   talks to one backend)
//! - `Max-Age=0` (or negative) deletes a cookie, as browsers do, and so
//!   does an `Expires` date in the past when there is no `Max-Age`
//! - the `HttpOnly` attribute is recorded but does not restrict access,
//!   because this client owns its jar outright

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use cookie::Cookie;
use cookie::time::OffsetDateTime;

use crate::SessionArtifacts;

/// A cookie as stored in the jar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    pub http_only: bool,
}

/// Thread-safe in-memory cookie jar, keyed by host.
///
/// Uses a `std::sync::Mutex` rather than Tokio's: reqwest calls the
/// cookie store synchronously, and no lock is ever held across an
/// `.await`.
#[derive(Debug, Default)]
pub struct SessionCookies {
    hosts: Mutex<HashMap<String, Vec<StoredCookie>>>,
}

impl SessionCookies {
    /// Creates an empty jar.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<StoredCookie>>> {
        // A panic while holding the lock can't leave the map half-updated
        // in a way that matters to us, so recover from poisoning.
        self.hosts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies one `Set-Cookie` header value received from `host`.
    ///
    /// Malformed values (no `name=value` pair) are ignored.
    pub fn store(&self, host: &str, set_cookie: &str) {
        let Some(parsed) = parse_set_cookie(set_cookie) else {
            tracing::debug!(host, "ignoring malformed Set-Cookie header");
            return;
        };

        let mut hosts = self.lock();
        let cookies = hosts.entry(host.to_string()).or_default();
        cookies.retain(|c| c.name != parsed.cookie.name);
        if !parsed.expired {
            cookies.push(parsed.cookie);
        }
        if cookies.is_empty() {
            hosts.remove(host);
        }
    }

    /// Returns the `Cookie` header value to send to `host`, if any.
    pub fn header_for(&self, host: &str) -> Option<String> {
        let hosts = self.lock();
        let cookies = hosts.get(host)?;
        if cookies.is_empty() {
            return None;
        }
        Some(
            cookies
                .iter()
                .map(|c| format!("{}={}", c.name, c.value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Looks up a single cookie.
    pub fn get(&self, host: &str, name: &str) -> Option<StoredCookie> {
        self.lock()
            .get(host)?
            .iter()
            .find(|c| c.name == name)
            .cloned()
    }

    /// Returns the total number of cookies across all hosts.
    pub fn len(&self) -> usize {
        self.lock().values().map(Vec::len).sum()
    }

    /// Returns `true` if the jar holds no cookies.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionArtifacts for SessionCookies {
    fn clear(&self) -> usize {
        let mut hosts = self.lock();
        let removed = hosts.values().map(Vec::len).sum();
        hosts.clear();
        removed
    }
}

#[cfg(feature = "reqwest")]
impl reqwest::cookie::CookieStore for SessionCookies {
    fn set_cookies(
        &self,
        cookie_headers: &mut dyn Iterator<Item = &reqwest::header::HeaderValue>,
        url: &reqwest::Url,
    ) {
        let Some(host) = url.host_str() else {
            return;
        };
        for header in cookie_headers {
            if let Ok(raw) = header.to_str() {
                self.store(host, raw);
            }
        }
    }

    fn cookies(&self, url: &reqwest::Url) -> Option<reqwest::header::HeaderValue> {
        let header = self.header_for(url.host_str()?)?;
        reqwest::header::HeaderValue::from_str(&header).ok()
    }
}

struct ParsedCookie {
    cookie: StoredCookie,
    expired: bool,
}

fn parse_set_cookie(raw: &str) -> Option<ParsedCookie> {
    let parsed = Cookie::parse(raw).ok()?;

    // Max-Age wins over Expires when both are present.
    let expired = match (parsed.max_age(), parsed.expires_datetime()) {
        (Some(max_age), _) => max_age.whole_seconds() <= 0,
        (None, Some(expires)) => expires <= OffsetDateTime::now_utc(),
        (None, None) => false,
    };

    Some(ParsedCookie {
        cookie: StoredCookie {
            name: parsed.name().to_string(),
            value: parsed.value_trimmed().to_string(),
            http_only: parsed.http_only().unwrap_or(false),
        },
        expired,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOST: &str = "api.market.test";

    #[test]
    fn test_store_and_header_for_single_cookie() {
        let jar = SessionCookies::new();

        jar.store(HOST, "refreshToken=r1; Path=/; HttpOnly; Secure");

        assert_eq!(jar.header_for(HOST).as_deref(), Some("refreshToken=r1"));
        let cookie = jar.get(HOST, "refreshToken").expect("cookie should be stored");
        assert!(cookie.http_only);
    }

    #[test]
    fn test_store_multiple_cookies_joined_in_header() {
        let jar = SessionCookies::new();
        jar.store(HOST, "refreshToken=r1; HttpOnly");
        jar.store(HOST, "theme=dark");

        assert_eq!(
            jar.header_for(HOST).as_deref(),
            Some("refreshToken=r1; theme=dark")
        );
        assert_eq!(jar.len(), 2);
    }

    #[test]
    fn test_store_same_name_replaces_value() {
        let jar = SessionCookies::new();
        jar.store(HOST, "refreshToken=r1; HttpOnly");
        jar.store(HOST, "refreshToken=r2; HttpOnly");

        assert_eq!(jar.len(), 1);
        assert_eq!(jar.get(HOST, "refreshToken").unwrap().value, "r2");
    }

    #[test]
    fn test_store_max_age_zero_deletes_cookie() {
        let jar = SessionCookies::new();
        jar.store(HOST, "refreshToken=r1; HttpOnly");

        jar.store(HOST, "refreshToken=; Max-Age=0; Path=/");

        assert!(jar.is_empty());
        assert!(jar.header_for(HOST).is_none());
    }

    #[test]
    fn test_store_past_expires_deletes_cookie() {
        let jar = SessionCookies::new();
        jar.store(HOST, "refreshToken=r1; HttpOnly");

        jar.store(HOST, "refreshToken=; Path=/; Expires=Thu, 01 Jan 1970 00:00:00 GMT");

        assert!(jar.is_empty());
        assert!(jar.header_for(HOST).is_none());
    }

    #[test]
    fn test_store_future_expires_keeps_cookie() {
        let jar = SessionCookies::new();

        jar.store(HOST, "refreshToken=r1; HttpOnly; Expires=Fri, 01 Jan 2100 00:00:00 GMT");

        assert_eq!(jar.header_for(HOST).as_deref(), Some("refreshToken=r1"));
    }

    #[test]
    fn test_store_positive_max_age_overrides_past_expires() {
        let jar = SessionCookies::new();

        jar.store(
            HOST,
            "refreshToken=r1; Max-Age=3600; Expires=Thu, 01 Jan 1970 00:00:00 GMT",
        );

        assert_eq!(jar.len(), 1);
    }

    #[test]
    fn test_store_negative_max_age_deletes_cookie() {
        let jar = SessionCookies::new();
        jar.store(HOST, "theme=dark");

        jar.store(HOST, "theme=; Max-Age=-1");

        assert!(jar.is_empty());
    }

    #[test]
    fn test_store_malformed_value_is_ignored() {
        let jar = SessionCookies::new();
        jar.store(HOST, "no-equals-sign");
        jar.store(HOST, "=orphan-value");

        assert!(jar.is_empty());
    }

    #[test]
    fn test_cookies_are_scoped_per_host() {
        let jar = SessionCookies::new();
        jar.store(HOST, "refreshToken=r1");

        assert!(jar.header_for("other.test").is_none());
    }

    #[test]
    fn test_clear_removes_http_only_cookies_too() {
        let jar = SessionCookies::new();
        jar.store(HOST, "refreshToken=r1; HttpOnly");
        jar.store(HOST, "theme=dark");
        jar.store("cdn.market.test", "edge=1");

        let removed = jar.clear();

        assert_eq!(removed, 3);
        assert!(jar.is_empty());
    }

    #[test]
    fn test_clear_on_empty_jar_returns_zero() {
        let jar = SessionCookies::new();
        assert_eq!(jar.clear(), 0);
        assert_eq!(jar.clear(), 0);
    }

    #[cfg(feature = "reqwest")]
    #[test]
    fn test_cookie_store_round_trip_through_reqwest_trait() {
        use reqwest::cookie::CookieStore;
        use reqwest::header::HeaderValue;

        let jar = SessionCookies::new();
        let url = reqwest::Url::parse("http://api.market.test/api/auth/login").unwrap();
        let set = HeaderValue::from_static("refreshToken=r1; HttpOnly; Path=/");

        jar.set_cookies(&mut std::iter::once(&set), &url);

        let token_url = reqwest::Url::parse("http://api.market.test/api/auth/token").unwrap();
        let header = jar.cookies(&token_url).expect("cookie should be replayed");
        assert_eq!(header.to_str().unwrap(), "refreshToken=r1");
    }
}
