//! Session cookie pair and the cookie store seam.
//!
//! The session manager never touches HTTP types directly; it reads and
//! writes through [`CookieStore`]. [`RequestCookies`] is the HTTP-backed
//! store: it parses the request's `Cookie` header, records every write as a
//! pending `Set-Cookie`, and emits them when returned from a handler (it
//! implements both [`FromRequestParts`] and [`IntoResponseParts`]).

use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;

use axum::extract::FromRequestParts;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponseParts, ResponseParts};

/// Name of the access token cookie.
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
/// Name of the refresh token cookie.
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";

/// Both session cookies live on the root path so every route (and the
/// guard middleware) can see them.
pub const SESSION_COOKIE_PATH: &str = "/";

const EPOCH_EXPIRES: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum CookieError {
    #[error("Cookie '{0}' has a value that cannot be sent in a header")]
    InvalidValue(String),

    #[error("Cookie store failure: {0}")]
    Store(String),
}

// ---------------------------------------------------------------------------
// Set-Cookie
// ---------------------------------------------------------------------------

/// Attributes shared by both session cookies. `SameSite=Strict` is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookiePolicy {
    /// Emit `Secure` (production only; browsers drop Secure cookies over
    /// plain-http localhost).
    pub secure: bool,
}

impl CookiePolicy {
    pub fn new(secure: bool) -> Self {
        Self { secure }
    }
}

/// A single outgoing cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    pub name: String,
    pub value: String,
    pub path: String,
    /// Lifetime in seconds; `0` deletes the cookie.
    pub max_age: i64,
    pub http_only: bool,
    pub secure: bool,
}

impl SetCookie {
    /// An HttpOnly session cookie on [`SESSION_COOKIE_PATH`].
    pub fn session(name: &str, value: &str, max_age: i64, policy: CookiePolicy) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            path: SESSION_COOKIE_PATH.to_string(),
            max_age,
            http_only: true,
            secure: policy.secure,
        }
    }

    /// The deletion form of a session cookie (empty value, `Max-Age=0`).
    pub fn removal(name: &str, policy: CookiePolicy) -> Self {
        Self::session(name, "", 0, policy)
    }

    pub fn is_removal(&self) -> bool {
        self.max_age <= 0
    }

    /// Render as a `Set-Cookie` header value.
    pub fn to_header_value(&self) -> Result<HeaderValue, CookieError> {
        if !is_valid_cookie_value(&self.value) {
            return Err(CookieError::InvalidValue(self.name.clone()));
        }
        HeaderValue::from_str(&self.to_string())
            .map_err(|_| CookieError::InvalidValue(self.name.clone()))
    }
}

impl fmt::Display for SetCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={}; Path={}; Max-Age={}",
            self.name,
            self.value,
            self.path,
            self.max_age.max(0)
        )?;
        if self.is_removal() {
            write!(f, "; Expires={EPOCH_EXPIRES}")?;
        }
        if self.http_only {
            f.write_str("; HttpOnly")?;
        }
        f.write_str("; SameSite=Strict")?;
        if self.secure {
            f.write_str("; Secure")?;
        }
        Ok(())
    }
}

/// RFC 6265 `cookie-octet`s only. JWTs and hex tokens always qualify.
fn is_valid_cookie_value(value: &str) -> bool {
    value
        .bytes()
        .all(|b| matches!(b, 0x21 | 0x23..=0x2B | 0x2D..=0x3A | 0x3C..=0x5B | 0x5D..=0x7E))
}

// ---------------------------------------------------------------------------
// Store seam
// ---------------------------------------------------------------------------

/// Read/write access to the cookies of the current request/response.
pub trait CookieStore {
    /// Current value of cookie `name`, including writes made earlier in the
    /// same request.
    fn get(&self, name: &str) -> Option<String>;

    /// Queue `cookie` for the response.
    fn set(&mut self, cookie: SetCookie) -> Result<(), CookieError>;

    /// Queue deletion of cookie `name`.
    fn remove(&mut self, name: &str, policy: CookiePolicy) -> Result<(), CookieError>;
}

/// HTTP-backed [`CookieStore`] for one request.
#[derive(Debug, Clone, Default)]
pub struct RequestCookies {
    current: HashMap<String, String>,
    pending: Vec<SetCookie>,
}

impl RequestCookies {
    /// Parse every `Cookie` header in `headers`.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut current = HashMap::new();
        for header in headers.get_all(COOKIE) {
            let Ok(raw) = header.to_str() else {
                continue;
            };
            for (name, value) in parse_cookie_header(raw) {
                // First occurrence wins, as browsers send the most specific path first.
                current.entry(name).or_insert(value);
            }
        }
        Self {
            current,
            pending: Vec::new(),
        }
    }

    /// Cookies queued for the response, in write order.
    pub fn pending(&self) -> &[SetCookie] {
        &self.pending
    }

    /// Append every pending cookie to `headers` as `Set-Cookie`.
    pub fn write_to(&self, headers: &mut HeaderMap) {
        for cookie in &self.pending {
            match cookie.to_header_value() {
                Ok(value) => {
                    headers.append(SET_COOKIE, value);
                }
                Err(e) => tracing::error!(error = %e, "Dropping unrenderable cookie"),
            }
        }
    }
}

impl CookieStore for RequestCookies {
    fn get(&self, name: &str) -> Option<String> {
        self.current.get(name).cloned()
    }

    fn set(&mut self, cookie: SetCookie) -> Result<(), CookieError> {
        if !is_valid_cookie_value(&cookie.value) {
            return Err(CookieError::InvalidValue(cookie.name));
        }
        if cookie.is_removal() {
            self.current.remove(&cookie.name);
        } else {
            self.current.insert(cookie.name.clone(), cookie.value.clone());
        }
        self.pending.retain(|c| c.name != cookie.name);
        self.pending.push(cookie);
        Ok(())
    }

    fn remove(&mut self, name: &str, policy: CookiePolicy) -> Result<(), CookieError> {
        self.set(SetCookie::removal(name, policy))
    }
}

impl<S> FromRequestParts<S> for RequestCookies
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

impl IntoResponseParts for RequestCookies {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        self.write_to(res.headers_mut());
        Ok(res)
    }
}

/// Split a `Cookie` request header into `(name, value)` pairs.
///
/// Malformed pairs (no `=`, empty name) are skipped; surrounding double
/// quotes on values are stripped.
pub fn parse_cookie_header(raw: &str) -> Vec<(String, String)> {
    raw.split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}
