//! Cookie-backed, stateless sessions.
//!
//! A session is nothing more than the signed token pair held in the
//! `access_token` / `refresh_token` cookies. Per request the manager moves
//! through these states:
//!
//! ```text
//! NoSession            no access_token cookie
//! Valid                access token verifies
//! ExpiredRefreshable   access token rejected, refresh token verifies:
//!                      both tokens are reissued and the session continues
//! Invalid              access and refresh tokens both rejected
//! ```
//!
//! Without a denylist, logging out only clears the client's cookies: a copied
//! access token keeps working until it expires.

use std::sync::Arc;

use async_trait::async_trait;

use crate::auth::cookies::{
    CookieError, CookiePolicy, CookieStore, RequestCookies, SetCookie, ACCESS_TOKEN_COOKIE,
    REFRESH_TOKEN_COOKIE,
};
use crate::auth::jwt::{decode_token, JwtPayload, TokenCodec, TokenError};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The authenticated identity plus the raw tokens backing it.
///
/// Built fresh on every lookup; never persisted server-side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionData {
    pub user_id: String,
    pub email: String,
    pub role: String,
    pub access_token: String,
    /// Empty when no matching refresh cookie accompanied the request.
    pub refresh_token: String,
}

impl SessionData {
    fn from_payload(payload: JwtPayload, access_token: String, refresh_token: String) -> Self {
        Self {
            user_id: payload.user_id,
            email: payload.email,
            role: payload.role,
            access_token,
            refresh_token,
        }
    }

    pub fn payload(&self) -> JwtPayload {
        JwtPayload {
            user_id: self.user_id.clone(),
            email: self.email.clone(),
            role: self.role.clone(),
        }
    }

    pub fn is_admin(&self) -> bool {
        atelier_core::roles::is_admin(&self.role)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NoSession,
    Valid,
    ExpiredRefreshable,
    Invalid,
}

/// Result of resolving the session for one request.
#[derive(Debug, Clone)]
pub struct SessionLookup {
    pub state: SessionState,
    pub session: Option<SessionData>,
}

impl SessionLookup {
    fn without_session(state: SessionState) -> Self {
        Self {
            state,
            session: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("No refresh token found")]
    NoRefreshToken,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Cookie(#[from] CookieError),
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// Issues, resolves, refreshes, and destroys cookie sessions.
pub struct SessionManager {
    codec: Arc<TokenCodec>,
    policy: CookiePolicy,
}

impl SessionManager {
    pub fn new(codec: Arc<TokenCodec>, policy: CookiePolicy) -> Self {
        Self { codec, policy }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Sign a fresh token pair for `payload` and write both cookies.
    pub fn create_session<S>(
        &self,
        cookies: &mut S,
        payload: &JwtPayload,
    ) -> Result<SessionData, SessionError>
    where
        S: CookieStore + ?Sized,
    {
        let access_token = self.codec.sign_access_token(payload)?;
        let refresh_token = self.codec.sign_refresh_token(payload)?;
        let config = self.codec.config();

        cookies.set(SetCookie::session(
            ACCESS_TOKEN_COOKIE,
            &access_token,
            config.access_max_age_secs(),
            self.policy,
        ))?;
        cookies.set(SetCookie::session(
            REFRESH_TOKEN_COOKIE,
            &refresh_token,
            config.refresh_max_age_secs(),
            self.policy,
        ))?;

        Ok(SessionData::from_payload(
            payload.clone(),
            access_token,
            refresh_token,
        ))
    }

    /// Resolve the current session, refreshing transparently when the
    /// access token is no longer valid.
    ///
    /// Token problems never surface as errors: they end in
    /// [`SessionState::NoSession`] or [`SessionState::Invalid`]. Only
    /// failures of the cookie store or of token signing are returned as `Err`.
    pub async fn lookup<S>(&self, cookies: &mut S) -> Result<SessionLookup, SessionError>
    where
        S: CookieStore + Send + ?Sized,
    {
        let Some(access_token) = non_empty_cookie(cookies, ACCESS_TOKEN_COOKIE) else {
            return Ok(SessionLookup::without_session(SessionState::NoSession));
        };

        match self.codec.verify_access_token(&access_token).await {
            Ok(claims) => {
                let refresh_token = matching_refresh_token(cookies, &claims.payload.user_id);
                return Ok(SessionLookup {
                    state: SessionState::Valid,
                    session: Some(SessionData::from_payload(
                        claims.payload,
                        access_token,
                        refresh_token,
                    )),
                });
            }
            Err(e) => tracing::debug!(error = %e, "Access token rejected, attempting refresh"),
        }

        match self.refresh_session(cookies).await {
            Ok(session) => Ok(SessionLookup {
                state: SessionState::ExpiredRefreshable,
                session: Some(session),
            }),
            Err(SessionError::NoRefreshToken | SessionError::InvalidRefreshToken) => {
                Ok(SessionLookup::without_session(SessionState::Invalid))
            }
            Err(e) => Err(e),
        }
    }

    /// The current session, or `None` when there is none, it is invalid, or
    /// it could not be refreshed. Lookup failures are logged.
    pub async fn get_session<S>(&self, cookies: &mut S) -> Option<SessionData>
    where
        S: CookieStore + Send + ?Sized,
    {
        match self.lookup(cookies).await {
            Ok(lookup) => lookup.session,
            Err(e) => {
                tracing::error!(error = %e, "Session lookup failed");
                None
            }
        }
    }

    /// Mint a new token pair from the refresh cookie.
    ///
    /// The refresh token is always rotated. The consumed token is retired:
    /// it keeps working for the configured grace period so concurrent
    /// requests holding it still refresh, then it is revoked. An invalid
    /// refresh token clears both cookies before failing.
    pub async fn refresh_session<S>(&self, cookies: &mut S) -> Result<SessionData, SessionError>
    where
        S: CookieStore + Send + ?Sized,
    {
        let refresh_token =
            non_empty_cookie(cookies, REFRESH_TOKEN_COOKIE).ok_or(SessionError::NoRefreshToken)?;

        let claims = match self.codec.verify_refresh_token(&refresh_token).await {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(error = %e, "Refresh token rejected, clearing session cookies");
                self.clear_cookies(cookies);
                return Err(SessionError::InvalidRefreshToken);
            }
        };

        let session = self.create_session(cookies, &claims.payload)?;
        self.codec.retire(&refresh_token).await;

        tracing::debug!(user_id = %session.user_id, "Session refreshed");
        Ok(session)
    }

    /// Revoke and delete both cookies. Never fails; problems are logged.
    pub async fn destroy_session<S>(&self, cookies: &mut S)
    where
        S: CookieStore + Send + ?Sized,
    {
        for name in [ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE] {
            if let Some(token) = non_empty_cookie(cookies, name) {
                self.codec.revoke(&token).await;
            }
        }
        self.clear_cookies(cookies);
    }

    fn clear_cookies<S>(&self, cookies: &mut S)
    where
        S: CookieStore + ?Sized,
    {
        for name in [ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE] {
            if let Err(e) = cookies.remove(name, self.policy) {
                tracing::warn!(cookie = name, error = %e, "Failed to clear session cookie");
            }
        }
    }
}

/// Resolves the session of one request for the route guard.
#[async_trait]
pub trait SessionResolver: Send + Sync {
    async fn resolve(&self, cookies: &mut RequestCookies) -> Result<SessionLookup, SessionError>;
}

#[async_trait]
impl SessionResolver for SessionManager {
    async fn resolve(&self, cookies: &mut RequestCookies) -> Result<SessionLookup, SessionError> {
        self.lookup(cookies).await
    }
}

fn non_empty_cookie<S>(cookies: &S, name: &str) -> Option<String>
where
    S: CookieStore + ?Sized,
{
    cookies.get(name).filter(|v| !v.is_empty())
}

/// The refresh cookie, if it belongs to `user_id`. A refresh token issued to
/// someone else is not reported as part of this session.
fn matching_refresh_token<S>(cookies: &S, user_id: &str) -> String
where
    S: CookieStore + ?Sized,
{
    let Some(refresh_token) = non_empty_cookie(cookies, REFRESH_TOKEN_COOKIE) else {
        return String::new();
    };

    match decode_token(&refresh_token) {
        Some(payload) if payload.user_id == user_id => refresh_token,
        _ => {
            tracing::warn!(user_id, "Refresh cookie does not belong to the session user");
            String::new()
        }
    }
}
