//! Access and refresh token signing/verification.
//!
//! Both token classes are HS256-signed JWTs carrying the same
//! [`JwtPayload`] plus `iat`, `exp`, and a unique `jti`. They are signed with
//! *different* secrets, so a refresh token can never pass access-token
//! verification (and vice versa).
//!
//! [`decode_token`] and [`is_token_expired`] read the claims segment without
//! checking the signature. They exist for diagnostics and housekeeping and
//! must never feed an authorization decision.

use std::sync::Arc;

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::denylist::TokenDenylist;
use crate::config::ConfigError;

/// Default access token lifetime in days.
pub const DEFAULT_ACCESS_EXPIRY_DAYS: i64 = 7;
/// Default refresh token lifetime in days.
pub const DEFAULT_REFRESH_EXPIRY_DAYS: i64 = 30;
/// Default time a rotated refresh token remains usable, in seconds.
pub const DEFAULT_ROTATION_GRACE_SECS: i64 = 30;

/// Local-development signing secrets. Refused in production.
const DEV_ACCESS_SECRET: &str = "atelier-dev-access-secret-change-me";
const DEV_REFRESH_SECRET: &str = "atelier-dev-refresh-secret-change-me";

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Clock skew tolerated by `jsonwebtoken`'s default validation.
const VALIDATION_LEEWAY_SECS: i64 = 60;

// ---------------------------------------------------------------------------
// Claims
// ---------------------------------------------------------------------------

/// Identity embedded in every access and refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JwtPayload {
    pub user_id: String,
    pub email: String,
    pub role: String,
}

/// Full claim set of a verified token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(flatten)]
    pub payload: JwtPayload,
    /// Issued-at time (UTC Unix timestamp).
    pub iat: i64,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
    /// Unique token identifier, used for revocation.
    pub jti: String,
}

/// Claims read without verification. Every field is optional because the
/// token may be forged or truncated.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UnverifiedClaims {
    user_id: Option<String>,
    email: Option<String>,
    role: Option<String>,
    pub(crate) exp: Option<i64>,
    pub(crate) jti: Option<String>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),

    #[error("Invalid token: {0}")]
    Invalid(#[source] jsonwebtoken::errors::Error),

    #[error("Token has been revoked")]
    Revoked,
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Signing secrets and lifetimes for both token classes.
#[derive(Clone)]
pub struct JwtConfig {
    /// HMAC-SHA256 secret for access tokens.
    pub access_secret: String,
    /// HMAC-SHA256 secret for refresh tokens. Must differ from `access_secret`.
    pub refresh_secret: String,
    /// Access token lifetime in days (default: 7).
    pub access_token_expiry_days: i64,
    /// Refresh token lifetime in days (default: 30).
    pub refresh_token_expiry_days: i64,
    /// Seconds a rotated refresh token is still accepted (default: 30).
    pub rotation_grace_secs: i64,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("access_secret", &"<redacted>")
            .field("refresh_secret", &"<redacted>")
            .field("access_token_expiry_days", &self.access_token_expiry_days)
            .field("refresh_token_expiry_days", &self.refresh_token_expiry_days)
            .field("rotation_grace_secs", &self.rotation_grace_secs)
            .finish()
    }
}

impl JwtConfig {
    /// Load JWT configuration through `lookup` (normally `std::env::var`).
    ///
    /// | Env Var                   | Required        | Default |
    /// |---------------------------|-----------------|---------|
    /// | `JWT_ACCESS_SECRET`       | in production   | dev key |
    /// | `JWT_REFRESH_SECRET`      | in production   | dev key |
    /// | `JWT_ACCESS_EXPIRY_DAYS`  | no              | `7`     |
    /// | `JWT_REFRESH_EXPIRY_DAYS` | no              | `30`    |
    /// | `JWT_ROTATION_GRACE_SECS` | no              | `30`    |
    ///
    /// In production both secrets must be set, non-empty, and distinct.
    /// Outside production a missing secret falls back to a development
    /// constant with a warning.
    pub fn from_lookup<F>(production: bool, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let access_secret = secret_or_fallback(
            &lookup,
            production,
            "JWT_ACCESS_SECRET",
            DEV_ACCESS_SECRET,
        )?;
        let refresh_secret = secret_or_fallback(
            &lookup,
            production,
            "JWT_REFRESH_SECRET",
            DEV_REFRESH_SECRET,
        )?;

        if access_secret == refresh_secret {
            return Err(ConfigError::InsecureSecrets(
                "JWT_ACCESS_SECRET and JWT_REFRESH_SECRET must differ".into(),
            ));
        }

        let access_token_expiry_days = crate::config::parse_or(
            &lookup,
            "JWT_ACCESS_EXPIRY_DAYS",
            DEFAULT_ACCESS_EXPIRY_DAYS,
        )?;
        let refresh_token_expiry_days = crate::config::parse_or(
            &lookup,
            "JWT_REFRESH_EXPIRY_DAYS",
            DEFAULT_REFRESH_EXPIRY_DAYS,
        )?;
        let rotation_grace_secs = crate::config::parse_or(
            &lookup,
            "JWT_ROTATION_GRACE_SECS",
            DEFAULT_ROTATION_GRACE_SECS,
        )?;

        Ok(Self {
            access_secret,
            refresh_secret,
            access_token_expiry_days,
            refresh_token_expiry_days,
            rotation_grace_secs,
        })
    }

    /// Access token lifetime in seconds.
    pub fn access_max_age_secs(&self) -> i64 {
        self.access_token_expiry_days * SECONDS_PER_DAY
    }

    /// Refresh token lifetime in seconds.
    pub fn refresh_max_age_secs(&self) -> i64 {
        self.refresh_token_expiry_days * SECONDS_PER_DAY
    }
}

fn secret_or_fallback<F>(
    lookup: &F,
    production: bool,
    key: &'static str,
    fallback: &str,
) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(secret) => Ok(secret),
        None if production => Err(ConfigError::Missing(key)),
        None => {
            tracing::warn!(key, "Signing secret not set, using development fallback");
            Ok(fallback.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Access,
    Refresh,
}

/// Signs and verifies access and refresh tokens.
pub struct TokenCodec {
    config: JwtConfig,
    denylist: Option<Arc<dyn TokenDenylist>>,
}

impl TokenCodec {
    pub fn new(config: JwtConfig) -> Self {
        Self {
            config,
            denylist: None,
        }
    }

    /// Consult `denylist` on every verification.
    pub fn with_denylist(mut self, denylist: Arc<dyn TokenDenylist>) -> Self {
        self.denylist = Some(denylist);
        self
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    /// Sign an access token valid for `access_token_expiry_days`.
    pub fn sign_access_token(&self, payload: &JwtPayload) -> Result<String, TokenError> {
        self.sign(TokenKind::Access, payload)
    }

    /// Sign a refresh token valid for `refresh_token_expiry_days`.
    pub fn sign_refresh_token(&self, payload: &JwtPayload) -> Result<String, TokenError> {
        self.sign(TokenKind::Refresh, payload)
    }

    /// Verify signature, expiry, and revocation of an access token.
    pub async fn verify_access_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify(TokenKind::Access, token).await
    }

    /// Verify signature, expiry, and revocation of a refresh token.
    pub async fn verify_refresh_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify(TokenKind::Refresh, token).await
    }

    /// Add `token`'s `jti` to the denylist until its expiry, effective now.
    ///
    /// Works on unverified claims: revoking a forged id is harmless. A no-op
    /// without a denylist or when the token carries no `jti`/`exp`.
    pub async fn revoke(&self, token: &str) {
        self.revoke_from(token, chrono::Utc::now().timestamp()).await;
    }

    /// Revoke a refresh token that has just been rotated. It keeps verifying
    /// for `rotation_grace_secs`, so parallel requests carrying the old
    /// cookie refresh too.
    pub async fn retire(&self, token: &str) {
        let effective_at = chrono::Utc::now().timestamp() + self.config.rotation_grace_secs.max(0);
        self.revoke_from(token, effective_at).await;
    }

    async fn revoke_from(&self, token: &str, effective_at: i64) {
        let Some(denylist) = &self.denylist else {
            return;
        };
        if let Some(UnverifiedClaims {
            jti: Some(jti),
            exp: Some(exp),
            ..
        }) = decode_unverified(token)
        {
            // Keep the entry while verification would still accept the token.
            denylist
                .revoke(&jti, effective_at, exp + VALIDATION_LEEWAY_SECS)
                .await;
        }
    }

    fn secret(&self, kind: TokenKind) -> &[u8] {
        match kind {
            TokenKind::Access => self.config.access_secret.as_bytes(),
            TokenKind::Refresh => self.config.refresh_secret.as_bytes(),
        }
    }

    fn sign(&self, kind: TokenKind, payload: &JwtPayload) -> Result<String, TokenError> {
        let now = chrono::Utc::now().timestamp();
        let lifetime = match kind {
            TokenKind::Access => self.config.access_max_age_secs(),
            TokenKind::Refresh => self.config.refresh_max_age_secs(),
        };

        let claims = Claims {
            payload: payload.clone(),
            iat: now,
            exp: now + lifetime,
            jti: Uuid::new_v4().to_string(),
        };

        encode(
            &Header::default(), // HS256
            &claims,
            &EncodingKey::from_secret(self.secret(kind)),
        )
        .map_err(TokenError::Signing)
    }

    async fn verify(&self, kind: TokenKind, token: &str) -> Result<Claims, TokenError> {
        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret(kind)),
            &Validation::new(Algorithm::HS256), // validates exp
        )
        .map_err(TokenError::Invalid)?
        .claims;

        if let Some(denylist) = &self.denylist {
            if denylist.is_revoked(&claims.jti).await {
                return Err(TokenError::Revoked);
            }
        }

        Ok(claims)
    }
}

// ---------------------------------------------------------------------------
// Unverified inspection
// ---------------------------------------------------------------------------

pub(crate) fn decode_unverified(token: &str) -> Option<UnverifiedClaims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<UnverifiedClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .ok()
        .map(|data| data.claims)
}

/// Read the payload of `token` without verifying its signature or expiry.
///
/// Returns `None` when the token is malformed or lacks identity claims.
pub fn decode_token(token: &str) -> Option<JwtPayload> {
    let claims = decode_unverified(token)?;
    Some(JwtPayload {
        user_id: claims.user_id?,
        email: claims.email?,
        role: claims.role?,
    })
}

/// `true` when `token` cannot be decoded, has no `exp`, or `exp` has passed.
pub fn is_token_expired(token: &str) -> bool {
    match decode_unverified(token).and_then(|c| c.exp) {
        Some(exp) => exp <= chrono::Utc::now().timestamp(),
        None => true,
    }
}
