//! Handlers for the forgot-password / reset-password flow.
//!
//! A reset request never reveals whether the email belongs to an account:
//! the response is the same either way, and the link only reaches the
//! account's own inbox through the [`ResetNotifier`](crate::notify::ResetNotifier).

use atelier_core::error::CoreError;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::cookies::RequestCookies;
use crate::auth::password::{
    generate_secure_token, validate_password_strength, DEFAULT_TOKEN_BYTES, MIN_PASSWORD_LENGTH,
};
use crate::error::{AppError, AppResult};
use crate::handlers::auth::hash_in_background;
use crate::state::AppState;
use crate::store::reset_tokens::{hash_reset_token, PasswordResetToken};

/// Response to every accepted forgot-password request.
pub const RESET_REQUESTED_MESSAGE: &str =
    "If an account exists for that email, a password reset link has been sent.";

const INVALID_RESET_TOKEN: &str = "Invalid or expired reset token";

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// POST /api/auth/forgot-password
pub async fn forgot_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<ForgotPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    let ip = client_ip(&headers);
    state
        .reset_limiter
        .check(&ip)
        .await
        .map_err(|e| AppError::Core(CoreError::RateLimited(e.to_string())))?;

    let Some(user) = state.users.find_by_email(&input.email).await? else {
        tracing::debug!("Password reset requested for unknown email");
        return Ok(Json(MessageResponse {
            message: RESET_REQUESTED_MESSAGE,
        }));
    };

    let token = generate_secure_token(DEFAULT_TOKEN_BYTES);
    state
        .reset_tokens
        .create(PasswordResetToken {
            user_id: user.id.clone(),
            token_hash: hash_reset_token(&token),
            expires_at: Utc::now() + Duration::minutes(state.config.reset_token_ttl_mins),
            used_at: None,
        })
        .await?;

    let reset_url = format!("{}/reset-password?token={token}", state.config.app_url);
    if let Err(e) = state.notifier.send_reset_link(&user.email, &reset_url).await {
        tracing::error!(user_id = %user.id, error = %e, "Failed to send password reset link");
    } else {
        tracing::info!(user_id = %user.id, "Password reset link sent");
    }

    Ok(Json(MessageResponse {
        message: RESET_REQUESTED_MESSAGE,
    }))
}

/// POST /api/auth/reset-password
///
/// Consumes the token, sets the new password and signs the caller out.
pub async fn reset_password(
    State(state): State<AppState>,
    mut cookies: RequestCookies,
    Json(input): Json<ResetPasswordRequest>,
) -> AppResult<(RequestCookies, Json<MessageResponse>)> {
    validate_password_strength(&input.password, MIN_PASSWORD_LENGTH)
        .map_err(|msg| AppError::Core(CoreError::Validation(msg)))?;

    let token_hash = hash_reset_token(input.token.trim());
    let token = state
        .reset_tokens
        .consume(&token_hash, Utc::now())
        .await?
        .ok_or_else(|| AppError::BadRequest(INVALID_RESET_TOKEN.into()))?;

    let password_hash = hash_in_background(input.password).await?;
    state
        .users
        .update_password_hash(&token.user_id, password_hash)
        .await
        .map_err(|e| match e {
            CoreError::NotFound { .. } => AppError::BadRequest(INVALID_RESET_TOKEN.into()),
            other => AppError::Core(other),
        })?;

    state.sessions.destroy_session(&mut cookies).await;
    tracing::info!(user_id = %token.user_id, "Password reset");

    Ok((
        cookies,
        Json(MessageResponse {
            message: "Password has been reset. Please sign in with your new password.",
        }),
    ))
}

/// Client address used as the rate-limit key: the first `x-forwarded-for`
/// entry, then `x-real-ip`, else `"unknown"`.
pub fn client_ip(headers: &HeaderMap) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    header("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| header("x-real-ip"))
        .unwrap_or("unknown")
        .to_string()
}
