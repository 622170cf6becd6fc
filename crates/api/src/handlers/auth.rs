//! Handlers for the `/api/auth` resource (register, login, logout, me, refresh).

use atelier_core::error::CoreError;
use atelier_core::roles::DEFAULT_ROLE;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::cookies::RequestCookies;
use crate::auth::jwt::JwtPayload;
use crate::auth::password::{
    hash_password, validate_password_strength, verify_password_or_decoy, MIN_PASSWORD_LENGTH,
};
use crate::error::{AppError, AppResult};
use crate::middleware::session::CurrentSession;
use crate::state::AppState;
use crate::store::users::{CreateUser, User};

/// Message for every credential failure, whatever its cause.
const INVALID_CREDENTIALS: &str = "Invalid email or password";

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /api/auth/register`.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: String,
}

/// Request body for `POST /api/auth/login`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Public user info returned by register and login.
#[derive(Debug, Serialize)]
pub struct UserInfo {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: String,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role.clone(),
        }
    }
}

/// Identity carried by the session tokens.
#[derive(Debug, Serialize)]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse<T> {
    pub user: T,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/auth/register
///
/// Create a student account and sign it in.
pub async fn register(
    State(state): State<AppState>,
    mut cookies: RequestCookies,
    Json(input): Json<RegisterRequest>,
) -> AppResult<(StatusCode, RequestCookies, Json<UserResponse<UserInfo>>)> {
    if !is_plausible_email(&input.email) {
        return Err(AppError::Core(CoreError::Validation(
            "A valid email address is required".into(),
        )));
    }
    validate_password_strength(&input.password, MIN_PASSWORD_LENGTH)
        .map_err(|msg| AppError::Core(CoreError::Validation(msg)))?;

    let password_hash = hash_in_background(input.password).await?;
    let user = state
        .users
        .create(CreateUser {
            email: input.email,
            name: input.name.trim().to_string(),
            password_hash,
            role: DEFAULT_ROLE.to_string(),
        })
        .await?;

    state
        .sessions
        .create_session(&mut cookies, &payload_for(&user))?;
    tracing::info!(user_id = %user.id, "User registered");

    Ok((
        StatusCode::CREATED,
        cookies,
        Json(UserResponse {
            user: UserInfo::from(&user),
        }),
    ))
}

/// POST /api/auth/login
///
/// Authenticate with email + password and start a cookie session.
pub async fn login(
    State(state): State<AppState>,
    mut cookies: RequestCookies,
    Json(input): Json<LoginRequest>,
) -> AppResult<(RequestCookies, Json<UserResponse<UserInfo>>)> {
    let user = state.users.find_by_email(&input.email).await?;
    let stored_hash = user.as_ref().map(|u| u.password_hash.clone());

    // Unknown emails pay for a bcrypt verification too.
    let verified = verify_in_background(input.password, stored_hash).await?;
    let user = match user {
        Some(user) if verified => user,
        Some(user) => {
            tracing::debug!(user_id = %user.id, "Login rejected: wrong password");
            return Err(invalid_credentials());
        }
        None => {
            tracing::debug!("Login rejected: unknown email");
            return Err(invalid_credentials());
        }
    };

    state
        .sessions
        .create_session(&mut cookies, &payload_for(&user))?;
    tracing::info!(user_id = %user.id, "User logged in");

    Ok((
        cookies,
        Json(UserResponse {
            user: UserInfo::from(&user),
        }),
    ))
}

/// POST /api/auth/logout
///
/// Always succeeds, with or without a session.
pub async fn logout(
    State(state): State<AppState>,
    mut cookies: RequestCookies,
) -> (RequestCookies, Json<SuccessResponse>) {
    state.sessions.destroy_session(&mut cookies).await;
    (cookies, Json(SuccessResponse { success: true }))
}

/// GET /api/auth/me
pub async fn me(CurrentSession(session): CurrentSession) -> Json<UserResponse<SessionUser>> {
    Json(UserResponse {
        user: SessionUser {
            id: session.user_id,
            email: session.email,
            role: session.role,
        },
    })
}

/// POST /api/auth/refresh
///
/// Rotate the token pair from the refresh cookie. A rejected refresh token
/// clears both cookies on the 401 response.
pub async fn refresh(State(state): State<AppState>, mut cookies: RequestCookies) -> Response {
    let result = state
        .sessions
        .refresh_session(&mut cookies)
        .await
        .map(|session| {
            Json(UserResponse {
                user: SessionUser {
                    id: session.user_id,
                    email: session.email,
                    role: session.role,
                },
            })
        })
        .map_err(AppError::from);

    (cookies, result).into_response()
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn invalid_credentials() -> AppError {
    AppError::Core(CoreError::Unauthorized(INVALID_CREDENTIALS.into()))
}

fn payload_for(user: &User) -> JwtPayload {
    JwtPayload {
        user_id: user.id.clone(),
        email: user.email.clone(),
        role: user.role.clone(),
    }
}

/// Minimal shape check: `local@domain.tld`, no whitespace.
fn is_plausible_email(email: &str) -> bool {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
        }
        None => false,
    }
}

/// Run bcrypt off the async runtime.
pub(crate) async fn hash_in_background(password: String) -> AppResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AppError::InternalError(format!("Hashing task failed: {e}")))?
        .map_err(|e| AppError::InternalError(format!("Password hashing failed: {e}")))
}

async fn verify_in_background(password: String, hash: Option<String>) -> AppResult<bool> {
    tokio::task::spawn_blocking(move || verify_password_or_decoy(&password, hash.as_deref()))
        .await
        .map_err(|e| AppError::InternalError(format!("Verification task failed: {e}")))
}
