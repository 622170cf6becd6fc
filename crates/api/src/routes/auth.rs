//! Route definitions for the `/auth` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{auth, password_reset};
use crate::state::AppState;

/// Routes mounted at `/api/auth`.
///
/// ```text
/// POST /register         -> register
/// POST /login            -> login
/// POST /logout           -> logout
/// GET  /me               -> me (guarded)
/// POST /refresh          -> refresh
/// POST /forgot-password  -> forgot_password
/// POST /reset-password   -> reset_password
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/refresh", post(auth::refresh))
        .route("/forgot-password", post(password_reset::forgot_password))
        .route("/reset-password", post(password_reset::reset_password))
}
