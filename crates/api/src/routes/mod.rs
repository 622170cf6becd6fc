pub mod auth;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /auth/register             POST  create account + session
/// /auth/login                POST  start session
/// /auth/logout               POST  end session
/// /auth/me                   GET   current user (protected)
/// /auth/refresh              POST  rotate token pair
/// /auth/forgot-password      POST  request reset link (rate limited)
/// /auth/reset-password       POST  consume reset token
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/auth", auth::router())
}

/// Routes served outside `/api`.
///
/// ```text
/// /health   GET  liveness
/// /403      GET  forbidden page (also the guard's rewrite target)
/// ```
pub fn root_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/403", get(handlers::pages::forbidden))
}
