//! Session extractor for handlers behind [`route_guard`](super::route_guard).

use atelier_core::error::CoreError;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::auth::session::SessionData;
use crate::error::AppError;

/// The session resolved by the route guard for the current request.
///
/// Only present on protected and admin routes; extracting it anywhere else
/// rejects with 401.
///
/// ```ignore
/// async fn my_handler(CurrentSession(session): CurrentSession) -> AppResult<Json<()>> {
///     tracing::info!(user_id = %session.user_id, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentSession(pub SessionData);

impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionData>()
            .cloned()
            .map(CurrentSession)
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized("Authentication required".into()))
            })
    }
}
