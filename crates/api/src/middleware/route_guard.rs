//! Path-based access control in front of every route.
//!
//! For each request the guard:
//!
//! 1. skips framework internals and static assets entirely;
//! 2. classifies the path with the [`RouteTable`](atelier_core::routes::RouteTable);
//!    unclassified and public paths pass through untouched;
//! 3. resolves the cookie session (refreshing it transparently when needed)
//!    and either denies the request or passes it on with the
//!    [`SessionData`] in the request extensions.
//!
//! Denials are a JSON 401/403 on `/api/*` paths and a login redirect or the
//! forbidden page elsewhere. A failed session lookup is logged and treated
//! as "no session": the guard never turns an internal error into a 500.

use atelier_core::routes::{is_api_path, is_bypassed, RouteClass};
use axum::extract::{OriginalUri, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use serde_json::json;

use crate::auth::cookies::RequestCookies;
use crate::auth::session::SessionData;
use crate::handlers::pages::forbidden_response;
use crate::state::AppState;

/// Login page that unauthenticated page requests are sent to.
pub const LOGIN_PATH: &str = "/login";

/// What the guard does with a classified request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    /// Let the request through.
    Continue,
    /// No usable session on a protected or admin route.
    Unauthenticated,
    /// A non-admin session on an admin route.
    Forbidden,
}

/// Decide the fate of a request from its route class and session alone.
pub fn decide(class: Option<RouteClass>, session: Option<&SessionData>) -> GuardOutcome {
    match (class, session) {
        (None | Some(RouteClass::Public), _) => GuardOutcome::Continue,
        (Some(_), None) => GuardOutcome::Unauthenticated,
        (Some(RouteClass::Admin), Some(session)) if !session.is_admin() => GuardOutcome::Forbidden,
        (Some(_), Some(_)) => GuardOutcome::Continue,
    }
}

/// `/login?from=<percent-encoded path and query>`.
pub fn login_redirect_target(path_and_query: &str) -> String {
    format!("{LOGIN_PATH}?from={}", urlencoding::encode(path_and_query))
}

/// Axum middleware enforcing the route table. Install with
/// `axum::middleware::from_fn_with_state`.
pub async fn route_guard(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    // Nested routers strip their prefix; classify the URI as the client sent it.
    let uri = request
        .extensions()
        .get::<OriginalUri>()
        .map(|original| original.0.clone())
        .unwrap_or_else(|| request.uri().clone());
    let path = uri.path().to_string();
    if is_bypassed(&path) {
        return next.run(request).await;
    }

    let class = state.routes.classify(&path);
    if decide(class, None) == GuardOutcome::Continue {
        return next.run(request).await;
    }

    let mut cookies = RequestCookies::from_headers(request.headers());
    let session = match state.resolver.resolve(&mut cookies).await {
        Ok(lookup) => lookup.session,
        Err(e) => {
            tracing::error!(path = %path, error = %e, "Session lookup failed, denying request");
            // Pending cookies may be half-written; send none of them.
            cookies = RequestCookies::default();
            None
        }
    };

    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| path.clone());

    let mut response = match decide(class, session.as_ref()) {
        GuardOutcome::Continue => {
            if let Some(session) = session {
                request.extensions_mut().insert(session);
            }
            next.run(request).await
        }
        GuardOutcome::Unauthenticated => {
            tracing::debug!(path = %path, "Unauthenticated request to guarded route");
            unauthenticated_response(&path, &path_and_query)
        }
        GuardOutcome::Forbidden => {
            tracing::debug!(path = %path, "Non-admin session on admin route");
            forbidden(&path)
        }
    };

    cookies.write_to(response.headers_mut());
    response
}

fn unauthenticated_response(path: &str, path_and_query: &str) -> Response {
    if is_api_path(path) {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "error": "Unauthorized",
                "message": "Authentication required",
            })),
        )
            .into_response()
    } else {
        Redirect::temporary(&login_redirect_target(path_and_query)).into_response()
    }
}

fn forbidden(path: &str) -> Response {
    if is_api_path(path) {
        (
            StatusCode::FORBIDDEN,
            Json(json!({
                "error": "Forbidden",
                "message": "Admin access required",
            })),
        )
            .into_response()
    } else {
        // Rewrite: the forbidden page is served under the requested URL.
        forbidden_response()
    }
}
