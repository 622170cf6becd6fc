#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tokio::sync::Mutex;
use tower::ServiceExt;

use atelier_api::auth::jwt::{JwtConfig, JwtPayload};
use atelier_api::config::{Environment, RateLimitConfig, ServerConfig};
use atelier_api::notify::ResetNotifier;
use atelier_api::router::build_app_router;
use atelier_api::state::AppState;
use atelier_core::error::CoreError;

pub const TEST_PASSWORD: &str = "croissant-123";

/// Build a test `ServerConfig` with safe defaults and fixed test secrets.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        environment: Environment::Test,
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:3000".to_string()],
        request_timeout_secs: 30,
        app_url: "http://localhost:3000".to_string(),
        reset_token_ttl_mins: 60,
        reset_rate_limit: RateLimitConfig {
            max_requests: 3,
            window_secs: 900,
        },
        jwt: JwtConfig {
            access_secret: "integration-access-secret".to_string(),
            refresh_secret: "integration-refresh-secret".to_string(),
            access_token_expiry_days: 7,
            refresh_token_expiry_days: 30,
            rotation_grace_secs: 30,
        },
        smtp: None,
    }
}

/// Notifier that keeps every reset link it is asked to send.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub async fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().await.clone()
    }

    /// The `token` query parameter of the most recent link.
    pub async fn last_token(&self) -> Option<String> {
        let sent = self.sent.lock().await;
        let (_, url) = sent.last()?;
        url.split_once("token=").map(|(_, token)| token.to_string())
    }
}

#[async_trait]
impl ResetNotifier for RecordingNotifier {
    async fn send_reset_link(&self, email: &str, reset_url: &str) -> Result<(), CoreError> {
        self.sent
            .lock()
            .await
            .push((email.to_string(), reset_url.to_string()));
        Ok(())
    }
}

/// The full application plus handles into its state.
pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub notifier: Arc<RecordingNotifier>,
}

/// Build the full application router (same middleware stack as `main.rs`)
/// over in-memory stores.
pub fn build_test_app() -> TestApp {
    build_test_app_with(test_config(), |state| state)
}

/// Like [`build_test_app`], with `config` and a final pass over the state.
pub fn build_test_app_with(
    config: ServerConfig,
    customize: impl FnOnce(AppState) -> AppState,
) -> TestApp {
    let notifier = Arc::new(RecordingNotifier::default());
    let state = customize(AppState::in_memory(config).with_notifier(notifier.clone()));
    let app = build_app_router(state.clone());
    TestApp {
        app,
        state,
        notifier,
    }
}

impl TestApp {
    /// A `Cookie` header holding a freshly signed session for `payload`.
    pub fn session_cookies(&self, payload: &JwtPayload) -> String {
        let codec = self.state.sessions.codec();
        let access = codec.sign_access_token(payload).unwrap();
        let refresh = codec.sign_refresh_token(payload).unwrap();
        format!("access_token={access}; refresh_token={refresh}")
    }
}

/// [`test_config`] with rotated refresh tokens revoked immediately.
pub fn no_grace_config() -> ServerConfig {
    let mut config = test_config();
    config.jwt.rotation_grace_secs = 0;
    config
}

pub fn payload(user_id: &str, role: &str) -> JwtPayload {
    JwtPayload {
        user_id: user_id.to_string(),
        email: format!("{user_id}@atelier.test"),
        role: role.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    get_with_cookies(app, uri, None).await
}

pub async fn get_with_cookies(app: &Router, uri: &str, cookies: Option<&str>) -> Response<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookies) = cookies {
        builder = builder.header(COOKIE, cookies);
    }
    send(app, builder.body(Body::empty()).unwrap()).await
}

pub async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    post_json_with_cookies(app, uri, body, None).await
}

pub async fn post_json_with_cookies(
    app: &Router,
    uri: &str,
    body: serde_json::Value,
    cookies: Option<&str>,
) -> Response<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/json");
    if let Some(cookies) = cookies {
        builder = builder.header(COOKIE, cookies);
    }
    send(app, builder.body(Body::from(body.to_string())).unwrap()).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

// ---------------------------------------------------------------------------
// Cookie helpers
// ---------------------------------------------------------------------------

/// Every `Set-Cookie` header of `response`.
pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

/// The `Set-Cookie` header for cookie `name`, if any.
pub fn set_cookie_for(response: &Response<Body>, name: &str) -> Option<String> {
    set_cookies(response)
        .into_iter()
        .find(|c| c.starts_with(&format!("{name}=")))
}

/// Turn the non-empty `Set-Cookie` values of `response` into a `Cookie`
/// request header, as a browser would.
pub fn cookie_header(response: &Response<Body>) -> String {
    set_cookies(response)
        .iter()
        .filter_map(|c| c.split(';').next())
        .filter(|pair| pair.split_once('=').is_some_and(|(_, v)| !v.is_empty()))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Register `email` through the API and return the session `Cookie` header.
pub async fn register(app: &Router, email: &str) -> String {
    let response = post_json(
        app,
        "/api/auth/register",
        serde_json::json!({
            "email": email,
            "password": TEST_PASSWORD,
            "name": "Test Baker",
        }),
    )
    .await;
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);
    cookie_header(&response)
}
