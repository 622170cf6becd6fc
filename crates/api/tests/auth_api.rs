//! HTTP-level integration tests for the `/api/auth` endpoints.
//!
//! Tests cover registration, login, session introspection, refresh,
//! logout, and the forgot/reset password flow including its rate limit.

mod common;

use axum::http::StatusCode;
use common::{
    body_json, build_test_app, build_test_app_with, cookie_header, get_with_cookies,
    no_grace_config, post_json, post_json_with_cookies, register, set_cookie_for, TEST_PASSWORD,
};
use serde_json::json;

// ---------------------------------------------------------------------------
// Register
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_register_creates_student_and_session() {
    let t = build_test_app();
    let response = post_json(
        &t.app,
        "/api/auth/register",
        json!({ "email": "New.Baker@Example.com", "password": TEST_PASSWORD, "name": "New Baker" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let access = set_cookie_for(&response, "access_token").expect("access cookie");
    let refresh = set_cookie_for(&response, "refresh_token").expect("refresh cookie");
    assert!(access.contains("Max-Age=604800"));
    assert!(refresh.contains("Max-Age=2592000"));
    for cookie in [&access, &refresh] {
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("Path=/"));
        assert!(!cookie.contains("Secure"), "Secure only in production");
    }

    let json = body_json(response).await;
    assert_eq!(json["user"]["email"], "new.baker@example.com");
    assert_eq!(json["user"]["name"], "New Baker");
    assert_eq!(json["user"]["role"], "STUDENT");
    assert!(json["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn test_register_duplicate_email_conflicts() {
    let t = build_test_app();
    register(&t.app, "baker@example.com").await;

    let response = post_json(
        &t.app,
        "/api/auth/register",
        json!({ "email": "BAKER@example.com", "password": TEST_PASSWORD }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "CONFLICT");
}

#[tokio::test]
async fn test_register_validates_input() {
    let t = build_test_app();

    let bad_email = post_json(
        &t.app,
        "/api/auth/register",
        json!({ "email": "not-an-email", "password": TEST_PASSWORD }),
    )
    .await;
    assert_eq!(bad_email.status(), StatusCode::BAD_REQUEST);

    let short_password = post_json(
        &t.app,
        "/api/auth/register",
        json!({ "email": "baker@example.com", "password": "short" }),
    )
    .await;
    assert_eq!(short_password.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(short_password).await["code"], "VALIDATION_ERROR");
}

// ---------------------------------------------------------------------------
// Login
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_login_success_sets_session() {
    let t = build_test_app();
    register(&t.app, "baker@example.com").await;

    let response = post_json(
        &t.app,
        "/api/auth/login",
        json!({ "email": "baker@example.com", "password": TEST_PASSWORD }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let cookies = cookie_header(&response);
    assert!(cookies.contains("access_token="));
    assert!(cookies.contains("refresh_token="));

    let me = get_with_cookies(&t.app, "/api/auth/me", Some(&cookies)).await;
    assert_eq!(me.status(), StatusCode::OK);
    let json = body_json(me).await;
    assert_eq!(json["user"]["email"], "baker@example.com");
    assert_eq!(json["user"]["role"], "STUDENT");
}

#[tokio::test]
async fn test_login_failures_share_one_message() {
    let t = build_test_app();
    register(&t.app, "baker@example.com").await;

    let wrong_password = post_json(
        &t.app,
        "/api/auth/login",
        json!({ "email": "baker@example.com", "password": "wrong-password" }),
    )
    .await;
    let unknown_user = post_json(
        &t.app,
        "/api/auth/login",
        json!({ "email": "nobody@example.com", "password": TEST_PASSWORD }),
    )
    .await;

    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_user.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookie_for(&wrong_password, "access_token").is_none());

    let a = body_json(wrong_password).await;
    let b = body_json(unknown_user).await;
    assert_eq!(a, b);
    assert_eq!(a["error"], "Invalid email or password");
}

// ---------------------------------------------------------------------------
// Refresh / logout
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_refresh_rotates_tokens() {
    let t = build_test_app_with(no_grace_config(), |state| state);
    let cookies = register(&t.app, "baker@example.com").await;

    let response =
        post_json_with_cookies(&t.app, "/api/auth/refresh", json!({}), Some(&cookies)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let rotated = cookie_header(&response);
    assert_ne!(rotated, cookies);
    assert_eq!(body_json(response).await["user"]["email"], "baker@example.com");

    // The consumed refresh token is revoked once its grace period is over.
    let replay =
        post_json_with_cookies(&t.app, "/api/auth/refresh", json!({}), Some(&cookies)).await;
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_replay_within_grace_period_succeeds() {
    let t = build_test_app();
    let cookies = register(&t.app, "baker@example.com").await;

    let first =
        post_json_with_cookies(&t.app, "/api/auth/refresh", json!({}), Some(&cookies)).await;
    let second =
        post_json_with_cookies(&t.app, "/api/auth/refresh", json!({}), Some(&cookies)).await;

    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(second.status(), StatusCode::OK);
    let refresh = set_cookie_for(&second, "refresh_token").expect("rotated refresh cookie");
    assert!(!refresh.contains("Max-Age=0"));
}

#[tokio::test]
async fn test_refresh_without_cookie_is_unauthorized() {
    let t = build_test_app();
    let response = post_json(&t.app, "/api/auth/refresh", json!({})).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "No refresh token found");
}

#[tokio::test]
async fn test_refresh_with_invalid_cookie_clears_session() {
    let t = build_test_app();
    let response = post_json_with_cookies(
        &t.app,
        "/api/auth/refresh",
        json!({}),
        Some("refresh_token=tampered"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let cleared = set_cookie_for(&response, "access_token").expect("access cookie cleared");
    assert!(cleared.contains("Max-Age=0"));
}

#[tokio::test]
async fn test_logout_clears_and_revokes_session() {
    let t = build_test_app();
    let cookies = register(&t.app, "baker@example.com").await;

    let response =
        post_json_with_cookies(&t.app, "/api/auth/logout", json!({}), Some(&cookies)).await;

    assert_eq!(response.status(), StatusCode::OK);
    for name in ["access_token", "refresh_token"] {
        let cleared = set_cookie_for(&response, name).expect("cookie cleared");
        assert!(cleared.starts_with(&format!("{name}=;")));
        assert!(cleared.contains("Max-Age=0"));
    }
    assert_eq!(body_json(response).await, json!({ "success": true }));

    // Copied cookies no longer authenticate.
    let me = get_with_cookies(&t.app, "/api/auth/me", Some(&cookies)).await;
    assert_eq!(me.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_without_session_still_succeeds() {
    let t = build_test_app();
    let response = post_json(&t.app, "/api/auth/logout", json!({})).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["success"], true);
}

// ---------------------------------------------------------------------------
// Password reset
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_forgot_password_response_does_not_reveal_accounts() {
    let t = build_test_app();
    register(&t.app, "baker@example.com").await;

    let known = post_json(
        &t.app,
        "/api/auth/forgot-password",
        json!({ "email": "baker@example.com" }),
    )
    .await;
    let unknown = post_json(
        &t.app,
        "/api/auth/forgot-password",
        json!({ "email": "nobody@example.com" }),
    )
    .await;

    assert_eq!(known.status(), StatusCode::OK);
    assert_eq!(unknown.status(), StatusCode::OK);
    assert_eq!(body_json(known).await, body_json(unknown).await);

    let sent = t.notifier.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "baker@example.com");
    assert!(sent[0].1.starts_with("http://localhost:3000/reset-password?token="));

    let token = t.notifier.last_token().await.unwrap();
    assert_eq!(token.len(), 64);
    assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
}

#[tokio::test]
async fn test_forgot_password_is_rate_limited_per_ip() {
    let t = build_test_app();
    let request = |ip: &'static str| {
        axum::http::Request::builder()
            .method("POST")
            .uri("/api/auth/forgot-password")
            .header("content-type", "application/json")
            .header("x-forwarded-for", ip)
            .body(axum::body::Body::from(
                json!({ "email": "nobody@example.com" }).to_string(),
            ))
            .unwrap()
    };

    for _ in 0..3 {
        let response = common::send(&t.app, request("203.0.113.7")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let limited = common::send(&t.app, request("203.0.113.7")).await;
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body_json(limited).await["code"], "RATE_LIMITED");

    let other_client = common::send(&t.app, request("198.51.100.2")).await;
    assert_eq!(other_client.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_reset_password_flow() {
    let t = build_test_app();
    let old_cookies = register(&t.app, "baker@example.com").await;
    post_json(
        &t.app,
        "/api/auth/forgot-password",
        json!({ "email": "baker@example.com" }),
    )
    .await;
    let token = t.notifier.last_token().await.expect("reset link sent");

    let response = post_json_with_cookies(
        &t.app,
        "/api/auth/reset-password",
        json!({ "token": token, "password": "new-sourdough-pw" }),
        Some(&old_cookies),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let cleared = set_cookie_for(&response, "access_token").expect("session cleared");
    assert!(cleared.contains("Max-Age=0"));

    // Old password no longer works, the new one does.
    let old_login = post_json(
        &t.app,
        "/api/auth/login",
        json!({ "email": "baker@example.com", "password": TEST_PASSWORD }),
    )
    .await;
    assert_eq!(old_login.status(), StatusCode::UNAUTHORIZED);

    let new_login = post_json(
        &t.app,
        "/api/auth/login",
        json!({ "email": "baker@example.com", "password": "new-sourdough-pw" }),
    )
    .await;
    assert_eq!(new_login.status(), StatusCode::OK);

    // One-time use.
    let reuse = post_json(
        &t.app,
        "/api/auth/reset-password",
        json!({ "token": token, "password": "another-password" }),
    )
    .await;
    assert_eq!(reuse.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(reuse).await["error"],
        "Invalid or expired reset token"
    );
}

#[tokio::test]
async fn test_reset_password_rejects_unknown_token() {
    let t = build_test_app();
    let response = post_json(
        &t.app,
        "/api/auth/reset-password",
        json!({ "token": "deadbeef", "password": "long-enough-pw" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["error"],
        "Invalid or expired reset token"
    );
}
