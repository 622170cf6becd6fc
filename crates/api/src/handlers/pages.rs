//! Server-rendered pages owned by the API itself.

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};

const FORBIDDEN_PAGE: &str = r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>403 - Access denied</title></head>
<body>
<h1>Access denied</h1>
<p>You do not have permission to view this page.</p>
<p><a href="/">Back to the atelier</a></p>
</body>
</html>
"#;

/// The forbidden page with status 403. Also served by the route guard in
/// place of admin pages a non-admin session asked for.
pub fn forbidden_response() -> Response {
    (StatusCode::FORBIDDEN, Html(FORBIDDEN_PAGE)).into_response()
}

/// GET /403
pub async fn forbidden() -> Response {
    forbidden_response()
}
