//! Request path classification for the route guard.
//!
//! Every inbound path is classified as [`RouteClass::Admin`],
//! [`RouteClass::Protected`], [`RouteClass::Public`], or left unclassified.
//! Pattern lists are consulted in that order, so an admin pattern always
//! wins over an overlapping protected or public one.
//!
//! Patterns use two shapes:
//!
//! - exact: `/login` matches only `/login` (a trailing slash is ignored).
//! - prefix wildcard: `/dashboard/:path*` matches `/dashboard` and anything
//!   below it (`/dashboard/profile/settings`), but not `/dashboards`.

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Suffix that turns a pattern into a prefix wildcard.
const WILDCARD_SUFFIX: &str = "/:path*";

/// Path prefixes that never go through the guard.
const BYPASS_PREFIXES: &[&str] = &["/_next/", "/static/"];

/// Exact paths that never go through the guard.
const BYPASS_PATHS: &[&str] = &["/favicon.ico", "/robots.txt"];

/// File extensions served as static assets.
const STATIC_EXTENSIONS: &[&str] = &[
    "css", "js", "map", "png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "woff", "woff2",
    "ttf",
];

/// Prefix shared by all JSON API routes.
pub const API_PREFIX: &str = "/api/";

const ADMIN_ROUTES: &[&str] = &["/admin/:path*", "/api/admin/:path*"];

const PROTECTED_ROUTES: &[&str] = &[
    "/dashboard/:path*",
    "/profile/:path*",
    "/my-courses/:path*",
    "/checkout/:path*",
    "/api/auth/me",
    "/api/orders/:path*",
    "/api/user/:path*",
    "/api/reviews/:path*",
];

const PUBLIC_ROUTES: &[&str] = &[
    "/",
    "/about",
    "/contact",
    "/courses/:path*",
    "/login",
    "/register",
    "/forgot-password",
    "/reset-password",
    "/403",
    "/health",
    "/api/auth/:path*",
    "/api/courses/:path*",
];

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Access level required by a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Public,
    Protected,
    Admin,
}

/// A single route pattern, either exact or a `/base/:path*` prefix wildcard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutePattern {
    Exact(String),
    Prefix(String),
}

impl RoutePattern {
    /// Parse a pattern string.
    ///
    /// Only literal paths and a trailing `/:path*` are supported; any other
    /// dynamic segment is rejected.
    pub fn parse(pattern: &str) -> Result<Self, CoreError> {
        if !pattern.starts_with('/') {
            return Err(CoreError::Validation(format!(
                "Route pattern '{pattern}' must start with '/'"
            )));
        }

        if let Some(base) = pattern.strip_suffix(WILDCARD_SUFFIX) {
            if base.contains(':') {
                return Err(CoreError::Validation(format!(
                    "Route pattern '{pattern}' has an unsupported dynamic segment"
                )));
            }
            return Ok(Self::Prefix(normalize(base).to_string()));
        }

        if pattern.contains(':') {
            return Err(CoreError::Validation(format!(
                "Route pattern '{pattern}' has an unsupported dynamic segment"
            )));
        }

        Ok(Self::Exact(normalize(pattern).to_string()))
    }

    /// Whether `path` (already stripped of its query) matches this pattern.
    pub fn matches(&self, path: &str) -> bool {
        let path = normalize(path);
        match self {
            Self::Exact(exact) => path == exact,
            Self::Prefix(base) => {
                // `/:path*` directly under the root matches everything.
                if base == "/" {
                    return true;
                }
                path == base
                    || path
                        .strip_prefix(base.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            }
        }
    }
}

/// Ordered pattern lists used by [`RouteTable::classify`].
#[derive(Debug, Clone)]
pub struct RouteTable {
    admin: Vec<RoutePattern>,
    protected: Vec<RoutePattern>,
    public: Vec<RoutePattern>,
}

impl RouteTable {
    /// Build a table from pattern strings, rejecting malformed patterns.
    pub fn new(admin: &[&str], protected: &[&str], public: &[&str]) -> Result<Self, CoreError> {
        Ok(Self {
            admin: parse_all(admin)?,
            protected: parse_all(protected)?,
            public: parse_all(public)?,
        })
    }

    /// Classify a request path. Returns `None` for paths no list mentions.
    pub fn classify(&self, path: &str) -> Option<RouteClass> {
        let path = strip_query(path);
        let lists = [
            (RouteClass::Admin, &self.admin),
            (RouteClass::Protected, &self.protected),
            (RouteClass::Public, &self.public),
        ];

        lists
            .into_iter()
            .find(|(_, patterns)| patterns.iter().any(|p| p.matches(path)))
            .map(|(class, _)| class)
    }
}

impl Default for RouteTable {
    /// The route table of the atelier site.
    fn default() -> Self {
        Self::new(ADMIN_ROUTES, PROTECTED_ROUTES, PUBLIC_ROUTES)
            .unwrap_or_else(|e| unreachable!("built-in route table is malformed: {e}"))
    }
}

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

/// Whether the guard must skip `path` entirely (framework internals,
/// static assets, favicon).
pub fn is_bypassed(path: &str) -> bool {
    let path = strip_query(path);

    if BYPASS_PATHS.contains(&path) || BYPASS_PREFIXES.iter().any(|p| path.starts_with(p)) {
        return true;
    }

    let last_segment = path.rsplit('/').next().unwrap_or_default();
    last_segment
        .rsplit_once('.')
        .is_some_and(|(stem, ext)| {
            !stem.is_empty() && STATIC_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
        })
}

/// Whether `path` belongs to the JSON API (and so gets JSON errors instead
/// of redirects).
pub fn is_api_path(path: &str) -> bool {
    let path = strip_query(path);
    path == "/api" || path.starts_with(API_PREFIX)
}

fn parse_all(patterns: &[&str]) -> Result<Vec<RoutePattern>, CoreError> {
    patterns.iter().map(|p| RoutePattern::parse(p)).collect()
}

fn strip_query(path: &str) -> &str {
    path.split_once('?').map_or(path, |(p, _)| p)
}

fn normalize(path: &str) -> &str {
    if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    }
}
