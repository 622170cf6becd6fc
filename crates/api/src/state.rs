use std::sync::Arc;

use atelier_core::routes::RouteTable;

use crate::auth::cookies::CookiePolicy;
use crate::auth::denylist::InMemoryDenylist;
use crate::auth::jwt::TokenCodec;
use crate::auth::session::{SessionManager, SessionResolver};
use crate::config::ServerConfig;
use crate::notify::{LogNotifier, ResetNotifier, SmtpNotifier};
use crate::rate_limit::{InMemoryRateLimitStore, RateLimiter};
use crate::store::{
    InMemoryPasswordResetStore, InMemoryUserStore, PasswordResetStore, UserStore,
};

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (every field is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Cookie session lifecycle (token codec, cookie policy).
    pub sessions: Arc<SessionManager>,
    /// Session source of the route guard; `sessions` unless replaced.
    pub resolver: Arc<dyn SessionResolver>,
    /// Public / protected / admin classification used by the route guard.
    pub routes: Arc<RouteTable>,
    pub users: Arc<dyn UserStore>,
    pub reset_tokens: Arc<dyn PasswordResetStore>,
    /// Limits forgot-password requests per client IP.
    pub reset_limiter: Arc<RateLimiter>,
    pub notifier: Arc<dyn ResetNotifier>,
}

impl AppState {
    /// State backed entirely by process-local stores.
    ///
    /// Sessions carry a token denylist, and cookies are marked `Secure` in
    /// production. Reset links go out by SMTP when it is configured.
    pub fn in_memory(config: ServerConfig) -> Self {
        let codec = TokenCodec::new(config.jwt.clone())
            .with_denylist(Arc::new(InMemoryDenylist::new()));
        let sessions = Arc::new(SessionManager::new(
            Arc::new(codec),
            CookiePolicy::new(config.is_production()),
        ));
        let reset_limiter = RateLimiter::new(
            Arc::new(InMemoryRateLimitStore::new()),
            config.reset_rate_limit,
        );
        let notifier: Arc<dyn ResetNotifier> = match &config.smtp {
            Some(smtp) => Arc::new(SmtpNotifier::new(smtp.clone())),
            None => Arc::new(LogNotifier {
                include_link: !config.is_production(),
            }),
        };

        Self {
            config: Arc::new(config),
            resolver: sessions.clone(),
            sessions,
            routes: Arc::new(RouteTable::default()),
            users: Arc::new(InMemoryUserStore::new()),
            reset_tokens: Arc::new(InMemoryPasswordResetStore::new()),
            reset_limiter: Arc::new(reset_limiter),
            notifier,
        }
    }

    /// Replace the reset-link notifier.
    pub fn with_notifier(mut self, notifier: Arc<dyn ResetNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Replace the session source consulted by the route guard.
    pub fn with_session_resolver(mut self, resolver: Arc<dyn SessionResolver>) -> Self {
        self.resolver = resolver;
        self
    }
}
