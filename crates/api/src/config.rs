use std::str::FromStr;

use crate::auth::jwt::JwtConfig;
use crate::notify::SmtpConfig;

/// Default forgot-password requests allowed per client per window.
const DEFAULT_RESET_RATE_LIMIT_MAX: u32 = 3;
/// Default forgot-password rate limit window (15 minutes).
const DEFAULT_RESET_RATE_LIMIT_WINDOW_SECS: u64 = 15 * 60;
/// Default lifetime of a password reset token.
const DEFAULT_RESET_TOKEN_TTL_MINS: i64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set in production")]
    Missing(&'static str),

    #[error("{key} has an invalid value '{value}'")]
    Invalid { key: &'static str, value: String },

    #[error("Insecure configuration: {0}")]
    InsecureSecrets(String),
}

/// Deployment environment, from `APP_ENV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl FromStr for Environment {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "test" => Ok(Self::Test),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(()),
        }
    }
}

/// Fixed-window limit applied to the forgot-password endpoint.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_secs: u64,
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development. Production
/// refuses to start without real signing secrets.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub environment: Environment,
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Public base URL, used to build password reset links.
    pub app_url: String,
    /// Password reset token lifetime in minutes (default: `60`).
    pub reset_token_ttl_mins: i64,
    pub reset_rate_limit: RateLimitConfig,
    /// JWT token configuration (secrets, expiry durations).
    pub jwt: JwtConfig,
    /// Mail transport for reset links; `None` when `SMTP_HOST` is unset.
    pub smtp: Option<SmtpConfig>,
}

impl ServerConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, with defaults.
    ///
    /// | Env Var                         | Default                 |
    /// |---------------------------------|-------------------------|
    /// | `APP_ENV`                       | `development`           |
    /// | `HOST`                          | `0.0.0.0`               |
    /// | `PORT`                          | `3000`                  |
    /// | `CORS_ORIGINS`                  | `http://localhost:3000` |
    /// | `REQUEST_TIMEOUT_SECS`          | `30`                    |
    /// | `APP_URL`                       | `http://localhost:3000` |
    /// | `RESET_TOKEN_TTL_MINS`          | `60`                    |
    /// | `RESET_RATE_LIMIT_MAX`          | `3`                     |
    /// | `RESET_RATE_LIMIT_WINDOW_SECS`  | `900`                   |
    ///
    /// JWT variables are documented on [`JwtConfig::from_lookup`], SMTP
    /// variables on [`SmtpConfig::from_lookup`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup("APP_ENV") {
            Some(raw) => raw.parse::<Environment>().map_err(|_| ConfigError::Invalid {
                key: "APP_ENV",
                value: raw.clone(),
            })?,
            None => Environment::Development,
        };

        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = parse_or(&lookup, "PORT", 3000u16)?;

        let cors_origins: Vec<String> = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:3000".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs = parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 30u64)?;
        let app_url = lookup("APP_URL")
            .unwrap_or_else(|| "http://localhost:3000".into())
            .trim_end_matches('/')
            .to_string();
        let reset_token_ttl_mins =
            parse_or(&lookup, "RESET_TOKEN_TTL_MINS", DEFAULT_RESET_TOKEN_TTL_MINS)?;

        let reset_rate_limit = RateLimitConfig {
            max_requests: parse_or(&lookup, "RESET_RATE_LIMIT_MAX", DEFAULT_RESET_RATE_LIMIT_MAX)?,
            window_secs: parse_or(
                &lookup,
                "RESET_RATE_LIMIT_WINDOW_SECS",
                DEFAULT_RESET_RATE_LIMIT_WINDOW_SECS,
            )?,
        };

        let jwt = JwtConfig::from_lookup(environment == Environment::Production, &lookup)?;
        let smtp = SmtpConfig::from_lookup(&lookup)?;

        Ok(Self {
            environment,
            host,
            port,
            cors_origins,
            request_timeout_secs,
            app_url,
            reset_token_ttl_mins,
            reset_rate_limit,
            jwt,
            smtp,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

/// Parse `key` through `lookup`, falling back to `default` when unset.
pub(crate) fn parse_or<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            key,
            value: raw.clone(),
        }),
        None => Ok(default),
    }
}
