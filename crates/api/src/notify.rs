//! Delivery of password reset links.
//!
//! [`SmtpNotifier`] mails the link through the `lettre` async SMTP
//! transport when `SMTP_HOST` is configured; otherwise [`LogNotifier`]
//! only records that a link was issued.

use async_trait::async_trait;
use atelier_core::error::CoreError;

/// Default SMTP port (STARTTLS).
const DEFAULT_SMTP_PORT: u16 = 587;

/// Default sender address when `SMTP_FROM` is not set.
const DEFAULT_FROM_ADDRESS: &str = "noreply@atelier.local";

const RESET_SUBJECT: &str = "Reset your atelier password";

/// Sends a password reset link to a user.
#[async_trait]
pub trait ResetNotifier: Send + Sync {
    async fn send_reset_link(&self, email: &str, reset_url: &str) -> Result<(), CoreError>;
}

// ---------------------------------------------------------------------------
// Logging notifier
// ---------------------------------------------------------------------------

/// Notifier that only logs.
///
/// The link itself is logged only when `include_link` is set, which must
/// never be the case in production.
#[derive(Debug, Clone, Copy)]
pub struct LogNotifier {
    pub include_link: bool,
}

#[async_trait]
impl ResetNotifier for LogNotifier {
    async fn send_reset_link(&self, email: &str, reset_url: &str) -> Result<(), CoreError> {
        if self.include_link {
            tracing::debug!(email, reset_url, "Password reset link issued");
        } else {
            tracing::info!(email, "Password reset link issued (no mail transport configured)");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SMTP notifier
// ---------------------------------------------------------------------------

/// SMTP settings for [`SmtpNotifier`].
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    /// SMTP port (defaults to 587).
    pub port: u16,
    /// RFC 5322 "From" address.
    pub from_address: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("from_address", &self.from_address)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl SmtpConfig {
    /// Load SMTP settings through `lookup`.
    ///
    /// Returns `Ok(None)` when `SMTP_HOST` is unset: mail delivery is simply
    /// not configured.
    ///
    /// | Variable        | Required | Default                 |
    /// |-----------------|----------|-------------------------|
    /// | `SMTP_HOST`     | yes      |                         |
    /// | `SMTP_PORT`     | no       | `587`                   |
    /// | `SMTP_FROM`     | no       | `noreply@atelier.local` |
    /// | `SMTP_USER`     | no       |                         |
    /// | `SMTP_PASSWORD` | no       |                         |
    pub fn from_lookup<F>(lookup: &F) -> Result<Option<Self>, crate::config::ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(host) = lookup("SMTP_HOST").filter(|h| !h.trim().is_empty()) else {
            return Ok(None);
        };

        Ok(Some(Self {
            host,
            port: crate::config::parse_or(lookup, "SMTP_PORT", DEFAULT_SMTP_PORT)?,
            from_address: lookup("SMTP_FROM").unwrap_or_else(|| DEFAULT_FROM_ADDRESS.to_string()),
            user: lookup("SMTP_USER"),
            password: lookup("SMTP_PASSWORD"),
        }))
    }
}

/// Mails reset links over SMTP (STARTTLS).
pub struct SmtpNotifier {
    config: SmtpConfig,
}

impl SmtpNotifier {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    fn build_message(&self, email: &str, reset_url: &str) -> Result<lettre::Message, CoreError> {
        use lettre::message::header::ContentType;

        let body = format!(
            "Someone asked to reset the password of your atelier account.\n\n\
             Open this link within the hour to choose a new password:\n{reset_url}\n\n\
             If this wasn't you, ignore this email; your password stays unchanged."
        );

        lettre::Message::builder()
            .from(self.config.from_address.parse().map_err(|e| {
                CoreError::Internal(format!("Invalid sender address: {e}"))
            })?)
            .to(email
                .parse()
                .map_err(|e| CoreError::Internal(format!("Invalid recipient address: {e}")))?)
            .subject(RESET_SUBJECT)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| CoreError::Internal(format!("Email build error: {e}")))
    }
}

#[async_trait]
impl ResetNotifier for SmtpNotifier {
    async fn send_reset_link(&self, email: &str, reset_url: &str) -> Result<(), CoreError> {
        use lettre::transport::smtp::authentication::Credentials;
        use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};

        let message = self.build_message(email, reset_url)?;

        let mut transport_builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)
                .map_err(|e| CoreError::Internal(format!("SMTP transport error: {e}")))?
                .port(self.config.port);

        if let (Some(user), Some(pass)) = (&self.config.user, &self.config.password) {
            transport_builder =
                transport_builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        transport_builder
            .build()
            .send(message)
            .await
            .map_err(|e| CoreError::Internal(format!("SMTP transport error: {e}")))?;

        tracing::info!(to = email, "Password reset email sent");
        Ok(())
    }
}
