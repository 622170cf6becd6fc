//! One-time password reset tokens.
//!
//! The plaintext token is mailed to the user; only its SHA-256 hex digest is
//! stored, so a leaked store cannot be used to reset passwords.

use std::collections::HashMap;

use async_trait::async_trait;
use atelier_core::error::CoreError;
use atelier_core::types::{Timestamp, UserId};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

/// A stored reset token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordResetToken {
    pub user_id: UserId,
    /// SHA-256 hex digest of the plaintext token.
    pub token_hash: String,
    pub expires_at: Timestamp,
    pub used_at: Option<Timestamp>,
}

impl PasswordResetToken {
    /// Unused and not yet expired at `now`.
    pub fn is_usable(&self, now: Timestamp) -> bool {
        self.used_at.is_none() && self.expires_at > now
    }
}

#[async_trait]
pub trait PasswordResetStore: Send + Sync {
    /// Store `token`, invalidating any earlier outstanding token of the same user.
    async fn create(&self, token: PasswordResetToken) -> Result<(), CoreError>;

    /// Atomically mark the token with `token_hash` as used and return it,
    /// provided it is still usable at `now`. Returns `None` otherwise.
    async fn consume(
        &self,
        token_hash: &str,
        now: Timestamp,
    ) -> Result<Option<PasswordResetToken>, CoreError>;
}

/// Compute the SHA-256 hex digest of a reset token.
pub fn hash_reset_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Process-local [`PasswordResetStore`].
#[derive(Debug, Default)]
pub struct InMemoryPasswordResetStore {
    tokens: RwLock<HashMap<String, PasswordResetToken>>,
}

impl InMemoryPasswordResetStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PasswordResetStore for InMemoryPasswordResetStore {
    async fn create(&self, token: PasswordResetToken) -> Result<(), CoreError> {
        let now = chrono::Utc::now();
        let mut tokens = self.tokens.write().await;

        tokens.retain(|_, t| t.user_id != token.user_id && t.is_usable(now));
        tokens.insert(token.token_hash.clone(), token);
        Ok(())
    }

    async fn consume(
        &self,
        token_hash: &str,
        now: Timestamp,
    ) -> Result<Option<PasswordResetToken>, CoreError> {
        let mut tokens = self.tokens.write().await;
        match tokens.get_mut(token_hash) {
            Some(token) if token.is_usable(now) => {
                token.used_at = Some(now);
                Ok(Some(token.clone()))
            }
            _ => Ok(None),
        }
    }
}
