//! Token revocation list keyed by JWT id (`jti`).
//!
//! Signed tokens are otherwise valid until they expire. Logging out or
//! rotating a refresh token records the token's `jti` here, and every
//! verification consults the list. Entries are only kept until the token
//! would have expired anyway.
//!
//! A revocation may take effect later than the moment it is recorded. A
//! rotated refresh token stays usable for a short grace period so that
//! requests the browser already had in flight with the old cookie still
//! refresh instead of logging the user out.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

/// Storage for revoked token ids.
///
/// The in-memory implementation is process-local; multi-instance
/// deployments plug in a shared store behind the same trait.
#[async_trait]
pub trait TokenDenylist: Send + Sync {
    /// Revoke `jti` from `effective_at` until `expires_at` (UTC Unix
    /// timestamps). Revoking an id twice keeps the earlier `effective_at`.
    async fn revoke(&self, jti: &str, effective_at: i64, expires_at: i64);

    /// Whether `jti` is revoked right now.
    async fn is_revoked(&self, jti: &str) -> bool;
}

#[derive(Debug, Clone, Copy)]
struct Revocation {
    effective_at: i64,
    expires_at: i64,
}

impl Revocation {
    fn applies_at(&self, now: i64) -> bool {
        self.effective_at <= now && now < self.expires_at
    }
}

/// Process-local [`TokenDenylist`].
#[derive(Debug, Default)]
pub struct InMemoryDenylist {
    entries: RwLock<HashMap<String, Revocation>>,
}

impl InMemoryDenylist {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenDenylist for InMemoryDenylist {
    async fn revoke(&self, jti: &str, effective_at: i64, expires_at: i64) {
        let now = chrono::Utc::now().timestamp();
        let mut entries = self.entries.write().await;
        entries.retain(|_, r| r.expires_at > now);
        if expires_at <= now {
            return;
        }

        entries
            .entry(jti.to_string())
            .and_modify(|r| {
                r.effective_at = r.effective_at.min(effective_at);
                r.expires_at = r.expires_at.max(expires_at);
            })
            .or_insert(Revocation {
                effective_at,
                expires_at,
            });
    }

    async fn is_revoked(&self, jti: &str) -> bool {
        let now = chrono::Utc::now().timestamp();
        self.entries
            .read()
            .await
            .get(jti)
            .is_some_and(|r| r.applies_at(now))
    }
}
