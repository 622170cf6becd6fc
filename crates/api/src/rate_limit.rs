//! Fixed-window request limiting behind an injectable store.
//!
//! [`RateLimiter`] owns the policy (requests per window); the counters live
//! in a [`RateLimitStore`]. The in-memory store is process-local and resets
//! on restart. Horizontally scaled deployments provide a shared store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::config::RateLimitConfig;

/// Counter state of one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitEntry {
    /// Requests seen in the current window, including the latest one.
    pub count: u32,
    /// When the current window ends.
    pub reset_at: Instant,
}

/// Counter storage used by [`RateLimiter`].
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Count one request for `key`, opening a new `window` if the previous
    /// one has ended, and return the updated entry.
    async fn hit(&self, key: &str, window: Duration) -> RateLimitEntry;

    /// Forget all counters.
    async fn clear(&self);
}

/// Process-local [`RateLimitStore`].
#[derive(Debug, Default)]
pub struct InMemoryRateLimitStore {
    entries: RwLock<HashMap<String, RateLimitEntry>>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn hit(&self, key: &str, window: Duration) -> RateLimitEntry {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.reset_at > now);

        let entry = entries
            .entry(key.to_string())
            .and_modify(|entry| entry.count += 1)
            .or_insert(RateLimitEntry {
                count: 1,
                reset_at: now + window,
            });
        *entry
    }

    async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

/// Rejection returned once a key exceeds its allowance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Too many requests, retry in {} seconds", .retry_after.as_secs())]
pub struct RateLimited {
    pub retry_after: Duration,
}

/// Allows `max_requests` per key per window.
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, config: RateLimitConfig) -> Self {
        Self {
            store,
            max_requests: config.max_requests,
            window: Duration::from_secs(config.window_secs),
        }
    }

    /// Record a request for `key`; `Err` once the window's allowance is spent.
    pub async fn check(&self, key: &str) -> Result<(), RateLimited> {
        let entry = self.store.hit(key, self.window).await;
        if entry.count > self.max_requests {
            let retry_after = entry.reset_at.saturating_duration_since(Instant::now());
            tracing::warn!(key, count = entry.count, "Rate limit exceeded");
            return Err(RateLimited { retry_after });
        }
        Ok(())
    }

    pub async fn reset(&self) {
        self.store.clear().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: u32, window_secs: u64) -> RateLimiter {
        RateLimiter::new(
            Arc::new(InMemoryRateLimitStore::new()),
            RateLimitConfig {
                max_requests,
                window_secs,
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_allows_up_to_limit_then_rejects() {
        let limiter = limiter(3, 60);

        for _ in 0..3 {
            assert!(limiter.check("203.0.113.7").await.is_ok());
        }
        let rejection = limiter.check("203.0.113.7").await.unwrap_err();
        assert_eq!(rejection.retry_after, Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let limiter = limiter(1, 60);

        assert!(limiter.check("a").await.is_ok());
        assert!(limiter.check("a").await.is_err());
        assert!(limiter.check("b").await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_expiry_resets_count() {
        let limiter = limiter(1, 60);

        assert!(limiter.check("a").await.is_ok());
        assert!(limiter.check("a").await.is_err());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(limiter.check("a").await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_clears_counters() {
        let limiter = limiter(1, 60);

        assert!(limiter.check("a").await.is_ok());
        assert!(limiter.check("a").await.is_err());

        limiter.reset().await;
        assert!(limiter.check("a").await.is_ok());
    }
}
