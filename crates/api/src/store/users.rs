use std::collections::HashMap;

use async_trait::async_trait;
use atelier_core::error::CoreError;
use atelier_core::types::{Timestamp, UserId};
use tokio::sync::RwLock;
use uuid::Uuid;

/// A stored user account.
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    /// Normalized with [`normalize_email`].
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: Timestamp,
}

/// Input for [`UserStore::create`].
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: String,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, CoreError>;

    /// Create a user. Fails with [`CoreError::Conflict`] when the email is taken.
    async fn create(&self, input: CreateUser) -> Result<User, CoreError>;

    /// Replace a user's password hash.
    async fn update_password_hash(&self, id: &str, password_hash: String)
        -> Result<(), CoreError>;
}

/// Lowercase and trim an email address for lookups and storage.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Process-local [`UserStore`].
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<UserId, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, CoreError> {
        let email = normalize_email(email);
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn create(&self, input: CreateUser) -> Result<User, CoreError> {
        let email = normalize_email(&input.email);
        let mut users = self.users.write().await;

        if users.values().any(|u| u.email == email) {
            return Err(CoreError::Conflict(
                "An account with this email already exists".into(),
            ));
        }

        let user = User {
            id: Uuid::new_v4().to_string(),
            email,
            name: input.name,
            password_hash: input.password_hash,
            role: input.role,
            created_at: chrono::Utc::now(),
        };
        users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn update_password_hash(
        &self,
        id: &str,
        password_hash: String,
    ) -> Result<(), CoreError> {
        let mut users = self.users.write().await;
        let user = users.get_mut(id).ok_or_else(|| CoreError::NotFound {
            entity: "User",
            id: id.to_string(),
        })?;
        user.password_hash = password_hash;
        Ok(())
    }
}
