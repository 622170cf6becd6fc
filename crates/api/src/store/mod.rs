//! Persistence seams for the collaborating auth endpoints.
//!
//! - [`users`] -- user accounts and credential hashes.
//! - [`reset_tokens`] -- one-time, time-boxed password reset tokens.
//!
//! Both are async traits with in-memory implementations; a database-backed
//! deployment implements the same traits.

pub mod reset_tokens;
pub mod users;

pub use reset_tokens::{InMemoryPasswordResetStore, PasswordResetStore, PasswordResetToken};
pub use users::{CreateUser, InMemoryUserStore, User, UserStore};
