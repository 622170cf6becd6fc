//! Framework-free building blocks for the atelier session layer.
//!
//! - [`error`] -- the domain error taxonomy shared by every crate.
//! - [`roles`] -- well-known role names carried in session claims.
//! - [`routes`] -- public / protected / admin path classification.
//! - [`types`] -- common type aliases.

pub mod error;
pub mod roles;
pub mod routes;
pub mod types;
