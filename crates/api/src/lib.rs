//! Atelier auth service library.
//!
//! Cookie-based JWT sessions, the route guard that gates pages and API
//! routes on them, and the auth endpoints built on top. Exposed as a library
//! so integration tests and the binary entrypoint share the same building
//! blocks.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod notify;
pub mod rate_limit;
pub mod router;
pub mod routes;
pub mod state;
pub mod store;
