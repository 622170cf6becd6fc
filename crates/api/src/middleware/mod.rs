//! Request middleware and the extractors that depend on it.
//!
//! - [`route_guard::route_guard`] -- Classifies every request path and gates
//!   protected and admin routes on the cookie session.
//! - [`session::CurrentSession`] -- The session the guard resolved, for
//!   handlers on protected routes.

pub mod route_guard;
pub mod session;
