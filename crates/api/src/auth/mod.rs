//! Authentication primitives.
//!
//! - [`password`] -- bcrypt password hashing and secure random tokens.
//! - [`jwt`] -- access/refresh token signing and verification.
//! - [`cookies`] -- the session cookie pair and the cookie store seam.
//! - [`denylist`] -- revocation of individual tokens by `jti`.
//! - [`session`] -- cookie session lifecycle (create, resolve, refresh, destroy).

pub mod cookies;
pub mod denylist;
pub mod jwt;
pub mod password;
pub mod session;
