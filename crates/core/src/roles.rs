//! Well-known role name constants.
//!
//! Role names travel inside access and refresh tokens verbatim, so they are
//! compared case-sensitively.

pub const ROLE_ADMIN: &str = "ADMIN";
pub const ROLE_STUDENT: &str = "STUDENT";

/// Role assigned to self-registered accounts.
pub const DEFAULT_ROLE: &str = ROLE_STUDENT;

/// Whether `role` grants access to admin routes.
pub fn is_admin(role: &str) -> bool {
    role == ROLE_ADMIN
}
