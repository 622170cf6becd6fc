//! bcrypt password hashing, verification, and secure token generation.
//!
//! Hashes use a fixed cost of [`BCRYPT_COST`] and a fresh random salt per
//! call, so hashing the same password twice yields two different strings
//! that both verify. The modular crypt format (`$2b$12$...`) embeds the cost
//! and salt in the hash itself.

use std::sync::LazyLock;

use rand::RngCore;

/// bcrypt work factor (2^12 rounds).
pub const BCRYPT_COST: u32 = 12;

/// Default number of random bytes in a secure token (64 hex characters).
pub const DEFAULT_TOKEN_BYTES: usize = 32;

/// Minimum accepted password length for registration and resets.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Hash a plaintext password with bcrypt at [`BCRYPT_COST`].
///
/// Any string is accepted, including the empty string. Inputs longer than
/// bcrypt's 72-byte limit are truncated by the algorithm.
pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, BCRYPT_COST)
}

/// Verify a plaintext password against a stored bcrypt hash.
///
/// Returns `false` on mismatch and also when `hash` is not a parseable
/// bcrypt string; verification never errors.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match bcrypt::verify(password, hash) {
        Ok(matches) => matches,
        Err(e) => {
            tracing::debug!(error = %e, "Stored password hash could not be parsed");
            false
        }
    }
}

/// Hash of a random secret, verified against when a login names no account
/// so that the request still does one full-cost bcrypt verification.
static DECOY_HASH: LazyLock<String> = LazyLock::new(|| {
    hash_password(&generate_secure_token(DEFAULT_TOKEN_BYTES)).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to build decoy password hash");
        String::new()
    })
});

/// Verify `password` against the stored hash, or against the decoy hash when
/// there is none. Without a stored hash the result is always `false`.
pub fn verify_password_or_decoy(password: &str, hash: Option<&str>) -> bool {
    match hash {
        Some(hash) => verify_password(password, hash),
        None => {
            verify_password(password, &DECOY_HASH);
            false
        }
    }
}

/// Generate `length_bytes` cryptographically secure random bytes,
/// hex-encoded (`2 * length_bytes` characters).
pub fn generate_secure_token(length_bytes: usize) -> String {
    let mut bytes = vec![0u8; length_bytes];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Validate that a password meets minimum strength requirements.
///
/// Currently enforces a minimum character length. Returns `Ok(())` when the
/// password is acceptable, or `Err` with a human-readable explanation.
pub fn validate_password_strength(password: &str, min_length: usize) -> Result<(), String> {
    if password.chars().count() < min_length {
        return Err(format!(
            "Password must be at least {min_length} characters long"
        ));
    }
    Ok(())
}
