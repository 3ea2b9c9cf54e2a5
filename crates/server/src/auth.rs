//! Credential and token primitives for the bearer-auth gate.
//!
//! Passwords are argon2 hashes; bearer tokens are random strings stored as
//! sha256 digests, so a leaked database does not leak usable tokens.

use std::fmt::Write as _;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::{distr::Alphanumeric, Rng};
use sha2::{Digest, Sha256};
use thiserror::Error;

const TOKEN_LENGTH: usize = 48;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("failed to hash password")]
    Hash,
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::Hash)
}

/// Malformed stored hashes count as a mismatch rather than an error, so a
/// bad row cannot be distinguished from a wrong password by the caller.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

pub fn generate_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

pub fn token_digest(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    let mut out = String::with_capacity(64);
    for byte in digest {
        let _ = write!(&mut out, "{:02x}", byte);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_roundtrip() {
        let hash = hash_password("hunter2").unwrap();
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
    }

    #[test]
    fn garbage_hash_is_a_mismatch() {
        assert!(!verify_password("hunter2", "not-a-phc-string"));
    }

    #[test]
    fn token_digest_is_hex() {
        let digest = token_digest("abc");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
