//! Password hashing and verification
//!
//! Passwords are hashed with Argon2id and a random salt; the stored value is
//! the PHC string, so parameters travel with the hash.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;

use crate::error::HashError;

/// Well-formed Argon2id hash with default parameters that no password is
/// expected to match
///
/// Verified against when a login names an unknown email, so that path costs
/// the same argon2 run as a wrong password.
pub const DUMMY_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$2rGAn8FZdtx7eQ7KNhCXeQ$TB1FcA+8bB7ZI7Oqk3QHiEjQdYl2o2ioYZV52S3NLGI";

/// Hash a password using Argon2id
///
/// # Returns
///
/// The Argon2id hash string (PHC format)
///
/// # Example
///
/// ```
/// use auth_gate::auth::password::{hash_password, verify_password};
///
/// let hash = hash_password("correct horse").unwrap();
/// assert!(hash.starts_with("$argon2id$"));
/// assert!(verify_password("correct horse", &hash));
/// ```
pub fn hash_password(password: &str) -> Result<String, HashError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| HashError::HashFailed(e.to_string()))
}

/// Verify a password against a stored hash
///
/// Comparison is done by the Argon2 verifier. An unparseable hash never
/// matches.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}
