//! Password hashing with Argon2id.
//!
//! Hashes are stored in PHC string format, which embeds the algorithm,
//! parameters and a random salt, so verification needs nothing but the string.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core},
};

use super::AuthError;
use crate::Result;

/// Hash a password using Argon2id with a fresh random salt.
pub fn hash_password(password: impl AsRef<str>) -> Result<String> {
    let salt = SaltString::generate(&mut rand_core::OsRng);

    let hash = Argon2::default()
        .hash_password(password.as_ref().as_bytes(), &salt)
        .map_err(|e| AuthError::HashingFailed {
            reason: e.to_string(),
        })?
        .to_string();

    Ok(hash)
}

/// Verify a password against its stored hash.
///
/// # Errors
/// - [`AuthError::InvalidPassword`] if the password does not match
/// - [`AuthError::CorruptPasswordHash`] if the stored hash cannot be parsed
pub fn verify_password(password: impl AsRef<str>, password_hash: impl AsRef<str>) -> Result<()> {
    let parsed_hash =
        PasswordHash::new(password_hash.as_ref()).map_err(|_| AuthError::CorruptPasswordHash)?;

    Argon2::default()
        .verify_password(password.as_ref().as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidPassword.into())
}

/// [`hash_password`] on the blocking pool, off the async worker threads.
pub async fn hash_password_blocking(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_password(password))
        .await
        .map_err(|e| AuthError::HashingFailed {
            reason: format!("hashing task failed: {e}"),
        })?
}

/// [`verify_password`] on the blocking pool.
pub async fn verify_password_blocking(password: String, password_hash: String) -> Result<()> {
    tokio::task::spawn_blocking(move || verify_password(password, password_hash))
        .await
        .map_err(|e| AuthError::HashingFailed {
            reason: format!("verification task failed: {e}"),
        })?
}
