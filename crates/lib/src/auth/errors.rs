//! Authentication error types.
//!
//! Each variant falls into one of the classes the HTTP layer cares about:
//! conflict, not found, unauthorized, invalid input, or an internal failure.
//! Use the `is_*()` helpers rather than matching variants when only the class
//! matters.

use thiserror::Error as ThisError;

use crate::Error;

/// Errors that can occur during registration, login and token checks.
#[non_exhaustive]
#[derive(Debug, ThisError)]
pub enum AuthError {
    /// The submitted email is not a plausible address.
    #[error("Invalid email address: {email}")]
    InvalidEmail {
        /// The rejected input
        email: String,
    },

    /// Registration for an email that already has an identity.
    #[error("Email already registered")]
    EmailTaken {
        /// The email that is already registered
        email: String,
    },

    /// Login for an email with no identity.
    #[error("User not found")]
    UnknownEmail {
        /// The email that was looked up
        email: String,
    },

    /// Password did not match the stored hash.
    #[error("Invalid password")]
    InvalidPassword,

    /// The stored hash could not be parsed.
    #[error("Stored password hash is corrupt")]
    CorruptPasswordHash,

    /// Hashing a new password failed.
    #[error("Password hashing failed: {reason}")]
    HashingFailed {
        /// Description of the failure
        reason: String,
    },

    /// No bearer token was supplied.
    #[error("Not authenticated")]
    MissingToken,

    /// Token is malformed, signed with another key or algorithm, or lacks claims.
    #[error("Invalid token")]
    InvalidToken {
        /// Description of why the token was rejected
        reason: String,
    },

    /// Token signature is valid but its expiry has passed.
    #[error("Token expired")]
    TokenExpired,

    /// Encoding a new token failed.
    #[error("Token issuance failed: {reason}")]
    TokenIssueFailed {
        /// Description of the failure
        reason: String,
    },
}

impl AuthError {
    /// Registration collided with an existing identity.
    pub fn is_conflict(&self) -> bool {
        matches!(self, AuthError::EmailTaken { .. })
    }

    /// Login named an email nobody registered.
    pub fn is_not_found(&self) -> bool {
        matches!(self, AuthError::UnknownEmail { .. })
    }

    /// Bad credentials, or a missing, invalid or expired token.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidPassword
                | AuthError::MissingToken
                | AuthError::InvalidToken { .. }
                | AuthError::TokenExpired
        )
    }

    /// The request itself was malformed.
    pub fn is_validation_error(&self) -> bool {
        matches!(self, AuthError::InvalidEmail { .. })
    }
}

impl From<AuthError> for Error {
    fn from(err: AuthError) -> Self {
        Error::Auth(err)
    }
}
