//! Email/password authentication with stateless session tokens.
//!
//! - [`password`]: Argon2id hashing of stored credentials
//! - [`token`]: the [`TokenCodec`] seam and its JWT implementation
//! - [`service`]: [`AuthService`], which ties the store and the codec together

pub mod errors;
pub mod password;
pub mod service;
pub mod token;

pub use errors::AuthError;
pub use password::{
    hash_password, hash_password_blocking, verify_password, verify_password_blocking,
};
pub use service::{AuthService, validate_email};
pub use token::{Claims, JwtCodec, SessionToken, TOKEN_TYPE, TokenCodec};
