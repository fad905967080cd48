//! Session token issuance and verification.
//!
//! Tokens are stateless: a [`TokenCodec`] signs `{sub, iat, exp}` and later
//! checks the signature and the expiry. Nothing is persisted, so there is no
//! revocation; a token dies when its `exp` passes.

use std::sync::Arc;

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};

use super::AuthError;
use crate::{Clock, Result, config::TokenSettings};

/// Marker returned alongside every access token.
pub const TOKEN_TYPE: &str = "bearer";

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the identity's email
    pub sub: String,
    /// Issued at (seconds since epoch)
    pub iat: i64,
    /// Expiry (seconds since epoch)
    pub exp: i64,
}

/// A freshly issued bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionToken {
    pub access_token: String,
    pub token_type: &'static str,
    /// Expiry of `access_token` (seconds since epoch).
    #[serde(skip)]
    pub expires_at: i64,
}

/// Signs and verifies session tokens.
///
/// Kept separate from credential storage so the signing scheme can change
/// without touching the auth service.
pub trait TokenCodec: Send + Sync {
    /// Issue a token whose subject is `subject`.
    fn issue(&self, subject: &str) -> Result<SessionToken>;

    /// Verify `token` and return its claims.
    ///
    /// # Errors
    /// - [`AuthError::TokenExpired`] once `exp` is not in the future
    /// - [`AuthError::InvalidToken`] for anything else that fails to check out
    fn verify(&self, token: &str) -> Result<Claims>;
}

/// HMAC-signed JWT codec.
pub struct JwtCodec {
    algorithm: Algorithm,
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    expiry_secs: i64,
    clock: Arc<dyn Clock>,
}

impl JwtCodec {
    pub fn new(settings: &TokenSettings, clock: Arc<dyn Clock>) -> Self {
        let mut validation = Validation::new(settings.algorithm);
        // Expiry is checked against our own clock below.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            algorithm: settings.algorithm,
            encoding: EncodingKey::from_secret(settings.secret.as_bytes()),
            decoding: DecodingKey::from_secret(settings.secret.as_bytes()),
            validation,
            expiry_secs: settings.expiry_secs(),
            clock,
        }
    }
}

impl TokenCodec for JwtCodec {
    fn issue(&self, subject: &str) -> Result<SessionToken> {
        let now = self.clock.now_secs();
        let claims = Claims {
            sub: subject.to_string(),
            iat: now,
            exp: now + self.expiry_secs,
        };

        let access_token = encode(&Header::new(self.algorithm), &claims, &self.encoding)
            .map_err(|e| AuthError::TokenIssueFailed {
                reason: e.to_string(),
            })?;

        Ok(SessionToken {
            access_token,
            token_type: TOKEN_TYPE,
            expires_at: claims.exp,
        })
    }

    fn verify(&self, token: &str) -> Result<Claims> {
        let claims = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken {
                    reason: e.to_string(),
                },
            })?
            .claims;

        if claims.exp <= self.clock.now_secs() {
            return Err(AuthError::TokenExpired.into());
        }
        if claims.sub.is_empty() {
            return Err(AuthError::InvalidToken {
                reason: "empty subject".to_string(),
            }
            .into());
        }
        Ok(claims)
    }
}
