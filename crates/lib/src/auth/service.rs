//! Registration, login and "who am I".

use std::sync::Arc;

use super::{AuthError, SessionToken, TokenCodec, hash_password_blocking, verify_password_blocking};
use crate::{
    Result,
    store::{CredentialStore, Identity},
};

/// Check that `email` looks like `local@domain.tld`.
///
/// This is a shape check only; deliverability is never tested.
pub fn validate_email(email: &str) -> Result<()> {
    let invalid = || -> crate::Error {
        AuthError::InvalidEmail {
            email: email.to_string(),
        }
        .into()
    };

    if email.is_empty() || email.len() > 254 || email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|label| label.is_empty()) {
        return Err(invalid());
    }
    Ok(())
}

/// Orchestrates identities and session tokens.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    tokens: Arc<dyn TokenCodec>,
}

impl AuthService {
    pub fn new(store: Arc<dyn CredentialStore>, tokens: Arc<dyn TokenCodec>) -> Self {
        Self { store, tokens }
    }

    /// The credential store backing this service.
    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Register a new identity.
    ///
    /// # Errors
    /// - [`AuthError::InvalidEmail`] if `email` is malformed
    /// - [`AuthError::EmailTaken`] if `email` is already registered
    pub async fn register(&self, email: &str, password: &str) -> Result<()> {
        validate_email(email)?;

        if self.store.find_by_email(email).await?.is_some() {
            return Err(AuthError::EmailTaken {
                email: email.to_string(),
            }
            .into());
        }

        let password_hash = hash_password_blocking(password.to_string()).await?;
        match self.store.insert(Identity::new(email, password_hash)).await {
            Ok(()) => {
                tracing::info!(email = %email, "Registered identity");
                Ok(())
            }
            // Lost a race with a concurrent registration.
            Err(e) if e.is_conflict() => Err(AuthError::EmailTaken {
                email: email.to_string(),
            }
            .into()),
            Err(e) => Err(e),
        }
    }

    /// Check credentials and issue a session token bound to `email`.
    ///
    /// # Errors
    /// - [`AuthError::InvalidEmail`] if `email` is malformed
    /// - [`AuthError::UnknownEmail`] if nobody registered `email`
    /// - [`AuthError::InvalidPassword`] if the password does not match
    pub async fn login(&self, email: &str, password: &str) -> Result<SessionToken> {
        validate_email(email)?;

        let identity =
            self.store
                .find_by_email(email)
                .await?
                .ok_or_else(|| AuthError::UnknownEmail {
                    email: email.to_string(),
                })?;

        if let Err(e) =
            verify_password_blocking(password.to_string(), identity.password_hash.clone()).await
        {
            tracing::debug!(email = %email, "Rejected login: {e}");
            return Err(e);
        }

        let token = self.tokens.issue(&identity.email)?;
        let expires_at = chrono::DateTime::from_timestamp(token.expires_at, 0)
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_else(|| token.expires_at.to_string());
        tracing::info!(email = %email, %expires_at, "Issued session token");
        Ok(token)
    }

    /// Resolve a bearer token to the email it was issued for.
    ///
    /// # Errors
    /// [`AuthError::MissingToken`], [`AuthError::InvalidToken`] or
    /// [`AuthError::TokenExpired`].
    pub fn who_am_i(&self, token: Option<&str>) -> Result<String> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;
        Ok(self.tokens.verify(token)?.sub)
    }
}
