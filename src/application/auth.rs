use std::sync::Arc;

use crate::domain::User;

use super::error::AppError;
use super::password::CredentialHasher;
use super::saga::{IdentityStore, Registration, RegistrationSaga};
use super::tokens::{TokenIssuer, TokenPair};

/// A completed registration as seen by the client: the new identity and
/// its first token pair.
#[derive(Debug)]
pub struct RegisteredUser {
    pub user: User,
    pub tokens: TokenPair,
}

/// The auth service surface: registration (via the saga), login, refresh
/// rotation, and logout.
pub struct AuthService {
    identities: Arc<dyn IdentityStore>,
    hasher: Arc<dyn CredentialHasher>,
    tokens: Arc<dyn TokenIssuer>,
    saga: RegistrationSaga,
}

impl AuthService {
    pub fn new(
        identities: Arc<dyn IdentityStore>,
        hasher: Arc<dyn CredentialHasher>,
        tokens: Arc<dyn TokenIssuer>,
        saga: RegistrationSaga,
    ) -> Self {
        Self {
            identities,
            hasher,
            tokens,
            saga,
        }
    }

    /// Register a new identity and provision its wallet. Tokens are issued
    /// only once the saga reaches its terminal success state; on any
    /// provisioning failure neither the identity nor the wallet survives.
    pub async fn register(&self, email: &str, password: &str) -> Result<RegisteredUser, AppError> {
        validate_email(email)?;
        validate_password(password)?;

        let credential_hash = self.hasher.hash(password);
        let Registration { user, .. } = self.saga.execute(email, &credential_hash).await?;
        let tokens = self.tokens.issue(&user).await?;
        Ok(RegisteredUser { user, tokens })
    }

    /// Exchange credentials for a token pair. Unknown email and wrong
    /// password are indistinguishable to the caller.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, AppError> {
        let user = self
            .identities
            .find_by_email(email)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        if !self.hasher.verify(password, &user.password_hash) {
            return Err(AppError::InvalidCredentials);
        }

        self.tokens.issue(&user).await
    }

    /// Rotate a refresh token: the old token is consumed, a fresh pair
    /// comes back.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AppError> {
        self.tokens.refresh(refresh_token).await
    }

    /// Revoke a refresh token.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AppError> {
        self.tokens.revoke(refresh_token).await
    }
}

fn validate_email(email: &str) -> Result<(), AppError> {
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::InvalidRequest(format!(
            "'{}' is not a valid email address",
            email
        )));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), AppError> {
    if password.len() < 8 {
        return Err(AppError::InvalidRequest(
            "Password must be at least 8 characters".to_string(),
        ));
    }
    Ok(())
}
