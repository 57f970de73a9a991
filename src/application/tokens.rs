use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::domain::{RefreshTokenRecord, User};
use crate::storage::SqliteIdentityStore;

use super::error::AppError;

/// An access/refresh token pair handed to a client.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// JWT claims. Access tokens carry the email; refresh tokens only the
/// subject.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Unique per token; two tokens for the same subject never collide
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// Token issuance contract. Invoked by the auth service only after a
/// registration reaches its terminal success state, and for login/refresh.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    async fn issue(&self, user: &User) -> Result<TokenPair, AppError>;
    /// Rotate: verify and consume `refresh_token`, then issue a fresh pair.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AppError>;
    /// Revoke a persisted refresh token (logout).
    async fn revoke(&self, refresh_token: &str) -> Result<(), AppError>;
}

/// HS256 issuer with persisted, single-use refresh tokens.
pub struct JwtIssuer {
    store: Arc<SqliteIdentityStore>,
    config: AuthConfig,
}

impl JwtIssuer {
    pub fn new(store: Arc<SqliteIdentityStore>, config: AuthConfig) -> Self {
        Self { store, config }
    }

    fn sign(&self, claims: &Claims, secret: &str) -> Result<String, AppError> {
        let token = encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .context("Failed to sign token")?;
        Ok(token)
    }

    fn verify_refresh(&self, token: &str) -> Result<Claims, AppError> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.refresh_secret.as_bytes()),
            &validation,
        )
        .map_err(|_| AppError::InvalidCredentials)?;
        Ok(data.claims)
    }
}

#[async_trait]
impl TokenIssuer for JwtIssuer {
    async fn issue(&self, user: &User) -> Result<TokenPair, AppError> {
        let now = Utc::now();

        let access_claims = Claims {
            sub: user.id.to_string(),
            email: Some(user.email.clone()),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(self.config.access_ttl_secs as i64)).timestamp(),
        };
        let access_token = self.sign(&access_claims, &self.config.jwt_secret)?;

        let expires_at = now + Duration::seconds(self.config.refresh_ttl_secs as i64);
        let refresh_claims = Claims {
            sub: user.id.to_string(),
            email: None,
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let refresh_token = self.sign(&refresh_claims, &self.config.refresh_secret)?;

        self.store
            .save_refresh_token(&RefreshTokenRecord {
                token: refresh_token.clone(),
                user_id: user.id,
                expires_at,
                created_at: now,
            })
            .await?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AppError> {
        // A token that was never issued, or was already consumed by an
        // earlier rotation, is rejected before any signature check.
        let record = self
            .store
            .get_refresh_token(refresh_token)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        let claims = self.verify_refresh(refresh_token)?;
        let subject = Uuid::parse_str(&claims.sub).map_err(|_| AppError::InvalidCredentials)?;
        if subject != record.user_id {
            return Err(AppError::InvalidCredentials);
        }

        let user = self
            .store
            .get_user_by_id(&record.user_id)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        self.store.delete_refresh_token(refresh_token).await?;
        self.issue(&user).await
    }

    async fn revoke(&self, refresh_token: &str) -> Result<(), AppError> {
        if !self.store.delete_refresh_token(refresh_token).await? {
            return Err(AppError::InvalidCredentials);
        }
        Ok(())
    }
}
