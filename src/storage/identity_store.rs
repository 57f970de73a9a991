use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::saga::IdentityStore;
use crate::domain::{RefreshTokenRecord, User, UserId};

use super::{MIGRATION_001_IDENTITY, is_unique_violation};

/// Store for identities and refresh tokens (the auth database).
pub struct SqliteIdentityStore {
    pool: SqlitePool,
}

impl SqliteIdentityStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL (single writer, same
    /// pooling scheme as the ledger store).
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await
            .context("Failed to connect to auth database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_IDENTITY)
            .execute(&self.pool)
            .await
            .context("Failed to run identity migration")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let store = Self::connect(database_url).await?;
        store.migrate().await?;
        Ok(store)
    }

    pub async fn insert_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(user.id.to_string())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to insert user")?;
        Ok(())
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT id, email, password_hash, created_at
            FROM users
            WHERE email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch user by email")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_user(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn get_user_by_id(&self, user_id: &UserId) -> Result<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT id, email, password_hash, created_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch user by id")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_user(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn delete_user(&self, user_id: &UserId) -> Result<()> {
        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to delete user")?;
        Ok(())
    }

    // ========================
    // Refresh token operations
    // ========================

    /// Persist a freshly issued refresh token.
    pub async fn save_refresh_token(&self, record: &RefreshTokenRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (token, user_id, expires_at, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&record.token)
        .bind(record.user_id.to_string())
        .bind(record.expires_at.to_rfc3339())
        .bind(record.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save refresh token")?;
        Ok(())
    }

    /// Get a persisted refresh token, if it has not been consumed.
    pub async fn get_refresh_token(&self, token: &str) -> Result<Option<RefreshTokenRecord>> {
        let row = sqlx::query(
            r#"
            SELECT token, user_id, expires_at, created_at
            FROM refresh_tokens
            WHERE token = ?
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch refresh token")?;

        match row {
            Some(row) => {
                let user_id_str: String = row.get("user_id");
                let expires_at_str: String = row.get("expires_at");
                let created_at_str: String = row.get("created_at");
                Ok(Some(RefreshTokenRecord {
                    token: row.get("token"),
                    user_id: Uuid::parse_str(&user_id_str).context("Invalid user ID")?,
                    expires_at: DateTime::parse_from_rfc3339(&expires_at_str)
                        .context("Invalid expires_at timestamp")?
                        .with_timezone(&Utc),
                    created_at: DateTime::parse_from_rfc3339(&created_at_str)
                        .context("Invalid created_at timestamp")?
                        .with_timezone(&Utc),
                }))
            }
            None => Ok(None),
        }
    }

    /// Consume a refresh token. Returns false when it was already gone.
    pub async fn delete_refresh_token(&self, token: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await
            .context("Failed to delete refresh token")?;
        Ok(result.rows_affected() == 1)
    }

    fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
        let id_str: String = row.get("id");
        let created_at_str: String = row.get("created_at");

        Ok(User {
            id: Uuid::parse_str(&id_str).context("Invalid user ID")?,
            email: row.get("email"),
            password_hash: row.get("password_hash"),
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
        })
    }
}

#[async_trait]
impl IdentityStore for SqliteIdentityStore {
    async fn create(&self, email: &str, credential_hash: &str) -> Result<User, AppError> {
        let user = User::new(email, credential_hash);
        match self.insert_user(&user).await {
            Ok(()) => Ok(user),
            // A concurrent registration for the same email committed first
            Err(e) if is_unique_violation(&e) => Err(AppError::DuplicateIdentity(email.into())),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, user_id: &UserId) -> Result<(), AppError> {
        Ok(self.delete_user(user_id).await?)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self.get_user_by_email(email).await?)
    }

    async fn find_by_id(&self, user_id: &UserId) -> Result<Option<User>, AppError> {
        Ok(self.get_user_by_id(user_id).await?)
    }
}
