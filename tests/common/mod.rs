// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use fiscus::application::{
    AuthService, InProcessProvisioner, JwtIssuer, LedgerEngine, RegistrationSaga, Sha256Hasher,
};
use fiscus::config::AuthConfig;
use fiscus::storage::SqliteIdentityStore;
use tempfile::TempDir;

/// Helper to create a ledger engine over a temporary billing database.
pub async fn test_engine() -> Result<(LedgerEngine, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("billing.db");
    let engine = LedgerEngine::init(db_path.to_str().unwrap()).await?;
    Ok((engine, temp_dir))
}

/// Helper to create an identity store over a temporary auth database.
pub async fn test_identity_store(temp_dir: &TempDir) -> Result<Arc<SqliteIdentityStore>> {
    let db_path = temp_dir.path().join("auth.db");
    let url = format!("sqlite:{}?mode=rwc", db_path.to_str().unwrap());
    Ok(Arc::new(SqliteIdentityStore::init(&url).await?))
}

pub fn test_auth_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: "test-access-secret".to_string(),
        refresh_secret: "test-refresh-secret".to_string(),
        ..AuthConfig::default()
    }
}

/// Both services wired into one process, each on its own temp database.
pub struct TestStack {
    pub auth: AuthService,
    pub engine: Arc<LedgerEngine>,
    pub identities: Arc<SqliteIdentityStore>,
    _temp_dir: TempDir,
}

pub async fn test_stack() -> Result<TestStack> {
    let temp_dir = TempDir::new()?;
    let billing_path = temp_dir.path().join("billing.db");
    let engine = Arc::new(LedgerEngine::init(billing_path.to_str().unwrap()).await?);
    let identities = test_identity_store(&temp_dir).await?;

    let config = test_auth_config();
    let saga = RegistrationSaga::new(
        identities.clone(),
        Arc::new(InProcessProvisioner::new(engine.clone())),
        Duration::from_millis(config.provision_timeout_ms),
    );
    let issuer = Arc::new(JwtIssuer::new(identities.clone(), config));
    let auth = AuthService::new(identities.clone(), Arc::new(Sha256Hasher), issuer, saga);

    Ok(TestStack {
        auth,
        engine,
        identities,
        _temp_dir: temp_dir,
    })
}
