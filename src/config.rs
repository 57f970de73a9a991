use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Explicit configuration for both services, passed to components at
/// construction. Components never read the environment themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub auth: AuthConfig,
    pub billing: BillingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auth: AuthConfig::default(),
            billing: BillingConfig::default(),
        }
    }
}

/// Auth service knobs: database, token secrets and lifetimes, and the
/// bound on the cross-service provisioning call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub database: String,
    pub jwt_secret: String,
    pub refresh_secret: String,
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
    pub provision_timeout_ms: u64,
}

impl AuthConfig {
    pub fn provision_timeout(&self) -> Duration {
        Duration::from_millis(self.provision_timeout_ms)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            database: "auth.db".to_string(),
            jwt_secret: "change-me".to_string(),
            refresh_secret: "change-me-too".to_string(),
            access_ttl_secs: 900,
            refresh_ttl_secs: 604_800,
            provision_timeout_ms: 3_000,
        }
    }
}

/// Billing service knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingConfig {
    pub database: String,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            database: "billing.db".to_string(),
        }
    }
}
