use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{User, UserId, Wallet};

use super::error::AppError;
use super::ledger::LedgerEngine;

/// Identity storage contract consumed by the saga. Delete-by-id is the
/// compensation primitive and must be supported.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn create(&self, email: &str, credential_hash: &str) -> Result<User, AppError>;
    async fn delete(&self, user_id: &UserId) -> Result<(), AppError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    async fn find_by_id(&self, user_id: &UserId) -> Result<Option<User>, AppError>;
}

/// The cross-service init-wallet call. Implementations decide the transport;
/// the saga supplies the timeout and owns retries (it makes none).
#[async_trait]
pub trait WalletProvisioner: Send + Sync {
    async fn init_wallet(&self, user_id: &UserId) -> Result<Wallet, AppError>;
}

/// Provisioner for single-process deployments: calls the ledger engine
/// directly, no network hop.
pub struct InProcessProvisioner {
    engine: Arc<LedgerEngine>,
}

impl InProcessProvisioner {
    pub fn new(engine: Arc<LedgerEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl WalletProvisioner for InProcessProvisioner {
    async fn init_wallet(&self, user_id: &UserId) -> Result<Wallet, AppError> {
        self.engine.ensure_wallet(user_id).await
    }
}

/// Where a registration run ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SagaState {
    /// Step 1 committed: the identity exists, the wallet does not yet.
    IdentityCreated,
    /// Terminal success: identity and wallet both exist.
    WalletProvisioned,
    /// Terminal failure: provisioning failed and the identity was removed.
    RolledBack,
}

/// Successful registration: the identity and its provisioned wallet.
#[derive(Debug)]
pub struct Registration {
    pub user: User,
    pub wallet: Wallet,
}

/// The two-step registration workflow: create an identity, then provision
/// its wallet across the service boundary. If provisioning fails or times
/// out, the identity is deleted again (best-effort compensation) so that
/// either both records exist or neither does.
pub struct RegistrationSaga {
    identities: Arc<dyn IdentityStore>,
    provisioner: Arc<dyn WalletProvisioner>,
    provision_timeout: Duration,
}

impl RegistrationSaga {
    pub fn new(
        identities: Arc<dyn IdentityStore>,
        provisioner: Arc<dyn WalletProvisioner>,
        provision_timeout: Duration,
    ) -> Self {
        Self {
            identities,
            provisioner,
            provision_timeout,
        }
    }

    /// Run the workflow for a new identity. `credential_hash` is the
    /// already-hashed password; hashing is the caller's concern.
    pub async fn execute(
        &self,
        email: &str,
        credential_hash: &str,
    ) -> Result<Registration, AppError> {
        if self.identities.find_by_email(email).await?.is_some() {
            return Err(AppError::DuplicateIdentity(email.to_string()));
        }

        let user = self.identities.create(email, credential_hash).await?;
        let mut state = SagaState::IdentityCreated;
        tracing::debug!(user_id = %user.id, ?state, "identity created");

        let provisioned =
            tokio::time::timeout(self.provision_timeout, self.provisioner.init_wallet(&user.id))
                .await
                .map_err(|_| {
                    AppError::UpstreamUnavailable(format!(
                        "wallet provisioning timed out after {:?}",
                        self.provision_timeout
                    ))
                })
                .and_then(|result| result);

        match provisioned {
            Ok(wallet) => {
                state = SagaState::WalletProvisioned;
                tracing::info!(user_id = %user.id, wallet_id = %wallet.id, ?state, "registration complete");
                Ok(Registration { user, wallet })
            }
            Err(cause) => {
                self.compensate(&user).await;
                state = SagaState::RolledBack;
                tracing::warn!(user_id = %user.id, ?state, error = %cause, "registration rolled back");
                Err(AppError::ProvisioningFailed(cause.to_string()))
            }
        }
    }

    /// Remove the identity created in step 1. Best-effort: there is no
    /// cross-service transaction, so a failure here leaves an identity
    /// without a wallet and is reported for out-of-band reconciliation.
    async fn compensate(&self, user: &User) {
        if let Err(e) = self.identities.delete(&user.id).await {
            tracing::error!(
                user_id = %user.id,
                email = %user.email,
                error = %e,
                "compensation failed: identity has no wallet and must be reconciled manually"
            );
        }
    }
}
