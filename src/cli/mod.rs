use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::api::{
    BalanceResponse, ChargeResponse, CompleteTransactionResponse, CreditResponse,
    InitWalletResponse, RefundTransactionResponse, RegisterResponse, TransactionView, UserView,
};
use crate::application::{
    AuthService, InProcessProvisioner, JwtIssuer, LedgerEngine, RegistrationSaga, Sha256Hasher,
};
use crate::config::{AuthConfig, BillingConfig, Config};
use crate::domain::{UserId, format_micros, parse_micros};
use crate::storage::SqliteIdentityStore;

/// Fiscus - user identities and per-user wallet ledgers
#[derive(Parser)]
#[command(name = "fiscus")]
#[command(about = "Wallet ledger and identity services with saga-based registration")]
#[command(version)]
pub struct Cli {
    /// Billing database file path
    #[arg(long, default_value = "billing.db")]
    pub billing_database: String,

    /// Auth database file path
    #[arg(long, default_value = "auth.db")]
    pub auth_database: String,

    /// Secret for signing access tokens
    #[arg(long, default_value = "change-me")]
    pub jwt_secret: String,

    /// Secret for signing refresh tokens
    #[arg(long, default_value = "change-me-too")]
    pub refresh_secret: String,

    /// Timeout for the wallet-provisioning call, in milliseconds
    #[arg(long, default_value_t = 3000)]
    pub provision_timeout_ms: u64,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize both databases
    Init,

    /// Wallet operations
    #[command(subcommand)]
    Wallet(WalletCommands),

    /// Transaction settlement operations
    #[command(subcommand)]
    Txn(TxnCommands),

    /// Register a new identity and provision its wallet
    Register {
        email: String,
        password: String,
    },

    /// Exchange credentials for a token pair
    Login {
        email: String,
        password: String,
    },

    /// Rotate a refresh token
    Refresh {
        /// The refresh token to consume
        token: String,
    },

    /// Revoke a refresh token
    Logout {
        token: String,
    },

    /// Verify ledger integrity
    Check,
}

#[derive(Subcommand)]
pub enum WalletCommands {
    /// Ensure a wallet exists for a user
    Init {
        /// User id (UUID)
        user: String,
    },

    /// Show a user's balance
    Balance {
        user: String,
    },

    /// Add funds to a user's wallet
    Credit {
        user: String,
        /// Amount to credit (e.g., "50.00")
        amount: String,
    },

    /// Reserve funds from a user's wallet
    Charge {
        user: String,
        /// Amount to charge (e.g., "40.00")
        amount: String,

        /// Idempotency key; retries with the same key replay the original
        #[arg(short, long)]
        operation: Option<String>,
    },

    /// List a user's transactions
    Transactions {
        user: String,
    },
}

#[derive(Subcommand)]
pub enum TxnCommands {
    /// Settle a pending debit
    Complete {
        /// Transaction id
        id: String,
    },

    /// Refund a debit
    Refund {
        id: String,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let config = self.config();

        match &self.command {
            Commands::Init => {
                LedgerEngine::init(&config.billing.database).await?;
                SqliteIdentityStore::init(&auth_db_url(&config.auth.database, true)).await?;
                println!("Initialized {} and {}", config.billing.database, config.auth.database);
                Ok(())
            }
            Commands::Wallet(cmd) => {
                let engine = LedgerEngine::connect(&config.billing.database).await?;
                run_wallet_command(&engine, cmd).await
            }
            Commands::Txn(cmd) => {
                let engine = LedgerEngine::connect(&config.billing.database).await?;
                run_txn_command(&engine, cmd).await
            }
            Commands::Check => {
                let engine = LedgerEngine::connect(&config.billing.database).await?;
                let report = engine.check_integrity().await?;
                println!(
                    "{} wallets, {} transactions",
                    report.wallet_count, report.transaction_count
                );
                if report.is_clean() {
                    println!("Ledger OK: every stored balance matches its transaction log");
                } else {
                    for drift in &report.drift {
                        println!(
                            "DRIFT wallet {} (user {}): stored {}, replayed {}",
                            drift.wallet_id,
                            drift.user_id,
                            format_micros(drift.stored),
                            format_micros(drift.replayed)
                        );
                    }
                    anyhow::bail!("{} wallet(s) out of balance", report.drift.len());
                }
                Ok(())
            }
            Commands::Register { email, password } => {
                let auth = build_auth_service(&config).await?;
                let registered = auth.register(email, password).await?;
                print_json(&RegisterResponse {
                    user: UserView::from(&registered.user),
                    tokens: registered.tokens,
                })
            }
            Commands::Login { email, password } => {
                let auth = build_auth_service(&config).await?;
                let tokens = auth.login(email, password).await?;
                print_json(&tokens)
            }
            Commands::Refresh { token } => {
                let auth = build_auth_service(&config).await?;
                let tokens = auth.refresh(token).await?;
                print_json(&tokens)
            }
            Commands::Logout { token } => {
                let auth = build_auth_service(&config).await?;
                auth.logout(token).await?;
                println!("Logged out");
                Ok(())
            }
        }
    }

    fn config(&self) -> Config {
        Config {
            auth: AuthConfig {
                database: self.auth_database.clone(),
                jwt_secret: self.jwt_secret.clone(),
                refresh_secret: self.refresh_secret.clone(),
                provision_timeout_ms: self.provision_timeout_ms,
                ..AuthConfig::default()
            },
            billing: BillingConfig {
                database: self.billing_database.clone(),
            },
        }
    }
}

async fn run_wallet_command(engine: &LedgerEngine, cmd: &WalletCommands) -> Result<()> {
    match cmd {
        WalletCommands::Init { user } => {
            let wallet = engine.ensure_wallet(&parse_user(user)?).await?;
            print_json(&InitWalletResponse::from(&wallet))
        }
        WalletCommands::Balance { user } => {
            let balance = engine.get_balance(&parse_user(user)?).await?;
            print_json(&BalanceResponse {
                balance: format_micros(balance),
            })
        }
        WalletCommands::Credit { user, amount } => {
            let amount = parse_micros(amount).context("Invalid amount")?;
            let txn = engine.credit(&parse_user(user)?, amount).await?;
            print_json(&CreditResponse {
                success: true,
                txn_id: txn.id,
            })
        }
        WalletCommands::Charge {
            user,
            amount,
            operation,
        } => {
            let amount = parse_micros(amount).context("Invalid amount")?;
            let txn = engine
                .charge(&parse_user(user)?, amount, operation.as_deref())
                .await?;
            print_json(&ChargeResponse {
                txn_id: txn.id,
                status: txn.status,
            })
        }
        WalletCommands::Transactions { user } => {
            let txns = engine.transactions_for_user(&parse_user(user)?).await?;
            let views: Vec<TransactionView> = txns.iter().map(TransactionView::from).collect();
            print_json(&views)
        }
    }
}

async fn run_txn_command(engine: &LedgerEngine, cmd: &TxnCommands) -> Result<()> {
    match cmd {
        TxnCommands::Complete { id } => {
            let txn = engine.complete_transaction(parse_txn_id(id)?).await?;
            print_json(&CompleteTransactionResponse {
                success: true,
                txn: TransactionView::from(&txn),
            })
        }
        TxnCommands::Refund { id } => {
            engine.refund_transaction(parse_txn_id(id)?).await?;
            print_json(&RefundTransactionResponse { success: true })
        }
    }
}

/// Wire both services into one process: the saga reaches the ledger engine
/// through the in-process provisioner.
async fn build_auth_service(config: &Config) -> Result<AuthService> {
    let engine = Arc::new(LedgerEngine::connect(&config.billing.database).await?);
    let identities = Arc::new(
        SqliteIdentityStore::connect(&auth_db_url(&config.auth.database, false)).await?,
    );

    let saga = RegistrationSaga::new(
        identities.clone(),
        Arc::new(InProcessProvisioner::new(engine)),
        config.auth.provision_timeout(),
    );
    let issuer = Arc::new(JwtIssuer::new(identities.clone(), config.auth.clone()));

    Ok(AuthService::new(
        identities,
        Arc::new(Sha256Hasher),
        issuer,
        saga,
    ))
}

fn auth_db_url(path: &str, create: bool) -> String {
    if create {
        format!("sqlite:{}?mode=rwc", path)
    } else {
        format!("sqlite:{}", path)
    }
}

fn parse_user(input: &str) -> Result<UserId> {
    Uuid::parse_str(input).context("Invalid user id (expected a UUID)")
}

fn parse_txn_id(input: &str) -> Result<Uuid> {
    Uuid::parse_str(input).context("Invalid transaction id (expected a UUID)")
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
