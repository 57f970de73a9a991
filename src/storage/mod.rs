mod identity_store;
mod ledger_store;

pub use identity_store::*;
pub use ledger_store::*;

/// SQL migration for the billing database (wallets + transactions)
pub const MIGRATION_001_LEDGER: &str = include_str!("migrations/001_ledger.sql");

/// SQL migration for the auth database (users + refresh tokens)
pub const MIGRATION_001_IDENTITY: &str = include_str!("migrations/001_identity.sql");
