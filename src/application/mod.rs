// Application layer: the ledger engine, the registration saga, the auth
// service surface, and the collaborator contracts they consume.

pub mod auth;
pub mod error;
pub mod ledger;
pub mod password;
pub mod saga;
pub mod tokens;

pub use auth::*;
pub use error::*;
pub use ledger::*;
pub use password::*;
pub use saga::*;
pub use tokens::*;
