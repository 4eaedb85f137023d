//! Token directory trait.

use serde::{Deserialize, Serialize};
use xledger_types::{ChainBrand, Timestamp};

use crate::StoreError;

/// A token (asset class) registered with the gateway.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub symbol: String,
    pub name: String,
    pub brand: ChainBrand,
    pub ledger_id: Option<String>,
    /// Address that controls the token on its ledger.
    pub controller: String,
    /// Set while the token's on-ledger state is still being loaded.
    pub loading: bool,
    /// Block in which the token contract was created, when known.
    pub creation_block: Option<u64>,
    /// On-ledger contract identity, when deployed.
    pub contract: Option<String>,
    pub created_at: Timestamp,
}

/// Lookup and persistence of token records.
pub trait TokenDirectory: Send + Sync {
    /// `None` when the symbol is unknown.
    fn token_of(&self, symbol: &str) -> Result<Option<TokenRecord>, StoreError>;

    fn persist_token_state(&self, symbol: &str, record: &TokenRecord) -> Result<(), StoreError>;
}
