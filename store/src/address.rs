//! Address directory trait.

use serde::{Deserialize, Serialize};
use xledger_types::{ChainBrand, WalletId};

use crate::StoreError;

/// An address known to the gateway and the ledger it lives on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerAddress {
    pub address: String,
    /// `None` means the configured default ledger.
    pub ledger_id: Option<String>,
    pub brand: ChainBrand,
    pub wallet_id: WalletId,
}

/// Lookup of addresses managed by the gateway.
pub trait AddressDirectory: Send + Sync {
    /// `None` when the address is unknown.
    fn address_of(&self, address: &str) -> Result<Option<LedgerAddress>, StoreError>;

    fn put_address(&self, record: &LedgerAddress) -> Result<(), StoreError>;
}
