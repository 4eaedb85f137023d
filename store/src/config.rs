//! Persisted key-value configuration store.

use xledger_types::ChainBrand;

use crate::StoreError;

/// Small string key-value store for records that must survive restarts,
/// such as the escrow bootstrap record.
pub trait ConfigStore: Send + Sync {
    /// Fetch a value, `None` when the key is absent.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store a value, replacing any previous one.
    fn put(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Store a value only when the key is absent.
    ///
    /// Returns `true` when this call wrote the value. The check and the write
    /// are atomic with respect to every other writer of the same store.
    fn put_if_absent(&self, key: &str, value: &str) -> Result<bool, StoreError>;

    fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Key of the escrow bootstrap record for one ledger instance.
pub fn escrow_record_key(brand: ChainBrand, ledger_id: &str) -> String {
    format!("{brand}:{ledger_id}:escrow:contract-address")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escrow_key_format() {
        assert_eq!(
            escrow_record_key(ChainBrand::Besu, "main"),
            "BESU:main:escrow:contract-address"
        );
    }
}
