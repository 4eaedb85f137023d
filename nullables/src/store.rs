//! Nullable stores: thread-safe in-memory storage for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use xledger_store::{
    AddressDirectory, ConfigStore, LedgerAddress, StoreError, TokenDirectory, TokenRecord,
};

/// An in-memory [`ConfigStore`].
#[derive(Default)]
pub struct NullConfigStore {
    values: Mutex<HashMap<String, String>>,
    writes: AtomicUsize,
    fail_reads: AtomicBool,
}

impl NullConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `put`/`put_if_absent` writes so far. Deletes are not counted.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every subsequent read fail with a backend error.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> HashMap<String, String> {
        self.values.lock().clone()
    }
}

impl ConfigStore for NullConfigStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("simulated read failure".into()));
        }
        Ok(self.values.lock().get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values.lock().insert(key.to_string(), value.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn put_if_absent(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        let mut values = self.values.lock();
        if values.contains_key(key) {
            return Ok(false);
        }
        values.insert(key.to_string(), value.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.values.lock().remove(key);
        Ok(())
    }
}

/// An in-memory address and token directory.
#[derive(Default)]
pub struct NullDirectory {
    addresses: Mutex<HashMap<String, LedgerAddress>>,
    tokens: Mutex<HashMap<String, TokenRecord>>,
}

impl NullDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_address(self, record: LedgerAddress) -> Self {
        self.addresses.lock().insert(record.address.clone(), record);
        self
    }

    pub fn with_token(self, record: TokenRecord) -> Self {
        self.tokens.lock().insert(record.symbol.clone(), record);
        self
    }
}

impl AddressDirectory for NullDirectory {
    fn address_of(&self, address: &str) -> Result<Option<LedgerAddress>, StoreError> {
        Ok(self.addresses.lock().get(address).cloned())
    }

    fn put_address(&self, record: &LedgerAddress) -> Result<(), StoreError> {
        self.addresses
            .lock()
            .insert(record.address.clone(), record.clone());
        Ok(())
    }
}

impl TokenDirectory for NullDirectory {
    fn token_of(&self, symbol: &str) -> Result<Option<TokenRecord>, StoreError> {
        Ok(self.tokens.lock().get(symbol).cloned())
    }

    fn persist_token_state(&self, symbol: &str, record: &TokenRecord) -> Result<(), StoreError> {
        self.tokens.lock().insert(symbol.to_string(), record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_if_absent_only_writes_once() {
        let store = NullConfigStore::new();
        assert!(store.put_if_absent("k", "a").unwrap());
        assert!(!store.put_if_absent("k", "b").unwrap());
        assert_eq!(store.get("k").unwrap().as_deref(), Some("a"));
        assert_eq!(store.writes(), 1);
    }

    #[test]
    fn simulated_read_failure() {
        let store = NullConfigStore::new();
        store.fail_reads(true);
        assert!(matches!(store.get("k"), Err(StoreError::Backend(_))));
    }
}
