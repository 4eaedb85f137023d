//! LMDB implementation of ConfigStore.

use xledger_store::{ConfigStore, StoreError};

use crate::{LmdbError, LmdbStore};

impl ConfigStore for LmdbStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let val = self
            .config_db
            .get(&rtxn, key)
            .map_err(LmdbError::from)?
            .map(str::to_string);
        Ok(val)
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.config_db
            .put(&mut wtxn, key, value)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn put_if_absent(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        // LMDB allows one write transaction at a time across every process
        // sharing the environment, so the check and the put cannot interleave.
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        if self
            .config_db
            .get(&wtxn, key)
            .map_err(LmdbError::from)?
            .is_some()
        {
            return Ok(false);
        }
        self.config_db
            .put(&mut wtxn, key, value)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        tracing::debug!(key, "config record created");
        Ok(true)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.config_db
            .delete(&mut wtxn, key)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }
}
