//! LMDB implementation of TokenDirectory.

use xledger_store::{StoreError, TokenDirectory, TokenRecord};

use crate::{LmdbError, LmdbStore};

impl TokenDirectory for LmdbStore {
    fn token_of(&self, symbol: &str) -> Result<Option<TokenRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        match self.token_db.get(&rtxn, symbol).map_err(LmdbError::from)? {
            Some(bytes) => {
                let record: TokenRecord = bincode::deserialize(bytes).map_err(LmdbError::from)?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn persist_token_state(&self, symbol: &str, record: &TokenRecord) -> Result<(), StoreError> {
        if record.symbol != symbol {
            return Err(StoreError::Corruption(format!(
                "token record for '{}' stored under '{}'",
                record.symbol, symbol
            )));
        }
        let bytes = bincode::serialize(record).map_err(LmdbError::from)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.token_db
            .put(&mut wtxn, symbol, &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }
}
