//! LMDB implementation of AddressDirectory.

use xledger_store::{AddressDirectory, LedgerAddress, StoreError};

use crate::{LmdbError, LmdbStore};

impl AddressDirectory for LmdbStore {
    fn address_of(&self, address: &str) -> Result<Option<LedgerAddress>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        match self
            .address_db
            .get(&rtxn, address)
            .map_err(LmdbError::from)?
        {
            Some(bytes) => {
                let record: LedgerAddress =
                    bincode::deserialize(bytes).map_err(LmdbError::from)?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn put_address(&self, record: &LedgerAddress) -> Result<(), StoreError> {
        let bytes = bincode::serialize(record).map_err(LmdbError::from)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.address_db
            .put(&mut wtxn, &record.address, &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }
}
