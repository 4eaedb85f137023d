//! LMDB environment setup.

use std::path::Path;

use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvOpenOptions};

use crate::LmdbError;

/// Default map size: 1 GiB is plenty for configuration and directory records.
pub const DEFAULT_MAP_SIZE: usize = 1 << 30;

const MAX_DBS: u32 = 8;

/// Wraps the LMDB environment.
pub struct LmdbEnvironment {
    env: Env,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given directory.
    pub fn open(path: &Path, max_dbs: u32, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path).map_err(|e| LmdbError::Heed(e.to_string()))?;
        // SAFETY: the environment is opened once per process for this path and
        // never concurrently re-opened from the same process.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(max_dbs)
                .open(path)?
        };
        Ok(Self { env })
    }

    pub fn env(&self) -> &Env {
        &self.env
    }
}

/// All gateway stores backed by one LMDB environment.
pub struct LmdbStore {
    pub(crate) env: Env,
    pub(crate) config_db: Database<Str, Str>,
    pub(crate) address_db: Database<Str, Bytes>,
    pub(crate) token_db: Database<Str, Bytes>,
}

impl LmdbStore {
    /// Open (creating if needed) the gateway databases under `path`.
    pub fn open(path: &Path) -> Result<Self, LmdbError> {
        Self::open_with_map_size(path, DEFAULT_MAP_SIZE)
    }

    pub fn open_with_map_size(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        let environment = LmdbEnvironment::open(path, MAX_DBS, map_size)?;
        let env = environment.env().clone();

        let mut wtxn = env.write_txn()?;
        let config_db = env.create_database::<Str, Str>(&mut wtxn, Some("config"))?;
        let address_db = env.create_database::<Str, Bytes>(&mut wtxn, Some("addresses"))?;
        let token_db = env.create_database::<Str, Bytes>(&mut wtxn, Some("tokens"))?;
        wtxn.commit()?;

        tracing::debug!(path = %path.display(), "opened LMDB store");
        Ok(Self {
            env,
            config_db,
            address_db,
            token_db,
        })
    }
}
