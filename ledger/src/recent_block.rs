//! Short-lived cache of a ledger's most recent block number.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::LedgerClient;

#[derive(Clone, Copy, Debug)]
struct Cached {
    block: u64,
    fetched_at: Instant,
}

/// Caches the latest block number of one ledger for `ttl`.
///
/// Concurrent callers share a single refresh: the lock is held across the
/// fetch so an expired entry is refreshed once, not once per caller.
#[derive(Debug)]
pub struct RecentBlockCache {
    ttl: Duration,
    state: Mutex<Option<Cached>>,
}

impl RecentBlockCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: Mutex::new(None),
        }
    }

    /// The most recent block number, refreshed from `client` when stale.
    ///
    /// A failed refresh falls back to the previous value, if any.
    pub async fn get(&self, client: &dyn LedgerClient) -> Option<u64> {
        let mut state = self.state.lock().await;
        if let Some(cached) = *state {
            if cached.fetched_at.elapsed() < self.ttl {
                return Some(cached.block);
            }
        }
        match client.block_number().await {
            Ok(block) => {
                *state = Some(Cached {
                    block,
                    fetched_at: Instant::now(),
                });
                Some(block)
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to refresh recent block number");
                (*state).map(|c| c.block)
            }
        }
    }

    /// Peek at the cached value without refreshing.
    pub async fn cached(&self) -> Option<u64> {
        let state = *self.state.lock().await;
        state.map(|c| c.block)
    }
}
