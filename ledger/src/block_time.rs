//! Mapping wall-clock time to a block number.
//!
//! Block times come from a remote ledger, so the search estimates the next
//! probe from the average block rate of the current bracket instead of
//! bisecting. On a ledger with a steady block rate this finds the block in
//! one or two round trips.

use async_trait::async_trait;
use xledger_types::{BlockTime, Timestamp};

use crate::{LedgerClient, LedgerError};

/// Source of block times for [`find_block`].
#[async_trait]
pub trait BlockTimeFetcher: Send + Sync {
    /// The most recent block and its time.
    async fn latest(&self) -> Result<BlockTime, LedgerError>;

    /// Time of block `block`.
    async fn time_of(&self, block: u64) -> Result<Timestamp, LedgerError>;
}

/// Adapts a [`LedgerClient`] into a [`BlockTimeFetcher`].
pub struct ClientFetcher<'a>(pub &'a dyn LedgerClient);

#[async_trait]
impl BlockTimeFetcher for ClientFetcher<'_> {
    async fn latest(&self) -> Result<BlockTime, LedgerError> {
        self.0.latest_block().await
    }

    async fn time_of(&self, block: u64) -> Result<Timestamp, LedgerError> {
        Ok(self.0.block_time(block).await?.time)
    }
}

/// Find the last block at or before `target`, searching no earlier than `horizon`.
///
/// The result is clamped to `[horizon, latest]`. Block times are assumed to be
/// non-decreasing in block number.
pub async fn find_block<F>(horizon: u64, target: Timestamp, fetcher: &F) -> Result<u64, LedgerError>
where
    F: BlockTimeFetcher + ?Sized,
{
    let mut high = fetcher.latest().await?;
    if target >= high.time || horizon >= high.block {
        return Ok(high.block);
    }

    let mut low = BlockTime {
        block: horizon,
        time: fetcher.time_of(horizon).await?,
    };
    if target <= low.time {
        return Ok(horizon);
    }

    // Invariant: low.time < target < high.time, so the bracket never has zero duration.
    let mut probes = 0u32;
    while high.block - low.block > 1 {
        let gap = (high.block - low.block) as f64;
        let gap_time = (high.time.as_secs() - low.time.as_secs()) as f64;
        let rate = gap / gap_time;
        let offset = (rate * (target.as_secs() - low.time.as_secs()) as f64) as u64;

        // Never re-test the low bound, and never probe the known high bound.
        let test = (low.block + offset).clamp(low.block + 1, high.block - 1);

        let time = fetcher.time_of(test).await?;
        probes += 1;
        if target < time {
            high = BlockTime { block: test, time };
        } else if target > time {
            low = BlockTime { block: test, time };
        } else {
            tracing::trace!(block = test, probes, "exact block time match");
            return Ok(test);
        }
    }

    tracing::trace!(block = low.block, probes, "block for time resolved");
    Ok(low.block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// A ledger whose block `b` was produced at `times[b]`.
    struct SyntheticChain {
        times: Vec<u64>,
        fetches: AtomicU32,
    }

    impl SyntheticChain {
        fn new(times: Vec<u64>) -> Self {
            Self {
                times,
                fetches: AtomicU32::new(0),
            }
        }

        fn steady(blocks: u64, start: u64, period: u64) -> Self {
            Self::new((0..blocks).map(|b| start + b * period).collect())
        }

        /// Reference answer: greatest b >= h with t(b) <= target, clamped.
        fn expected(&self, horizon: u64, target: u64) -> u64 {
            let latest = self.times.len() as u64 - 1;
            if horizon >= latest {
                return latest;
            }
            (horizon..=latest)
                .rev()
                .find(|b| self.times[*b as usize] <= target)
                .unwrap_or(horizon)
        }
    }

    #[async_trait]
    impl BlockTimeFetcher for SyntheticChain {
        async fn latest(&self) -> Result<BlockTime, LedgerError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let block = self.times.len() as u64 - 1;
            Ok(BlockTime::new(block, self.times[block as usize]))
        }

        async fn time_of(&self, block: u64) -> Result<Timestamp, LedgerError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.times
                .get(block as usize)
                .map(|t| Timestamp::new(*t))
                .ok_or_else(|| LedgerError::Malformed(format!("no block {block}")))
        }
    }

    fn run<F: std::future::Future>(fut: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(fut)
    }

    #[tokio::test]
    async fn target_after_latest_returns_latest() {
        let chain = SyntheticChain::steady(500, 1_000, 2);
        let block = find_block(100, Timestamp::new(1_000_000), &chain).await.unwrap();
        assert_eq!(block, 499);
    }

    #[tokio::test]
    async fn target_before_horizon_returns_horizon() {
        let chain = SyntheticChain::steady(500, 1_000, 2);
        let block = find_block(100, Timestamp::new(1_050), &chain).await.unwrap();
        assert_eq!(block, 100);
    }

    #[tokio::test]
    async fn steady_chain_resolves_with_few_fetches() {
        let chain = SyntheticChain::steady(100_000, 1_000, 5);
        let target = 1_000 + 73_210 * 5 + 3;
        let block = find_block(1, Timestamp::new(target), &chain).await.unwrap();
        assert_eq!(block, 73_210);
        // latest + horizon + a handful of probes, far fewer than bisection's ~17.
        assert!(chain.fetches.load(Ordering::SeqCst) <= 6);
    }

    #[tokio::test]
    async fn exact_time_match_returns_that_block() {
        let chain = SyntheticChain::steady(1_000, 0, 10);
        let block = find_block(1, Timestamp::new(4_560), &chain).await.unwrap();
        assert_eq!(block, 456);
    }

    #[tokio::test]
    async fn horizon_beyond_latest_returns_latest() {
        let chain = SyntheticChain::steady(50, 0, 10);
        let block = find_block(80, Timestamp::new(100), &chain).await.unwrap();
        assert_eq!(block, 49);
    }

    #[tokio::test]
    async fn fetch_error_is_propagated() {
        struct Broken;

        #[async_trait]
        impl BlockTimeFetcher for Broken {
            async fn latest(&self) -> Result<BlockTime, LedgerError> {
                Err(LedgerError::Transport("connection refused".into()))
            }

            async fn time_of(&self, _block: u64) -> Result<Timestamp, LedgerError> {
                unreachable!()
            }
        }

        let err = find_block(1, Timestamp::new(5), &Broken).await.unwrap_err();
        assert!(matches!(err, LedgerError::Transport(_)));
    }

    proptest! {
        #[test]
        fn finds_greatest_block_not_after_target(
            gaps in proptest::collection::vec(1u64..40, 2..400),
            horizon_frac in 0.0f64..1.0,
            target_frac in -0.1f64..1.1,
        ) {
            let mut times = Vec::with_capacity(gaps.len());
            let mut t = 1_600_000_000u64;
            for gap in &gaps {
                t += gap;
                times.push(t);
            }
            let chain = SyntheticChain::new(times);
            let latest = chain.times.len() as u64 - 1;
            let horizon = (horizon_frac * latest as f64) as u64;
            let first = chain.times[0] as f64;
            let span = (chain.times[latest as usize] - chain.times[0]) as f64;
            let target = (first + target_frac * span).max(0.0) as u64;

            let found = run(find_block(horizon, Timestamp::new(target), &chain)).unwrap();
            prop_assert_eq!(found, chain.expected(horizon, target));
        }
    }
}
