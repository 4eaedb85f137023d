//! Ledger-side collaborators of the gateway.
//!
//! - [`LedgerClient`]: the narrow interface every ledger brand implements
//! - [`revert`]: decoding of failure diagnostics embedded in confirmations
//! - [`block_time`]: interpolation search from wall-clock time to block number
//! - [`RecentBlockCache`]: short-lived cache of the most recent block number

pub mod block_time;
pub mod client;
pub mod error;
pub mod recent_block;
pub mod revert;

pub use block_time::{find_block, BlockTimeFetcher, ClientFetcher};
pub use client::{Confirmation, LedgerCall, LedgerClient};
pub use error::LedgerError;
pub use recent_block::RecentBlockCache;
pub use revert::decode_failure_reason;
