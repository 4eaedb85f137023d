//! JSON-RPC client for Ethereum-compatible ledgers.
//!
//! Implements [`xledger_ledger::LedgerClient`] over the standard `eth_*`
//! methods exposed by BESU nodes.

pub mod client;
pub mod settings;
pub mod wire;

pub use client::JsonRpcClient;
pub use settings::JsonRpcSettings;
