//! Nullable infrastructure for deterministic testing.
//!
//! Every external collaborator of the gateway (ledger client, persisted
//! config store, address and token directories) has an in-memory stand-in
//! here that:
//! - Returns deterministic values
//! - Can be scripted and inspected programmatically
//! - Never touches the filesystem or network

pub mod ledger;
pub mod store;

pub use ledger::NullLedger;
pub use store::{NullConfigStore, NullDirectory};
