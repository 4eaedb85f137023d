//! Abstract storage traits for the xledger gateway.
//!
//! Every backend (LMDB, in-memory for testing) implements these traits.
//! The gateway depends only on the traits.

pub mod address;
pub mod config;
pub mod error;
pub mod token;

pub use address::{AddressDirectory, LedgerAddress};
pub use config::{escrow_record_key, ConfigStore};
pub use error::StoreError;
pub use token::{TokenDirectory, TokenRecord};
