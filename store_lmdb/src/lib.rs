//! LMDB storage backend for the xledger gateway.
//!
//! Implements the `xledger-store` traits using the `heed` LMDB bindings.
//! Each logical store maps to one named database within a single environment.

pub mod address;
pub mod config;
pub mod environment;
pub mod error;
pub mod token;

pub use environment::{LmdbEnvironment, LmdbStore};
pub use error::LmdbError;
