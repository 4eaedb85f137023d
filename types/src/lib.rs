//! Fundamental types for the xledger gateway.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! ledger brands, work identifiers, transaction results and their extra-data bag,
//! key material, and timestamps.

pub mod brand;
pub mod error;
pub mod extra;
pub mod keys;
pub mod result;
pub mod time;
pub mod work;

pub use brand::{ChainBrand, INTERNAL_LEDGER};
pub use error::TypesError;
pub use extra::{ExtraData, ExtraValue};
pub use keys::{KeyPair, PrivateKey, PublicKey};
pub use result::{ErrorDetails, TransactionResult, TxStatus};
pub use time::{BlockTime, Timestamp};
pub use work::{WalletId, WorkId};
