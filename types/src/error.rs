//! Parse errors for the shared types.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypesError {
    #[error("unknown ledger brand: {0}")]
    UnknownBrand(String),

    #[error("invalid wallet id: {0}")]
    InvalidWalletId(String),

    #[error("invalid transaction status: {0}")]
    InvalidStatus(String),
}
