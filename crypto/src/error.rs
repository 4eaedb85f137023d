use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("system random source failed: {0}")]
    Random(String),

    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("expected {expected} bytes of key material, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}
