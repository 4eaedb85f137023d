use thiserror::Error;

/// Failure of a directory or config store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend failed: {0}")]
    Backend(String),

    #[error("stored record cannot be decoded: {0}")]
    Serialization(String),

    /// A record contradicts its own key or another record.
    #[error("inconsistent store: {0}")]
    Corruption(String),
}
