use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("ledger rejected request ({code}): {message}")]
    Rpc { code: i64, message: String },

    #[error("operation not supported by this ledger client: {0}")]
    Unsupported(String),

    #[error("malformed ledger response: {0}")]
    Malformed(String),
}

impl LedgerError {
    /// Whether the failure is worth retrying on a later poll.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Rpc { .. })
    }
}
