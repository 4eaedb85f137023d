use std::any::Any;

use thiserror::Error;
use xledger_ledger::LedgerError;
use xledger_store::StoreError;
use xledger_types::{ErrorDetails, ExtraData, WorkId};

use crate::DelegateKey;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GatewayError {
    #[error("access denied for operation {operation}")]
    AccessDenied { operation: String },

    #[error("no such ledger: {ledger_id}")]
    NoSuchLedger { ledger_id: String },

    #[error("no delegate implementation for {key}")]
    NoDelegateImplementation { key: DelegateKey },

    #[error("two delegates registered for {key}")]
    DuplicateDelegate { key: DelegateKey },

    #[error("ledger transport error: {0}")]
    Transport(String),

    #[error("malformed confirmation for {work_id}: {reason}")]
    MalformedConfirmation { work_id: WorkId, reason: String },

    #[error("{what} is not ready yet")]
    NotReady { what: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unknown token: {0}")]
    UnknownToken(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("internal error: {message}")]
    Internal {
        kind: String,
        message: String,
        trace: String,
    },
}

impl GatewayError {
    /// Wrap an unexpected error with its type name and source chain.
    pub fn internal<E: std::error::Error + 'static>(err: &E) -> Self {
        let mut trace = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            trace.push(format!("caused by: {cause}"));
            source = cause.source();
        }
        Self::Internal {
            kind: std::any::type_name::<E>().to_string(),
            message: err.to_string(),
            trace: trace.join("\n"),
        }
    }

    /// An internal error raised by the gateway itself.
    pub fn internal_msg(message: impl Into<String>) -> Self {
        Self::Internal {
            kind: "GatewayError".to_string(),
            message: message.into(),
            trace: String::new(),
        }
    }

    /// Wrap the payload of a panicking task.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "task panicked".to_string()
        };
        Self::Internal {
            kind: "panic".to_string(),
            message,
            trace: String::new(),
        }
    }

    /// Stable, user-visible error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AccessDenied { .. } => "gateway:access-denied",
            Self::NoSuchLedger { .. } => "gateway:no-such-ledger",
            Self::NoDelegateImplementation { .. } => "gateway:no-delegate-implementation",
            Self::DuplicateDelegate { .. } => "gateway:duplicate-delegate",
            Self::Transport(_) => "gateway:transport-error",
            Self::MalformedConfirmation { .. } => "gateway:malformed-confirmation",
            Self::NotReady { .. } => "gateway:not-ready",
            Self::InvalidInput(_) => "gateway:invalid-input",
            Self::UnknownToken(_) => "gateway:unknown-token",
            Self::Store(_) => "gateway:store-error",
            Self::Config(_) => "gateway:config-error",
            Self::Internal { .. } => "gateway:internal-error",
        }
    }

    /// Render as details safe to deliver to a caller.
    pub fn to_details(&self) -> ErrorDetails {
        let parameters = match self {
            Self::AccessDenied { operation } => ExtraData::new().with("operation", operation.as_str()),
            Self::NoSuchLedger { ledger_id } => ExtraData::new().with("ledgerId", ledger_id.as_str()),
            Self::NoDelegateImplementation { key } | Self::DuplicateDelegate { key } => {
                ExtraData::new()
                    .with("operation", key.operation.as_str())
                    .with("inputShape", key.shape.as_str())
                    .with("chainBrand", key.brand.as_str())
            }
            Self::MalformedConfirmation { work_id, reason } => ExtraData::new()
                .with("workId", work_id.as_str())
                .with("reason", reason.as_str()),
            Self::NotReady { what } => ExtraData::new().with("component", what.as_str()),
            Self::UnknownToken(symbol) => ExtraData::new().with("symbol", symbol.as_str()),
            Self::Internal {
                kind,
                message,
                trace,
            } => ExtraData::new()
                .with("kind", kind.as_str())
                .with("message", message.as_str())
                .with("description", self.to_string())
                .with("trace", trace.as_str()),
            Self::Transport(_) | Self::InvalidInput(_) | Self::Store(_) | Self::Config(_) => {
                ExtraData::new()
            }
        };
        ErrorDetails::new(self.code(), self.to_string()).with_parameters(parameters)
    }
}

impl From<LedgerError> for GatewayError {
    fn from(e: LedgerError) -> Self {
        if e.is_transient() {
            Self::Transport(e.to_string())
        } else {
            Self::internal(&e)
        }
    }
}

impl From<StoreError> for GatewayError {
    fn from(e: StoreError) -> Self {
        Self::Store(e.to_string())
    }
}

impl From<xledger_crypto::CryptoError> for GatewayError {
    fn from(e: xledger_crypto::CryptoError) -> Self {
        Self::internal(&e)
    }
}
