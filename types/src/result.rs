//! Transaction outcomes and user-visible error details.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{ExtraData, TypesError, WorkId};

/// Lifecycle status of a unit of submitted work.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TxStatus {
    Success,
    Failure,
    /// Accepted by the ledger, outcome not yet known.
    Pending,
    /// The outcome could not be determined.
    Unknown,
}

impl TxStatus {
    /// Whether this status ends the lifecycle of the work.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
            Self::Pending => "PENDING",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxStatus {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SUCCESS" => Ok(Self::Success),
            "FAILURE" => Ok(Self::Failure),
            "PENDING" => Ok(Self::Pending),
            "UNKNOWN" => Ok(Self::Unknown),
            _ => Err(TypesError::InvalidStatus(s.to_string())),
        }
    }
}

/// Outcome of a unit of work as reported to callers.
///
/// A `PENDING` result never travels alone: the gateway pairs it with a
/// continuation that resolves to the terminal outcome.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResult {
    pub work_id: WorkId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<u64>,
    pub status: TxStatus,
    #[serde(default, skip_serializing_if = "ExtraData::is_empty")]
    pub extra: ExtraData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TransactionResult {
    pub fn new(work_id: WorkId, block: Option<u64>, status: TxStatus) -> Self {
        Self {
            work_id,
            block,
            status,
            extra: ExtraData::new(),
            message: None,
        }
    }

    pub fn success(work_id: WorkId, block: u64, extra: ExtraData) -> Self {
        Self {
            extra,
            ..Self::new(work_id, Some(block), TxStatus::Success)
        }
    }

    pub fn failure(work_id: WorkId, block: Option<u64>, extra: ExtraData) -> Self {
        Self {
            extra,
            ..Self::new(work_id, block, TxStatus::Failure)
        }
    }

    /// `block` is the most recent block known when the work was accepted.
    pub fn pending(work_id: WorkId, block: Option<u64>) -> Self {
        Self::new(work_id, block, TxStatus::Pending)
    }

    pub fn unknown(work_id: WorkId, extra: ExtraData) -> Self {
        Self {
            extra,
            ..Self::new(work_id, None, TxStatus::Unknown)
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status == TxStatus::Pending
    }
}

/// Stable error code plus structured diagnostics, safe to show to callers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "ExtraData::is_empty")]
    pub parameters: ExtraData,
}

impl ErrorDetails {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            parameters: ExtraData::new(),
        }
    }

    pub fn with_parameters(mut self, parameters: ExtraData) -> Self {
        self.parameters = parameters;
        self
    }
}

impl fmt::Display for ErrorDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}
