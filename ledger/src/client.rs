//! The ledger client collaborator interface.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use xledger_types::{BlockTime, ExtraData, PublicKey, WorkId};

use crate::{decode_failure_reason, LedgerError};

/// A call the gateway asks a ledger to execute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LedgerCall {
    /// Deploy the shared escrow contract, owned by `owner`.
    DeployEscrow { owner: PublicKey },
    /// Execute an already encoded call on behalf of `from`.
    Invoke { from: String, data: Vec<u8> },
}

impl LedgerCall {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DeployEscrow { .. } => "deploy-escrow",
            Self::Invoke { .. } => "invoke",
        }
    }
}

/// The ledger's authoritative answer about previously submitted work.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Confirmation {
    pub work_id: WorkId,
    pub success: bool,
    pub block: u64,
    /// Failure diagnostics as reported by the ledger, possibly still encoded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub extra: ExtraData,
}

impl Confirmation {
    pub fn success(work_id: WorkId, block: u64, extra: ExtraData) -> Self {
        Self {
            work_id,
            success: true,
            block,
            failure_reason: None,
            extra,
        }
    }

    pub fn failure(work_id: WorkId, block: u64, reason: Option<String>, extra: ExtraData) -> Self {
        Self {
            work_id,
            success: false,
            block,
            failure_reason: reason,
            extra,
        }
    }

    /// Replace an encoded failure reason with its readable form.
    ///
    /// Absent or unparsable reasons are left unchanged.
    pub fn decode_failure_reason(&mut self) {
        if let Some(decoded) = self.failure_reason.as_deref().and_then(decode_failure_reason) {
            self.failure_reason = Some(decoded);
        }
    }
}

/// Narrow interface to one ledger instance.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Submit a call and return the identifier of the resulting work.
    async fn submit(&self, call: LedgerCall) -> Result<WorkId, LedgerError>;

    /// The confirmation of `work_id`, `None` while the ledger has not decided.
    async fn confirmation_of(&self, work_id: &WorkId) -> Result<Option<Confirmation>, LedgerError>;

    /// Whether the ledger has seen `work_id` at all, decided or not.
    async fn is_known(&self, work_id: &WorkId) -> Result<bool, LedgerError>;

    /// Number of the most recent block.
    async fn block_number(&self) -> Result<u64, LedgerError>;

    /// Number and time of the most recent block.
    async fn latest_block(&self) -> Result<BlockTime, LedgerError>;

    /// Time stamped on block `block`.
    async fn block_time(&self, block: u64) -> Result<BlockTime, LedgerError>;

    /// The fee (e.g. gas price) the ledger currently charges per unit of work.
    async fn fee_policy(&self) -> Result<u128, LedgerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_rewrites_encoded_reason() {
        let encoded = format!(
            "0x4e487b71{}",
            "0000000000000000000000000000000000000000000000000000000000000012"
        );
        let mut c = Confirmation::failure(WorkId::new("0x1"), 9, Some(encoded), ExtraData::new());
        c.decode_failure_reason();
        assert_eq!(
            c.failure_reason.as_deref(),
            Some("PANIC: division by zero (or modulo zero) (0x12)")
        );
    }

    #[test]
    fn decode_keeps_plain_reason() {
        let mut c = Confirmation::failure(
            WorkId::new("0x1"),
            9,
            Some("out of gas".into()),
            ExtraData::new(),
        );
        c.decode_failure_reason();
        assert_eq!(c.failure_reason.as_deref(), Some("out of gas"));
    }
}
