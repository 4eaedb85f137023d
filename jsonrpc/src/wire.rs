//! JSON-RPC 2.0 envelopes and `eth_*` payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use xledger_ledger::{Confirmation, LedgerError};
use xledger_types::{BlockTime, ExtraData, WorkId};

#[derive(Debug, Serialize)]
pub struct RpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: Value,
}

impl<'a> RpcRequest<'a> {
    pub fn new(id: u64, method: &'a str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RpcErrorBody {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub error: Option<RpcErrorBody>,
}

impl RpcResponse {
    /// The `result` member, or the `error` member mapped to [`LedgerError::Rpc`].
    pub fn into_result(self) -> Result<Value, LedgerError> {
        match self.error {
            Some(err) => Err(LedgerError::Rpc {
                code: err.code,
                message: err.message,
            }),
            None => Ok(self.result),
        }
    }
}

/// Parse an Ethereum hex quantity such as `"0x1b4"`.
pub fn parse_quantity(s: &str) -> Result<u128, LedgerError> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| LedgerError::Malformed(format!("quantity without 0x prefix: {s}")))?;
    if digits.is_empty() {
        return Err(LedgerError::Malformed("empty quantity".into()));
    }
    u128::from_str_radix(digits, 16)
        .map_err(|e| LedgerError::Malformed(format!("bad quantity {s}: {e}")))
}

pub fn parse_u64(s: &str) -> Result<u64, LedgerError> {
    let n = parse_quantity(s)?;
    u64::try_from(n).map_err(|_| LedgerError::Malformed(format!("quantity out of range: {s}")))
}

pub fn to_quantity(n: u64) -> String {
    format!("0x{n:x}")
}

/// Subset of an `eth_getTransactionReceipt` result.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub transaction_hash: String,
    pub block_number: String,
    #[serde(default)]
    pub block_hash: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub contract_address: Option<String>,
    #[serde(default)]
    pub gas_used: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    /// BESU extension: ABI-encoded revert data.
    #[serde(default)]
    pub revert_reason: Option<String>,
}

impl Receipt {
    pub fn is_success(&self) -> bool {
        self.status.as_deref() == Some("0x1")
    }

    pub fn into_confirmation(self) -> Result<Confirmation, LedgerError> {
        let block = parse_u64(&self.block_number)?;
        let work_id = WorkId::new(self.transaction_hash.clone());
        if self.is_success() {
            let extra = ExtraData::new()
                .with("blockHash", self.block_hash)
                .with("blockNumber", block)
                .with("contractAddress", self.contract_address)
                .with("gasUsed", self.gas_used)
                .with("from", self.from)
                .with("to", self.to)
                .with("transactionHash", self.transaction_hash);
            Ok(Confirmation::success(work_id, block, extra))
        } else {
            let extra = ExtraData::new()
                .with("blockHash", self.block_hash)
                .with("status", self.status);
            Ok(Confirmation::failure(
                work_id,
                block,
                self.revert_reason,
                extra,
            ))
        }
    }
}

/// Subset of an `eth_getBlockByNumber` result.
#[derive(Debug, Deserialize)]
pub struct Block {
    pub number: String,
    pub timestamp: String,
}

impl Block {
    pub fn block_time(&self) -> Result<BlockTime, LedgerError> {
        Ok(BlockTime::new(
            parse_u64(&self.number)?,
            parse_u64(&self.timestamp)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn quantities_parse() {
        assert_eq!(parse_quantity("0x0").unwrap(), 0);
        assert_eq!(parse_quantity("0x1b4").unwrap(), 436);
        assert!(parse_quantity("1b4").is_err());
        assert!(parse_quantity("0x").is_err());
        assert!(parse_u64("0x1ffffffffffffffff").is_err());
        assert_eq!(to_quantity(436), "0x1b4");
    }

    #[test]
    fn rpc_error_is_mapped() {
        let resp: RpcResponse = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32000, "message": "nonce too low" }
        }))
        .unwrap();
        assert_eq!(
            resp.into_result().unwrap_err(),
            LedgerError::Rpc {
                code: -32000,
                message: "nonce too low".into()
            }
        );
    }

    #[test]
    fn null_result_is_kept() {
        let resp: RpcResponse =
            serde_json::from_value(json!({ "jsonrpc": "2.0", "id": 1, "result": null })).unwrap();
        assert!(resp.into_result().unwrap().is_null());
    }

    #[test]
    fn successful_receipt_becomes_success_confirmation() {
        let receipt: Receipt = serde_json::from_value(json!({
            "transactionHash": "0xabc",
            "blockNumber": "0x10",
            "blockHash": "0xb10c",
            "status": "0x1",
            "contractAddress": "0xc0ffee",
            "gasUsed": "0x5208"
        }))
        .unwrap();
        let c = receipt.into_confirmation().unwrap();
        assert!(c.success);
        assert_eq!(c.block, 16);
        assert_eq!(c.work_id.as_str(), "0xabc");
        assert_eq!(c.extra.get_str("contractAddress"), Some("0xc0ffee"));
        assert_eq!(c.extra.get_i64("blockNumber"), Some(16));
    }

    #[test]
    fn reverted_receipt_carries_reason() {
        let receipt: Receipt = serde_json::from_value(json!({
            "transactionHash": "0xabc",
            "blockNumber": "0x11",
            "status": "0x0",
            "revertReason": "0x4e487b71"
        }))
        .unwrap();
        let c = receipt.into_confirmation().unwrap();
        assert!(!c.success);
        assert_eq!(c.failure_reason.as_deref(), Some("0x4e487b71"));
        assert_eq!(c.extra.get_str("status"), Some("0x0"));
    }

    #[test]
    fn block_time_parses() {
        let block: Block =
            serde_json::from_value(json!({ "number": "0x64", "timestamp": "0x5f5e100" })).unwrap();
        assert_eq!(block.block_time().unwrap(), BlockTime::new(100, 100_000_000));
    }
}
