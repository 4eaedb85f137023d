//! [`LedgerClient`] over Ethereum JSON-RPC.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use xledger_ledger::{Confirmation, LedgerCall, LedgerClient, LedgerError};
use xledger_types::{BlockTime, PublicKey, WorkId};

use crate::wire::{self, Block, Receipt, RpcRequest, RpcResponse};
use crate::JsonRpcSettings;

/// HTTP JSON-RPC client for one BESU (or other Ethereum-compatible) node.
pub struct JsonRpcClient {
    settings: JsonRpcSettings,
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(settings: JsonRpcSettings) -> Self {
        Self {
            settings,
            client: reqwest::Client::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn settings(&self) -> &JsonRpcSettings {
        &self.settings
    }

    /// Perform one JSON-RPC call and return its raw `result`.
    async fn call(&self, method: &str, params: Value) -> Result<Value, LedgerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest::new(id, method, params);
        let resp = self
            .client
            .post(&self.settings.address)
            .timeout(Duration::from_millis(self.settings.timeout_ms))
            .json(&request)
            .send()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(LedgerError::Transport(format!(
                "HTTP {} from {}",
                resp.status(),
                self.settings.address
            )));
        }

        let body: RpcResponse = resp
            .json()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?;
        tracing::trace!(method, id, "json-rpc call completed");
        body.into_result()
    }

    async fn call_as<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, LedgerError> {
        let value = self.call(method, params).await?;
        serde_json::from_value(value)
            .map_err(|e| LedgerError::Malformed(format!("{method}: {e}")))
    }

    async fn block_by_number(&self, tag: String) -> Result<BlockTime, LedgerError> {
        let block: Option<Block> = self
            .call_as("eth_getBlockByNumber", json!([tag, false]))
            .await?;
        block
            .ok_or_else(|| LedgerError::Malformed(format!("block {tag} not found")))?
            .block_time()
    }

    fn deployment_data(&self, owner: &PublicKey) -> Result<(String, String), LedgerError> {
        let sender = self.settings.sender.clone().ok_or_else(|| {
            LedgerError::Unsupported("escrow deployment needs a configured sender".into())
        })?;
        let bytecode = self.settings.escrow_bytecode.as_deref().ok_or_else(|| {
            LedgerError::Unsupported("escrow deployment needs configured bytecode".into())
        })?;
        let bytecode = bytecode.strip_prefix("0x").unwrap_or(bytecode);
        // The owner key is the single bytes32 constructor argument.
        Ok((sender, format!("0x{bytecode}{}", hex::encode(owner.as_bytes()))))
    }
}

#[async_trait]
impl LedgerClient for JsonRpcClient {
    async fn submit(&self, call: LedgerCall) -> Result<WorkId, LedgerError> {
        let hash: String = match call {
            LedgerCall::DeployEscrow { owner } => {
                let (from, data) = self.deployment_data(&owner)?;
                self.call_as("eth_sendTransaction", json!([{ "from": from, "data": data }]))
                    .await?
            }
            LedgerCall::Invoke { from, data } => {
                tracing::debug!(%from, bytes = data.len(), "submitting raw transaction");
                self.call_as(
                    "eth_sendRawTransaction",
                    json!([format!("0x{}", hex::encode(data))]),
                )
                .await?
            }
        };
        Ok(WorkId::new(hash))
    }

    async fn confirmation_of(&self, work_id: &WorkId) -> Result<Option<Confirmation>, LedgerError> {
        let receipt: Option<Receipt> = self
            .call_as("eth_getTransactionReceipt", json!([work_id.as_str()]))
            .await?;
        receipt.map(Receipt::into_confirmation).transpose()
    }

    async fn is_known(&self, work_id: &WorkId) -> Result<bool, LedgerError> {
        // Null for hashes the node has neither mined nor holds in its pool.
        let tx: Value = self
            .call("eth_getTransactionByHash", json!([work_id.as_str()]))
            .await?;
        Ok(!tx.is_null())
    }

    async fn block_number(&self) -> Result<u64, LedgerError> {
        let n: String = self.call_as("eth_blockNumber", json!([])).await?;
        wire::parse_u64(&n)
    }

    async fn latest_block(&self) -> Result<BlockTime, LedgerError> {
        self.block_by_number("latest".to_string()).await
    }

    async fn block_time(&self, block: u64) -> Result<BlockTime, LedgerError> {
        self.block_by_number(wire::to_quantity(block)).await
    }

    async fn fee_policy(&self) -> Result<u128, LedgerError> {
        let price: String = self.call_as("eth_gasPrice", json!([])).await?;
        wire::parse_quantity(&price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deployment_appends_owner_key() {
        let client = JsonRpcClient::new(JsonRpcSettings {
            sender: Some("0xfe".into()),
            escrow_bytecode: Some("0x6080".into()),
            ..JsonRpcSettings::default()
        });
        let (from, data) = client.deployment_data(&PublicKey([0xaa; 32])).unwrap();
        assert_eq!(from, "0xfe");
        assert_eq!(data, format!("0x6080{}", "aa".repeat(32)));
    }

    #[test]
    fn deployment_without_bytecode_is_unsupported() {
        let client = JsonRpcClient::new(JsonRpcSettings {
            sender: Some("0xfe".into()),
            ..JsonRpcSettings::default()
        });
        assert!(matches!(
            client.deployment_data(&PublicKey([0; 32])),
            Err(LedgerError::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_node_is_a_transport_error() {
        let client = JsonRpcClient::new(JsonRpcSettings {
            address: "http://127.0.0.1:1/".into(),
            timeout_ms: 500,
            ..JsonRpcSettings::default()
        });
        let err = client.block_number().await.unwrap_err();
        assert!(matches!(err, LedgerError::Transport(_)));
        assert!(err.is_transient());
    }
}
