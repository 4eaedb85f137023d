//! Ledger client factories known to the daemon.

use std::sync::Arc;

use xledger_gateway::{GatewayError, LedgerClientFactory, LedgerSettings};
use xledger_jsonrpc::{JsonRpcClient, JsonRpcSettings};
use xledger_ledger::LedgerClient;
use xledger_types::ChainBrand;

/// BESU ledgers, reached over Ethereum JSON-RPC.
pub struct BesuClientFactory;

impl LedgerClientFactory for BesuClientFactory {
    fn brand(&self) -> ChainBrand {
        ChainBrand::Besu
    }

    fn create(&self, settings: &LedgerSettings) -> Result<Arc<dyn LedgerClient>, GatewayError> {
        let rpc: JsonRpcSettings = settings.params.clone().try_into().map_err(|e| {
            GatewayError::Config(format!("ledger {}: invalid params: {e}", settings.id))
        })?;
        tracing::info!(ledger = %settings.id, address = %rpc.address, "JSON-RPC ledger client");
        Ok(Arc::new(JsonRpcClient::new(rpc)))
    }
}
