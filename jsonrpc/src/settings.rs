//! Per-ledger connection settings.

use serde::{Deserialize, Serialize};

/// Connection settings for one JSON-RPC ledger, read from the ledger's
/// `params` table in the gateway configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRpcSettings {
    #[serde(default = "default_address")]
    pub address: String,

    #[serde(default = "default_chain_id")]
    pub chain_id: u64,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Node-managed account that pays for the escrow deployment.
    #[serde(default)]
    pub sender: Option<String>,

    /// Hex creation bytecode of the escrow contract.
    #[serde(default)]
    pub escrow_bytecode: Option<String>,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_address() -> String {
    "http://localhost:8545/".to_string()
}

fn default_chain_id() -> u64 {
    1337
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl Default for JsonRpcSettings {
    fn default() -> Self {
        Self {
            address: default_address(),
            chain_id: default_chain_id(),
            timeout_ms: default_timeout_ms(),
            sender: None,
            escrow_bytecode: None,
        }
    }
}
