//! Gateway configuration with TOML file support.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use xledger_types::{ChainBrand, INTERNAL_LEDGER};

use crate::{GatewayError, LogFormat};

/// Configuration of one gateway process.
///
/// Loaded from a TOML file via [`GatewayConfig::from_toml_file`] or built
/// programmatically (e.g. for tests).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub log_format: LogFormat,

    /// Log level filter, e.g. `"info"` or `"debug,xledger_gateway=trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Directory of the persisted store.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Period of the receipt scan, in milliseconds.
    #[serde(default = "default_scan_interval_ms")]
    pub scan_interval_ms: u64,

    /// Receipt callbacks that may run at the same time.
    #[serde(default = "default_callback_workers")]
    pub callback_workers: usize,

    #[serde(default = "default_recent_block_ttl_ms")]
    pub recent_block_ttl_ms: u64,

    /// Longest chain of continuations followed for one request.
    #[serde(default = "default_max_continuation_depth")]
    pub max_continuation_depth: u32,

    /// Confirmations remembered per ledger after dispatch.
    #[serde(default = "default_recent_receipts")]
    pub recent_receipts: usize,

    #[serde(default)]
    pub ledgers: Vec<LedgerSettings>,
}

/// One configured ledger.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerSettings {
    pub id: String,
    pub brand: ChainBrand,

    /// Serves requests that name no ledger.
    #[serde(default)]
    pub default: bool,

    /// Present when the ledger hosts the shared escrow contract.
    #[serde(default)]
    pub escrow: Option<EscrowSettings>,

    /// Brand-specific client settings, handed to the brand's client factory.
    #[serde(default)]
    pub params: toml::Table,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowSettings {
    /// Fee the ledger must charge before an escrow contract is deployed.
    #[serde(default)]
    pub expected_fee: u64,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./xledger_data")
}

fn default_scan_interval_ms() -> u64 {
    3_600
}

fn default_callback_workers() -> usize {
    8
}

fn default_recent_block_ttl_ms() -> u64 {
    10_000
}

fn default_max_continuation_depth() -> u32 {
    4
}

fn default_recent_receipts() -> usize {
    1_024
}

// ── Impl ───────────────────────────────────────────────────────────────

impl GatewayConfig {
    pub fn from_toml_file(path: &str) -> Result<Self, GatewayError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| GatewayError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate.
    pub fn from_toml_str(s: &str) -> Result<Self, GatewayError> {
        let config: Self = toml::from_str(s).map_err(|e| GatewayError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, GatewayError> {
        toml::to_string_pretty(self).map_err(|e| GatewayError::Config(e.to_string()))
    }

    /// Reject ambiguous ledger tables and nonsensical limits.
    pub fn validate(&self) -> Result<(), GatewayError> {
        let mut seen = HashSet::new();
        for ledger in &self.ledgers {
            if ledger.id.is_empty() {
                return Err(GatewayError::Config("ledger id must not be empty".into()));
            }
            if ledger.id == INTERNAL_LEDGER {
                return Err(GatewayError::Config(format!(
                    "ledger id {INTERNAL_LEDGER} is reserved"
                )));
            }
            if !seen.insert(ledger.id.as_str()) {
                return Err(GatewayError::Config(format!(
                    "ledger {} configured twice",
                    ledger.id
                )));
            }
        }

        let defaults: Vec<&str> = self
            .ledgers
            .iter()
            .filter(|l| l.default)
            .map(|l| l.id.as_str())
            .collect();
        if defaults.len() > 1 {
            return Err(GatewayError::Config(format!(
                "more than one default ledger: {}",
                defaults.join(", ")
            )));
        }

        if self.scan_interval_ms == 0 {
            return Err(GatewayError::Config("scan_interval_ms must be positive".into()));
        }
        if self.max_continuation_depth == 0 {
            return Err(GatewayError::Config(
                "max_continuation_depth must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Id of the ledger serving requests that name none.
    ///
    /// The flagged ledger, else the first configured one, else the internal ledger.
    pub fn default_ledger_id(&self) -> &str {
        self.ledgers
            .iter()
            .find(|l| l.default)
            .or_else(|| self.ledgers.first())
            .map_or(INTERNAL_LEDGER, |l| l.id.as_str())
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    pub fn recent_block_ttl(&self) -> Duration {
        Duration::from_millis(self.recent_block_ttl_ms)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::default(),
            log_level: default_log_level(),
            data_dir: default_data_dir(),
            scan_interval_ms: default_scan_interval_ms(),
            callback_workers: default_callback_workers(),
            recent_block_ttl_ms: default_recent_block_ttl_ms(),
            max_continuation_depth: default_max_continuation_depth(),
            recent_receipts: default_recent_receipts(),
            ledgers: Vec::new(),
        }
    }
}

impl LedgerSettings {
    pub fn new(id: impl Into<String>, brand: ChainBrand) -> Self {
        Self {
            id: id.into(),
            brand,
            default: false,
            escrow: None,
            params: toml::Table::new(),
        }
    }

    pub fn as_default(mut self) -> Self {
        self.default = true;
        self
    }

    pub fn with_escrow(mut self, expected_fee: u64) -> Self {
        self.escrow = Some(EscrowSettings { expected_fee });
        self
    }
}
