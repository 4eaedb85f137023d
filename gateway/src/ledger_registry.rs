//! Configured ledgers, looked up by id.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use xledger_ledger::{LedgerClient, RecentBlockCache};
use xledger_types::{ChainBrand, INTERNAL_LEDGER};

use crate::{EscrowBootstrap, GatewayError, LedgerSettings, ReceiptTracker};

/// Builds the client of one ledger brand from its settings.
pub trait LedgerClientFactory: Send + Sync {
    fn brand(&self) -> ChainBrand;

    fn create(&self, settings: &LedgerSettings) -> Result<Arc<dyn LedgerClient>, GatewayError>;
}

/// Everything the gateway holds for one ledger instance.
pub struct LedgerConfiguration {
    id: String,
    brand: ChainBrand,
    client: Option<Arc<dyn LedgerClient>>,
    tracker: Option<Arc<ReceiptTracker>>,
    escrow: Option<Arc<EscrowBootstrap>>,
    recent_block: RecentBlockCache,
}

impl LedgerConfiguration {
    /// The reserved ledger for requests that touch no external ledger.
    pub fn internal() -> Self {
        Self {
            id: INTERNAL_LEDGER.to_string(),
            brand: ChainBrand::None,
            client: None,
            tracker: None,
            escrow: None,
            recent_block: RecentBlockCache::new(Duration::ZERO),
        }
    }

    /// An external ledger whose work is confirmed through `tracker`.
    pub fn new(brand: ChainBrand, tracker: Arc<ReceiptTracker>, recent_block_ttl: Duration) -> Self {
        Self {
            id: tracker.ledger_id().to_string(),
            brand,
            client: Some(Arc::clone(tracker.client())),
            tracker: Some(tracker),
            escrow: None,
            recent_block: RecentBlockCache::new(recent_block_ttl),
        }
    }

    pub fn with_escrow(mut self, escrow: Arc<EscrowBootstrap>) -> Self {
        self.escrow = Some(escrow);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn brand(&self) -> ChainBrand {
        self.brand
    }

    pub fn is_internal(&self) -> bool {
        self.id == INTERNAL_LEDGER
    }

    pub fn client(&self) -> Result<&Arc<dyn LedgerClient>, GatewayError> {
        self.client
            .as_ref()
            .ok_or_else(|| GatewayError::internal_msg(format!("ledger {} has no client", self.id)))
    }

    pub fn tracker(&self) -> Result<&Arc<ReceiptTracker>, GatewayError> {
        self.tracker.as_ref().ok_or_else(|| {
            GatewayError::internal_msg(format!("ledger {} tracks no receipts", self.id))
        })
    }

    pub fn escrow(&self) -> Result<&Arc<EscrowBootstrap>, GatewayError> {
        self.escrow
            .as_ref()
            .ok_or_else(|| GatewayError::Config(format!("ledger {} hosts no escrow", self.id)))
    }

    /// Most recent block number, served from a short-lived cache.
    pub async fn recent_block(&self) -> Option<u64> {
        let client = self.client.as_deref()?;
        self.recent_block.get(client).await
    }
}

/// The set of configured ledgers. The internal ledger is always present.
pub struct LedgerRegistry {
    ledgers: HashMap<String, Arc<LedgerConfiguration>>,
    /// Configured ledgers in declaration order.
    order: Vec<String>,
    default_id: String,
}

impl LedgerRegistry {
    /// Build the registry.
    ///
    /// `default_id` names the ledger serving requests that name none; when
    /// absent, the first configuration is used, or the internal ledger.
    pub fn new<I>(configurations: I, default_id: Option<&str>) -> Result<Self, GatewayError>
    where
        I: IntoIterator<Item = LedgerConfiguration>,
    {
        let mut ledgers = HashMap::new();
        let mut order = Vec::new();
        for configuration in configurations {
            let id = configuration.id().to_string();
            if id.is_empty() || id == INTERNAL_LEDGER {
                return Err(GatewayError::Config(format!("invalid ledger id {id:?}")));
            }
            if ledgers.contains_key(&id) {
                return Err(GatewayError::Config(format!("ledger {id} configured twice")));
            }
            order.push(id.clone());
            ledgers.insert(id, Arc::new(configuration));
        }

        let default_id = match default_id {
            Some(id) if id == INTERNAL_LEDGER || ledgers.contains_key(id) => id.to_string(),
            Some(id) => {
                return Err(GatewayError::Config(format!(
                    "default ledger {id} is not configured"
                )))
            }
            None => order
                .first()
                .cloned()
                .unwrap_or_else(|| INTERNAL_LEDGER.to_string()),
        };

        ledgers.insert(
            INTERNAL_LEDGER.to_string(),
            Arc::new(LedgerConfiguration::internal()),
        );
        Ok(Self {
            ledgers,
            order,
            default_id,
        })
    }

    /// The configuration for `ledger_id`; `None` or `""` selects the default.
    pub fn get(&self, ledger_id: Option<&str>) -> Option<Arc<LedgerConfiguration>> {
        let id = match ledger_id {
            None | Some("") => self.default_id.as_str(),
            Some(id) => id,
        };
        self.ledgers.get(id).cloned()
    }

    pub fn default_id(&self) -> &str {
        &self.default_id
    }

    /// Configured ledgers in declaration order, without the internal one.
    pub fn configured(&self) -> impl Iterator<Item = &Arc<LedgerConfiguration>> {
        self.order.iter().filter_map(|id| self.ledgers.get(id))
    }

    pub fn trackers(&self) -> Vec<Arc<ReceiptTracker>> {
        self.configured()
            .filter_map(|l| l.tracker.clone())
            .collect()
    }

    pub fn escrows(&self) -> Vec<Arc<EscrowBootstrap>> {
        self.configured().filter_map(|l| l.escrow.clone()).collect()
    }

    /// Distinct brands of the configured ledgers, in declaration order.
    pub fn brands(&self) -> Vec<ChainBrand> {
        let mut brands = Vec::new();
        for ledger in self.configured() {
            if !brands.contains(&ledger.brand) {
                brands.push(ledger.brand);
            }
        }
        brands
    }
}
