//! Delegate registry: handlers indexed by `(operation, input shape, brand)`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use xledger_types::ChainBrand;

use crate::{GatewayError, Input, InputShape, LedgerConfiguration, Reply};

/// Exact-match index key of a delegate.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DelegateKey {
    pub operation: String,
    pub shape: InputShape,
    pub brand: ChainBrand,
}

impl DelegateKey {
    pub fn new(operation: impl Into<String>, shape: InputShape, brand: ChainBrand) -> Self {
        Self {
            operation: operation.into(),
            shape,
            brand,
        }
    }

    /// The same key under the brand-agnostic sentinel.
    pub fn brand_agnostic(&self) -> Self {
        Self {
            brand: ChainBrand::None,
            ..self.clone()
        }
    }
}

impl fmt::Display for DelegateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.operation, self.shape, self.brand)
    }
}

/// A handler for one operation on one input shape and ledger brand.
#[async_trait]
pub trait Delegate: Send + Sync {
    /// The key this delegate serves. Must not change after construction.
    fn key(&self) -> DelegateKey;

    async fn apply(
        &self,
        ledger: Arc<LedgerConfiguration>,
        input: Option<Input>,
    ) -> Result<Reply, GatewayError>;
}

/// Immutable lookup table of delegates, built once at startup.
#[derive(Clone, Default)]
pub struct DelegateRegistry {
    delegates: HashMap<DelegateKey, Arc<dyn Delegate>>,
}

impl DelegateRegistry {
    /// Build the table, rejecting two delegates with the same key.
    pub fn from_delegates<I>(delegates: I) -> Result<Self, GatewayError>
    where
        I: IntoIterator<Item = Arc<dyn Delegate>>,
    {
        let mut table: HashMap<DelegateKey, Arc<dyn Delegate>> = HashMap::new();
        for delegate in delegates {
            let key = delegate.key();
            if table.contains_key(&key) {
                return Err(GatewayError::DuplicateDelegate { key });
            }
            tracing::debug!(%key, "delegate registered");
            table.insert(key, delegate);
        }
        Ok(Self { delegates: table })
    }

    /// Exact match on all three components, then once more under `NONE`.
    pub fn find(
        &self,
        operation: &str,
        shape: InputShape,
        brand: ChainBrand,
    ) -> Option<Arc<dyn Delegate>> {
        let key = DelegateKey::new(operation, shape, brand);
        self.delegates
            .get(&key)
            .or_else(|| self.delegates.get(&key.brand_agnostic()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.delegates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.delegates.is_empty()
    }

    /// Registered keys in sorted order.
    pub fn keys(&self) -> Vec<DelegateKey> {
        let mut keys: Vec<_> = self.delegates.keys().cloned().collect();
        keys.sort();
        keys
    }
}
