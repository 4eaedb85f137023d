use std::sync::Arc;

use async_trait::async_trait;
use xledger_types::ChainBrand;

use super::{unexpected_input, GET_ESCROW_IDENTITY};
use crate::{Delegate, DelegateKey, GatewayError, Input, InputShape, LedgerConfiguration, Output, Reply};

/// Address and public key of the ledger's escrow contract.
///
/// Fails with `gateway:not-ready` while the bootstrap is still running.
pub struct EscrowIdentityDelegate {
    brand: ChainBrand,
}

impl EscrowIdentityDelegate {
    pub fn new(brand: ChainBrand) -> Self {
        Self { brand }
    }
}

#[async_trait]
impl Delegate for EscrowIdentityDelegate {
    fn key(&self) -> DelegateKey {
        DelegateKey::new(GET_ESCROW_IDENTITY, InputShape::LedgerScope, self.brand)
    }

    async fn apply(
        &self,
        ledger: Arc<LedgerConfiguration>,
        input: Option<Input>,
    ) -> Result<Reply, GatewayError> {
        if !matches!(input, Some(Input::LedgerScope { .. })) {
            return Err(unexpected_input(InputShape::LedgerScope, input.as_ref()));
        }
        let identity = ledger.escrow()?.identity()?;
        Ok(Reply::done(Output::EscrowIdentity {
            ledger_id: ledger.id().to_string(),
            contract_address: identity.contract_address,
            public_key: identity.public_key.to_string(),
        }))
    }
}
