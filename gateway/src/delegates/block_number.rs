use std::sync::Arc;

use async_trait::async_trait;
use xledger_types::ChainBrand;

use super::{unexpected_input, GET_BLOCK_NUMBER};
use crate::{Delegate, DelegateKey, GatewayError, Input, InputShape, LedgerConfiguration, Output, Reply};

/// Number of the ledger's most recent block.
pub struct BlockNumberDelegate {
    brand: ChainBrand,
}

impl BlockNumberDelegate {
    pub fn new(brand: ChainBrand) -> Self {
        Self { brand }
    }
}

#[async_trait]
impl Delegate for BlockNumberDelegate {
    fn key(&self) -> DelegateKey {
        DelegateKey::new(GET_BLOCK_NUMBER, InputShape::LedgerScope, self.brand)
    }

    async fn apply(
        &self,
        ledger: Arc<LedgerConfiguration>,
        input: Option<Input>,
    ) -> Result<Reply, GatewayError> {
        if !matches!(input, Some(Input::LedgerScope { .. })) {
            return Err(unexpected_input(InputShape::LedgerScope, input.as_ref()));
        }
        let block = ledger.client()?.block_number().await?;
        Ok(Reply::done(Output::BlockNumber {
            ledger_id: ledger.id().to_string(),
            block,
        }))
    }
}
