use std::sync::Arc;

use async_trait::async_trait;
use xledger_ledger::{find_block, ClientFetcher};
use xledger_types::{ChainBrand, Timestamp};

use super::{unexpected_input, GET_BLOCK_NUMBER_FOR_TIME};
use crate::{
    Delegate, DelegateKey, Directories, GatewayError, Input, InputShape, LedgerConfiguration,
    Output, Reply,
};

/// The last block at or before a point in time, searched no earlier than
/// the block that created the token.
pub struct BlockForTimeDelegate {
    brand: ChainBrand,
    directories: Directories,
}

impl BlockForTimeDelegate {
    pub fn new(brand: ChainBrand, directories: Directories) -> Self {
        Self { brand, directories }
    }
}

#[async_trait]
impl Delegate for BlockForTimeDelegate {
    fn key(&self) -> DelegateKey {
        DelegateKey::new(
            GET_BLOCK_NUMBER_FOR_TIME,
            InputShape::BlockForTime,
            self.brand,
        )
    }

    async fn apply(
        &self,
        ledger: Arc<LedgerConfiguration>,
        input: Option<Input>,
    ) -> Result<Reply, GatewayError> {
        let (symbol, epoch_second) = match input {
            Some(Input::BlockForTime {
                symbol,
                epoch_second,
            }) => (symbol, epoch_second),
            other => return Err(unexpected_input(InputShape::BlockForTime, other.as_ref())),
        };

        let token = match self.directories.token_of(&symbol)? {
            Some(token) if !token.loading => token,
            _ => return Err(GatewayError::UnknownToken(symbol)),
        };
        let horizon = token.creation_block.unwrap_or(1).max(1);

        let client = ledger.client()?;
        let block = find_block(
            horizon,
            Timestamp::new(epoch_second),
            &ClientFetcher(client.as_ref()),
        )
        .await?;
        tracing::debug!(%symbol, horizon, epoch_second, block, "block for time resolved");

        Ok(Reply::done(Output::BlockNumber {
            ledger_id: ledger.id().to_string(),
            block,
        }))
    }
}
