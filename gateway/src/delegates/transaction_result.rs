use std::sync::Arc;

use async_trait::async_trait;
use xledger_ledger::{Confirmation, LedgerClient, LedgerError};
use xledger_types::{ChainBrand, ExtraData, TransactionResult, WorkId};

use super::{unexpected_input, GET_TRANSACTION_RESULT};
use crate::{
    prepare, to_transaction_result, Delegate, DelegateKey, GatewayError, Input, InputShape,
    LedgerConfiguration, Reply, TxProcessingMode,
};

/// Current result of previously submitted work.
///
/// Work the ledger knows but has not decided yet is tracked, and the
/// `PENDING` reply carries a continuation that resolves once it is. Work the
/// ledger has never seen is `UNKNOWN` and is not tracked.
pub struct TransactionResultDelegate {
    brand: ChainBrand,
}

impl TransactionResultDelegate {
    pub fn new(brand: ChainBrand) -> Self {
        Self { brand }
    }
}

enum Lookup {
    Decided(Confirmation),
    Undecided,
    Unseen,
}

async fn look_up(client: &dyn LedgerClient, work_id: &WorkId) -> Result<Lookup, LedgerError> {
    match client.confirmation_of(work_id).await? {
        Some(confirmation) => Ok(Lookup::Decided(confirmation)),
        None if client.is_known(work_id).await? => Ok(Lookup::Undecided),
        None => Ok(Lookup::Unseen),
    }
}

#[async_trait]
impl Delegate for TransactionResultDelegate {
    fn key(&self) -> DelegateKey {
        DelegateKey::new(
            GET_TRANSACTION_RESULT,
            InputShape::TransactionQuery,
            self.brand,
        )
    }

    async fn apply(
        &self,
        ledger: Arc<LedgerConfiguration>,
        input: Option<Input>,
    ) -> Result<Reply, GatewayError> {
        let work_id = match input {
            Some(Input::TransactionQuery { transaction_id, .. }) => transaction_id,
            other => return Err(unexpected_input(InputShape::TransactionQuery, other.as_ref())),
        };

        let lookup = look_up(ledger.client()?.as_ref(), &work_id).await;
        match lookup {
            Ok(Lookup::Decided(mut confirmation)) => {
                confirmation.decode_failure_reason();
                Reply::result(to_transaction_result(&confirmation))
            }
            Ok(Lookup::Undecided) => {
                let recent = ledger.recent_block().await;
                prepare(
                    TxProcessingMode::ReturnId,
                    ledger.tracker()?,
                    work_id,
                    recent,
                )
                .await
            }
            Ok(Lookup::Unseen) => {
                tracing::debug!(%work_id, "transaction not known to the ledger");
                Reply::result(
                    TransactionResult::unknown(work_id, ExtraData::new())
                        .with_message("transaction not known to the ledger"),
                )
            }
            Err(e) => {
                tracing::warn!(%work_id, error = %e, "transaction result unavailable");
                let err = GatewayError::from(e);
                let extra = ExtraData::new()
                    .with("errorCode", err.code())
                    .with("error", err.to_string());
                Reply::result(TransactionResult::unknown(work_id, extra).with_message(err.to_string()))
            }
        }
    }
}
