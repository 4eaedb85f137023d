use std::sync::Arc;

use async_trait::async_trait;
use xledger_ledger::LedgerCall;
use xledger_types::ChainBrand;

use super::{unexpected_input, SUBMIT_CALL};
use crate::{
    prepare, Delegate, DelegateKey, GatewayError, Input, InputShape, LedgerConfiguration, Reply,
};

/// Submits an encoded call on behalf of the caller's address.
pub struct SubmitCallDelegate {
    brand: ChainBrand,
}

impl SubmitCallDelegate {
    pub fn new(brand: ChainBrand) -> Self {
        Self { brand }
    }
}

#[async_trait]
impl Delegate for SubmitCallDelegate {
    fn key(&self) -> DelegateKey {
        DelegateKey::new(SUBMIT_CALL, InputShape::Call, self.brand)
    }

    async fn apply(
        &self,
        ledger: Arc<LedgerConfiguration>,
        input: Option<Input>,
    ) -> Result<Reply, GatewayError> {
        let (from, call_data, mode) = match input {
            Some(Input::Call {
                address,
                call_data,
                mode,
            }) => (address, call_data, mode),
            other => return Err(unexpected_input(InputShape::Call, other.as_ref())),
        };
        let digits = call_data.strip_prefix("0x").unwrap_or(&call_data);
        let data = hex::decode(digits)
            .map_err(|e| GatewayError::InvalidInput(format!("call data is not hex: {e}")))?;

        let work_id = ledger
            .client()?
            .submit(LedgerCall::Invoke { from, data })
            .await?;
        tracing::info!(ledger = ledger.id(), %work_id, ?mode, "call submitted");

        let recent = ledger.recent_block().await;
        prepare(mode, ledger.tracker()?, work_id, recent).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GatewayMetrics, Output, ReceiptTracker, TxProcessingMode, WorkerPool};
    use std::time::Duration;
    use xledger_nullables::NullLedger;
    use xledger_types::{ExtraData, TxStatus};

    fn setup() -> (Arc<NullLedger>, Arc<ReceiptTracker>, Arc<LedgerConfiguration>) {
        let null = Arc::new(NullLedger::new());
        let tracker = Arc::new(ReceiptTracker::new(
            "main",
            null.clone(),
            WorkerPool::new(1).unwrap(),
            Arc::new(GatewayMetrics::new()),
            4,
        ));
        let config = Arc::new(LedgerConfiguration::new(
            ChainBrand::Besu,
            tracker.clone(),
            Duration::from_secs(1),
        ));
        (null, tracker, config)
    }

    fn call(data: &str, mode: TxProcessingMode) -> Option<Input> {
        Some(Input::Call {
            address: "0xa".into(),
            call_data: data.into(),
            mode,
        })
    }

    #[tokio::test]
    async fn return_id_submits_and_replies_pending() {
        let (null, tracker, config) = setup();
        let reply = SubmitCallDelegate::new(ChainBrand::Besu)
            .apply(config, call("0xdead", TxProcessingMode::ReturnId))
            .await
            .unwrap();
        assert!(reply.is_pending());

        let (work_id, submitted) = null.submitted().remove(0);
        assert_eq!(
            submitted,
            LedgerCall::Invoke {
                from: "0xa".into(),
                data: vec![0xde, 0xad]
            }
        );
        match reply.output() {
            Output::Transaction(r) => {
                assert_eq!(r.work_id, work_id);
                assert_eq!(r.block, Some(100));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(tracker.pending_count(), 1);
    }

    #[tokio::test]
    async fn return_result_waits_for_confirmation() {
        let (null, tracker, config) = setup();
        let running = tokio::spawn(async move {
            SubmitCallDelegate::new(ChainBrand::Besu)
                .apply(config, call("00", TxProcessingMode::ReturnResult))
                .await
        });
        while tracker.pending_count() == 0 {
            tokio::task::yield_now().await;
        }
        let (work_id, _) = null.submitted().remove(0);
        null.confirm_success(&work_id, 101, ExtraData::new());
        tracker.scan().await;

        let reply = running.await.unwrap().unwrap();
        match reply.output() {
            Output::Transaction(r) => assert_eq!(r.status, TxStatus::Success),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn bad_hex_is_invalid_input() {
        let (null, _, config) = setup();
        let err = SubmitCallDelegate::new(ChainBrand::Besu)
            .apply(config, call("0xzz", TxProcessingMode::ReturnId))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "gateway:invalid-input");
        assert_eq!(null.submit_count(), 0);
    }
}
