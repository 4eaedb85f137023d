use std::sync::Arc;

use async_trait::async_trait;
use xledger_types::{ChainBrand, Timestamp};

use super::{unexpected_input, PING};
use crate::{Delegate, DelegateKey, GatewayError, Input, InputShape, LedgerConfiguration, Output, Reply};

/// Echoes the caller's message. Works on every ledger brand.
pub struct PingDelegate;

#[async_trait]
impl Delegate for PingDelegate {
    fn key(&self) -> DelegateKey {
        DelegateKey::new(PING, InputShape::Ping, ChainBrand::None)
    }

    async fn apply(
        &self,
        _ledger: Arc<LedgerConfiguration>,
        input: Option<Input>,
    ) -> Result<Reply, GatewayError> {
        match input {
            Some(Input::Ping { message }) => Ok(Reply::done(Output::Pong {
                message,
                time: Timestamp::now(),
            })),
            other => Err(unexpected_input(InputShape::Ping, other.as_ref())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echoes_message() {
        let reply = PingDelegate
            .apply(
                Arc::new(LedgerConfiguration::internal()),
                Some(Input::Ping {
                    message: "hello".into(),
                }),
            )
            .await
            .unwrap();
        assert!(matches!(reply.output(), Output::Pong { message, .. } if message == "hello"));
    }

    #[tokio::test]
    async fn rejects_other_shapes() {
        let err = PingDelegate
            .apply(Arc::new(LedgerConfiguration::internal()), None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "gateway:invalid-input");
    }
}
