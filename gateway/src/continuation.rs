//! Two-phase replies.
//!
//! A [`Reply`] is either terminal or `PENDING` with a [`Continuation`] that
//! resolves to the next reply. The next reply may itself be pending, which
//! chains continuations; the delivery layer bounds the chain length.

use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use xledger_types::{ExtraData, Timestamp, TransactionResult, TxStatus};

use crate::GatewayError;

/// What a delegate produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum Output {
    Pong {
        message: String,
        time: Timestamp,
    },
    BlockNumber {
        ledger_id: String,
        block: u64,
    },
    Transaction(TransactionResult),
    EscrowIdentity {
        ledger_id: String,
        contract_address: String,
        public_key: String,
    },
    /// Free-form output of embedder-provided delegates.
    Data(ExtraData),
}

impl Output {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Transaction(r) if r.is_pending())
    }
}

enum Source {
    Channel(oneshot::Receiver<Result<Reply, GatewayError>>),
    Task(JoinHandle<Result<Reply, GatewayError>>),
}

/// Forward reference to the reply that follows a `PENDING` one.
pub struct Continuation {
    source: Source,
}

/// Producer side of [`Continuation::channel`].
pub struct ContinuationSender {
    tx: oneshot::Sender<Result<Reply, GatewayError>>,
}

impl ContinuationSender {
    /// Resolve the continuation. Returns `false` if nobody is waiting any more.
    pub fn send(self, reply: Result<Reply, GatewayError>) -> bool {
        self.tx.send(reply).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl Continuation {
    pub fn channel() -> (ContinuationSender, Continuation) {
        let (tx, rx) = oneshot::channel();
        (
            ContinuationSender { tx },
            Continuation {
                source: Source::Channel(rx),
            },
        )
    }

    /// Run `fut` on its own task; its outcome is the continuation's value.
    pub fn spawn<F>(fut: F) -> Self
    where
        F: Future<Output = Result<Reply, GatewayError>> + Send + 'static,
    {
        Self {
            source: Source::Task(tokio::spawn(fut)),
        }
    }

    /// Wait for the next reply.
    pub async fn resolve(self) -> Result<Reply, GatewayError> {
        match self.source {
            Source::Channel(rx) => rx
                .await
                .unwrap_or_else(|_| Err(GatewayError::internal_msg("continuation abandoned"))),
            Source::Task(handle) => match handle.await {
                Ok(reply) => reply,
                Err(e) if e.is_panic() => Err(GatewayError::from_panic(e.into_panic())),
                Err(e) => Err(GatewayError::internal(&e)),
            },
        }
    }
}

impl std::fmt::Debug for Continuation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.source {
            Source::Channel(_) => "channel",
            Source::Task(_) => "task",
        };
        f.debug_struct("Continuation").field("source", &kind).finish()
    }
}

/// A delegate's reply: an output plus, for pending results, what follows.
#[derive(Debug)]
pub struct Reply {
    output: Output,
    continuation: Option<Continuation>,
}

impl Reply {
    /// A terminal reply.
    ///
    /// A pending transaction result has no outcome to follow it here, so it is
    /// reported as `UNKNOWN` instead.
    pub fn done(output: Output) -> Self {
        let output = match output {
            Output::Transaction(mut result) if result.is_pending() => {
                tracing::error!(work_id = %result.work_id, "pending result without continuation");
                result.status = TxStatus::Unknown;
                Output::Transaction(result.with_message("no continuation for pending result"))
            }
            other => other,
        };
        Self {
            output,
            continuation: None,
        }
    }

    /// A terminal transaction reply. Fails for a pending result.
    pub fn result(result: TransactionResult) -> Result<Self, GatewayError> {
        if result.is_pending() {
            return Err(GatewayError::internal_msg(format!(
                "pending result for {} without continuation",
                result.work_id
            )));
        }
        Ok(Self {
            output: Output::Transaction(result),
            continuation: None,
        })
    }

    /// A `PENDING` reply followed by `continuation`.
    pub fn pending(mut result: TransactionResult, continuation: Continuation) -> Self {
        result.status = TxStatus::Pending;
        Self {
            output: Output::Transaction(result),
            continuation: Some(continuation),
        }
    }

    pub fn output(&self) -> &Output {
        &self.output
    }

    pub fn is_pending(&self) -> bool {
        self.continuation.is_some()
    }

    pub fn into_parts(self) -> (Output, Option<Continuation>) {
        (self.output, self.continuation)
    }

    /// Follow continuations until a terminal reply, at most `max_depth` hops.
    pub async fn into_terminal(self, max_depth: u32) -> Result<Output, GatewayError> {
        let mut reply = self;
        for _ in 0..max_depth {
            match reply.continuation {
                None => return Ok(reply.output),
                Some(next) => reply = next.resolve().await?,
            }
        }
        match reply.continuation {
            None => Ok(reply.output),
            Some(_) => Err(GatewayError::internal_msg(format!(
                "continuation chain longer than {max_depth}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xledger_types::WorkId;

    fn success(id: &str) -> TransactionResult {
        TransactionResult::success(WorkId::new(id), 5, ExtraData::new())
    }

    #[tokio::test]
    async fn channel_continuation_delivers_reply() {
        let (tx, cont) = Continuation::channel();
        assert!(tx.send(Reply::result(success("0x1"))));
        let reply = cont.resolve().await.unwrap();
        assert_eq!(reply.output(), &Output::Transaction(success("0x1")));
    }

    #[tokio::test]
    async fn dropped_sender_is_an_internal_error() {
        let (tx, cont) = Continuation::channel();
        drop(tx);
        let err = cont.resolve().await.unwrap_err();
        assert_eq!(err.code(), "gateway:internal-error");
    }

    #[tokio::test]
    async fn panicking_task_is_an_internal_error() {
        let cont = Continuation::spawn(async {
            if true {
                panic!("delegate exploded");
            }
            Reply::result(success("0x9"))
        });
        match cont.resolve().await.unwrap_err() {
            GatewayError::Internal { message, .. } => assert_eq!(message, "delegate exploded"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn terminal_pending_result_is_rejected() {
        let pending = TransactionResult::pending(WorkId::new("0x1"), Some(3));
        assert!(Reply::result(pending.clone()).is_err());
        let reply = Reply::done(Output::Transaction(pending));
        assert!(!reply.is_pending());
        assert!(!reply.output().is_pending());
    }

    #[tokio::test]
    async fn chained_continuations_are_followed() {
        let inner = Continuation::spawn(async { Reply::result(success("0x2")) });
        let outer = Continuation::spawn(async move {
            Ok(Reply::pending(
                TransactionResult::pending(WorkId::new("0x2"), None),
                inner,
            ))
        });
        let first = Reply::pending(TransactionResult::pending(WorkId::new("0x2"), None), outer);
        assert!(first.output().is_pending());
        let terminal = first.into_terminal(4).await.unwrap();
        assert_eq!(terminal, Output::Transaction(success("0x2")));
    }

    #[tokio::test]
    async fn overlong_chain_is_cut_off() {
        let inner = Continuation::spawn(async { Reply::result(success("0x3")) });
        let first = Reply::pending(TransactionResult::pending(WorkId::new("0x3"), None), inner);
        assert!(first.into_terminal(0).await.is_err());
    }

    #[test]
    fn output_json_is_tagged() {
        let json = serde_json::to_value(Output::BlockNumber {
            ledger_id: "main".into(),
            block: 9,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "type": "BLOCK_NUMBER", "ledgerId": "main", "block": 9 })
        );
    }
}
