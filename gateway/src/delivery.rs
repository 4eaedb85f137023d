//! Request/response envelopes and two-phase delivery.
//!
//! A request yields one response per reply in its continuation chain: the
//! immediate reply first, then one correlated response per continuation,
//! numbered by `sequence`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::Instrument;
use xledger_types::ErrorDetails;

use crate::tracing_spans::delivery_span;
use crate::{GatewayError, Input, Output, Reply, Router};

/// An inbound request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub message_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub operation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Input>,
}

impl Request {
    pub fn new(message_id: impl Into<String>, operation: impl Into<String>, input: Option<Input>) -> Self {
        Self {
            message_id: message_id.into(),
            user_id: None,
            operation: operation.into(),
            input,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// Correlates a response with its request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InReplyTo {
    pub message_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl From<&Request> for InReplyTo {
    fn from(request: &Request) -> Self {
        Self {
            message_id: request.message_id.clone(),
            user_id: request.user_id.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub in_reply_to: InReplyTo,
    pub operation: String,
    /// Whether the reply succeeded. A `PENDING` reply passes.
    pub pass: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Output>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetails>,
    /// 0 for the immediate reply, then one more per continuation.
    pub sequence: u32,
}

impl Response {
    pub fn success(in_reply_to: InReplyTo, operation: &str, output: Output, sequence: u32) -> Self {
        Self {
            in_reply_to,
            operation: operation.to_string(),
            pass: true,
            result: Some(output),
            error: None,
            sequence,
        }
    }

    pub fn failure(
        in_reply_to: InReplyTo,
        operation: &str,
        error: &GatewayError,
        sequence: u32,
    ) -> Self {
        Self {
            in_reply_to,
            operation: operation.to_string(),
            pass: false,
            result: None,
            error: Some(error.to_details()),
            sequence,
        }
    }

    /// Whether more responses follow this one.
    pub fn is_pending(&self) -> bool {
        self.result.as_ref().is_some_and(Output::is_pending)
    }
}

/// Where responses go.
#[async_trait]
pub trait ResponseSink: Send + Sync {
    async fn send(&self, response: Response) -> Result<(), GatewayError>;
}

/// A sink feeding an mpsc channel.
#[derive(Clone)]
pub struct ChannelSink(pub mpsc::Sender<Response>);

#[async_trait]
impl ResponseSink for ChannelSink {
    async fn send(&self, response: Response) -> Result<(), GatewayError> {
        self.0
            .send(response)
            .await
            .map_err(|_| GatewayError::internal_msg("response channel closed"))
    }
}

/// Route `request` and deliver every response it produces to `sink`.
///
/// Continuations are followed for at most `max_depth` hops; a longer chain
/// ends with a failure response. Returns the number of responses sent.
pub async fn deliver(
    router: &Router,
    request: Request,
    sink: &dyn ResponseSink,
    max_depth: u32,
) -> Result<u32, GatewayError> {
    let span = delivery_span(&request.message_id, &request.operation);
    async move {
        let in_reply_to = InReplyTo::from(&request);
        let operation = request.operation;
        let mut next: Result<Reply, GatewayError> = router.route(&operation, request.input).await;
        let mut sequence = 0u32;

        loop {
            let reply = match next {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::debug!(sequence, code = e.code(), "delivering failure");
                    sink.send(Response::failure(in_reply_to, &operation, &e, sequence))
                        .await?;
                    return Ok(sequence + 1);
                }
            };

            let (output, continuation) = reply.into_parts();
            sink.send(Response::success(in_reply_to.clone(), &operation, output, sequence))
                .await?;
            let Some(continuation) = continuation else {
                return Ok(sequence + 1);
            };

            sequence += 1;
            if sequence > max_depth {
                tracing::warn!(max_depth, "continuation chain cut off");
                let e = GatewayError::internal_msg(format!(
                    "continuation chain longer than {max_depth}"
                ));
                sink.send(Response::failure(in_reply_to, &operation, &e, sequence))
                    .await?;
                return Ok(sequence + 1);
            }
            next = continuation.resolve().await;
        }
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Continuation, Delegate, DelegateKey, DelegateRegistry, Directories, GatewayMetrics,
        InputShape, LedgerConfiguration, LedgerRegistry,
    };
    use std::sync::Arc;
    use xledger_nullables::NullDirectory;
    use xledger_types::{ChainBrand, ExtraData, TransactionResult, TxStatus, WorkId};

    /// Replies with `links` pending results before a terminal one, or fails
    /// in the last continuation when `fail_last` is set.
    struct Chain {
        links: u32,
        fail_last: bool,
    }

    fn chain(links: u32, fail_last: bool) -> Result<Reply, GatewayError> {
        if links == 0 {
            if fail_last {
                return Err(GatewayError::Transport("ledger went away".into()));
            }
            return Reply::result(TransactionResult::success(
                WorkId::new("0xc"),
                7,
                ExtraData::new(),
            ));
        }
        Ok(Reply::pending(
            TransactionResult::pending(WorkId::new("0xc"), Some(links as u64)),
            Continuation::spawn(async move { chain(links - 1, fail_last) }),
        ))
    }

    #[async_trait]
    impl Delegate for Chain {
        fn key(&self) -> DelegateKey {
            DelegateKey::new("CHAIN", InputShape::Ping, ChainBrand::None)
        }

        async fn apply(
            &self,
            _ledger: Arc<LedgerConfiguration>,
            _input: Option<Input>,
        ) -> Result<Reply, GatewayError> {
            chain(self.links, self.fail_last)
        }
    }

    fn router(links: u32, fail_last: bool) -> Router {
        let delegates =
            DelegateRegistry::from_delegates([Arc::new(Chain { links, fail_last }) as Arc<dyn Delegate>])
                .unwrap();
        let dir = Arc::new(NullDirectory::new());
        Router::new(
            delegates,
            Arc::new(LedgerRegistry::new(Vec::new(), None).unwrap()),
            Directories::new(dir.clone(), dir),
            Arc::new(GatewayMetrics::new()),
        )
    }

    fn request(operation: &str) -> Request {
        Request::new(
            "m-1",
            operation,
            Some(Input::Ping {
                message: "hi".into(),
            }),
        )
        .with_user("alice")
    }

    async fn collect(router: &Router, request: Request, max_depth: u32) -> (u32, Vec<Response>) {
        let (tx, mut rx) = mpsc::channel(16);
        let sent = deliver(router, request, &ChannelSink(tx), max_depth)
            .await
            .unwrap();
        let mut responses = Vec::new();
        while let Ok(response) = rx.try_recv() {
            responses.push(response);
        }
        (sent, responses)
    }

    fn status(response: &Response) -> TxStatus {
        match &response.result {
            Some(Output::Transaction(r)) => r.status,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn terminal_reply_is_one_response() {
        let (sent, responses) = collect(&router(0, false), request("CHAIN"), 4).await;
        assert_eq!(sent, 1);
        assert!(responses[0].pass);
        assert_eq!(responses[0].sequence, 0);
        assert_eq!(responses[0].in_reply_to.user_id.as_deref(), Some("alice"));
        assert_eq!(status(&responses[0]), TxStatus::Success);
    }

    #[tokio::test]
    async fn pending_reply_is_followed_by_its_outcome() {
        let (sent, responses) = collect(&router(2, false), request("CHAIN"), 4).await;
        assert_eq!(sent, 3);
        let statuses: Vec<_> = responses.iter().map(status).collect();
        assert_eq!(
            statuses,
            vec![TxStatus::Pending, TxStatus::Pending, TxStatus::Success]
        );
        assert!(responses[0].is_pending());
        assert!(!responses[2].is_pending());
        let sequences: Vec<_> = responses.iter().map(|r| r.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn chain_at_the_limit_completes() {
        let (sent, responses) = collect(&router(4, false), request("CHAIN"), 4).await;
        assert_eq!(sent, 5);
        assert_eq!(status(&responses[4]), TxStatus::Success);
    }

    #[tokio::test]
    async fn overlong_chain_ends_in_failure() {
        let (sent, responses) = collect(&router(5, false), request("CHAIN"), 4).await;
        assert_eq!(sent, 6);
        let last = responses.last().unwrap();
        assert!(!last.pass);
        assert_eq!(last.sequence, 5);
        assert_eq!(
            last.error.as_ref().map(|e| e.code.as_str()),
            Some("gateway:internal-error")
        );
    }

    #[tokio::test]
    async fn failed_continuation_is_a_failure_response() {
        let (sent, responses) = collect(&router(1, true), request("CHAIN"), 4).await;
        assert_eq!(sent, 2);
        assert!(responses[0].pass);
        assert!(!responses[1].pass);
        assert_eq!(
            responses[1].error.as_ref().map(|e| e.code.as_str()),
            Some("gateway:transport-error")
        );
    }

    #[tokio::test]
    async fn routing_failure_is_a_single_failure_response() {
        let (sent, responses) = collect(&router(0, false), request("MISSING"), 4).await;
        assert_eq!(sent, 1);
        assert!(!responses[0].pass);
        assert_eq!(
            responses[0].error.as_ref().map(|e| e.code.as_str()),
            Some("gateway:no-delegate-implementation")
        );
    }

    #[test]
    fn request_parses_from_json() {
        let request: Request = serde_json::from_str(
            r#"{"messageId":"m-9","operation":"PING","input":{"shape":"PING","message":"hello"}}"#,
        )
        .unwrap();
        assert_eq!(request.message_id, "m-9");
        assert_eq!(request.user_id, None);
        assert_eq!(
            request.input,
            Some(Input::Ping {
                message: "hello".into()
            })
        );
    }

    #[test]
    fn response_serializes_camel_case() {
        let response = Response::failure(
            InReplyTo {
                message_id: "m-1".into(),
                user_id: None,
            },
            "PING",
            &GatewayError::AccessDenied {
                operation: "PING".into(),
            },
            0,
        );
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["inReplyTo"]["messageId"], "m-1");
        assert_eq!(json["pass"], false);
        assert_eq!(json["error"]["code"], "gateway:access-denied");
        assert!(json.get("result").is_none());
    }
}
