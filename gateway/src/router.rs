//! Request routing: principal resolution, ledger lookup, delegate matching.

use std::sync::Arc;

use tracing::Instrument;

use crate::tracing_spans::route_span;
use crate::{
    Delegate, DelegateKey, DelegateRegistry, Directories, GatewayError, GatewayMetrics, Input,
    InputShape, LedgerConfiguration, LedgerRegistry, PrincipalCandidate, Reply,
};

/// Where a request goes: the chosen principal, its ledger and the delegate.
#[derive(Clone)]
pub struct Route {
    pub candidate: PrincipalCandidate,
    pub ledger: Arc<LedgerConfiguration>,
    pub delegate: Arc<dyn Delegate>,
}

pub struct Router {
    delegates: DelegateRegistry,
    ledgers: Arc<LedgerRegistry>,
    directories: Directories,
    metrics: Arc<GatewayMetrics>,
}

impl Router {
    pub fn new(
        delegates: DelegateRegistry,
        ledgers: Arc<LedgerRegistry>,
        directories: Directories,
        metrics: Arc<GatewayMetrics>,
    ) -> Self {
        Self {
            delegates,
            ledgers,
            directories,
            metrics,
        }
    }

    pub fn ledgers(&self) -> &Arc<LedgerRegistry> {
        &self.ledgers
    }

    pub fn delegates(&self) -> &DelegateRegistry {
        &self.delegates
    }

    /// Decide where `operation` on `input` goes, without running anything.
    ///
    /// Only the first valid principal is considered: if its ledger is not
    /// configured the request fails even when a later principal would work.
    pub fn plan(&self, operation: &str, input: Option<&Input>) -> Result<Route, GatewayError> {
        let planned = self.plan_inner(operation, input);
        if let Err(e) = &planned {
            self.metrics.routing_failures.inc();
            tracing::debug!(operation, code = e.code(), "request not routable");
        }
        planned
    }

    fn plan_inner(&self, operation: &str, input: Option<&Input>) -> Result<Route, GatewayError> {
        let candidate = self
            .directories
            .first_valid(input)?
            .ok_or_else(|| GatewayError::AccessDenied {
                operation: operation.to_string(),
            })?;

        let ledger = self
            .ledgers
            .get(candidate.ledger_id.as_deref())
            .ok_or_else(|| GatewayError::NoSuchLedger {
                ledger_id: candidate
                    .ledger_id
                    .clone()
                    .unwrap_or_else(|| self.ledgers.default_id().to_string()),
            })?;

        let shape = InputShape::of(input);
        let delegate = self
            .delegates
            .find(operation, shape, ledger.brand())
            .ok_or_else(|| GatewayError::NoDelegateImplementation {
                key: DelegateKey::new(operation, shape, ledger.brand()),
            })?;

        Ok(Route {
            candidate,
            ledger,
            delegate,
        })
    }

    /// Route and run a request. The delegate runs on its own task; a panic
    /// there becomes an internal error.
    pub async fn route(&self, operation: &str, input: Option<Input>) -> Result<Reply, GatewayError> {
        let span = route_span(operation, InputShape::of(input.as_ref()).as_str());
        async {
            let Route {
                candidate,
                ledger,
                delegate,
            } = self.plan(operation, input.as_ref())?;
            self.metrics.requests_routed.inc();
            tracing::debug!(
                ledger = ledger.id(),
                wallet = %candidate.wallet_id,
                key = %delegate.key(),
                "routing request"
            );

            let running = tokio::spawn(async move { delegate.apply(ledger, input).await });
            match running.await {
                Ok(reply) => reply,
                Err(e) if e.is_panic() => Err(GatewayError::from_panic(e.into_panic())),
                Err(e) => Err(GatewayError::internal(&e)),
            }
        }
        .instrument(span)
        .await
    }
}
