//! Receipt tracking: polls a ledger for the outcome of submitted work and
//! hands each outcome to the callbacks registered for it.
//!
//! Three maps make up the state. Pending work (work id to attempt count) is
//! only touched by `track_start` and `scan`. Registered callbacks and
//! unclaimed receipts sit behind one lock, so for any work id either the
//! callbacks receive the receipt or the receipt is stored for a later
//! `register`, never both and never neither.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::Instrument;
use xledger_ledger::{Confirmation, LedgerClient};
use xledger_types::{ExtraData, TransactionResult, WorkId};

use crate::recently_confirmed::RecentlyConfirmed;
use crate::tracing_spans::scan_span;
use crate::{Continuation, GatewayError, GatewayMetrics, Reply, TxProcessingMode, WorkerPool};

/// Receives the confirmation of one piece of work.
pub trait ReceiptHandler: Send + 'static {
    /// True when the outcome no longer matters (e.g. the waiter went away).
    /// Such handlers are discarded by [`ReceiptTracker::register`].
    fn is_done(&self) -> bool {
        false
    }

    /// Runs on the tracker's worker pool, never on the scanning task.
    fn accept(self: Box<Self>, confirmation: Confirmation);
}

/// Adapts a closure into a [`ReceiptHandler`].
pub struct FnReceiptHandler<F>(F);

impl<F> FnReceiptHandler<F>
where
    F: FnOnce(Confirmation) + Send + 'static,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> ReceiptHandler for FnReceiptHandler<F>
where
    F: FnOnce(Confirmation) + Send + 'static,
{
    fn accept(self: Box<Self>, confirmation: Confirmation) {
        (self.0)(confirmation)
    }
}

/// The standard handler: converts the confirmation into a terminal
/// [`TransactionResult`] and sends it to a waiting receiver.
pub struct SimpleReceiptHandler {
    tx: oneshot::Sender<TransactionResult>,
}

impl SimpleReceiptHandler {
    pub fn new() -> (Self, oneshot::Receiver<TransactionResult>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }
}

impl ReceiptHandler for SimpleReceiptHandler {
    fn is_done(&self) -> bool {
        self.tx.is_closed()
    }

    fn accept(self: Box<Self>, confirmation: Confirmation) {
        let _ = self.tx.send(to_transaction_result(&confirmation));
    }
}

/// Terminal result for a confirmation.
pub fn to_transaction_result(confirmation: &Confirmation) -> TransactionResult {
    let copy = |keys: &[&str]| {
        let mut extra = ExtraData::new();
        for key in keys {
            if let Some(value) = confirmation.extra.get(key) {
                extra.insert(*key, value.clone());
            }
        }
        extra
    };

    if confirmation.success {
        let mut extra = copy(&["blockHash", "contractAddress"]);
        extra.insert("blockNumber", confirmation.block);
        TransactionResult::success(confirmation.work_id.clone(), confirmation.block, extra)
    } else {
        let mut extra = copy(&["blockHash", "status"]);
        let reason = confirmation
            .failure_reason
            .clone()
            .unwrap_or_else(|| "transaction failed".to_string());
        extra.insert("failureReason", reason.as_str());
        TransactionResult::failure(confirmation.work_id.clone(), Some(confirmation.block), extra)
            .with_message(reason)
    }
}

/// Outcome of one call to [`ReceiptTracker::scan`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanReport {
    /// Another scan was running; this one did nothing.
    Skipped,
    Completed {
        checked: usize,
        confirmed: usize,
        errors: usize,
    },
}

#[derive(Default)]
struct Receipts {
    callbacks: HashMap<WorkId, Vec<Box<dyn ReceiptHandler>>>,
    unclaimed: HashMap<WorkId, Confirmation>,
}

struct ScanGuard<'a>(&'a AtomicBool);

impl<'a> ScanGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Receipt tracking for one ledger.
pub struct ReceiptTracker {
    ledger_id: String,
    client: Arc<dyn LedgerClient>,
    pending: Mutex<HashMap<WorkId, u32>>,
    receipts: Mutex<Receipts>,
    recent: Mutex<RecentlyConfirmed>,
    scanning: AtomicBool,
    pool: WorkerPool,
    metrics: Arc<GatewayMetrics>,
}

impl ReceiptTracker {
    pub fn new(
        ledger_id: impl Into<String>,
        client: Arc<dyn LedgerClient>,
        pool: WorkerPool,
        metrics: Arc<GatewayMetrics>,
        recent_capacity: usize,
    ) -> Self {
        Self {
            ledger_id: ledger_id.into(),
            client,
            pending: Mutex::new(HashMap::new()),
            receipts: Mutex::new(Receipts::default()),
            recent: Mutex::new(RecentlyConfirmed::new(recent_capacity)),
            scanning: AtomicBool::new(false),
            pool,
            metrics,
        }
    }

    pub fn ledger_id(&self) -> &str {
        &self.ledger_id
    }

    pub fn client(&self) -> &Arc<dyn LedgerClient> {
        &self.client
    }

    /// Start polling for `work_id`. Tracking an already tracked id keeps its count.
    pub fn track_start(&self, work_id: WorkId) {
        let mut pending = self.pending.lock();
        pending.entry(work_id.clone()).or_insert(0);
        self.metrics.pending_work.set(pending.len() as i64);
        tracing::debug!(ledger = %self.ledger_id, %work_id, "tracking work");
    }

    /// Deliver the receipt of `work_id` to `handler`.
    ///
    /// A receipt that already arrived is dispatched at once; otherwise the
    /// handler waits for the scan that finds it.
    pub fn register<H: ReceiptHandler>(&self, work_id: WorkId, handler: H) {
        self.register_boxed(work_id, Box::new(handler));
    }

    pub fn register_boxed(&self, work_id: WorkId, handler: Box<dyn ReceiptHandler>) {
        if handler.is_done() {
            tracing::debug!(ledger = %self.ledger_id, %work_id, "handler already done, not registered");
            return;
        }

        let confirmation = {
            let mut receipts = self.receipts.lock();
            match receipts.unclaimed.remove(&work_id) {
                Some(confirmation) => {
                    self.metrics
                        .unclaimed_receipts
                        .set(receipts.unclaimed.len() as i64);
                    self.recent.lock().insert(confirmation.clone());
                    confirmation
                }
                None => match self.recent.lock().get(&work_id).cloned() {
                    Some(confirmation) => confirmation,
                    None => {
                        receipts
                            .callbacks
                            .entry(work_id.clone())
                            .or_default()
                            .push(handler);
                        return;
                    }
                },
            }
        };

        tracing::debug!(ledger = %self.ledger_id, %work_id, "receipt already available");
        self.dispatch(handler, confirmation);
    }

    /// Poll the ledger once for every pending piece of work.
    ///
    /// Returns [`ScanReport::Skipped`] without doing anything while another
    /// scan of this tracker is running.
    pub async fn scan(&self) -> ScanReport {
        let Some(_guard) = ScanGuard::acquire(&self.scanning) else {
            self.metrics.scans_skipped.inc();
            tracing::debug!(ledger = %self.ledger_id, "scan in progress, tick dropped");
            return ScanReport::Skipped;
        };
        self.metrics.scans.inc();
        self.scan_pending()
            .instrument(scan_span(&self.ledger_id))
            .await
    }

    async fn scan_pending(&self) -> ScanReport {
        let work_ids = self.pending_ids();
        let (mut checked, mut confirmed, mut errors) = (0, 0, 0);

        for work_id in work_ids {
            let Some(attempt) = self.next_attempt(&work_id) else {
                continue;
            };
            checked += 1;

            match self.client.confirmation_of(&work_id).await {
                Ok(None) => {
                    tracing::trace!(%work_id, attempt, "not yet confirmed");
                }
                Ok(Some(mut confirmation)) => {
                    confirmation.decode_failure_reason();
                    confirmation.work_id = work_id.clone();
                    self.untrack(&work_id);
                    self.metrics.confirmations.inc();
                    tracing::info!(
                        %work_id,
                        attempt,
                        success = confirmation.success,
                        block = confirmation.block,
                        "work confirmed"
                    );
                    self.arrive(confirmation);
                    confirmed += 1;
                }
                Err(e) => {
                    errors += 1;
                    self.metrics.transport_errors.inc();
                    tracing::warn!(%work_id, attempt, error = %e, "confirmation query failed, will retry");
                }
            }
        }

        tracing::debug!(checked, confirmed, errors, "scan complete");
        ScanReport::Completed {
            checked,
            confirmed,
            errors,
        }
    }

    fn pending_ids(&self) -> Vec<WorkId> {
        self.pending.lock().keys().cloned().collect()
    }

    fn next_attempt(&self, work_id: &WorkId) -> Option<u32> {
        let mut pending = self.pending.lock();
        let attempt = pending.get_mut(work_id)?;
        *attempt += 1;
        Some(*attempt)
    }

    fn untrack(&self, work_id: &WorkId) {
        let mut pending = self.pending.lock();
        pending.remove(work_id);
        self.metrics.pending_work.set(pending.len() as i64);
    }

    fn arrive(&self, confirmation: Confirmation) {
        let handlers = {
            let mut receipts = self.receipts.lock();
            match receipts.callbacks.remove(&confirmation.work_id) {
                Some(handlers) => {
                    self.recent.lock().insert(confirmation.clone());
                    handlers
                }
                None => {
                    tracing::debug!(work_id = %confirmation.work_id, "no callback yet, receipt kept");
                    receipts
                        .unclaimed
                        .insert(confirmation.work_id.clone(), confirmation);
                    self.metrics
                        .unclaimed_receipts
                        .set(receipts.unclaimed.len() as i64);
                    return;
                }
            }
        };
        for handler in handlers {
            self.dispatch(handler, confirmation.clone());
        }
    }

    fn dispatch(&self, handler: Box<dyn ReceiptHandler>, confirmation: Confirmation) {
        self.metrics.callbacks_dispatched.inc();
        self.pool.dispatch(move || handler.accept(confirmation));
    }

    /// Attempts made so far for `work_id`, `None` when it is not pending.
    pub fn pending_attempts(&self, work_id: &WorkId) -> Option<u32> {
        self.pending.lock().get(work_id).copied()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn unclaimed_count(&self) -> usize {
        self.receipts.lock().unclaimed.len()
    }
}

/// Track freshly submitted work and build the reply for `mode`.
///
/// `ReturnResult` waits for the receipt; `ReturnId` replies `PENDING` at
/// once with `recent_block` and resolves the continuation when the receipt
/// arrives.
pub async fn prepare(
    mode: TxProcessingMode,
    tracker: &ReceiptTracker,
    work_id: WorkId,
    recent_block: Option<u64>,
) -> Result<Reply, GatewayError> {
    let (handler, rx) = SimpleReceiptHandler::new();
    tracker.track_start(work_id.clone());
    tracker.register(work_id.clone(), handler);

    let wait = async move {
        let result = rx
            .await
            .map_err(|_| GatewayError::internal_msg("receipt handler dropped"))?;
        Reply::result(result)
    };

    match mode {
        TxProcessingMode::ReturnResult => wait.await,
        TxProcessingMode::ReturnId => Ok(Reply::pending(
            TransactionResult::pending(work_id, recent_block),
            Continuation::spawn(wait),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Output;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;
    use xledger_ledger::LedgerCall;
    use xledger_nullables::NullLedger;
    use xledger_types::TxStatus;

    fn tracker(ledger: &Arc<NullLedger>) -> Arc<ReceiptTracker> {
        tracker_with_workers(ledger, 4)
    }

    fn tracker_with_workers(ledger: &Arc<NullLedger>, workers: usize) -> Arc<ReceiptTracker> {
        Arc::new(ReceiptTracker::new(
            "main",
            ledger.clone(),
            WorkerPool::new(workers).unwrap(),
            Arc::new(GatewayMetrics::new()),
            16,
        ))
    }

    async fn submit(ledger: &NullLedger) -> WorkId {
        ledger
            .submit(LedgerCall::Invoke {
                from: "0xa".into(),
                data: vec![1, 2],
            })
            .await
            .unwrap()
    }

    fn success_extra() -> ExtraData {
        ExtraData::new()
            .with("blockHash", "0xbb")
            .with("contractAddress", "0xcc")
            .with("gasUsed", "0x5208")
    }

    #[tokio::test]
    async fn registered_callback_receives_confirmation() {
        let ledger = Arc::new(NullLedger::new());
        let tracker = tracker(&ledger);
        let id = submit(&ledger).await;
        tracker.track_start(id.clone());
        let (handler, rx) = SimpleReceiptHandler::new();
        tracker.register(id.clone(), handler);

        assert_eq!(
            tracker.scan().await,
            ScanReport::Completed {
                checked: 1,
                confirmed: 0,
                errors: 0
            }
        );
        ledger.confirm_success(&id, 12, success_extra());
        assert_eq!(
            tracker.scan().await,
            ScanReport::Completed {
                checked: 1,
                confirmed: 1,
                errors: 0
            }
        );

        let result = rx.await.unwrap();
        assert_eq!(result.status, TxStatus::Success);
        assert_eq!(result.block, Some(12));
        assert_eq!(result.extra.get_str("contractAddress"), Some("0xcc"));
        assert_eq!(result.extra.get_i64("blockNumber"), Some(12));
        assert!(!result.extra.contains_key("gasUsed"));
        assert_eq!(tracker.pending_count(), 0);
    }

    #[tokio::test]
    async fn receipt_before_register_is_held_then_claimed() {
        let ledger = Arc::new(NullLedger::new());
        let tracker = tracker(&ledger);
        let id = WorkId::new("0xABC");
        tracker.track_start(id.clone());
        ledger.confirm_success(&id, 3, ExtraData::new());
        tracker.scan().await;
        assert_eq!(tracker.unclaimed_count(), 1);

        let (handler, rx) = SimpleReceiptHandler::new();
        tracker.register(id.clone(), handler);
        assert_eq!(tracker.unclaimed_count(), 0);
        assert_eq!(rx.await.unwrap().status, TxStatus::Success);
    }

    #[tokio::test]
    async fn transport_error_keeps_work_pending() {
        let ledger = Arc::new(NullLedger::new());
        let tracker = tracker(&ledger);
        let id = submit(&ledger).await;
        tracker.track_start(id.clone());
        ledger.fail_confirmations(true);

        let report = tracker.scan().await;
        assert_eq!(
            report,
            ScanReport::Completed {
                checked: 1,
                confirmed: 0,
                errors: 1
            }
        );
        tracker.scan().await;
        assert_eq!(tracker.pending_attempts(&id), Some(2));

        ledger.fail_confirmations(false);
        ledger.confirm_success(&id, 4, ExtraData::new());
        tracker.scan().await;
        assert_eq!(tracker.pending_attempts(&id), None);
        assert_eq!(tracker.unclaimed_count(), 1);
    }

    #[tokio::test]
    async fn overlapping_scan_is_dropped() {
        let ledger = Arc::new(NullLedger::new());
        let tracker = tracker(&ledger);
        let id = submit(&ledger).await;
        tracker.track_start(id.clone());

        let gate = ledger.pause().await;
        let first = tokio::spawn({
            let tracker = Arc::clone(&tracker);
            async move { tracker.scan().await }
        });
        ledger.wait_for_query().await;

        assert_eq!(tracker.scan().await, ScanReport::Skipped);
        assert_eq!(tracker.scan().await, ScanReport::Skipped);
        drop(gate);

        assert!(matches!(
            first.await.unwrap(),
            ScanReport::Completed { checked: 1, .. }
        ));
        assert_eq!(tracker.pending_attempts(&id), Some(1));
        assert_eq!(ledger.queries(&id), 1);

        // The flag is released once the scan finishes.
        assert!(matches!(tracker.scan().await, ScanReport::Completed { .. }));
    }

    /// Two confirmed pieces of work; the first one's callback blocks until
    /// the returned sender fires, the second one's result arrives on the receiver.
    async fn one_blocked_callback(
        ledger: &Arc<NullLedger>,
        tracker: &ReceiptTracker,
    ) -> (
        std::sync::mpsc::Sender<()>,
        oneshot::Receiver<()>,
        oneshot::Receiver<TransactionResult>,
    ) {
        let slow = submit(ledger).await;
        let other = submit(ledger).await;
        for id in [&slow, &other] {
            tracker.track_start(id.clone());
            ledger.confirm_success(id, 5, ExtraData::new());
        }

        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let (started_tx, started_rx) = oneshot::channel();
        tracker.register(
            slow,
            FnReceiptHandler::new(move |_| {
                let _ = started_tx.send(());
                let _ = release_rx.recv();
            }),
        );
        let (handler, other_rx) = SimpleReceiptHandler::new();
        tracker.register(other, handler);
        (release_tx, started_rx, other_rx)
    }

    #[tokio::test]
    async fn blocked_callback_does_not_stall_the_scan() {
        let ledger = Arc::new(NullLedger::new());
        let tracker = tracker_with_workers(&ledger, 1);
        let (release, _started, other_rx) = one_blocked_callback(&ledger, &tracker).await;

        let report = tokio::time::timeout(Duration::from_secs(5), tracker.scan())
            .await
            .expect("scan waited on a callback");
        assert_eq!(
            report,
            ScanReport::Completed {
                checked: 2,
                confirmed: 2,
                errors: 0
            }
        );
        assert_eq!(tracker.pending_count(), 0);
        assert_eq!(tracker.metrics.callbacks_dispatched.get(), 2);

        release.send(()).unwrap();
        assert_eq!(other_rx.await.unwrap().status, TxStatus::Success);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn other_callbacks_run_while_one_is_blocked() {
        let ledger = Arc::new(NullLedger::new());
        let tracker = tracker_with_workers(&ledger, 2);
        let (release, started, other_rx) = one_blocked_callback(&ledger, &tracker).await;

        tracker.scan().await;
        started.await.unwrap();
        let result = tokio::time::timeout(Duration::from_secs(5), other_rx)
            .await
            .expect("callback held up by a blocked one")
            .unwrap();
        assert_eq!(result.status, TxStatus::Success);
        release.send(()).unwrap();
    }

    #[tokio::test]
    async fn failure_reason_is_decoded_before_dispatch() {
        let ledger = Arc::new(NullLedger::new());
        let tracker = tracker(&ledger);
        let id = submit(&ledger).await;
        tracker.track_start(id.clone());
        let reason = format!("0x4e487b71{:064x}", 0x11);
        ledger.confirm(Confirmation::failure(
            id.clone(),
            8,
            Some(reason),
            ExtraData::new().with("blockHash", "0xbb").with("status", "0x0"),
        ));
        let (handler, rx) = SimpleReceiptHandler::new();
        tracker.register(id.clone(), handler);
        tracker.scan().await;

        let result = rx.await.unwrap();
        assert_eq!(result.status, TxStatus::Failure);
        let expected = "PANIC: arithmetic overflow or underflow (0x11)";
        assert_eq!(result.extra.get_str("failureReason"), Some(expected));
        assert_eq!(result.extra.get_str("status"), Some("0x0"));
        assert_eq!(result.message.as_deref(), Some(expected));
    }

    #[tokio::test]
    async fn abandoned_handler_is_not_registered() {
        let ledger = Arc::new(NullLedger::new());
        let tracker = tracker(&ledger);
        let (handler, rx) = SimpleReceiptHandler::new();
        drop(rx);
        tracker.register(WorkId::new("0x1"), handler);
        assert!(tracker.receipts.lock().callbacks.is_empty());
    }

    #[tokio::test]
    async fn late_register_is_answered_from_recent_confirmations() {
        let ledger = Arc::new(NullLedger::new());
        let tracker = tracker(&ledger);
        let id = submit(&ledger).await;
        tracker.track_start(id.clone());
        let (first, first_rx) = SimpleReceiptHandler::new();
        tracker.register(id.clone(), first);
        ledger.confirm_success(&id, 6, ExtraData::new());
        tracker.scan().await;
        first_rx.await.unwrap();

        let (late, late_rx) = SimpleReceiptHandler::new();
        tracker.register(id.clone(), late);
        assert_eq!(late_rx.await.unwrap().block, Some(6));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn every_callback_runs_exactly_once() {
        let ledger = Arc::new(NullLedger::new());
        let tracker = tracker(&ledger);
        let mut ids = Vec::new();
        for _ in 0..40 {
            let id = submit(&ledger).await;
            tracker.track_start(id.clone());
            ledger.confirm_success(&id, 1, ExtraData::new());
            ids.push(id);
        }

        let calls: Arc<HashMap<WorkId, AtomicU32>> =
            Arc::new(ids.iter().map(|id| (id.clone(), AtomicU32::new(0))).collect());
        let (done_tx, mut done_rx) = tokio::sync::mpsc::unbounded_channel();

        let registering = tokio::spawn({
            let tracker = Arc::clone(&tracker);
            let calls = Arc::clone(&calls);
            let ids = ids.clone();
            async move {
                for id in ids {
                    let calls = Arc::clone(&calls);
                    let done_tx = done_tx.clone();
                    tracker.register(
                        id,
                        FnReceiptHandler::new(move |c: Confirmation| {
                            if let Some(n) = calls.get(&c.work_id) {
                                n.fetch_add(1, Ordering::SeqCst);
                            }
                            let _ = done_tx.send(());
                        }),
                    );
                    tokio::task::yield_now().await;
                }
            }
        });
        tracker.scan().await;
        registering.await.unwrap();

        for _ in 0..ids.len() {
            done_rx.recv().await.unwrap();
        }
        for id in &ids {
            assert_eq!(calls[id].load(Ordering::SeqCst), 1, "{id}");
        }
        assert_eq!(tracker.unclaimed_count(), 0);
    }

    #[tokio::test]
    async fn return_id_replies_pending_then_resolves() {
        let ledger = Arc::new(NullLedger::new());
        let tracker = tracker(&ledger);
        let id = submit(&ledger).await;

        let reply = prepare(TxProcessingMode::ReturnId, &tracker, id.clone(), Some(50))
            .await
            .unwrap();
        assert!(reply.is_pending());
        let (output, continuation) = reply.into_parts();
        match output {
            Output::Transaction(r) => {
                assert_eq!(r.status, TxStatus::Pending);
                assert_eq!(r.block, Some(50));
            }
            other => panic!("unexpected {other:?}"),
        }

        ledger.confirm_success(&id, 51, ExtraData::new());
        tracker.scan().await;
        let next = continuation.unwrap().resolve().await.unwrap();
        assert!(!next.is_pending());
        assert!(matches!(
            next.output(),
            Output::Transaction(r) if r.status == TxStatus::Success
        ));
    }

    #[tokio::test]
    async fn return_result_waits_for_the_receipt() {
        let ledger = Arc::new(NullLedger::new());
        let tracker = tracker(&ledger);
        let id = submit(&ledger).await;

        let waiting = tokio::spawn({
            let tracker = Arc::clone(&tracker);
            let id = id.clone();
            async move { prepare(TxProcessingMode::ReturnResult, &tracker, id, None).await }
        });
        while tracker.pending_count() == 0 {
            tokio::task::yield_now().await;
        }
        ledger.confirm_success(&id, 2, ExtraData::new());
        tracker.scan().await;

        let reply = waiting.await.unwrap().unwrap();
        assert!(!reply.is_pending());
    }
}
