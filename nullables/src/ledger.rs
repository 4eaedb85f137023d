//! Nullable ledger: a scriptable [`LedgerClient`] for testing.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{Notify, OwnedRwLockWriteGuard, RwLock};
use xledger_ledger::{Confirmation, LedgerCall, LedgerClient, LedgerError};
use xledger_types::{BlockTime, ExtraData, WorkId};

/// An in-memory ledger whose confirmations, block times and failures are
/// controlled by the test.
///
/// Submitted work stays undecided until the test calls [`NullLedger::confirm`].
pub struct NullLedger {
    submitted: Mutex<Vec<(WorkId, LedgerCall)>>,
    confirmations: Mutex<HashMap<WorkId, Confirmation>>,
    queries: Mutex<HashMap<WorkId, u32>>,
    announced: Mutex<HashSet<WorkId>>,
    block_times: Mutex<Vec<u64>>,
    next_work: AtomicU64,
    fee: AtomicU64,
    fail_confirmations: AtomicBool,
    fail_submits: AtomicBool,
    fail_blocks: AtomicBool,
    gate: Arc<RwLock<()>>,
    entered: Notify,
}

impl NullLedger {
    /// A ledger with blocks `0..=100`, one every ten seconds from t=1000, and zero fees.
    pub fn new() -> Self {
        Self {
            submitted: Mutex::new(Vec::new()),
            confirmations: Mutex::new(HashMap::new()),
            queries: Mutex::new(HashMap::new()),
            announced: Mutex::new(HashSet::new()),
            block_times: Mutex::new((0..=100).map(|b| 1_000 + b * 10).collect()),
            next_work: AtomicU64::new(1),
            fee: AtomicU64::new(0),
            fail_confirmations: AtomicBool::new(false),
            fail_submits: AtomicBool::new(false),
            fail_blocks: AtomicBool::new(false),
            gate: Arc::new(RwLock::new(())),
            entered: Notify::new(),
        }
    }

    /// Replace the block history; `times[b]` is the time of block `b`.
    pub fn with_block_times(self, times: Vec<u64>) -> Self {
        *self.block_times.lock() = times;
        self
    }

    pub fn set_fee(&self, fee: u64) {
        self.fee.store(fee, Ordering::SeqCst);
    }

    /// Make the ledger decide `work_id`.
    pub fn confirm(&self, confirmation: Confirmation) {
        self.confirmations
            .lock()
            .insert(confirmation.work_id.clone(), confirmation);
    }

    /// Make `work_id` known but undecided, as if someone else had submitted it.
    pub fn announce(&self, work_id: &WorkId) {
        self.announced.lock().insert(work_id.clone());
    }

    /// Confirm `work_id` as successful at `block`.
    pub fn confirm_success(&self, work_id: &WorkId, block: u64, extra: ExtraData) {
        self.confirm(Confirmation::success(work_id.clone(), block, extra));
    }

    pub fn fail_confirmations(&self, fail: bool) {
        self.fail_confirmations.store(fail, Ordering::SeqCst);
    }

    pub fn fail_submits(&self, fail: bool) {
        self.fail_submits.store(fail, Ordering::SeqCst);
    }

    pub fn fail_blocks(&self, fail: bool) {
        self.fail_blocks.store(fail, Ordering::SeqCst);
    }

    /// Every call submitted so far, in order.
    pub fn submitted(&self) -> Vec<(WorkId, LedgerCall)> {
        self.submitted.lock().clone()
    }

    pub fn submit_count(&self) -> usize {
        self.submitted.lock().len()
    }

    /// How many times the confirmation of `work_id` was queried.
    pub fn queries(&self, work_id: &WorkId) -> u32 {
        self.queries.lock().get(work_id).copied().unwrap_or(0)
    }

    /// Hold every confirmation query until the returned guard is dropped.
    pub async fn pause(&self) -> OwnedRwLockWriteGuard<()> {
        self.gate.clone().write_owned().await
    }

    /// Wait until a confirmation query has started.
    pub async fn wait_for_query(&self) {
        self.entered.notified().await;
    }

    fn check_blocks(&self) -> Result<(), LedgerError> {
        if self.fail_blocks.load(Ordering::SeqCst) {
            return Err(LedgerError::Transport("simulated block query failure".into()));
        }
        Ok(())
    }
}

impl Default for NullLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerClient for NullLedger {
    async fn submit(&self, call: LedgerCall) -> Result<WorkId, LedgerError> {
        if self.fail_submits.load(Ordering::SeqCst) {
            return Err(LedgerError::Transport("simulated submit failure".into()));
        }
        let n = self.next_work.fetch_add(1, Ordering::SeqCst);
        let work_id = WorkId::new(format!("0x{n:064x}"));
        self.submitted.lock().push((work_id.clone(), call));
        Ok(work_id)
    }

    async fn confirmation_of(&self, work_id: &WorkId) -> Result<Option<Confirmation>, LedgerError> {
        self.entered.notify_one();
        let _open = self.gate.read().await;
        *self.queries.lock().entry(work_id.clone()).or_default() += 1;
        if self.fail_confirmations.load(Ordering::SeqCst) {
            return Err(LedgerError::Transport("simulated confirmation failure".into()));
        }
        Ok(self.confirmations.lock().get(work_id).cloned())
    }

    async fn is_known(&self, work_id: &WorkId) -> Result<bool, LedgerError> {
        if self.fail_confirmations.load(Ordering::SeqCst) {
            return Err(LedgerError::Transport("simulated lookup failure".into()));
        }
        Ok(self.announced.lock().contains(work_id)
            || self.confirmations.lock().contains_key(work_id)
            || self.submitted.lock().iter().any(|(id, _)| id == work_id))
    }

    async fn block_number(&self) -> Result<u64, LedgerError> {
        self.check_blocks()?;
        Ok(self.block_times.lock().len().saturating_sub(1) as u64)
    }

    async fn latest_block(&self) -> Result<BlockTime, LedgerError> {
        self.check_blocks()?;
        let times = self.block_times.lock();
        let block = times.len().saturating_sub(1);
        let time = times
            .get(block)
            .copied()
            .ok_or_else(|| LedgerError::Malformed("empty chain".into()))?;
        Ok(BlockTime::new(block as u64, time))
    }

    async fn block_time(&self, block: u64) -> Result<BlockTime, LedgerError> {
        self.check_blocks()?;
        let times = self.block_times.lock();
        let time = usize::try_from(block)
            .ok()
            .and_then(|b| times.get(b).copied())
            .ok_or_else(|| LedgerError::Malformed(format!("no block {block}")))?;
        Ok(BlockTime::new(block, time))
    }

    async fn fee_policy(&self) -> Result<u128, LedgerError> {
        Ok(self.fee.load(Ordering::SeqCst).into())
    }
}
