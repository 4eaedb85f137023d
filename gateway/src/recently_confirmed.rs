//! Bounded FIFO of confirmations that were already handed to a callback.
//!
//! A callback registered after its work's receipt was dispatched would
//! otherwise wait forever; this cache lets it be answered at once.

use std::collections::{HashMap, VecDeque};

use xledger_ledger::Confirmation;
use xledger_types::WorkId;

pub struct RecentlyConfirmed {
    entries: HashMap<WorkId, Confirmation>,
    order: VecDeque<WorkId>,
    capacity: usize,
}

impl RecentlyConfirmed {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Remember `confirmation`, evicting the oldest entry when full.
    pub fn insert(&mut self, confirmation: Confirmation) {
        if self.capacity == 0 || self.entries.contains_key(&confirmation.work_id) {
            return;
        }
        if self.order.len() >= self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.entries.remove(&evicted);
            }
        }
        self.order.push_back(confirmation.work_id.clone());
        self.entries.insert(confirmation.work_id.clone(), confirmation);
    }

    pub fn get(&self, work_id: &WorkId) -> Option<&Confirmation> {
        self.entries.get(work_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
