/// Bounded diagnostic history of strategy applications
use super::classification::FailureCategory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryLogEntry {
    pub timestamp: DateTime<Utc>,
    pub error_id: String,
    pub category: FailureCategory,
    pub strategy: String,
    pub success: bool,
    pub action: String,
}

/// FIFO ring buffer; the oldest entry is dropped once `capacity` is reached
#[derive(Debug)]
pub struct RecoveryLog {
    capacity: usize,
    entries: Mutex<VecDeque<RecoveryLogEntry>>,
}

impl RecoveryLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<RecoveryLogEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record(&self, entry: RecoveryLogEntry) {
        let mut entries = self.lock();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Snapshot, oldest first
    pub fn entries(&self) -> Vec<RecoveryLogEntry> {
        self.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for RecoveryLog {
    fn default() -> Self {
        Self::new(crate::settings::DEFAULT_LOG_CAPACITY)
    }
}
