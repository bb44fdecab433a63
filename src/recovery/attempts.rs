/// Attempt bookkeeping per failure identity
///
/// Counters are created on the first unsuccessful pass, incremented on each
/// further one, and removed on recovery or escalation. A recovery call holds
/// its counter through an [`AttemptScope`], so a call that is dropped midway
/// removes its counter too. All access goes through a single mutex that is
/// never held across an await.
use crate::context::Context;
use crate::Failure;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Derive the identity of a failure.
///
/// SHA-256 over the message, the context snapshot and the optional
/// correlation id, hex encoded and truncated to `length` characters.
pub fn error_id(
    failure: &Failure,
    context: &Context,
    correlation: Option<&str>,
    length: usize,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(failure.message().as_bytes());
    hasher.update([0u8]);
    hasher.update(context.snapshot().as_bytes());
    if let Some(correlation) = correlation {
        hasher.update([0u8]);
        hasher.update(correlation.as_bytes());
    }

    let mut id: String = hasher
        .finalize()
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect();
    id.truncate(length);
    id
}

#[derive(Debug, Default)]
pub struct AttemptTracker {
    counters: Mutex<HashMap<String, u32>>,
}

impl AttemptTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, u32>> {
        // A panicking holder cannot leave a counter half-written
        self.counters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Attempts recorded so far, 0 when unknown
    pub fn get(&self, error_id: &str) -> u32 {
        self.lock().get(error_id).copied().unwrap_or(0)
    }

    /// Increment and return the new count
    pub fn increment(&self, error_id: &str) -> u32 {
        let mut counters = self.lock();
        let count = counters.entry(error_id.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    /// Remove a counter, returning its value immediately before removal
    pub fn take(&self, error_id: &str) -> Option<u32> {
        self.lock().remove(error_id)
    }

    pub fn contains(&self, error_id: &str) -> bool {
        self.lock().contains_key(error_id)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Hold the counter for `key` until the scope is released or dropped
    pub fn scope(&self, key: impl Into<String>) -> AttemptScope<'_> {
        AttemptScope {
            tracker: self,
            key: key.into(),
            released: false,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Counter owned by one in-flight recovery call
#[derive(Debug)]
pub struct AttemptScope<'a> {
    tracker: &'a AttemptTracker,
    key: String,
    released: bool,
}

impl AttemptScope<'_> {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn get(&self) -> u32 {
        self.tracker.get(&self.key)
    }

    pub fn increment(&self) -> u32 {
        self.tracker.increment(&self.key)
    }

    /// Remove the counter, returning its value immediately before removal
    pub fn release(mut self) -> Option<u32> {
        self.released = true;
        self.tracker.take(&self.key)
    }
}

impl Drop for AttemptScope<'_> {
    fn drop(&mut self) {
        if !self.released {
            self.tracker.take(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_error_id_is_deterministic() {
        let failure = Failure::new("RPC down");
        let ctx = Context::new().with("endpoint", "a");

        let first = error_id(&failure, &ctx, None, 32);
        assert_eq!(first, error_id(&failure, &ctx, None, 32));
        assert_eq!(first.len(), 32);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_error_id_depends_on_inputs() {
        let failure = Failure::new("RPC down");
        let ctx = Context::new().with("endpoint", "a");
        let base = error_id(&failure, &ctx, None, 32);

        assert_ne!(base, error_id(&Failure::new("RPC up"), &ctx, None, 32));
        assert_ne!(
            base,
            error_id(&failure, &Context::new().with("endpoint", "b"), None, 32)
        );
        assert_ne!(base, error_id(&failure, &ctx, Some("req-1"), 32));
        assert_ne!(
            error_id(&failure, &ctx, Some("req-1"), 32),
            error_id(&failure, &ctx, Some("req-2"), 32)
        );
    }

    #[test]
    fn test_error_id_length_bounded() {
        let id = error_id(&Failure::new("x"), &Context::new(), None, 500);
        assert_eq!(id.len(), 64);
        assert_eq!(error_id(&Failure::new("x"), &Context::new(), None, 8).len(), 8);
    }

    #[test]
    fn test_counter_lifecycle() {
        let tracker = AttemptTracker::new();
        assert_eq!(tracker.get("a"), 0);
        assert!(!tracker.contains("a"));

        assert_eq!(tracker.increment("a"), 1);
        assert_eq!(tracker.increment("a"), 2);
        assert_eq!(tracker.get("a"), 2);

        assert_eq!(tracker.take("a"), Some(2));
        assert_eq!(tracker.take("a"), None);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_scope_release_returns_count() {
        let tracker = AttemptTracker::new();
        let scope = tracker.scope("a");
        scope.increment();
        scope.increment();

        assert_eq!(scope.get(), 2);
        assert_eq!(scope.release(), Some(2));
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_dropped_scope_removes_counter() {
        let tracker = AttemptTracker::new();
        {
            let scope = tracker.scope("a");
            scope.increment();
            assert!(tracker.contains("a"));
        }
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_concurrent_increments() {
        let tracker = Arc::new(AttemptTracker::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        tracker.increment("shared");
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(tracker.get("shared"), 800);
    }
}
