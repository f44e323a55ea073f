//! Per-resource mutual exclusion.
//!
//! Each managed resource gets one async mutex, created on first use and
//! guarding that resource's lifecycle phase. Operations on different
//! resources never contend; operations on the same resource queue in
//! arrival order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::lifecycle::Phase;

/// Registry of per-resource locks.
#[derive(Debug, Default)]
pub struct ResourceLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<Phase>>>>,
}

impl ResourceLocks {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the lock for `key`, registering it in `initial` phase if unknown.
    fn handle(&self, key: &str, initial: Phase) -> Arc<AsyncMutex<Phase>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(initial)))
            .clone()
    }

    /// Wait for exclusive access to `key`.
    ///
    /// A resource seen for the first time starts in `initial`: `Absent` when
    /// it is about to be created, `Present` when the caller holds state from
    /// an earlier run.
    pub async fn acquire(&self, key: &str, initial: Phase) -> OwnedMutexGuard<Phase> {
        self.handle(key, initial).lock_owned().await
    }

    /// Current phase of `key`, waiting for any in-flight operation.
    pub async fn phase(&self, key: &str) -> Option<Phase> {
        let handle = {
            let locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.get(key).cloned()
        };
        match handle {
            Some(handle) => Some(*handle.lock().await),
            None => None,
        }
    }

    /// Returns true if an operation currently holds `key`.
    pub fn is_busy(&self, key: &str) -> bool {
        let locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.get(key).is_some_and(|handle| handle.try_lock().is_err())
    }

    /// Number of resources seen.
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Returns true if no resource has been seen.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
