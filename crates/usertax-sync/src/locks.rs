//! Per-(user, taxonomy) serialization of synchronization work.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{ArcMutexGuard, Mutex, RawMutex};

/// Lock table keyed by `(user_id, taxonomy)`.
///
/// Every write to a user's terms or to a taxonomy-backed profile value holds
/// the pair's lock for its whole read-diff-write sequence, including the
/// event handlers it triggers. Entries nobody holds or waits on are evicted
/// when the last guard drops.
#[derive(Default)]
pub struct PairLocks {
    locks: DashMap<(u64, String), Arc<Mutex<()>>>,
}

impl PairLocks {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until the pair is free and hold it until the guard drops.
    pub fn lock(&self, user_id: u64, taxonomy: &str) -> PairGuard<'_> {
        let key = (user_id, taxonomy.to_string());
        let mutex = self.locks.entry(key.clone()).or_default().clone();
        let guard = mutex.lock_arc();
        PairGuard {
            locks: self,
            key,
            guard: Some(guard),
        }
    }

    /// Number of pairs currently held or waited on.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Check whether no pair is held.
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Holds one pair of a [`PairLocks`] table.
pub struct PairGuard<'a> {
    locks: &'a PairLocks,
    key: (u64, String),
    guard: Option<ArcMutexGuard<RawMutex, ()>>,
}

impl Drop for PairGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Waiters hold their own handle, so a count of one means nobody needs the entry.
        self.locks
            .locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_same_pair_waits() {
        let locks = Arc::new(PairLocks::new());
        let entered = Arc::new(AtomicBool::new(false));

        let held = locks.lock(1, "department");
        let waiter = {
            let locks = locks.clone();
            let entered = entered.clone();
            thread::spawn(move || {
                let _guard = locks.lock(1, "department");
                entered.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!entered.load(Ordering::SeqCst));
        // A different pair is independent.
        drop(locks.lock(2, "department"));

        drop(held);
        waiter.join().unwrap();
        assert!(entered.load(Ordering::SeqCst));
    }

    #[test]
    fn test_released_pairs_are_evicted() {
        let locks = PairLocks::new();
        {
            let _a = locks.lock(1, "department");
            let _b = locks.lock(1, "team");
            assert_eq!(locks.len(), 2);
        }
        assert!(locks.is_empty());
    }
}
