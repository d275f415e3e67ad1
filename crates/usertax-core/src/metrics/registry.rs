//! Central metrics registry.
//!
//! Counts relationship mutations per scope and the outcome of profile
//! synchronization, so callers can observe how many writes an operation
//! actually produced.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::scope::ObjectScope;

/// Per-scope relationship counters.
#[derive(Debug, Default)]
struct ScopeCounters {
    /// `set_object_terms` calls.
    term_assignments: AtomicU64,
    /// Relationship rows inserted.
    rows_inserted: AtomicU64,
    /// Relationship rows deleted.
    rows_deleted: AtomicU64,
    /// Term counts recomputed.
    counts_recomputed: AtomicU64,
}

impl ScopeCounters {
    fn snapshot(&self) -> ScopeSnapshot {
        ScopeSnapshot {
            term_assignments: self.term_assignments.load(Ordering::Relaxed),
            rows_inserted: self.rows_inserted.load(Ordering::Relaxed),
            rows_deleted: self.rows_deleted.load(Ordering::Relaxed),
            counts_recomputed: self.counts_recomputed.load(Ordering::Relaxed),
        }
    }
}

/// Central registry for all metrics.
pub struct MetricsRegistry {
    started_at: Instant,

    // Relationship metrics
    native: ScopeCounters,
    user: ScopeCounters,

    // Synchronization metrics
    profile_writes: AtomicU64,
    profile_deletes: AtomicU64,
    syncs_skipped: AtomicU64,
    permission_skips: AtomicU64,
}

/// Snapshot of one scope's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ScopeSnapshot {
    /// `set_object_terms` calls.
    pub term_assignments: u64,
    /// Relationship rows inserted.
    pub rows_inserted: u64,
    /// Relationship rows deleted.
    pub rows_deleted: u64,
    /// Term counts recomputed.
    pub counts_recomputed: u64,
}

/// Point-in-time copy of every counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Seconds since the registry was created.
    pub uptime_secs: u64,
    /// Native scope counters.
    pub native: ScopeSnapshot,
    /// User scope counters.
    pub user: ScopeSnapshot,
    /// Profile values written by synchronization.
    pub profile_writes: u64,
    /// Profile values deleted by synchronization.
    pub profile_deletes: u64,
    /// Synchronizations skipped because nothing changed.
    pub syncs_skipped: u64,
    /// Operations skipped for lack of capability.
    pub permission_skips: u64,
}

impl MetricsRegistry {
    /// Create a new metrics registry.
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            native: ScopeCounters::default(),
            user: ScopeCounters::default(),
            profile_writes: AtomicU64::new(0),
            profile_deletes: AtomicU64::new(0),
            syncs_skipped: AtomicU64::new(0),
            permission_skips: AtomicU64::new(0),
        }
    }

    fn scope(&self, scope: ObjectScope) -> &ScopeCounters {
        match scope {
            ObjectScope::Post => &self.native,
            ObjectScope::User => &self.user,
        }
    }

    /// Record a `set_object_terms` call.
    pub fn record_term_assignment(&self, scope: ObjectScope) {
        self.scope(scope).term_assignments.fetch_add(1, Ordering::Relaxed);
    }

    /// Record inserted relationship rows.
    pub fn record_rows_inserted(&self, scope: ObjectScope, rows: u64) {
        self.scope(scope).rows_inserted.fetch_add(rows, Ordering::Relaxed);
    }

    /// Record deleted relationship rows.
    pub fn record_rows_deleted(&self, scope: ObjectScope, rows: u64) {
        self.scope(scope).rows_deleted.fetch_add(rows, Ordering::Relaxed);
    }

    /// Record recomputed term counts.
    pub fn record_counts_recomputed(&self, scope: ObjectScope, terms: u64) {
        self.scope(scope)
            .counts_recomputed
            .fetch_add(terms, Ordering::Relaxed);
    }

    /// Record a profile value written by synchronization.
    pub fn record_profile_write(&self) {
        self.profile_writes.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a profile value deleted by synchronization.
    pub fn record_profile_delete(&self) {
        self.profile_deletes.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a synchronization that found nothing to do.
    pub fn record_sync_skipped(&self) {
        self.syncs_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an operation skipped for lack of capability.
    pub fn record_permission_skip(&self) {
        self.permission_skips.fetch_add(1, Ordering::Relaxed);
    }

    /// `set_object_terms` calls against a scope so far.
    pub fn term_assignments(&self, scope: ObjectScope) -> u64 {
        self.scope(scope).term_assignments.load(Ordering::Relaxed)
    }

    /// Take a snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.started_at.elapsed().as_secs(),
            native: self.native.snapshot(),
            user: self.user.snapshot(),
            profile_writes: self.profile_writes.load(Ordering::Relaxed),
            profile_deletes: self.profile_deletes.load(Ordering::Relaxed),
            syncs_skipped: self.syncs_skipped.load(Ordering::Relaxed),
            permission_skips: self.permission_skips.load(Ordering::Relaxed),
        }
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared handle to a metrics registry.
pub type SharedMetricsRegistry = Arc<MetricsRegistry>;

/// Create a new shared metrics registry.
pub fn new_shared_registry() -> SharedMetricsRegistry {
    Arc::new(MetricsRegistry::new())
}
