//! Backfill of term assignments from stored profile values.
//!
//! Runs once when a field starts pushing its values into a taxonomy: every
//! stored value of the field is appended to the user's terms.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};
use usertax_core::TermStore;

use crate::error::Error;
use crate::locks::PairLocks;
use crate::profile::ProfileStore;

/// Configuration for backfill execution.
#[derive(Debug, Clone)]
pub struct BackfillConfig {
    /// Number of rows between progress log lines.
    pub batch_size: usize,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self { batch_size: 500 }
    }
}

/// Result of a backfill run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    /// Field whose values were pushed.
    pub field_id: u64,
    /// Target taxonomy.
    pub taxonomy: String,
    /// Stored values read.
    pub rows_scanned: u64,
    /// Users that received new terms.
    pub users_updated: u64,
    /// Users that already held every term.
    pub users_unchanged: u64,
    /// Per-user failures; the run continues past them.
    pub errors: Vec<BackfillError>,
}

impl BackfillReport {
    fn new(field_id: u64, taxonomy: &str) -> Self {
        Self {
            field_id,
            taxonomy: taxonomy.to_string(),
            rows_scanned: 0,
            users_updated: 0,
            users_unchanged: 0,
            errors: Vec::new(),
        }
    }
}

/// Error during backfill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackfillError {
    /// User whose value could not be applied.
    pub user_id: u64,
    /// Error message.
    pub error_message: String,
}

/// Executor for backfill runs.
pub struct BackfillExecutor {
    terms: Arc<TermStore>,
    profiles: Arc<ProfileStore>,
    config: BackfillConfig,
}

impl BackfillExecutor {
    /// Create a new backfill executor.
    pub fn new(terms: Arc<TermStore>, profiles: Arc<ProfileStore>, config: BackfillConfig) -> Self {
        Self {
            terms,
            profiles,
            config,
        }
    }

    /// Append every stored value of `field_id` to the users' terms in `taxonomy`.
    pub fn execute(
        &self,
        field_id: u64,
        taxonomy: &str,
        locks: &PairLocks,
    ) -> Result<BackfillReport, Error> {
        let mut report = BackfillReport::new(field_id, taxonomy);
        let batch_size = self.config.batch_size.max(1);

        for (user_id, value) in self.profiles.values_for_field(field_id)? {
            report.rows_scanned += 1;

            let _guard = locks.lock(user_id, taxonomy);

            let result: Result<bool, usertax_core::Error> = self.terms.with_user_scope(|terms| {
                let held: BTreeSet<String> = terms
                    .get_object_term_slugs(user_id, taxonomy)?
                    .into_iter()
                    .collect();
                let wanted = value.slug_set();
                if wanted.is_subset(&held) {
                    return Ok(false);
                }
                let slugs: Vec<String> = wanted.into_iter().collect();
                terms.set_object_terms(user_id, &slugs, taxonomy, true)?;
                Ok(true)
            });

            match result {
                Ok(true) => report.users_updated += 1,
                Ok(false) => report.users_unchanged += 1,
                Err(e) => report.errors.push(BackfillError {
                    user_id,
                    error_message: e.to_string(),
                }),
            }

            if report.rows_scanned % batch_size as u64 == 0 {
                debug!(field_id, taxonomy, rows = report.rows_scanned, "backfill progress");
            }
        }

        info!(
            field_id,
            taxonomy,
            rows = report.rows_scanned,
            updated = report.users_updated,
            errors = report.errors.len(),
            "backfill complete"
        );
        Ok(report)
    }
}
