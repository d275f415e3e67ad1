//! Profile/taxonomy synchronizer.
//!
//! Subscribes to the four mutation events and keeps taxonomy-backed profile
//! fields and user term assignments consistent:
//!
//! - `TermsAssigned`: mirror the user's resulting term set into every field
//!   with `sync_to_profile`.
//! - `ProfileFieldSaved`: push the new value into the taxonomy. Terms the
//!   field no longer wants are released unless a sibling field on the same
//!   taxonomy still holds them.
//! - `ProfileFieldDeleted`: release the field's terms under the same rule.
//! - `FieldSettingsChanged`: backfill when `sync_terms` is switched on.
//!
//! Writes made here never publish events. Profile writes go straight to the
//! profile store and term writes go through the scope-bound primitives, so a
//! change cannot bounce between the two directions.
//!
//! Handlers A to C run inside the publisher's `(user, taxonomy)` lock and
//! never take it themselves. The backfill locks each user it touches.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;
use usertax_core::{SharedMetricsRegistry, TaxonomyRegistry, TermStore};

use crate::backfill::{BackfillConfig, BackfillExecutor};
use crate::config::SyncConfig;
use crate::error::Error;
use crate::events::{EventKind, Outcome, Subscriber, SyncEvent};
use crate::locks::PairLocks;
use crate::profile::{FieldSettings, ProfileStore, ProfileValue};

const KINDS: [EventKind; 4] = [
    EventKind::TermsAssigned,
    EventKind::ProfileFieldSaved,
    EventKind::ProfileFieldDeleted,
    EventKind::FieldSettingsChanged,
];

/// Reactive translator between profile values and term assignments.
pub struct Synchronizer {
    terms: Arc<TermStore>,
    profiles: Arc<ProfileStore>,
    registry: Arc<TaxonomyRegistry>,
    metrics: SharedMetricsRegistry,
    config: SyncConfig,
    locks: Arc<PairLocks>,
}

impl Synchronizer {
    /// Create a synchronizer over the two stores, sharing the publisher's lock table.
    pub fn new(
        terms: Arc<TermStore>,
        profiles: Arc<ProfileStore>,
        registry: Arc<TaxonomyRegistry>,
        config: SyncConfig,
        locks: Arc<PairLocks>,
    ) -> Self {
        let metrics = terms.metrics().clone();
        Self {
            terms,
            profiles,
            registry,
            metrics,
            config,
            locks,
        }
    }

    fn on_terms_assigned(
        &self,
        user_id: u64,
        taxonomy: &str,
        term_taxonomy_ids: &[u64],
    ) -> Result<Outcome, Error> {
        if !self.config.terms_to_profile {
            return Ok(Outcome::Skipped);
        }

        let mut slugs = Vec::with_capacity(term_taxonomy_ids.len());
        for &tt_id in term_taxonomy_ids {
            match self.terms.get_term(tt_id)? {
                Some(term) if term.taxonomy == taxonomy => slugs.push(term.slug),
                _ => debug!(tt_id, taxonomy, "skipping unresolved term"),
            }
        }

        let mut wrote = false;
        for (field, settings) in self.profiles.fields_for_taxonomy(taxonomy)? {
            if !settings.sync_to_profile {
                continue;
            }
            match ProfileValue::for_field(&slugs, settings.multiple) {
                Some(value) => {
                    if self.profiles.set_value(field.id, user_id, &value)? {
                        self.metrics.record_profile_write();
                        wrote = true;
                    } else {
                        self.metrics.record_sync_skipped();
                    }
                }
                None => {
                    if self.profiles.delete_value(field.id, user_id)?.is_some() {
                        self.metrics.record_profile_delete();
                        wrote = true;
                    }
                }
            }
        }

        Ok(if wrote { Outcome::Applied } else { Outcome::Skipped })
    }

    fn on_field_saved(
        &self,
        field_id: u64,
        user_id: u64,
        previous: Option<&ProfileValue>,
        value: &ProfileValue,
    ) -> Result<Outcome, Error> {
        let Some(taxonomy) = self.pushing_taxonomy(field_id)? else {
            return Ok(Outcome::Skipped);
        };

        let current = previous.map(ProfileValue::slug_set).unwrap_or_default();
        let new = value.slug_set();
        if current == new {
            self.metrics.record_sync_skipped();
            debug!(field_id, user_id, "value unchanged");
            return Ok(Outcome::Skipped);
        }

        self.release_and_assign(field_id, user_id, &taxonomy, &current, &new)
    }

    fn on_field_deleted(
        &self,
        field_id: u64,
        user_id: u64,
        previous: Option<&ProfileValue>,
    ) -> Result<Outcome, Error> {
        let Some(previous) = previous else {
            return Ok(Outcome::Skipped);
        };
        let Some(taxonomy) = self.pushing_taxonomy(field_id)? else {
            return Ok(Outcome::Skipped);
        };

        self.release_and_assign(field_id, user_id, &taxonomy, &previous.slug_set(), &BTreeSet::new())
    }

    fn on_settings_changed(
        &self,
        field_id: u64,
        previous: &FieldSettings,
        current: &FieldSettings,
    ) -> Result<Outcome, Error> {
        if !self.config.backfill_on_enable || previous.sync_terms || !current.sync_terms {
            return Ok(Outcome::Skipped);
        }
        let Some(taxonomy) = current.taxonomy.as_deref() else {
            return Ok(Outcome::Skipped);
        };
        let is_taxonomy_field = self
            .profiles
            .get_field(field_id)?
            .is_some_and(|field| field.is_taxonomy());
        if !is_taxonomy_field || !self.registry.is_user_taxonomy(taxonomy) {
            return Ok(Outcome::Skipped);
        }

        let executor = BackfillExecutor::new(
            self.terms.clone(),
            self.profiles.clone(),
            BackfillConfig::default(),
        );
        let report = executor.execute(field_id, taxonomy, &self.locks)?;
        Ok(Outcome::Backfilled(report))
    }

    /// Taxonomy a field pushes its values into, if profile-to-terms applies.
    fn pushing_taxonomy(&self, field_id: u64) -> Result<Option<String>, Error> {
        if !self.config.profile_to_terms {
            return Ok(None);
        }
        let Some(field) = self.profiles.get_field(field_id)? else {
            return Ok(None);
        };
        if !field.is_taxonomy() {
            return Ok(None);
        }
        let settings = self.profiles.settings(field_id)?;
        match settings.taxonomy {
            Some(taxonomy) if settings.sync_terms && self.registry.is_user_taxonomy(&taxonomy) => {
                Ok(Some(taxonomy))
            }
            _ => Ok(None),
        }
    }

    /// Release `current - claimed_by_siblings - new`, then append `new`.
    fn release_and_assign(
        &self,
        field_id: u64,
        user_id: u64,
        taxonomy: &str,
        current: &BTreeSet<String>,
        new: &BTreeSet<String>,
    ) -> Result<Outcome, Error> {
        let mut claimed = BTreeSet::new();
        for (sibling, settings) in self.profiles.fields_for_taxonomy(taxonomy)? {
            if sibling.id == field_id || !settings.sync_terms {
                continue;
            }
            if let Some(value) = self.profiles.get_value(sibling.id, user_id)? {
                claimed.extend(value.slug_set());
            }
        }

        let remove: Vec<&String> = current
            .iter()
            .filter(|slug| !claimed.contains(*slug) && !new.contains(*slug))
            .collect();
        let assign: Vec<&String> = new.iter().collect();

        self.terms.with_user_scope(|terms| {
            if !remove.is_empty() {
                terms.remove_object_terms(user_id, &remove, taxonomy)?;
            }
            if !assign.is_empty() {
                terms.set_object_terms(user_id, &assign, taxonomy, true)?;
            }
            Ok::<_, usertax_core::Error>(())
        })?;

        debug!(
            field_id,
            user_id,
            taxonomy,
            removed = remove.len(),
            assigned = assign.len(),
            "profile value pushed to terms"
        );
        Ok(Outcome::Applied)
    }
}

impl Subscriber for Synchronizer {
    fn name(&self) -> &str {
        "profile-taxonomy-sync"
    }

    fn kinds(&self) -> &[EventKind] {
        &KINDS
    }

    fn handle(&self, event: &SyncEvent) -> Result<Outcome, Error> {
        match event {
            SyncEvent::TermsAssigned {
                user_id,
                taxonomy,
                term_taxonomy_ids,
            } => self.on_terms_assigned(*user_id, taxonomy, term_taxonomy_ids),
            SyncEvent::ProfileFieldSaved {
                field_id,
                user_id,
                previous,
                value,
            } => self.on_field_saved(*field_id, *user_id, previous.as_ref(), value),
            SyncEvent::ProfileFieldDeleted {
                field_id,
                user_id,
                previous,
            } => self.on_field_deleted(*field_id, *user_id, previous.as_ref()),
            SyncEvent::FieldSettingsChanged {
                field_id,
                previous,
                current,
            } => self.on_settings_changed(*field_id, previous, current),
        }
    }
}
