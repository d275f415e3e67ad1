//! User taxonomy facade.
//!
//! [`UserTaxonomies`] is the entry point host code calls. It runs every
//! operation against the user relationship table and publishes the matching
//! event after each mutation, which is where synchronization hooks in.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};
use usertax_core::{
    build_term_tree, Actor, ObjectScope, SharedMetricsRegistry, StorageConfig, StorageEngine,
    TaxonomyDef, TaxonomyRegistry, Term, TermNode, TermQuery, TermStore,
};

use crate::backfill::{BackfillConfig, BackfillExecutor, BackfillReport};
use crate::bulk::{BulkAction, BulkEditReport};
use crate::config::SyncConfig;
use crate::error::Error;
use crate::events::{EventBus, Outcome, SyncEvent};
use crate::locks::PairLocks;
use crate::profile::{
    FieldSettings, FieldSettingsPatch, FieldType, PostedValue, ProfileField, ProfileStore,
    SortDirection,
};
use crate::sync::Synchronizer;

/// Choices a taxonomy field offers one user.
#[derive(Debug, Clone, Serialize)]
pub struct FieldChoices {
    pub field: ProfileField,
    pub settings: FieldSettings,
    /// Every term of the field's taxonomy, in the field's order.
    pub terms: Vec<Term>,
    /// Slugs the user currently holds.
    pub selected: BTreeSet<String>,
}

/// User-scoped taxonomies with profile-field synchronization.
pub struct UserTaxonomies {
    engine: Arc<StorageEngine>,
    registry: Arc<TaxonomyRegistry>,
    terms: Arc<TermStore>,
    profiles: Arc<ProfileStore>,
    bus: EventBus,
    locks: Arc<PairLocks>,
}

impl UserTaxonomies {
    /// Open the stores and install the synchronizer.
    pub fn open(
        storage: StorageConfig,
        registry: Arc<TaxonomyRegistry>,
        config: SyncConfig,
    ) -> Result<Self, Error> {
        let engine = Arc::new(StorageEngine::open(storage)?);
        Self::from_engine(engine, registry, config)
    }

    /// Build the facade over an open storage engine.
    pub fn from_engine(
        engine: Arc<StorageEngine>,
        registry: Arc<TaxonomyRegistry>,
        config: SyncConfig,
    ) -> Result<Self, Error> {
        let terms = Arc::new(TermStore::open(engine.clone(), registry.clone())?);
        let profiles = Arc::new(ProfileStore::open(engine.clone())?);
        let bus = EventBus::new();
        let locks = Arc::new(PairLocks::new());

        if config.profile_enabled {
            bus.subscribe(Arc::new(Synchronizer::new(
                terms.clone(),
                profiles.clone(),
                registry.clone(),
                config,
                locks.clone(),
            )));
        }

        info!(
            user_table = terms.table(ObjectScope::User).name(),
            recovered = engine.was_recovered(),
            profile_sync = config.profile_enabled,
            "user taxonomies opened"
        );

        Ok(Self {
            engine,
            registry,
            terms,
            profiles,
            bus,
            locks,
        })
    }

    /// Get the storage engine.
    pub fn engine(&self) -> &StorageEngine {
        &self.engine
    }

    /// Get the taxonomy registry.
    pub fn registry(&self) -> &TaxonomyRegistry {
        &self.registry
    }

    /// Get the term store.
    pub fn terms(&self) -> &TermStore {
        &self.terms
    }

    /// Get the profile store.
    pub fn profiles(&self) -> &ProfileStore {
        &self.profiles
    }

    /// Get the event bus.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Get the per-(user, taxonomy) lock table.
    pub fn locks(&self) -> &PairLocks {
        &self.locks
    }

    /// Get the metrics registry.
    pub fn metrics(&self) -> &SharedMetricsRegistry {
        self.terms.metrics()
    }

    fn user_taxonomy(&self, taxonomy: &str) -> Result<TaxonomyDef, Error> {
        match self.registry.get(taxonomy) {
            Some(def) if self.registry.is_user_taxonomy(taxonomy) => Ok(def),
            _ => Err(usertax_core::Error::InvalidTaxonomy {
                taxonomy: taxonomy.to_string(),
                scope: ObjectScope::User.to_string(),
            }
            .into()),
        }
    }

    // ========== Users ==========

    /// Register a user account. Logins equal to a user taxonomy name are refused.
    pub fn register_user(&self, user_id: u64, login: &str) -> Result<(), Error> {
        if self.registry.sanitize_username(login).is_empty() {
            return Err(Error::InvalidValue(format!("username '{login}' is reserved")));
        }
        self.terms.register_subject(ObjectScope::User, user_id, login)?;
        Ok(())
    }

    /// Delete a user account with its relationships and profile values.
    pub fn delete_user(&self, user_id: u64) -> Result<bool, Error> {
        for field in self.profiles.fields()? {
            self.profiles.delete_value(field.id, user_id)?;
        }
        Ok(self.terms.delete_subject(ObjectScope::User, user_id)?)
    }

    // ========== Term Assignment ==========

    /// Assign terms to a user.
    ///
    /// With `update_profile`, fields mirroring the taxonomy receive the
    /// user's resulting term set.
    pub fn set_user_terms<S: AsRef<str>>(
        &self,
        user_id: u64,
        slugs: &[S],
        taxonomy: &str,
        append: bool,
        update_profile: bool,
    ) -> Result<Vec<u64>, Error> {
        let _pair = self.locks.lock(user_id, taxonomy);
        self.write_terms(user_id, slugs, taxonomy, append, update_profile)
    }

    /// Remove terms from a user. Returns the number removed.
    pub fn remove_user_terms<S: AsRef<str>>(
        &self,
        user_id: u64,
        slugs: &[S],
        taxonomy: &str,
        update_profile: bool,
    ) -> Result<usize, Error> {
        let _pair = self.locks.lock(user_id, taxonomy);
        let removed = self
            .terms
            .with_user_scope(|terms| terms.remove_object_terms(user_id, slugs, taxonomy))?;
        if update_profile {
            self.publish_assigned(user_id, taxonomy)?;
        }
        Ok(removed)
    }

    /// Remove every term of a taxonomy from a user.
    pub fn delete_user_relationships(
        &self,
        user_id: u64,
        taxonomy: &str,
        update_profile: bool,
    ) -> Result<usize, Error> {
        let _pair = self.locks.lock(user_id, taxonomy);
        self.clear_terms(user_id, taxonomy, update_profile)
    }

    /// Terms a user holds in a taxonomy, by name.
    pub fn get_user_terms(&self, user_id: u64, taxonomy: &str) -> Result<Vec<Term>, Error> {
        Ok(self
            .terms
            .with_user_scope(|terms| terms.get_object_terms(user_id, taxonomy))?)
    }

    // Callers below hold the pair lock.

    fn write_terms<S: AsRef<str>>(
        &self,
        user_id: u64,
        slugs: &[S],
        taxonomy: &str,
        append: bool,
        update_profile: bool,
    ) -> Result<Vec<u64>, Error> {
        let ids = self
            .terms
            .with_user_scope(|terms| terms.set_object_terms(user_id, slugs, taxonomy, append))?;
        if update_profile {
            self.publish_assigned(user_id, taxonomy)?;
        }
        Ok(ids)
    }

    fn clear_terms(&self, user_id: u64, taxonomy: &str, update_profile: bool) -> Result<usize, Error> {
        let removed = self
            .terms
            .with_user_scope(|terms| terms.delete_object_term_relationships(user_id, &[taxonomy]))?;
        if update_profile {
            self.publish_assigned(user_id, taxonomy)?;
        }
        Ok(removed)
    }

    /// Replace a user's terms, or clear them for an empty selection.
    fn replace_terms(&self, user_id: u64, slugs: &[String], taxonomy: &str) -> Result<(), Error> {
        if slugs.is_empty() {
            self.clear_terms(user_id, taxonomy, true)?;
        } else {
            self.write_terms(user_id, slugs, taxonomy, false, true)?;
        }
        Ok(())
    }

    fn publish_assigned(&self, user_id: u64, taxonomy: &str) -> Result<(), Error> {
        let term_taxonomy_ids = self
            .get_user_terms(user_id, taxonomy)?
            .into_iter()
            .map(|term| term.term_taxonomy_id)
            .collect();
        self.bus.publish(&SyncEvent::TermsAssigned {
            user_id,
            taxonomy: taxonomy.to_string(),
            term_taxonomy_ids,
        })?;
        Ok(())
    }

    /// Replace a user's terms on behalf of `actor`.
    ///
    /// Returns false, without writing, when the actor may not edit the user
    /// or assign the taxonomy's terms. An empty selection clears the terms.
    pub fn set_terms_for_user(
        &self,
        actor: &Actor,
        user_id: u64,
        taxonomy: &str,
        posted: &PostedValue,
    ) -> Result<bool, Error> {
        let def = self.user_taxonomy(taxonomy)?;
        if let Err(e) = actor.require_term_assignment(user_id, &def) {
            self.metrics().record_permission_skip();
            debug!(user_id, taxonomy, error = %e, "term assignment skipped");
            return Ok(false);
        }

        let mut slugs = posted.ordered_slugs();
        if def.single_value {
            slugs.truncate(1);
        }

        let _pair = self.locks.lock(user_id, taxonomy);
        self.replace_terms(user_id, &slugs, taxonomy)?;
        Ok(true)
    }

    /// Save the taxonomy part of a profile screen.
    ///
    /// Every user taxonomy is written from `form`; a taxonomy missing from
    /// the form is cleared. Returns the taxonomies written.
    pub fn save_profile(
        &self,
        actor: &Actor,
        user_id: u64,
        form: &HashMap<String, PostedValue>,
    ) -> Result<Vec<String>, Error> {
        let empty = PostedValue::Many(Vec::new());
        let mut written = Vec::new();
        for def in self.registry.user_taxonomies() {
            let posted = form.get(&def.name).unwrap_or(&empty);
            if self.set_terms_for_user(actor, user_id, &def.name, posted)? {
                written.push(def.name);
            }
        }
        Ok(written)
    }

    /// Apply a bulk action to a list of users.
    pub fn bulk_edit(
        &self,
        actor: &Actor,
        user_ids: &[u64],
        taxonomy: &str,
        action: &BulkAction,
    ) -> Result<BulkEditReport, Error> {
        let def = self.user_taxonomy(taxonomy)?;
        let mut report = BulkEditReport::default();

        for &user_id in user_ids {
            if let Err(e) = actor.require_term_assignment(user_id, &def) {
                self.metrics().record_permission_skip();
                debug!(user_id, taxonomy, error = %e, "bulk edit skipped");
                report.skipped.push(user_id);
                continue;
            }

            let _pair = self.locks.lock(user_id, taxonomy);
            let current: Vec<String> = self
                .get_user_terms(user_id, taxonomy)?
                .into_iter()
                .map(|term| term.slug)
                .collect();
            let next = action.apply(&current);

            let before: BTreeSet<&String> = current.iter().collect();
            let after: BTreeSet<&String> = next.iter().collect();
            if before == after {
                report.unchanged.push(user_id);
                continue;
            }

            self.replace_terms(user_id, &next, taxonomy)?;
            report.updated.push(user_id);
        }

        info!(
            taxonomy,
            action = %action,
            updated = report.updated.len(),
            unchanged = report.unchanged.len(),
            skipped = report.skipped.len(),
            "bulk edit complete"
        );
        Ok(report)
    }

    // ========== Queries ==========

    /// Users holding every `(taxonomy, slug)` term.
    ///
    /// Without filters every registered user is returned. An unknown slug
    /// matches no one.
    pub fn users_in_terms(&self, filters: &[(&str, &str)]) -> Result<Vec<u64>, Error> {
        if filters.is_empty() {
            return Ok(self
                .engine
                .subject_ids(ObjectScope::User)
                .collect::<Result<Vec<_>, _>>()?);
        }

        let mut matched: Option<BTreeSet<u64>> = None;
        for &(taxonomy, slug) in filters {
            self.user_taxonomy(taxonomy)?;
            let Some(term) = self.terms.term_by_slug(taxonomy, slug)? else {
                debug!(taxonomy, slug, "filter term not found");
                return Ok(Vec::new());
            };
            let users: BTreeSet<u64> = self
                .terms
                .with_user_scope(|terms| terms.get_objects_in_term(&[term.term_id], taxonomy))?
                .into_iter()
                .collect();
            matched = Some(match matched {
                Some(prev) => prev.intersection(&users).copied().collect(),
                None => users,
            });
        }
        Ok(matched.unwrap_or_default().into_iter().collect())
    }

    /// Terms of a user taxonomy as a tree.
    pub fn term_tree(&self, taxonomy: &str) -> Result<Vec<TermNode>, Error> {
        self.user_taxonomy(taxonomy)?;
        let terms = self
            .terms
            .with_user_scope(|terms| terms.get_terms(taxonomy, &TermQuery::all()))?;
        Ok(build_term_tree(&terms))
    }

    /// Recompute the counts of every term of a taxonomy. Returns the number of terms.
    pub fn recount(&self, taxonomy: &str) -> Result<usize, Error> {
        if !self.registry.exists(taxonomy) {
            return Err(usertax_core::Error::TermNotFound(format!("taxonomy '{taxonomy}'")).into());
        }
        let ids: Vec<u64> = self
            .terms
            .terms_in_taxonomy(taxonomy)?
            .into_iter()
            .map(|record| record.term_taxonomy_id)
            .collect();

        let scope = if self.registry.is_user_taxonomy(taxonomy) {
            ObjectScope::User
        } else {
            ObjectScope::Post
        };
        self.terms
            .with_scope(scope, |terms| terms.update_term_count(&ids))?;

        info!(taxonomy, terms = ids.len(), scope = %scope, "counts recomputed");
        Ok(ids.len())
    }

    // ========== Profile Fields ==========

    /// Create a profile field.
    pub fn create_field(
        &self,
        name: &str,
        field_type: FieldType,
        order_by: SortDirection,
    ) -> Result<ProfileField, Error> {
        self.profiles.create_field(name, field_type, order_by)
    }

    /// Save a field's settings.
    ///
    /// Returns the backfill report when the save switched on pushing values
    /// into the taxonomy.
    pub fn save_field_settings(
        &self,
        field_id: u64,
        patch: &FieldSettingsPatch,
    ) -> Result<Option<BackfillReport>, Error> {
        self.profiles.require_field(field_id)?;
        let previous = self.profiles.settings(field_id)?;
        let current = patch.apply(&previous);

        if let Some(taxonomy) = &current.taxonomy {
            if !self.registry.is_user_taxonomy(taxonomy) {
                return Err(Error::InvalidSettings(format!(
                    "'{taxonomy}' is not a user taxonomy"
                )));
            }
        }

        self.profiles.put_settings(field_id, &current)?;
        let outcomes = self.bus.publish(&SyncEvent::FieldSettingsChanged {
            field_id,
            previous,
            current,
        })?;

        Ok(outcomes.into_iter().find_map(|outcome| match outcome {
            Outcome::Backfilled(report) => Some(report),
            _ => None,
        }))
    }

    /// Save a profile value. An empty selection deletes the value.
    ///
    /// For a field bound to a taxonomy, the read of the prior value, the write
    /// and the synchronization it triggers run under the pair lock.
    pub fn save_field_value(
        &self,
        field_id: u64,
        user_id: u64,
        posted: &PostedValue,
    ) -> Result<(), Error> {
        self.profiles.require_field(field_id)?;
        let settings = self.profiles.settings(field_id)?;
        let _pair = settings
            .taxonomy
            .as_deref()
            .map(|taxonomy| self.locks.lock(user_id, taxonomy));

        let Some(value) = posted.to_profile_value(settings.multiple) else {
            self.remove_field_value(field_id, user_id)?;
            return Ok(());
        };

        let previous = self.profiles.get_value(field_id, user_id)?;
        self.profiles.set_value(field_id, user_id, &value)?;
        self.bus.publish(&SyncEvent::ProfileFieldSaved {
            field_id,
            user_id,
            previous,
            value,
        })?;
        Ok(())
    }

    /// Delete a profile value. Returns false if nothing was stored.
    pub fn delete_field_value(&self, field_id: u64, user_id: u64) -> Result<bool, Error> {
        let settings = self.profiles.settings(field_id)?;
        let _pair = settings
            .taxonomy
            .as_deref()
            .map(|taxonomy| self.locks.lock(user_id, taxonomy));
        self.remove_field_value(field_id, user_id)
    }

    fn remove_field_value(&self, field_id: u64, user_id: u64) -> Result<bool, Error> {
        let previous = self.profiles.delete_value(field_id, user_id)?;
        let existed = previous.is_some();
        self.bus.publish(&SyncEvent::ProfileFieldDeleted {
            field_id,
            user_id,
            previous,
        })?;
        Ok(existed)
    }

    /// Push every stored value of a field into its taxonomy.
    pub fn backfill_field(&self, field_id: u64) -> Result<BackfillReport, Error> {
        self.profiles.require_field(field_id)?;
        let settings = self.profiles.settings(field_id)?;
        let taxonomy = settings
            .taxonomy
            .ok_or_else(|| Error::InvalidSettings(format!("field {field_id} has no taxonomy")))?;
        self.user_taxonomy(&taxonomy)?;

        let executor = BackfillExecutor::new(
            self.terms.clone(),
            self.profiles.clone(),
            BackfillConfig::default(),
        );
        executor.execute(field_id, &taxonomy, &self.locks)
    }

    /// Choices a taxonomy field offers a user.
    pub fn field_choices(&self, field_id: u64, user_id: u64) -> Result<FieldChoices, Error> {
        let field = self.profiles.require_field(field_id)?;
        let settings = self.profiles.settings(field_id)?;

        let (mut terms, selected) = match settings.taxonomy.as_deref() {
            Some(taxonomy) if field.is_taxonomy() && self.registry.is_user_taxonomy(taxonomy) => {
                let terms = self
                    .terms
                    .with_user_scope(|terms| terms.get_terms(taxonomy, &TermQuery::all()))?;
                let selected = self
                    .get_user_terms(user_id, taxonomy)?
                    .into_iter()
                    .map(|term| term.slug)
                    .collect();
                (terms, selected)
            }
            _ => (Vec::new(), BTreeSet::new()),
        };
        if field.order_by == SortDirection::Desc {
            terms.reverse();
        }

        Ok(FieldChoices {
            field,
            settings,
            terms,
            selected,
        })
    }

    /// Display text of a taxonomy field: the names of the user's terms.
    pub fn field_display(&self, field_id: u64, user_id: u64) -> Result<Option<String>, Error> {
        let settings = self.profiles.settings(field_id)?;
        let Some(taxonomy) = settings.taxonomy.as_deref() else {
            return Ok(None);
        };
        if !self.registry.is_user_taxonomy(taxonomy) {
            return Ok(None);
        }
        let names: Vec<String> = self
            .get_user_terms(user_id, taxonomy)?
            .into_iter()
            .map(|term| term.name)
            .collect();
        Ok((!names.is_empty()).then(|| names.join(", ")))
    }
}
