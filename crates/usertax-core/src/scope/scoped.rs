//! Taxonomy primitives bound to one relationship table.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use super::{ObjectScope, TermStore};
use crate::error::Error;
use crate::storage::{RelationshipKey, TermRecord};
use crate::taxonomy::{Term, TermField, TermQuery};

/// Generic term primitives running against the table of one scope.
///
/// Obtained from [`TermStore::native`], [`TermStore::with_scope`] or
/// [`TermStore::with_user_scope`].
pub struct ScopedTerms<'a> {
    store: &'a TermStore,
    scope: ObjectScope,
}

impl<'a> ScopedTerms<'a> {
    pub(super) fn new(store: &'a TermStore, scope: ObjectScope) -> Self {
        Self { store, scope }
    }

    /// Scope this binding serves.
    pub fn scope(&self) -> ObjectScope {
        self.scope
    }

    /// Name of the bound relationship table.
    pub fn table_name(&self) -> &str {
        self.store.table(self.scope).name()
    }

    fn check_taxonomy(&self, taxonomy: &str) -> Result<(), Error> {
        if self.store.registry().is_registered_for(taxonomy, self.scope) {
            Ok(())
        } else {
            Err(Error::invalid_taxonomy(taxonomy, self.scope))
        }
    }

    /// Assign terms (by slug) to an object.
    ///
    /// With `append` false, relationships of the object in `taxonomy` that are
    /// not named in `slugs` are removed. Unknown slugs are skipped. Returns the
    /// term-taxonomy ids now named by `slugs`.
    pub fn set_object_terms<S: AsRef<str>>(
        &self,
        object_id: u64,
        slugs: &[S],
        taxonomy: &str,
        append: bool,
    ) -> Result<Vec<u64>, Error> {
        self.check_taxonomy(taxonomy)?;
        let def = self
            .store
            .registry()
            .get(taxonomy)
            .ok_or_else(|| Error::invalid_taxonomy(taxonomy, self.scope))?;
        let table = self.store.table(self.scope);
        let metrics = self.store.metrics();
        metrics.record_term_assignment(self.scope);

        let mut wanted = Vec::with_capacity(slugs.len());
        for slug in slugs {
            let slug = slug.as_ref();
            match self.store.term_by_slug(taxonomy, slug)? {
                Some(record) => {
                    if !wanted.contains(&record.term_taxonomy_id) {
                        wanted.push(record.term_taxonomy_id);
                    }
                }
                None => warn!(taxonomy, slug, "skipping unknown term"),
            }
        }

        let existing = self.object_rows(object_id, taxonomy)?;
        let mut changed = BTreeSet::new();

        // Appended terms go after the object's current ones.
        let mut last_order = existing.iter().map(|(_, order)| *order).max().unwrap_or(0);
        let mut inserted = 0u64;
        for (index, &tt_id) in wanted.iter().enumerate() {
            let held = existing
                .iter()
                .find(|(id, _)| *id == tt_id)
                .map(|(_, order)| *order);
            let order = match (def.sort, append, held) {
                (false, _, _) => 0,
                (true, false, _) => index as u32 + 1,
                (true, true, Some(order)) => order,
                (true, true, None) => {
                    last_order += 1;
                    last_order
                }
            };
            if held == Some(order) {
                continue;
            }
            let key = RelationshipKey::new(object_id, tt_id);
            if table.insert(key, order)? {
                inserted += 1;
                changed.insert(tt_id);
            }
        }

        let mut deleted = 0u64;
        if !append {
            for (tt_id, _) in &existing {
                if !wanted.contains(tt_id) && table.remove(RelationshipKey::new(object_id, *tt_id))? {
                    deleted += 1;
                    changed.insert(*tt_id);
                }
            }
        }

        metrics.record_rows_inserted(self.scope, inserted);
        metrics.record_rows_deleted(self.scope, deleted);

        if !changed.is_empty() {
            let ids: Vec<u64> = changed.into_iter().collect();
            self.refresh_counts(&ids, taxonomy)?;
        }

        debug!(
            object_id,
            taxonomy,
            inserted,
            deleted,
            "object terms set"
        );
        Ok(wanted)
    }

    /// Remove the named terms (by slug) from an object. Returns the rows removed.
    pub fn remove_object_terms<S: AsRef<str>>(
        &self,
        object_id: u64,
        slugs: &[S],
        taxonomy: &str,
    ) -> Result<usize, Error> {
        self.check_taxonomy(taxonomy)?;
        let table = self.store.table(self.scope);

        let mut removed = Vec::new();
        for slug in slugs {
            let Some(record) = self.store.term_by_slug(taxonomy, slug.as_ref())? else {
                continue;
            };
            if table.remove(RelationshipKey::new(object_id, record.term_taxonomy_id))? {
                removed.push(record.term_taxonomy_id);
            }
        }

        self.store
            .metrics()
            .record_rows_deleted(self.scope, removed.len() as u64);
        if !removed.is_empty() {
            self.refresh_counts(&removed, taxonomy)?;
        }
        Ok(removed.len())
    }

    /// Remove every relationship of an object in the given taxonomies.
    pub fn delete_object_term_relationships<S: AsRef<str>>(
        &self,
        object_id: u64,
        taxonomies: &[S],
    ) -> Result<usize, Error> {
        let table = self.store.table(self.scope);
        let mut total = 0;

        for taxonomy in taxonomies {
            let taxonomy = taxonomy.as_ref();
            self.check_taxonomy(taxonomy)?;

            let mut removed = Vec::new();
            for (tt_id, _) in self.object_rows(object_id, taxonomy)? {
                if table.remove(RelationshipKey::new(object_id, tt_id))? {
                    removed.push(tt_id);
                }
            }
            if !removed.is_empty() {
                self.refresh_counts(&removed, taxonomy)?;
            }
            total += removed.len();
        }

        self.store
            .metrics()
            .record_rows_deleted(self.scope, total as u64);
        Ok(total)
    }

    /// Terms of an object in a taxonomy.
    ///
    /// Sorted by term order for taxonomies that keep assignment order, by name
    /// otherwise.
    pub fn get_object_terms(&self, object_id: u64, taxonomy: &str) -> Result<Vec<Term>, Error> {
        self.check_taxonomy(taxonomy)?;
        let sort = self
            .store
            .registry()
            .get(taxonomy)
            .is_some_and(|def| def.sort);

        let mut rows: Vec<(u32, TermRecord)> = Vec::new();
        for (tt_id, order) in self.store.table(self.scope).terms_of(object_id)? {
            if let Some(record) = self.store.get_term(tt_id)? {
                if record.taxonomy == taxonomy {
                    rows.push((order, record));
                }
            }
        }

        if sort {
            rows.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.name.cmp(&b.1.name)));
        } else {
            rows.sort_by(|a, b| a.1.name.cmp(&b.1.name).then(a.1.slug.cmp(&b.1.slug)));
        }
        Ok(rows.into_iter().map(|(_, record)| record.into()).collect())
    }

    /// Slugs of an object's terms in a taxonomy.
    pub fn get_object_term_slugs(&self, object_id: u64, taxonomy: &str) -> Result<Vec<String>, Error> {
        Ok(self
            .get_object_terms(object_id, taxonomy)?
            .into_iter()
            .map(|term| term.slug)
            .collect())
    }

    /// List the terms of a taxonomy.
    pub fn get_terms(&self, taxonomy: &str, query: &TermQuery) -> Result<Vec<Term>, Error> {
        self.check_taxonomy(taxonomy)?;
        let mut terms: Vec<Term> = self
            .store
            .terms_in_taxonomy(taxonomy)?
            .into_iter()
            .map(Term::from)
            .filter(|term| query.matches(term))
            .collect();
        query.sort(&mut terms);
        Ok(terms)
    }

    /// Look a term up by one of its fields.
    pub fn get_term_by(&self, field: TermField<'_>, taxonomy: &str) -> Result<Option<Term>, Error> {
        self.check_taxonomy(taxonomy)?;
        let record = match field {
            TermField::Id(term_id) => self.store.term_by_term_id(term_id)?,
            TermField::TermTaxonomyId(tt_id) => self.store.get_term(tt_id)?,
            TermField::Slug(slug) => self.store.term_by_slug(taxonomy, slug)?,
            TermField::Name(name) => self
                .store
                .terms_in_taxonomy(taxonomy)?
                .into_iter()
                .find(|record| record.name == name),
        };
        Ok(record
            .filter(|record| record.taxonomy == taxonomy)
            .map(Term::from))
    }

    /// Objects holding any of the given terms (by term id), ascending and distinct.
    pub fn get_objects_in_term(&self, term_ids: &[u64], taxonomy: &str) -> Result<Vec<u64>, Error> {
        self.check_taxonomy(taxonomy)?;
        let table = self.store.table(self.scope);

        let mut objects = BTreeSet::new();
        for &term_id in term_ids {
            let Some(record) = self.store.term_by_term_id(term_id)? else {
                continue;
            };
            if record.taxonomy != taxonomy {
                continue;
            }
            objects.extend(table.objects_of(record.term_taxonomy_id)?);
        }
        Ok(objects.into_iter().collect())
    }

    /// Recompute usage counts against the bound table.
    ///
    /// Only rows whose object is a registered subject of this scope count.
    pub fn update_term_count(&self, term_taxonomy_ids: &[u64]) -> Result<(), Error> {
        let table = self.store.table(self.scope);
        let engine = self.store.engine();

        for &tt_id in term_taxonomy_ids {
            let mut count = 0u64;
            for object_id in table.objects_of(tt_id)? {
                if engine.has_subject(self.scope, object_id)? {
                    count += 1;
                }
            }
            self.store.set_term_count(tt_id, count)?;
        }

        self.store
            .metrics()
            .record_counts_recomputed(self.scope, term_taxonomy_ids.len() as u64);
        Ok(())
    }

    /// The count hook only runs for user-scope writes; native writes always
    /// recount against the native table.
    fn refresh_counts(&self, term_taxonomy_ids: &[u64], taxonomy: &str) -> Result<(), Error> {
        if self.scope != ObjectScope::User {
            return self.update_term_count(term_taxonomy_ids);
        }
        match self.store.registry().get(taxonomy) {
            Some(def) => match def.update_count_callback.clone() {
                Some(callback) => callback.0.update_count(self.store, term_taxonomy_ids, &def),
                None => self.update_term_count(term_taxonomy_ids),
            },
            None => self.update_term_count(term_taxonomy_ids),
        }
    }

    fn object_rows(&self, object_id: u64, taxonomy: &str) -> Result<Vec<(u64, u32)>, Error> {
        let mut rows = Vec::new();
        for (tt_id, order) in self.store.table(self.scope).terms_of(object_id)? {
            if self
                .store
                .get_term(tt_id)?
                .is_some_and(|record| record.taxonomy == taxonomy)
            {
                rows.push((tt_id, order));
            }
        }
        Ok(rows)
    }
}
