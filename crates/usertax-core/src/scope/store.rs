//! Term store: term rows, subject tables, and scope binding.

use std::sync::Arc;

use sled::transaction::TransactionError;
use sled::Transactional;
use tracing::{debug, debug_span};

use super::table::{map_transaction, RelationshipTable};
use super::{ObjectScope, ScopedTerms};
use crate::error::Error;
use crate::metrics::{new_shared_registry, SharedMetricsRegistry};
use crate::storage::key::{decode_id, encode_id, named_key};
use crate::storage::{RelationshipKey, StorageEngine, SubjectRecord, TermRecord};
use crate::taxonomy::{sanitize_slug, slug_from_name, Term, TaxonomyRegistry};

/// A term to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTerm {
    /// Display name.
    pub name: String,
    /// Explicit slug; derived from the name when absent.
    pub slug: Option<String>,
    /// Parent term id, 0 for a root term.
    pub parent: u64,
    /// Description.
    pub description: String,
}

impl NewTerm {
    /// Create a root term with a slug derived from its name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slug: None,
            parent: 0,
            description: String::new(),
        }
    }

    /// Set an explicit slug.
    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    /// Set the parent term id.
    pub fn with_parent(mut self, parent: u64) -> Self {
        self.parent = parent;
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Store of terms and their scope-specific relationships.
pub struct TermStore {
    engine: Arc<StorageEngine>,
    registry: Arc<TaxonomyRegistry>,
    native: RelationshipTable,
    user: RelationshipTable,
    metrics: SharedMetricsRegistry,
}

impl TermStore {
    /// Open the store, creating both relationship tables on first use.
    pub fn open(engine: Arc<StorageEngine>, registry: Arc<TaxonomyRegistry>) -> Result<Self, Error> {
        let native = RelationshipTable::open(&engine, ObjectScope::Post)?;
        let user = RelationshipTable::open(&engine, ObjectScope::User)?;

        debug!(
            native = native.name(),
            user = user.name(),
            "relationship tables opened"
        );

        Ok(Self {
            engine,
            registry,
            native,
            user,
            metrics: new_shared_registry(),
        })
    }

    /// Use a shared metrics registry.
    pub fn with_metrics(mut self, metrics: SharedMetricsRegistry) -> Self {
        self.metrics = metrics;
        self
    }

    /// Get the storage engine.
    pub fn engine(&self) -> &StorageEngine {
        &self.engine
    }

    /// Get the taxonomy registry.
    pub fn registry(&self) -> &TaxonomyRegistry {
        &self.registry
    }

    /// Get the metrics registry.
    pub fn metrics(&self) -> &SharedMetricsRegistry {
        &self.metrics
    }

    /// Relationship table serving a scope.
    pub fn table(&self, scope: ObjectScope) -> &RelationshipTable {
        match scope {
            ObjectScope::Post => &self.native,
            ObjectScope::User => &self.user,
        }
    }

    // ========== Scope Binding ==========

    /// Primitives bound to the native relationship table.
    pub fn native(&self) -> ScopedTerms<'_> {
        ScopedTerms::new(self, ObjectScope::Post)
    }

    /// Run `operation` with the primitives bound to `scope`'s relationship table.
    ///
    /// The binding ends when `operation` returns, whether it succeeded or not.
    pub fn with_scope<T, E>(
        &self,
        scope: ObjectScope,
        operation: impl FnOnce(&ScopedTerms<'_>) -> Result<T, E>,
    ) -> Result<T, E> {
        let span = debug_span!("term_scope", scope = %scope, table = self.table(scope).name());
        let _entered = span.enter();
        operation(&ScopedTerms::new(self, scope))
    }

    /// Run `operation` against the user relationship table.
    pub fn with_user_scope<T, E>(
        &self,
        operation: impl FnOnce(&ScopedTerms<'_>) -> Result<T, E>,
    ) -> Result<T, E> {
        self.with_scope(ObjectScope::User, operation)
    }

    // ========== Terms ==========

    /// Create a term in a registered taxonomy.
    pub fn insert_term(&self, taxonomy: &str, term: NewTerm) -> Result<Term, Error> {
        if !self.registry.exists(taxonomy) {
            return Err(Error::invalid_taxonomy(taxonomy, "registry"));
        }

        let slug = match &term.slug {
            Some(slug) => sanitize_slug(slug),
            None => slug_from_name(&term.name),
        };
        if slug.is_empty() {
            return Err(Error::InvalidData(format!("empty slug for term '{}'", term.name)));
        }
        if self.term_by_slug(taxonomy, &slug)?.is_some() {
            return Err(Error::DuplicateTerm {
                taxonomy: taxonomy.to_string(),
                slug,
            });
        }
        if term.parent != 0
            && !self
                .term_by_term_id(term.parent)?
                .is_some_and(|parent| parent.taxonomy == taxonomy)
        {
            return Err(Error::TermNotFound(format!("parent {}", term.parent)));
        }

        let record = TermRecord {
            term_id: self.engine.generate_id()?,
            term_taxonomy_id: self.engine.generate_id()?,
            taxonomy: taxonomy.to_string(),
            slug,
            name: term.name,
            description: term.description,
            parent: term.parent,
            count: 0,
        };
        self.write_term(&record, true)?;

        debug!(
            taxonomy,
            slug = %record.slug,
            term_taxonomy_id = record.term_taxonomy_id,
            "term created"
        );
        Ok(record.into())
    }

    /// Delete a term and every relationship referencing it.
    ///
    /// Children of the deleted term move up to its parent.
    pub fn delete_term(&self, taxonomy: &str, slug: &str) -> Result<bool, Error> {
        let Some(record) = self.term_by_slug(taxonomy, slug)? else {
            return Ok(false);
        };

        for scope in [ObjectScope::Post, ObjectScope::User] {
            let objects = self.table(scope).purge_term(record.term_taxonomy_id)?;
            self.metrics
                .record_rows_deleted(scope, objects.len() as u64);
        }

        for mut child in self.terms_in_taxonomy(taxonomy)? {
            if child.parent == record.term_id {
                child.parent = record.parent;
                self.write_term(&child, false)?;
            }
        }

        let tt_key = encode_id(record.term_taxonomy_id).to_vec();
        let term_key = encode_id(record.term_id).to_vec();
        let slug_key = named_key(taxonomy, record.slug.as_bytes());
        let listing_key = named_key(taxonomy, &encode_id(record.term_taxonomy_id));

        let result: Result<(), TransactionError<Error>> = (
            self.engine.term_taxonomy_tree(),
            self.engine.term_id_index(),
            self.engine.slug_index(),
            self.engine.taxonomy_index(),
        )
            .transaction(|(terms, by_id, by_slug, listing)| {
                terms.remove(tt_key.clone())?;
                by_id.remove(term_key.clone())?;
                by_slug.remove(slug_key.clone())?;
                listing.remove(listing_key.clone())?;
                Ok(())
            });
        map_transaction(result)?;

        debug!(taxonomy, slug, "term deleted");
        Ok(true)
    }

    /// Get a term row by term-taxonomy id.
    pub fn get_term(&self, term_taxonomy_id: u64) -> Result<Option<TermRecord>, Error> {
        match self
            .engine
            .term_taxonomy_tree()
            .get(encode_id(term_taxonomy_id))?
        {
            Some(bytes) => Ok(Some(TermRecord::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Get a term row by term id.
    pub fn term_by_term_id(&self, term_id: u64) -> Result<Option<TermRecord>, Error> {
        match self.engine.term_id_index().get(encode_id(term_id))? {
            Some(bytes) => {
                let tt_id = decode_id(&bytes).ok_or(Error::InvalidKey)?;
                self.get_term(tt_id)
            }
            None => Ok(None),
        }
    }

    /// Get a term row by slug within a taxonomy.
    pub fn term_by_slug(&self, taxonomy: &str, slug: &str) -> Result<Option<TermRecord>, Error> {
        match self.engine.slug_index().get(named_key(taxonomy, slug.as_bytes()))? {
            Some(bytes) => {
                let tt_id = decode_id(&bytes).ok_or(Error::InvalidKey)?;
                self.get_term(tt_id)
            }
            None => Ok(None),
        }
    }

    /// All term rows of a taxonomy, by ascending term-taxonomy id.
    pub fn terms_in_taxonomy(&self, taxonomy: &str) -> Result<Vec<TermRecord>, Error> {
        let prefix = named_key(taxonomy, &[]);
        let mut out = Vec::new();
        for result in self.engine.taxonomy_index().scan_prefix(&prefix).keys() {
            let key = result?;
            let tt_id = decode_id(&key[prefix.len()..]).ok_or(Error::InvalidKey)?;
            if let Some(record) = self.get_term(tt_id)? {
                out.push(record);
            }
        }
        Ok(out)
    }

    /// Persist a term's usage count.
    pub(crate) fn set_term_count(&self, term_taxonomy_id: u64, count: u64) -> Result<(), Error> {
        if let Some(mut record) = self.get_term(term_taxonomy_id)? {
            if record.count != count {
                record.count = count;
                self.write_term(&record, false)?;
            }
        }
        Ok(())
    }

    fn write_term(&self, record: &TermRecord, with_indexes: bool) -> Result<(), Error> {
        let tt_key = encode_id(record.term_taxonomy_id).to_vec();
        let value = record.to_bytes()?;

        if !with_indexes {
            self.engine.term_taxonomy_tree().insert(tt_key, value)?;
            return Ok(());
        }

        let tt_value = tt_key.clone();
        let term_key = encode_id(record.term_id).to_vec();
        let slug_key = named_key(&record.taxonomy, record.slug.as_bytes());
        let listing_key = named_key(&record.taxonomy, &tt_key);

        let result: Result<(), TransactionError<Error>> = (
            self.engine.term_taxonomy_tree(),
            self.engine.term_id_index(),
            self.engine.slug_index(),
            self.engine.taxonomy_index(),
        )
            .transaction(|(terms, by_id, by_slug, listing)| {
                terms.insert(tt_key.clone(), value.clone())?;
                by_id.insert(term_key.clone(), tt_value.clone())?;
                by_slug.insert(slug_key.clone(), tt_value.clone())?;
                listing.insert(listing_key.clone(), Vec::<u8>::new())?;
                Ok(())
            });
        map_transaction(result)
    }

    // ========== Subjects ==========

    /// Register a subject (content item or user account).
    pub fn register_subject(
        &self,
        scope: ObjectScope,
        object_id: u64,
        label: impl Into<String>,
    ) -> Result<(), Error> {
        self.engine
            .put_subject(scope, object_id, &SubjectRecord::new(label))
    }

    /// Remove a subject and all of its relationships, refreshing affected counts.
    pub fn delete_subject(&self, scope: ObjectScope, object_id: u64) -> Result<bool, Error> {
        let table = self.table(scope);
        let rows = table.terms_of(object_id)?;
        for &(tt_id, _) in &rows {
            table.remove(RelationshipKey::new(object_id, tt_id))?;
        }
        self.metrics.record_rows_deleted(scope, rows.len() as u64);

        let existed = self.engine.remove_subject(scope, object_id)?;
        let tt_ids: Vec<u64> = rows.into_iter().map(|(tt_id, _)| tt_id).collect();
        self.with_scope(scope, |terms| terms.update_term_count(&tt_ids))?;

        debug!(scope = %scope, object_id, "subject deleted");
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageConfig;
    use crate::taxonomy::TaxonomyDef;

    fn store() -> TermStore {
        let engine = Arc::new(StorageEngine::open(StorageConfig::temporary()).unwrap());
        let registry = Arc::new(TaxonomyRegistry::new());
        registry.register(TaxonomyDef::for_users("department").hierarchical());
        TermStore::open(engine, registry).unwrap()
    }

    #[test]
    fn test_insert_and_lookup_term() {
        let store = store();
        let term = store
            .insert_term("department", NewTerm::new("Human Resources"))
            .unwrap();
        assert_eq!(term.slug, "human-resources");

        let by_slug = store.term_by_slug("department", "human-resources").unwrap().unwrap();
        assert_eq!(by_slug.term_taxonomy_id, term.term_taxonomy_id);

        let by_id = store.term_by_term_id(term.term_id).unwrap().unwrap();
        assert_eq!(by_id.slug, "human-resources");
    }

    #[test]
    fn test_duplicate_slug_rejected() {
        let store = store();
        store.insert_term("department", NewTerm::new("Sales")).unwrap();
        let err = store
            .insert_term("department", NewTerm::new("Sales Team").with_slug("sales"))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateTerm { .. }));
    }

    #[test]
    fn test_unknown_taxonomy_and_parent_rejected() {
        let store = store();
        assert!(matches!(
            store.insert_term("color", NewTerm::new("Red")),
            Err(Error::InvalidTaxonomy { .. })
        ));
        assert!(matches!(
            store.insert_term("department", NewTerm::new("Orphan").with_parent(999)),
            Err(Error::TermNotFound(_))
        ));
    }

    #[test]
    fn test_delete_term_reparents_children() {
        let store = store();
        let root = store.insert_term("department", NewTerm::new("Engineering")).unwrap();
        let mid = store
            .insert_term("department", NewTerm::new("Platform").with_parent(root.term_id))
            .unwrap();
        let leaf = store
            .insert_term("department", NewTerm::new("Storage").with_parent(mid.term_id))
            .unwrap();

        assert!(store.delete_term("department", "platform").unwrap());
        assert!(!store.delete_term("department", "platform").unwrap());

        let leaf = store.get_term(leaf.term_taxonomy_id).unwrap().unwrap();
        assert_eq!(leaf.parent, root.term_id);
        assert_eq!(store.terms_in_taxonomy("department").unwrap().len(), 2);
        assert!(store.term_by_slug("department", "platform").unwrap().is_none());
    }

    #[test]
    fn test_delete_subject_refreshes_counts() {
        let store = store();
        let term = store.insert_term("department", NewTerm::new("Sales")).unwrap();
        store.register_subject(ObjectScope::User, 1, "alice").unwrap();
        store
            .with_user_scope(|terms| terms.set_object_terms(1, &["sales"], "department", false))
            .unwrap();
        assert_eq!(store.get_term(term.term_taxonomy_id).unwrap().unwrap().count, 1);

        assert!(store.delete_subject(ObjectScope::User, 1).unwrap());
        assert_eq!(store.get_term(term.term_taxonomy_id).unwrap().unwrap().count, 0);
        assert!(store.table(ObjectScope::User).is_empty());
    }
}
