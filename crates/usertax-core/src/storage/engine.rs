//! Storage engine implementation.

use super::key::{decode_id, encode_id};
use super::{StorageConfig, SubjectRecord, TableConfig};
use crate::error::Error;
use crate::scope::ObjectScope;
use sled::{Db, Tree};

/// Tree name for term rows keyed by term-taxonomy id.
const TERM_TAXONOMY_TREE: &str = "term_taxonomy";

/// Tree name for the term id -> term-taxonomy id index.
const TERM_ID_INDEX_TREE: &str = "index:term_id";

/// Tree name for the (taxonomy, slug) -> term-taxonomy id index.
const SLUG_INDEX_TREE: &str = "index:term_slug";

/// Tree name for the (taxonomy, term-taxonomy id) listing index.
const TAXONOMY_INDEX_TREE: &str = "index:taxonomy_terms";

/// Tree name for content subjects.
const POST_SUBJECTS_TREE: &str = "subjects:post";

/// Tree name for user subjects.
const USER_SUBJECTS_TREE: &str = "subjects:user";

/// The main storage engine wrapping sled.
pub struct StorageEngine {
    /// The underlying sled database.
    db: Db,

    /// Relationship table naming.
    tables: TableConfig,

    /// Term rows.
    term_taxonomy_tree: Tree,

    /// Term id index.
    term_id_index: Tree,

    /// Slug index.
    slug_index: Tree,

    /// Taxonomy listing index.
    taxonomy_index: Tree,

    /// Content subject table.
    post_subjects: Tree,

    /// User subject table.
    user_subjects: Tree,
}

impl StorageEngine {
    /// Open or create a storage engine with the given configuration.
    pub fn open(config: StorageConfig) -> Result<Self, Error> {
        let db = config.to_sled_config().open()?;

        Ok(Self {
            term_taxonomy_tree: db.open_tree(TERM_TAXONOMY_TREE)?,
            term_id_index: db.open_tree(TERM_ID_INDEX_TREE)?,
            slug_index: db.open_tree(SLUG_INDEX_TREE)?,
            taxonomy_index: db.open_tree(TAXONOMY_INDEX_TREE)?,
            post_subjects: db.open_tree(POST_SUBJECTS_TREE)?,
            user_subjects: db.open_tree(USER_SUBJECTS_TREE)?,
            tables: config.tables,
            db,
        })
    }

    /// Check if the database was recovered from a previous crash.
    pub fn was_recovered(&self) -> bool {
        self.db.was_recovered()
    }

    /// Relationship table naming in effect.
    pub fn tables(&self) -> &TableConfig {
        &self.tables
    }

    /// Allocate a new identifier. Identifiers start at 1; 0 means "none".
    pub fn generate_id(&self) -> Result<u64, Error> {
        Ok(self.db.generate_id()? + 1)
    }

    // ========== Subject Tables ==========

    /// Insert or replace a subject row.
    pub fn put_subject(
        &self,
        scope: ObjectScope,
        object_id: u64,
        record: &SubjectRecord,
    ) -> Result<(), Error> {
        self.subject_tree(scope)
            .insert(encode_id(object_id), record.to_bytes()?)?;
        Ok(())
    }

    /// Get a subject row.
    pub fn get_subject(
        &self,
        scope: ObjectScope,
        object_id: u64,
    ) -> Result<Option<SubjectRecord>, Error> {
        match self.subject_tree(scope).get(encode_id(object_id))? {
            Some(bytes) => Ok(Some(SubjectRecord::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Remove a subject row. Relationship rows are left to the caller.
    pub fn remove_subject(&self, scope: ObjectScope, object_id: u64) -> Result<bool, Error> {
        Ok(self.subject_tree(scope).remove(encode_id(object_id))?.is_some())
    }

    /// Check whether a subject exists.
    pub fn has_subject(&self, scope: ObjectScope, object_id: u64) -> Result<bool, Error> {
        Ok(self.subject_tree(scope).contains_key(encode_id(object_id))?)
    }

    /// Iterate all subject ids of a scope in ascending order.
    pub fn subject_ids(&self, scope: ObjectScope) -> impl Iterator<Item = Result<u64, Error>> + '_ {
        self.subject_tree(scope).iter().keys().map(|result| {
            let key = result?;
            decode_id(&key).ok_or(Error::InvalidKey)
        })
    }

    fn subject_tree(&self, scope: ObjectScope) -> &Tree {
        match scope {
            ObjectScope::Post => &self.post_subjects,
            ObjectScope::User => &self.user_subjects,
        }
    }

    // ========== End Subject Tables ==========

    /// Open (creating on first use) a tree by name.
    pub(crate) fn open_tree(&self, name: &str) -> Result<Tree, Error> {
        Ok(self.db.open_tree(name)?)
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), Error> {
        self.db.flush()?;
        Ok(())
    }

    /// Get database size in bytes.
    pub fn size_on_disk(&self) -> Result<u64, Error> {
        Ok(self.db.size_on_disk()?)
    }

    /// Get access to the term rows tree.
    pub(crate) fn term_taxonomy_tree(&self) -> &Tree {
        &self.term_taxonomy_tree
    }

    /// Get access to the term id index.
    pub(crate) fn term_id_index(&self) -> &Tree {
        &self.term_id_index
    }

    /// Get access to the slug index.
    pub(crate) fn slug_index(&self) -> &Tree {
        &self.slug_index
    }

    /// Get access to the taxonomy listing index.
    pub(crate) fn taxonomy_index(&self) -> &Tree {
        &self.taxonomy_index
    }

    /// Get the underlying sled database (for opening new trees).
    pub fn db(&self) -> &Db {
        &self.db
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestDb {
        engine: StorageEngine,
        _dir: tempfile::TempDir, // Keep the temp dir alive
    }

    impl std::ops::Deref for TestDb {
        type Target = StorageEngine;
        fn deref(&self) -> &Self::Target {
            &self.engine
        }
    }

    fn test_engine() -> TestDb {
        let dir = tempfile::tempdir().unwrap();
        let engine = StorageEngine::open(StorageConfig::new(dir.path())).unwrap();
        TestDb { engine, _dir: dir }
    }

    #[test]
    fn test_generated_ids_are_nonzero_and_unique() {
        let engine = test_engine();
        let a = engine.generate_id().unwrap();
        let b = engine.generate_id().unwrap();
        assert!(a > 0);
        assert_ne!(a, b);
    }

    #[test]
    fn test_subject_tables_are_separate() {
        let engine = test_engine();
        engine
            .put_subject(ObjectScope::User, 7, &SubjectRecord::new("alice"))
            .unwrap();

        assert!(engine.has_subject(ObjectScope::User, 7).unwrap());
        assert!(!engine.has_subject(ObjectScope::Post, 7).unwrap());

        let record = engine.get_subject(ObjectScope::User, 7).unwrap().unwrap();
        assert_eq!(record.label, "alice");
    }

    #[test]
    fn test_subject_ids_in_order() {
        let engine = test_engine();
        for id in [30, 10, 20] {
            engine
                .put_subject(ObjectScope::User, id, &SubjectRecord::new(format!("u{id}")))
                .unwrap();
        }
        let ids: Vec<u64> = engine
            .subject_ids(ObjectScope::User)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(ids, vec![10, 20, 30]);

        assert!(engine.remove_subject(ObjectScope::User, 20).unwrap());
        assert!(!engine.remove_subject(ObjectScope::User, 20).unwrap());
    }

    #[test]
    fn test_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig::new(dir.path());

        {
            let engine = StorageEngine::open(config.clone()).unwrap();
            engine
                .put_subject(ObjectScope::Post, 1, &SubjectRecord::new("hello-world"))
                .unwrap();
            engine.flush().unwrap();
        }

        {
            let engine = StorageEngine::open(config).unwrap();
            assert!(engine.has_subject(ObjectScope::Post, 1).unwrap());
        }
    }
}
