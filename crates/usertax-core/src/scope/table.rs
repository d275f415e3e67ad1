//! Relationship tables.

use sled::transaction::TransactionError;
use sled::{Transactional, Tree};

use super::ObjectScope;
use crate::error::Error;
use crate::storage::key::encode_id;
use crate::storage::{RelationshipKey, StorageEngine};

/// Suffix of the secondary index tree of a relationship table.
const BY_TERM_SUFFIX: &str = ":by_term";

/// One relationship table: `(object_id, term_taxonomy_id) -> term_order`,
/// with a secondary index on `term_taxonomy_id`.
pub struct RelationshipTable {
    scope: ObjectScope,
    name: String,
    rows: Tree,
    by_term: Tree,
}

impl RelationshipTable {
    /// Open (creating on first use) the relationship table of a scope.
    pub fn open(engine: &StorageEngine, scope: ObjectScope) -> Result<Self, Error> {
        let name = engine.tables().relationship_table(scope);
        let rows = engine.open_tree(&name)?;
        let by_term = engine.open_tree(&format!("{name}{BY_TERM_SUFFIX}"))?;

        Ok(Self {
            scope,
            name,
            rows,
            by_term,
        })
    }

    /// Scope this table serves.
    pub fn scope(&self) -> ObjectScope {
        self.scope
    }

    /// Physical table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Insert a row. Returns false if the row already existed.
    pub fn insert(&self, key: RelationshipKey, term_order: u32) -> Result<bool, Error> {
        let row_key = key.encode().to_vec();
        let index_key = key.encode_by_term().to_vec();
        let order = term_order.to_be_bytes().to_vec();

        let result: Result<bool, TransactionError<Error>> =
            (&self.rows, &self.by_term).transaction(|(rows, by_term)| {
                let existed = rows.insert(row_key.clone(), order.clone())?.is_some();
                by_term.insert(index_key.clone(), Vec::<u8>::new())?;
                Ok(!existed)
            });
        map_transaction(result)
    }

    /// Remove a row. Returns false if there was nothing to remove.
    pub fn remove(&self, key: RelationshipKey) -> Result<bool, Error> {
        let row_key = key.encode().to_vec();
        let index_key = key.encode_by_term().to_vec();

        let result: Result<bool, TransactionError<Error>> =
            (&self.rows, &self.by_term).transaction(|(rows, by_term)| {
                let existed = rows.remove(row_key.clone())?.is_some();
                by_term.remove(index_key.clone())?;
                Ok(existed)
            });
        map_transaction(result)
    }

    /// Term-taxonomy ids and term orders of an object, by ascending tt id.
    pub fn terms_of(&self, object_id: u64) -> Result<Vec<(u64, u32)>, Error> {
        let mut out = Vec::new();
        for result in self.rows.scan_prefix(encode_id(object_id)) {
            let (key, value) = result?;
            let key = RelationshipKey::decode(&key).ok_or(Error::InvalidKey)?;
            let order: [u8; 4] = value
                .as_ref()
                .try_into()
                .map_err(|_| Error::InvalidData("term order".into()))?;
            out.push((key.term_taxonomy_id, u32::from_be_bytes(order)));
        }
        Ok(out)
    }

    /// Object ids related to a term-taxonomy id, ascending.
    pub fn objects_of(&self, term_taxonomy_id: u64) -> Result<Vec<u64>, Error> {
        self.by_term
            .scan_prefix(encode_id(term_taxonomy_id))
            .keys()
            .map(|result| {
                let key = result?;
                RelationshipKey::decode_by_term(&key)
                    .map(|k| k.object_id)
                    .ok_or(Error::InvalidKey)
            })
            .collect()
    }

    /// Remove every row referencing a term-taxonomy id. Returns the objects affected.
    pub fn purge_term(&self, term_taxonomy_id: u64) -> Result<Vec<u64>, Error> {
        let objects = self.objects_of(term_taxonomy_id)?;
        for &object_id in &objects {
            self.remove(RelationshipKey::new(object_id, term_taxonomy_id))?;
        }
        Ok(objects)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

pub(crate) fn map_transaction<T>(result: Result<T, TransactionError<Error>>) -> Result<T, Error> {
    match result {
        Ok(value) => Ok(value),
        Err(TransactionError::Abort(e)) => Err(e),
        Err(TransactionError::Storage(e)) => Err(Error::Storage(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageConfig;

    fn engine() -> StorageEngine {
        StorageEngine::open(StorageConfig::temporary()).unwrap()
    }

    #[test]
    fn test_insert_is_unique_per_pair() {
        let engine = engine();
        let table = RelationshipTable::open(&engine, ObjectScope::User).unwrap();

        assert!(table.insert(RelationshipKey::new(1, 10), 0).unwrap());
        assert!(!table.insert(RelationshipKey::new(1, 10), 0).unwrap());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_secondary_index_follows_rows() {
        let engine = engine();
        let table = RelationshipTable::open(&engine, ObjectScope::User).unwrap();

        table.insert(RelationshipKey::new(1, 10), 0).unwrap();
        table.insert(RelationshipKey::new(2, 10), 0).unwrap();
        table.insert(RelationshipKey::new(2, 11), 3).unwrap();

        assert_eq!(table.objects_of(10).unwrap(), vec![1, 2]);
        assert_eq!(table.terms_of(2).unwrap(), vec![(10, 0), (11, 3)]);

        assert!(table.remove(RelationshipKey::new(1, 10)).unwrap());
        assert!(!table.remove(RelationshipKey::new(1, 10)).unwrap());
        assert_eq!(table.objects_of(10).unwrap(), vec![2]);
    }

    #[test]
    fn test_tables_are_named_per_scope() {
        let engine = engine();
        let native = RelationshipTable::open(&engine, ObjectScope::Post).unwrap();
        let user = RelationshipTable::open(&engine, ObjectScope::User).unwrap();

        assert_eq!(native.name(), "wp_term_relationships");
        assert_eq!(user.name(), "wp_user_term_relationships");

        user.insert(RelationshipKey::new(5, 1), 0).unwrap();
        assert!(native.is_empty());
        assert_eq!(user.len(), 1);
    }

    #[test]
    fn test_purge_term() {
        let engine = engine();
        let table = RelationshipTable::open(&engine, ObjectScope::User).unwrap();
        table.insert(RelationshipKey::new(1, 10), 0).unwrap();
        table.insert(RelationshipKey::new(2, 10), 0).unwrap();
        table.insert(RelationshipKey::new(2, 11), 0).unwrap();

        assert_eq!(table.purge_term(10).unwrap(), vec![1, 2]);
        assert!(table.objects_of(10).unwrap().is_empty());
        assert_eq!(table.len(), 1);
    }
}
