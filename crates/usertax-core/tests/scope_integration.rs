//! Integration tests for scope-bound term relationships.

use std::sync::Arc;

use usertax_core::storage::{StorageConfig, StorageEngine, TableConfig};
use usertax_core::{
    Error, NewTerm, ObjectScope, TaxonomyDef, TaxonomyRegistry, TermQuery, TermStore,
};

struct TestContext {
    store: TermStore,
    _dir: tempfile::TempDir,
}

impl TestContext {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(StorageConfig::new(dir.path()));
        Self { store, _dir: dir }
    }
}

fn registry() -> Arc<TaxonomyRegistry> {
    let registry = TaxonomyRegistry::new();
    registry.register(TaxonomyDef::for_users("department").hierarchical());
    registry.register(TaxonomyDef::new("category", ObjectScope::Post));
    Arc::new(registry)
}

fn open_store(config: StorageConfig) -> TermStore {
    let engine = Arc::new(StorageEngine::open(config).unwrap());
    TermStore::open(engine, registry()).unwrap()
}

fn seed(store: &TermStore) {
    store.insert_term("department", NewTerm::new("Sales")).unwrap();
    store.insert_term("department", NewTerm::new("Support")).unwrap();
    store.insert_term("category", NewTerm::new("News")).unwrap();
    for id in 1..=3 {
        store
            .register_subject(ObjectScope::User, id, format!("user{id}"))
            .unwrap();
        store
            .register_subject(ObjectScope::Post, id, format!("post{id}"))
            .unwrap();
    }
}

#[test]
fn test_user_relationships_stay_in_user_table() {
    let ctx = TestContext::new();
    seed(&ctx.store);

    ctx.store
        .with_user_scope(|terms| terms.set_object_terms(1, &["sales"], "department", false))
        .unwrap();
    ctx.store
        .native()
        .set_object_terms(1, &["news"], "category", false)
        .unwrap();

    assert_eq!(ctx.store.table(ObjectScope::User).len(), 1);
    assert_eq!(ctx.store.table(ObjectScope::Post).len(), 1);

    // Post 1 and user 1 share an id but not relationships.
    let user_terms = ctx
        .store
        .with_user_scope(|terms| terms.get_object_term_slugs(1, "department"))
        .unwrap();
    assert_eq!(user_terms, vec!["sales"]);
    let post_terms = ctx.store.native().get_object_term_slugs(1, "category").unwrap();
    assert_eq!(post_terms, vec!["news"]);
}

#[test]
fn test_binding_ends_when_operation_fails() {
    let ctx = TestContext::new();
    seed(&ctx.store);

    let failed: Result<(), Error> = ctx.store.with_user_scope(|terms| {
        terms.set_object_terms(2, &["support"], "department", false)?;
        Err(Error::InvalidData("aborted".into()))
    });
    assert!(failed.is_err());

    // Native primitives still run against the native table.
    ctx.store
        .native()
        .set_object_terms(2, &["news"], "category", false)
        .unwrap();
    assert_eq!(ctx.store.table(ObjectScope::Post).len(), 1);
    assert_eq!(ctx.store.table(ObjectScope::User).len(), 1);
}

#[test]
fn test_counts_drop_to_zero() {
    let ctx = TestContext::new();
    seed(&ctx.store);

    ctx.store
        .with_user_scope(|terms| {
            terms.set_object_terms(1, &["sales"], "department", false)?;
            terms.set_object_terms(2, &["sales", "support"], "department", false)
        })
        .unwrap();
    let sales = ctx.store.term_by_slug("department", "sales").unwrap().unwrap();
    assert_eq!(sales.count, 2);

    ctx.store
        .with_user_scope(|terms| {
            terms.delete_object_term_relationships(1, &["department"])?;
            terms.delete_object_term_relationships(2, &["department"])
        })
        .unwrap();

    for slug in ["sales", "support"] {
        let term = ctx.store.term_by_slug("department", slug).unwrap().unwrap();
        assert_eq!(term.count, 0, "{slug}");
    }
    let listed = ctx
        .store
        .with_user_scope(|terms| terms.get_terms("department", &TermQuery::default()))
        .unwrap();
    assert!(listed.is_empty());
}

#[test]
fn test_relationships_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = open_store(StorageConfig::new(dir.path()));
        seed(&store);
        store
            .with_user_scope(|terms| terms.set_object_terms(3, &["support"], "department", false))
            .unwrap();
        store.engine().flush().unwrap();
    }

    let store = open_store(StorageConfig::new(dir.path()));
    let slugs = store
        .with_user_scope(|terms| terms.get_object_term_slugs(3, "department"))
        .unwrap();
    assert_eq!(slugs, vec!["support"]);
    let support = store.term_by_slug("department", "support").unwrap().unwrap();
    assert_eq!(support.count, 1);
}

#[test]
fn test_blog_tables_are_separate() {
    let dir = tempfile::tempdir().unwrap();
    let main = open_store(StorageConfig::new(dir.path().join("main")));
    let blog = open_store(
        StorageConfig::new(dir.path().join("blog")).with_tables(TableConfig::new("wp_", 2)),
    );

    assert_eq!(main.table(ObjectScope::User).name(), "wp_user_term_relationships");
    assert_eq!(blog.table(ObjectScope::User).name(), "wp_2_user_term_relationships");
    assert_eq!(blog.table(ObjectScope::Post).name(), "wp_2_term_relationships");
}
