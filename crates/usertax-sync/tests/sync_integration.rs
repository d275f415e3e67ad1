//! Integration tests for profile/taxonomy synchronization.

use std::collections::HashMap;
use std::sync::Arc;

use usertax_core::{
    Actor, CapabilitySet, NewTerm, ObjectScope, StorageConfig, TaxonomyDef, TaxonomyRegistry,
};
use usertax_sync::{
    BulkAction, FieldSettingsPatch, FieldType, PostedValue, ProfileValue, SortDirection,
    SyncConfig, UserTaxonomies,
};

struct TestContext {
    app: UserTaxonomies,
    _dir: tempfile::TempDir,
}

impl TestContext {
    fn new() -> Self {
        Self::with_config(SyncConfig::default())
    }

    fn with_config(config: SyncConfig) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let registry = TaxonomyRegistry::new();
        registry.register(TaxonomyDef::for_users("color").hierarchical());
        registry.register(TaxonomyDef::for_users("level"));
        let app =
            UserTaxonomies::open(StorageConfig::new(dir.path()), Arc::new(registry), config).unwrap();

        for name in ["Red", "Blue", "Green"] {
            app.terms().insert_term("color", NewTerm::new(name)).unwrap();
        }
        for name in ["Gold", "Silver", "Bronze"] {
            app.terms().insert_term("level", NewTerm::new(name)).unwrap();
        }
        for (id, login) in [(1, "ada"), (2, "grace"), (3, "linus")] {
            app.register_user(id, login).unwrap();
        }

        Self { app, _dir: dir }
    }

    /// A taxonomy field bound to `taxonomy`, syncing both ways.
    fn synced_field(&self, name: &str, taxonomy: &str, multiple: bool) -> u64 {
        let field = self
            .app
            .create_field(name, FieldType::Taxonomy, SortDirection::Asc)
            .unwrap();
        let patch = FieldSettingsPatch {
            taxonomy: Some(taxonomy.to_string()),
            sync_terms: Some(true),
            sync_to_profile: Some(true),
            multiple: Some(multiple),
            ..Default::default()
        };
        self.app.save_field_settings(field.id, &patch).unwrap();
        field.id
    }

    fn slugs(&self, user_id: u64, taxonomy: &str) -> Vec<String> {
        self.app
            .get_user_terms(user_id, taxonomy)
            .unwrap()
            .into_iter()
            .map(|term| term.slug)
            .collect()
    }
}

fn editor() -> Actor {
    Actor::new(
        100,
        CapabilitySet::from_strings(&["edit_users", "edit_posts"]).unwrap(),
    )
}

#[test]
fn test_saving_same_value_twice_writes_once() {
    let ctx = TestContext::new();
    let field = ctx.synced_field("Colors", "color", true);
    let posted = PostedValue::from(vec!["red", "blue"]);

    ctx.app.save_field_value(field, 1, &posted).unwrap();
    assert_eq!(ctx.app.metrics().term_assignments(ObjectScope::User), 1);
    assert_eq!(ctx.slugs(1, "color"), vec!["blue", "red"]);

    ctx.app.save_field_value(field, 1, &posted).unwrap();
    assert_eq!(ctx.app.metrics().term_assignments(ObjectScope::User), 1);
    assert!(ctx.app.metrics().snapshot().syncs_skipped >= 1);
}

#[test]
fn test_sibling_field_keeps_its_terms() {
    let ctx = TestContext::new();
    let a = ctx.synced_field("Favourite", "color", false);
    let b = ctx.synced_field("Second favourite", "color", false);

    ctx.app.save_field_value(a, 1, &PostedValue::from("red")).unwrap();
    ctx.app.save_field_value(b, 1, &PostedValue::from("blue")).unwrap();
    assert_eq!(ctx.slugs(1, "color"), vec!["blue", "red"]);

    assert!(ctx.app.delete_field_value(b, 1).unwrap());
    assert_eq!(ctx.slugs(1, "color"), vec!["red"]);

    // Both fields claim the same term; dropping one keeps it.
    ctx.app.save_field_value(b, 1, &PostedValue::from("red")).unwrap();
    ctx.app.delete_field_value(b, 1).unwrap();
    assert_eq!(ctx.slugs(1, "color"), vec!["red"]);

    ctx.app.delete_field_value(a, 1).unwrap();
    assert!(ctx.slugs(1, "color").is_empty());
}

#[test]
fn test_changing_value_releases_old_terms() {
    let ctx = TestContext::new();
    let field = ctx.synced_field("Favourite", "color", false);

    ctx.app.save_field_value(field, 2, &PostedValue::from("green")).unwrap();
    ctx.app.save_field_value(field, 2, &PostedValue::from("red")).unwrap();
    assert_eq!(ctx.slugs(2, "color"), vec!["red"]);
}

#[test]
fn test_term_changes_reach_profile() {
    let ctx = TestContext::new();
    let many = ctx.synced_field("Colors", "color", true);
    let single = ctx.synced_field("Main color", "color", false);

    ctx.app
        .set_user_terms(1, &["red", "blue"], "color", false, true)
        .unwrap();
    assert_eq!(
        ctx.app.profiles().get_value(many, 1).unwrap(),
        Some(ProfileValue::many(["blue", "red"]))
    );
    assert_eq!(
        ctx.app.profiles().get_value(single, 1).unwrap(),
        Some(ProfileValue::Single("blue".into()))
    );

    ctx.app.remove_user_terms(1, &["red"], "color", true).unwrap();
    assert_eq!(
        ctx.app.profiles().get_value(many, 1).unwrap(),
        Some(ProfileValue::many(["blue"]))
    );

    ctx.app.delete_user_relationships(1, "color", true).unwrap();
    assert_eq!(ctx.app.profiles().get_value(many, 1).unwrap(), None);
    assert_eq!(ctx.app.profiles().get_value(single, 1).unwrap(), None);
}

#[test]
fn test_profile_untouched_without_update_flag() {
    let ctx = TestContext::new();
    let field = ctx.synced_field("Colors", "color", true);

    ctx.app.set_user_terms(1, &["green"], "color", false, false).unwrap();
    assert_eq!(ctx.app.profiles().get_value(field, 1).unwrap(), None);
}

#[test]
fn test_disabled_sync_installs_no_handlers() {
    let ctx = TestContext::with_config(SyncConfig::disabled());
    let field = ctx.synced_field("Colors", "color", true);
    assert_eq!(ctx.app.bus().subscription_count(), 0);

    ctx.app.set_user_terms(1, &["green"], "color", false, true).unwrap();
    assert_eq!(ctx.app.profiles().get_value(field, 1).unwrap(), None);

    ctx.app
        .save_field_value(field, 2, &PostedValue::from("red"))
        .unwrap();
    assert!(ctx.slugs(2, "color").is_empty());
}

#[test]
fn test_bulk_add_and_set() {
    let ctx = TestContext::new();
    ctx.app.set_user_terms(1, &["gold"], "level", false, true).unwrap();

    let add: BulkAction = "add-silver".parse().unwrap();
    let report = ctx.app.bulk_edit(&editor(), &[1, 2], "level", &add).unwrap();
    assert_eq!(report.updated, vec![1, 2]);
    assert_eq!(ctx.slugs(1, "level"), vec!["gold", "silver"]);
    assert_eq!(ctx.slugs(2, "level"), vec!["silver"]);

    let set: BulkAction = "set-bronze".parse().unwrap();
    ctx.app.bulk_edit(&editor(), &[1, 2], "level", &set).unwrap();
    assert_eq!(ctx.slugs(1, "level"), vec!["bronze"]);
    assert_eq!(ctx.slugs(2, "level"), vec!["bronze"]);

    let again = ctx.app.bulk_edit(&editor(), &[1, 2], "level", &set).unwrap();
    assert!(again.updated.is_empty());
    assert_eq!(again.unchanged, vec![1, 2]);

    ctx.app
        .bulk_edit(&editor(), &[1, 2], "level", &BulkAction::UnsetAll)
        .unwrap();
    assert!(ctx.slugs(1, "level").is_empty());
    let bronze = ctx.app.terms().term_by_slug("level", "bronze").unwrap().unwrap();
    assert_eq!(bronze.count, 0);
}

#[test]
fn test_bulk_skips_users_actor_cannot_edit() {
    let ctx = TestContext::new();
    let self_assigner = Actor::new(1, CapabilitySet::from_strings(&["edit_posts"]).unwrap());
    let add: BulkAction = "add-gold".parse().unwrap();

    let report = ctx.app.bulk_edit(&self_assigner, &[1, 2], "level", &add).unwrap();
    assert_eq!(report.updated, vec![1]);
    assert_eq!(report.skipped, vec![2]);
    assert!(ctx.slugs(2, "level").is_empty());
    assert_eq!(ctx.app.metrics().snapshot().permission_skips, 1);
}

#[test]
fn test_bulk_requires_assign_capability() {
    let ctx = TestContext::new();
    let self_only = Actor::new(1, CapabilitySet::new());
    let users_only = Actor::new(100, CapabilitySet::from_strings(&["edit_users"]).unwrap());
    let add: BulkAction = "add-gold".parse().unwrap();

    let report = ctx.app.bulk_edit(&self_only, &[1], "level", &add).unwrap();
    assert_eq!(report.skipped, vec![1]);
    let report = ctx.app.bulk_edit(&users_only, &[1, 2], "level", &add).unwrap();
    assert_eq!(report.skipped, vec![1, 2]);
    assert!(report.updated.is_empty());

    assert!(ctx.slugs(1, "level").is_empty());
    assert_eq!(ctx.app.metrics().snapshot().permission_skips, 3);
}

#[test]
fn test_concurrent_saves_of_one_field_leave_one_term() {
    let ctx = TestContext::new();
    let field = ctx.synced_field("Favourite", "color", false);
    ctx.app.save_field_value(field, 2, &PostedValue::from("green")).unwrap();

    for _ in 0..10 {
        std::thread::scope(|s| {
            for slug in ["red", "blue"] {
                let app = &ctx.app;
                s.spawn(move || app.save_field_value(field, 2, &PostedValue::from(slug)).unwrap());
            }
        });

        let stored = ctx.app.profiles().get_value(field, 2).unwrap().unwrap();
        let expected: Vec<String> = stored.slug_set().into_iter().collect();
        assert_eq!(ctx.slugs(2, "color"), expected);
    }
    assert!(ctx.app.locks().is_empty());
}

#[test]
fn test_concurrent_sibling_saves_keep_both_claims() {
    let ctx = TestContext::new();
    let a = ctx.synced_field("Favourite", "color", false);
    let b = ctx.synced_field("Second favourite", "color", false);

    std::thread::scope(|s| {
        let app = &ctx.app;
        s.spawn(move || {
            for round in 0..20 {
                let slug = if round % 2 == 0 { "red" } else { "green" };
                app.save_field_value(a, 1, &PostedValue::from(slug)).unwrap();
            }
        });
        s.spawn(move || {
            for round in 0..20 {
                let slug = if round % 2 == 0 { "green" } else { "blue" };
                app.save_field_value(b, 1, &PostedValue::from(slug)).unwrap();
            }
        });
    });

    let mut claimed = std::collections::BTreeSet::new();
    for field in [a, b] {
        if let Some(value) = ctx.app.profiles().get_value(field, 1).unwrap() {
            claimed.extend(value.slug_set());
        }
    }
    assert_eq!(ctx.slugs(1, "color"), claimed.into_iter().collect::<Vec<_>>());
}

#[test]
fn test_single_value_taxonomy_keeps_first_posted() {
    let dir = tempfile::tempdir().unwrap();
    let registry = TaxonomyRegistry::new();
    registry.register(TaxonomyDef::for_users("team").single_value());
    let app = UserTaxonomies::open(
        StorageConfig::new(dir.path()),
        Arc::new(registry),
        SyncConfig::default(),
    )
    .unwrap();
    for name in ["Alpha", "Zulu"] {
        app.terms().insert_term("team", NewTerm::new(name)).unwrap();
    }
    app.register_user(1, "ada").unwrap();

    let posted = PostedValue::from(vec!["zulu", "alpha"]);
    assert!(app.set_terms_for_user(&editor(), 1, "team", &posted).unwrap());
    let slugs: Vec<String> = app
        .get_user_terms(1, "team")
        .unwrap()
        .into_iter()
        .map(|term| term.slug)
        .collect();
    assert_eq!(slugs, vec!["zulu"]);
}

#[test]
fn test_shared_taxonomy_is_not_a_user_taxonomy() {
    let dir = tempfile::tempdir().unwrap();
    let registry = TaxonomyRegistry::new();
    registry.register(
        TaxonomyDef::new("topic", ObjectScope::Post).with_object_type(ObjectScope::User),
    );
    let app = UserTaxonomies::open(
        StorageConfig::new(dir.path()),
        Arc::new(registry),
        SyncConfig::default(),
    )
    .unwrap();
    app.terms().insert_term("topic", NewTerm::new("Rust")).unwrap();
    app.terms()
        .register_subject(ObjectScope::Post, 10, "post10")
        .unwrap();

    assert!(app.set_user_terms(1, &["rust"], "topic", false, false).is_err());
    app.terms()
        .native()
        .set_object_terms(10, &["rust"], "topic", false)
        .unwrap();
    assert_eq!(app.recount("topic").unwrap(), 1);
    let rust = app.terms().term_by_slug("topic", "rust").unwrap().unwrap();
    assert_eq!(rust.count, 1);
}

#[test]
fn test_enabling_sync_backfills_existing_values() {
    let ctx = TestContext::new();
    let field = ctx
        .app
        .create_field("Colors", FieldType::Taxonomy, SortDirection::Asc)
        .unwrap();
    let bind = FieldSettingsPatch {
        taxonomy: Some("color".into()),
        multiple: Some(true),
        ..Default::default()
    };
    assert!(ctx.app.save_field_settings(field.id, &bind).unwrap().is_none());

    ctx.app
        .save_field_value(field.id, 1, &PostedValue::from(vec!["red", "green"]))
        .unwrap();
    ctx.app
        .save_field_value(field.id, 2, &PostedValue::from("blue"))
        .unwrap();
    assert!(ctx.slugs(1, "color").is_empty());

    let enable = FieldSettingsPatch {
        sync_terms: Some(true),
        ..Default::default()
    };
    let report = ctx
        .app
        .save_field_settings(field.id, &enable)
        .unwrap()
        .expect("backfill report");
    assert_eq!(report.rows_scanned, 2);
    assert_eq!(report.users_updated, 2);
    assert_eq!(ctx.slugs(1, "color"), vec!["green", "red"]);
    assert_eq!(ctx.slugs(2, "color"), vec!["blue"]);

    // Already enabled: no second backfill.
    assert!(ctx.app.save_field_settings(field.id, &enable).unwrap().is_none());
}

#[test]
fn test_settings_must_name_a_user_taxonomy() {
    let ctx = TestContext::new();
    let field = ctx
        .app
        .create_field("Colors", FieldType::Taxonomy, SortDirection::Asc)
        .unwrap();
    let patch = FieldSettingsPatch {
        taxonomy: Some("category".into()),
        ..Default::default()
    };
    assert!(ctx.app.save_field_settings(field.id, &patch).is_err());
    assert!(ctx.app.save_field_settings(999, &patch).is_err());
}

#[test]
fn test_save_profile_checks_capabilities() {
    let ctx = TestContext::new();
    ctx.app.set_user_terms(2, &["gold"], "level", false, true).unwrap();

    let mut form = HashMap::new();
    form.insert("color".to_string(), PostedValue::from(vec!["green"]));

    let written = ctx.app.save_profile(&editor(), 2, &form).unwrap();
    assert_eq!(written, vec!["color", "level"]);
    assert_eq!(ctx.slugs(2, "color"), vec!["green"]);
    // Missing from the form: cleared.
    assert!(ctx.slugs(2, "level").is_empty());

    let no_assign = Actor::new(3, CapabilitySet::new());
    let written = ctx.app.save_profile(&no_assign, 3, &form).unwrap();
    assert!(written.is_empty());
    assert!(ctx.slugs(3, "color").is_empty());
}

#[test]
fn test_users_in_terms() {
    let ctx = TestContext::new();
    ctx.app.set_user_terms(1, &["red"], "color", false, false).unwrap();
    ctx.app
        .set_user_terms(2, &["red", "blue"], "color", false, false)
        .unwrap();

    assert_eq!(ctx.app.users_in_terms(&[("color", "red")]).unwrap(), vec![1, 2]);
    assert_eq!(
        ctx.app
            .users_in_terms(&[("color", "red"), ("color", "blue")])
            .unwrap(),
        vec![2]
    );
    assert!(ctx.app.users_in_terms(&[("color", "mauve")]).unwrap().is_empty());
    assert_eq!(ctx.app.users_in_terms(&[]).unwrap(), vec![1, 2, 3]);
}

#[test]
fn test_reserved_usernames() {
    let ctx = TestContext::new();
    assert!(ctx.app.register_user(9, "color").is_err());
    assert!(ctx.app.register_user(9, "colour").is_ok());
}

#[test]
fn test_choices_and_display() {
    let ctx = TestContext::new();
    let field = ctx
        .app
        .create_field("Colors", FieldType::Taxonomy, SortDirection::Desc)
        .unwrap();
    let patch = FieldSettingsPatch {
        taxonomy: Some("color".into()),
        multiple: Some(true),
        ..Default::default()
    };
    ctx.app.save_field_settings(field.id, &patch).unwrap();
    ctx.app
        .set_user_terms(1, &["red", "blue"], "color", false, false)
        .unwrap();

    let choices = ctx.app.field_choices(field.id, 1).unwrap();
    let names: Vec<&str> = choices.terms.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["Red", "Green", "Blue"]);
    assert!(choices.selected.contains("red"));
    assert!(!choices.selected.contains("green"));

    assert_eq!(
        ctx.app.field_display(field.id, 1).unwrap().as_deref(),
        Some("Blue, Red")
    );
    assert_eq!(ctx.app.field_display(field.id, 3).unwrap(), None);
}

#[test]
fn test_term_tree_and_recount() {
    let ctx = TestContext::new();
    let red = ctx.app.terms().term_by_slug("color", "red").unwrap().unwrap();
    ctx.app
        .terms()
        .insert_term("color", NewTerm::new("Crimson").with_parent(red.term_id))
        .unwrap();

    let tree = ctx.app.term_tree("color").unwrap();
    assert_eq!(tree.len(), 3);
    let red_node = tree.iter().find(|node| node.term.slug == "red").unwrap();
    assert_eq!(red_node.children.len(), 1);
    assert_eq!(red_node.children[0].term.slug, "crimson");

    ctx.app.set_user_terms(1, &["crimson"], "color", false, false).unwrap();
    ctx.app.delete_user(1).unwrap();
    assert_eq!(ctx.app.recount("color").unwrap(), 4);
    let crimson = ctx.app.terms().term_by_slug("color", "crimson").unwrap().unwrap();
    assert_eq!(crimson.count, 0);
}
