//! Registry of taxonomies known to the store.

use std::collections::{BTreeMap, BTreeSet};

use parking_lot::RwLock;
use tracing::debug;

use super::def::{CountCallback, TaxonomyDef, UserTermCount};
use crate::scope::ObjectScope;

/// Registry of taxonomy definitions.
///
/// Public taxonomies registered for the `user` scope alone are additionally
/// tracked as user taxonomies and receive the user-table count callback if they were
/// registered without one.
#[derive(Default)]
pub struct TaxonomyRegistry {
    /// All registered taxonomies keyed by name.
    taxonomies: RwLock<BTreeMap<String, TaxonomyDef>>,
    /// Names of the taxonomies served by the user relationship table.
    user_taxonomies: RwLock<BTreeSet<String>>,
}

impl TaxonomyRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a taxonomy, replacing any previous definition of the same name.
    pub fn register(&self, mut taxonomy: TaxonomyDef) {
        let name = taxonomy.name.clone();
        let is_user = taxonomy.public && taxonomy.is_user_only();

        if is_user {
            if taxonomy.update_count_callback.is_none() {
                taxonomy.update_count_callback = Some(CountCallback::new(UserTermCount));
            }
            self.user_taxonomies.write().insert(name.clone());
        } else {
            if taxonomy.is_for(ObjectScope::User) {
                debug!(taxonomy = %name, "taxonomy left to the native scope");
            }
            self.user_taxonomies.write().remove(&name);
        }

        debug!(taxonomy = %name, user = is_user, "taxonomy registered");
        self.taxonomies.write().insert(name, taxonomy);
    }

    /// Get a taxonomy definition by name.
    pub fn get(&self, name: &str) -> Option<TaxonomyDef> {
        self.taxonomies.read().get(name).cloned()
    }

    /// Check whether a taxonomy exists at all.
    pub fn exists(&self, name: &str) -> bool {
        self.taxonomies.read().contains_key(name)
    }

    /// Check whether a taxonomy is served by the user relationship table.
    pub fn is_user_taxonomy(&self, name: &str) -> bool {
        self.user_taxonomies.read().contains(name)
    }

    /// Check whether relationships of `scope` may reference the taxonomy.
    pub fn is_registered_for(&self, name: &str, scope: ObjectScope) -> bool {
        match scope {
            ObjectScope::User => self.is_user_taxonomy(name),
            ObjectScope::Post => self
                .taxonomies
                .read()
                .get(name)
                .is_some_and(|t| t.is_for(ObjectScope::Post)),
        }
    }

    /// User taxonomies in alphabetical order.
    pub fn user_taxonomies(&self) -> Vec<TaxonomyDef> {
        let names = self.user_taxonomies.read();
        let taxonomies = self.taxonomies.read();
        names
            .iter()
            .filter_map(|name| taxonomies.get(name).cloned())
            .collect()
    }

    /// Reject usernames that collide with a user taxonomy name.
    ///
    /// Returns an empty string for a colliding name, the name unchanged
    /// otherwise.
    pub fn sanitize_username(&self, username: &str) -> String {
        if self.is_user_taxonomy(username) {
            debug!(username, "username collides with a user taxonomy");
            String::new()
        } else {
            username.to_string()
        }
    }
}
