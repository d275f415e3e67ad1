//! Taxonomy definitions.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::scope::{ObjectScope, TermStore};

/// Hook invoked with the term-taxonomy ids whose usage count must be refreshed.
pub trait UpdateCount: Send + Sync {
    /// Recompute and persist the counts of `term_taxonomy_ids`.
    fn update_count(
        &self,
        store: &TermStore,
        term_taxonomy_ids: &[u64],
        taxonomy: &TaxonomyDef,
    ) -> Result<(), Error>;
}

/// Shared handle to an [`UpdateCount`] implementation.
#[derive(Clone)]
pub struct CountCallback(pub Arc<dyn UpdateCount>);

impl CountCallback {
    /// Wrap an update-count implementation.
    pub fn new(callback: impl UpdateCount + 'static) -> Self {
        Self(Arc::new(callback))
    }
}

impl fmt::Debug for CountCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CountCallback(..)")
    }
}

/// Counts users holding each term, against the user relationship table.
///
/// Injected into every public user taxonomy registered without a callback of
/// its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserTermCount;

impl UpdateCount for UserTermCount {
    fn update_count(
        &self,
        store: &TermStore,
        term_taxonomy_ids: &[u64],
        _taxonomy: &TaxonomyDef,
    ) -> Result<(), Error> {
        store.with_user_scope(|terms| terms.update_term_count(term_taxonomy_ids))
    }
}

/// Display labels of a taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxonomyLabels {
    /// Plural name.
    pub name: String,
    /// Singular name.
    pub singular_name: String,
    /// Name used in menus.
    pub menu_name: String,
}

/// Capabilities required to act on a taxonomy's terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxonomyCaps {
    /// Create and rename terms.
    pub manage_terms: String,
    /// Edit terms.
    pub edit_terms: String,
    /// Delete terms.
    pub delete_terms: String,
    /// Assign terms to subjects.
    pub assign_terms: String,
}

impl Default for TaxonomyCaps {
    fn default() -> Self {
        Self {
            manage_terms: "manage_categories".to_string(),
            edit_terms: "manage_categories".to_string(),
            delete_terms: "manage_categories".to_string(),
            assign_terms: "edit_posts".to_string(),
        }
    }
}

/// A registered classification scheme.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxonomyDef {
    /// Taxonomy name (unique).
    pub name: String,
    /// Subject kinds the taxonomy classifies.
    #[serde(default)]
    pub object_types: Vec<ObjectScope>,
    /// Whether the taxonomy is public.
    #[serde(default = "default_true")]
    pub public: bool,
    /// Whether terms form a tree.
    #[serde(default)]
    pub hierarchical: bool,
    /// Whether a subject holds at most one term.
    #[serde(default)]
    pub single_value: bool,
    /// Whether the taxonomy is shown as a column on subject listings.
    #[serde(default)]
    pub show_admin_column: bool,
    /// Whether the taxonomy has its own menu entry.
    #[serde(default = "default_true")]
    pub show_in_menu: bool,
    /// Whether relationship rows remember the order terms were assigned in.
    #[serde(default)]
    pub sort: bool,
    /// Display labels.
    #[serde(default)]
    pub labels: TaxonomyLabels,
    /// Required capabilities.
    #[serde(default)]
    pub cap: TaxonomyCaps,
    /// Count refresh hook; injected for user taxonomies when absent.
    #[serde(skip)]
    pub update_count_callback: Option<CountCallback>,
}

fn default_true() -> bool {
    true
}

impl TaxonomyDef {
    /// Create a public taxonomy for the given subject kind.
    pub fn new(name: impl Into<String>, object_type: ObjectScope) -> Self {
        let name = name.into();
        Self {
            labels: TaxonomyLabels {
                name: name.clone(),
                singular_name: name.clone(),
                menu_name: name.clone(),
            },
            name,
            object_types: vec![object_type],
            public: true,
            hierarchical: false,
            single_value: false,
            show_admin_column: false,
            show_in_menu: true,
            sort: false,
            cap: TaxonomyCaps::default(),
            update_count_callback: None,
        }
    }

    /// Shorthand for a user taxonomy.
    pub fn for_users(name: impl Into<String>) -> Self {
        Self::new(name, ObjectScope::User)
    }

    /// Mark the taxonomy hierarchical.
    pub fn hierarchical(mut self) -> Self {
        self.hierarchical = true;
        self
    }

    /// Restrict subjects to a single term.
    pub fn single_value(mut self) -> Self {
        self.single_value = true;
        self
    }

    /// Set visibility.
    pub fn with_public(mut self, public: bool) -> Self {
        self.public = public;
        self
    }

    /// Set display labels.
    pub fn with_labels(mut self, labels: TaxonomyLabels) -> Self {
        self.labels = labels;
        self
    }

    /// Set required capabilities.
    pub fn with_caps(mut self, cap: TaxonomyCaps) -> Self {
        self.cap = cap;
        self
    }

    /// Set the count refresh hook.
    pub fn with_update_count(mut self, callback: impl UpdateCount + 'static) -> Self {
        self.update_count_callback = Some(CountCallback::new(callback));
        self
    }

    /// Also classify another subject kind.
    pub fn with_object_type(mut self, scope: ObjectScope) -> Self {
        if !self.object_types.contains(&scope) {
            self.object_types.push(scope);
        }
        self
    }

    /// Check whether the taxonomy classifies the given subject kind.
    pub fn is_for(&self, scope: ObjectScope) -> bool {
        self.object_types.contains(&scope)
    }

    /// Check whether users are the only subject kind.
    pub fn is_user_only(&self) -> bool {
        !self.object_types.is_empty() && self.object_types.iter().all(|t| *t == ObjectScope::User)
    }

    /// Parse taxonomy definitions from a JSON array.
    pub fn list_from_json(json: &str) -> Result<Vec<Self>, Error> {
        serde_json::from_str(json).map_err(|e| Error::Deserialization(e.to_string()))
    }
}
