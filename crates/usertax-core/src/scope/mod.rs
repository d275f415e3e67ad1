//! Scope-bound access to term relationships.
//!
//! Term rows are shared between scopes, but relationship rows live in one
//! table per subject kind: the native table for content items and a parallel
//! table for user accounts. The generic taxonomy primitives in
//! [`ScopedTerms`] never pick a table themselves; they run against whatever
//! table the caller bound through [`TermStore::with_scope`] or
//! [`TermStore::with_user_scope`].
//!
//! The binding is a value that lives for one call. Nothing shared is
//! overwritten, so a failing or panicking operation cannot leave a later call
//! pointed at the wrong table, and concurrent requests never observe each
//! other's scope.
//!
//! # Example
//!
//! ```ignore
//! use usertax_core::scope::TermStore;
//!
//! let tt_ids = store.with_user_scope(|terms| {
//!     terms.set_object_terms(user_id, &["sales"], "department", false)
//! })?;
//! let posts = store.native().get_objects_in_term(&[term_id], "category")?;
//! ```

mod scoped;
mod store;
mod table;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use scoped::ScopedTerms;
pub use store::{NewTerm, TermStore};
pub use table::RelationshipTable;

/// Subject kind a relationship table serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectScope {
    /// Content items; the platform's native scope.
    Post,
    /// User accounts.
    User,
}

impl ObjectScope {
    /// Lowercase scope name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectScope::Post => "post",
            ObjectScope::User => "user",
        }
    }
}

impl fmt::Display for ObjectScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
