//! usertax core - Taxonomy storage and user-scoped term relationships.
//!
//! Taxonomies classify both content items and user accounts. Terms are
//! shared, but user relationships live in their own table; the generic term
//! primitives are bound to one table at a time through [`TermStore`].

pub mod error;
pub mod metrics;
pub mod scope;
pub mod security;
pub mod storage;
pub mod taxonomy;

pub use error::Error;
pub use scope::{NewTerm, ObjectScope, RelationshipTable, ScopedTerms, TermStore};
pub use storage::{RelationshipKey, StorageConfig, StorageEngine, TableConfig};
pub use taxonomy::{
    build_term_tree, TaxonomyDef, TaxonomyRegistry, Term, TermField, TermNode, TermOrder,
    TermQuery, UpdateCount, UserTermCount,
};

// Metrics exports
pub use metrics::{new_shared_registry, MetricsRegistry, MetricsSnapshot, SharedMetricsRegistry};

// Security exports
pub use security::{Actor, Capability, CapabilitySet, SecurityError, SecurityResult};
