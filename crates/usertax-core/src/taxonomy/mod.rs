//! Taxonomy definitions, terms, and the taxonomy registry.

mod def;
mod registry;
mod term;
mod tree;

pub use def::{CountCallback, TaxonomyCaps, TaxonomyDef, TaxonomyLabels, UpdateCount, UserTermCount};
pub use registry::TaxonomyRegistry;
pub use term::{sanitize_slug, slug_from_name, Term, TermField, TermOrder, TermQuery};
pub use tree::{build_term_tree, TermNode};
