//! Term types and lookups.

use serde::Serialize;

use crate::storage::TermRecord;

/// A value within a taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Term {
    /// Term identifier.
    pub term_id: u64,
    /// Term-taxonomy identifier referenced by relationship rows.
    pub term_taxonomy_id: u64,
    /// Owning taxonomy.
    pub taxonomy: String,
    /// Stable key, unique within the taxonomy.
    pub slug: String,
    /// Display name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Parent term id, 0 for root terms.
    pub parent: u64,
    /// Number of subjects holding the term.
    pub count: u64,
}

impl From<TermRecord> for Term {
    fn from(record: TermRecord) -> Self {
        Self {
            term_id: record.term_id,
            term_taxonomy_id: record.term_taxonomy_id,
            taxonomy: record.taxonomy,
            slug: record.slug,
            name: record.name,
            description: record.description,
            parent: record.parent,
            count: record.count,
        }
    }
}

/// Field a term can be looked up by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TermField<'a> {
    /// Term id.
    Id(u64),
    /// Term-taxonomy id.
    TermTaxonomyId(u64),
    /// Slug.
    Slug(&'a str),
    /// Display name (exact match).
    Name(&'a str),
}

/// Ordering of term listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TermOrder {
    /// By display name.
    #[default]
    Name,
    /// By slug.
    Slug,
    /// By usage count, highest first.
    Count,
    /// By term id.
    Id,
}

/// Options for listing the terms of a taxonomy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermQuery {
    /// Skip terms with a zero count.
    pub hide_empty: bool,
    /// Only direct children of this term id.
    pub parent: Option<u64>,
    /// Result ordering.
    pub order: TermOrder,
}

impl Default for TermQuery {
    fn default() -> Self {
        Self {
            hide_empty: true,
            parent: None,
            order: TermOrder::Name,
        }
    }
}

impl TermQuery {
    /// Every term, including unused ones.
    pub fn all() -> Self {
        Self {
            hide_empty: false,
            ..Default::default()
        }
    }

    /// Restrict to direct children of `parent`.
    pub fn with_parent(mut self, parent: u64) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Set the ordering.
    pub fn with_order(mut self, order: TermOrder) -> Self {
        self.order = order;
        self
    }

    pub(crate) fn matches(&self, term: &Term) -> bool {
        if self.hide_empty && term.count == 0 {
            return false;
        }
        self.parent.map_or(true, |parent| term.parent == parent)
    }

    pub(crate) fn sort(&self, terms: &mut [Term]) {
        match self.order {
            TermOrder::Name => terms.sort_by(|a, b| a.name.cmp(&b.name).then(a.slug.cmp(&b.slug))),
            TermOrder::Slug => terms.sort_by(|a, b| a.slug.cmp(&b.slug)),
            TermOrder::Count => terms.sort_by(|a, b| b.count.cmp(&a.count).then(a.name.cmp(&b.name))),
            TermOrder::Id => terms.sort_by_key(|t| t.term_id),
        }
    }
}

/// Normalize a user-supplied term key.
///
/// Lowercases and keeps only ASCII alphanumerics, `-` and `_`.
pub fn sanitize_slug(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter_map(|c| {
            let c = c.to_ascii_lowercase();
            (c.is_ascii_alphanumeric() || c == '-' || c == '_').then_some(c)
        })
        .collect()
}

/// Derive a slug from a display name.
pub fn slug_from_name(name: &str) -> String {
    let dashed: String = name
        .trim()
        .chars()
        .map(|c| if c.is_whitespace() { '-' } else { c })
        .collect();
    sanitize_slug(&dashed)
}
