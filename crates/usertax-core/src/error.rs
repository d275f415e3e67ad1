//! Core error types.

use thiserror::Error;

/// Core taxonomy store errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Key decoding error.
    #[error("invalid key format")]
    InvalidKey,

    /// Taxonomy is not registered for the requested scope.
    #[error("invalid taxonomy '{taxonomy}' for scope {scope}")]
    InvalidTaxonomy {
        /// Taxonomy name.
        taxonomy: String,
        /// Scope the operation was bound to.
        scope: String,
    },

    /// A term with the same slug already exists in the taxonomy.
    #[error("term '{slug}' already exists in taxonomy '{taxonomy}'")]
    DuplicateTerm {
        /// Taxonomy name.
        taxonomy: String,
        /// Conflicting slug.
        slug: String,
    },

    /// Term not found.
    #[error("term not found: {0}")]
    TermNotFound(String),

    /// Transaction error.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// Invalid data format.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl Error {
    pub(crate) fn invalid_taxonomy(taxonomy: &str, scope: impl std::fmt::Display) -> Self {
        Error::InvalidTaxonomy {
            taxonomy: taxonomy.to_string(),
            scope: scope.to_string(),
        }
    }
}
