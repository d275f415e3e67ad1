//! Sync error types.

use thiserror::Error;

/// Profile store and synchronization errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Taxonomy store error.
    #[error("storage error: {0}")]
    Storage(#[from] usertax_core::Error),

    /// Profile tree error.
    #[error("profile store error: {0}")]
    Sled(#[from] sled::Error),

    /// Capability check failed.
    #[error("security error: {0}")]
    Security(#[from] usertax_core::SecurityError),

    /// Profile field does not exist.
    #[error("profile field not found: {0}")]
    FieldNotFound(u64),

    /// Field settings could not be parsed.
    #[error("invalid field settings: {0}")]
    InvalidSettings(String),

    /// Posted value could not be decoded.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// Bulk action string could not be parsed.
    #[error("invalid bulk action: {0}")]
    InvalidAction(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_errors_convert() {
        let err: Error = usertax_core::Error::TermNotFound("sales".into()).into();
        assert!(matches!(err, Error::Storage(_)));
        assert_eq!(err.to_string(), "storage error: term not found: sales");
    }
}
