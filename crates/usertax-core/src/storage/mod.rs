//! Storage layer.
//!
//! A sled-backed engine holding term rows, their indexes, and the subject
//! tables that relationship rows are counted against. Relationship tables
//! themselves are opened per scope by [`crate::scope`].

mod config;
mod engine;
mod record;

pub mod key;

pub use config::{StorageConfig, TableConfig};
pub use engine::StorageEngine;
pub use key::RelationshipKey;
pub use record::{aligned, SubjectRecord, TermRecord};
