//! Record types for stored values.

use crate::error::Error;
use rkyv::util::AlignedVec;
use rkyv::{Archive, Deserialize, Serialize};

/// Copy stored bytes into a buffer rkyv can validate in place.
///
/// sled hands back short values inline, at an offset that does not satisfy
/// the archived types' alignment.
pub fn aligned(bytes: &[u8]) -> AlignedVec<16> {
    let mut buffer: AlignedVec<16> = AlignedVec::with_capacity(bytes.len());
    buffer.extend_from_slice(bytes);
    buffer
}

/// A stored term row, keyed by term-taxonomy id.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct TermRecord {
    /// Term identifier.
    pub term_id: u64,
    /// Term-taxonomy identifier (what relationship rows reference).
    pub term_taxonomy_id: u64,
    /// Owning taxonomy.
    pub taxonomy: String,
    /// Stable key, unique within the taxonomy.
    pub slug: String,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Parent term id, 0 for root terms.
    pub parent: u64,
    /// Number of subjects holding this term.
    pub count: u64,
}

impl TermRecord {
    /// Serialize the record to bytes using rkyv.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize a record from bytes using rkyv.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(&aligned(bytes))
            .map_err(|e| Error::Deserialization(e.to_string()))
    }
}

/// A row of a subject table (content item or user account).
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct SubjectRecord {
    /// Login or title of the subject.
    pub label: String,
    /// Registration timestamp in microseconds since Unix epoch.
    pub registered_at: u64,
}

impl SubjectRecord {
    /// Create a subject record stamped with the current time.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            registered_at: super::key::current_timestamp(),
        }
    }

    /// Serialize the record to bytes using rkyv.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize a record from bytes using rkyv.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(&aligned(bytes))
            .map_err(|e| Error::Deserialization(e.to_string()))
    }
}
