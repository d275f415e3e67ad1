//! Relationship key encoding.

use std::fmt;

/// Size of an encoded identifier in bytes.
pub const ID_SIZE: usize = 8;

/// Total relationship key size.
pub const KEY_SIZE: usize = ID_SIZE * 2;

/// Primary key of a relationship row: `(object_id, term_taxonomy_id)`.
///
/// Key format: `[object_id (8 bytes BE)][term_taxonomy_id (8 bytes BE)]`
///
/// Big-endian encoding keeps all rows of one object contiguous, so a prefix
/// scan on the object id returns that object's relationships. The secondary
/// index uses the mirrored layout (see [`RelationshipKey::encode_by_term`]).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelationshipKey {
    /// Subject identifier (content item or user account).
    pub object_id: u64,

    /// Term-taxonomy identifier.
    pub term_taxonomy_id: u64,
}

impl RelationshipKey {
    /// Create a new relationship key.
    pub fn new(object_id: u64, term_taxonomy_id: u64) -> Self {
        Self {
            object_id,
            term_taxonomy_id,
        }
    }

    /// Encode the primary key.
    pub fn encode(&self) -> [u8; KEY_SIZE] {
        let mut buf = [0u8; KEY_SIZE];
        buf[..ID_SIZE].copy_from_slice(&self.object_id.to_be_bytes());
        buf[ID_SIZE..].copy_from_slice(&self.term_taxonomy_id.to_be_bytes());
        buf
    }

    /// Encode the secondary index key (`term_taxonomy_id` first).
    pub fn encode_by_term(&self) -> [u8; KEY_SIZE] {
        let mut buf = [0u8; KEY_SIZE];
        buf[..ID_SIZE].copy_from_slice(&self.term_taxonomy_id.to_be_bytes());
        buf[ID_SIZE..].copy_from_slice(&self.object_id.to_be_bytes());
        buf
    }

    /// Decode a primary key.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let (first, second) = split_ids(bytes)?;
        Some(Self::new(first, second))
    }

    /// Decode a secondary index key.
    pub fn decode_by_term(bytes: &[u8]) -> Option<Self> {
        let (first, second) = split_ids(bytes)?;
        Some(Self::new(second, first))
    }
}

impl fmt::Debug for RelationshipKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationshipKey")
            .field("object_id", &self.object_id)
            .field("term_taxonomy_id", &self.term_taxonomy_id)
            .finish()
    }
}

fn split_ids(bytes: &[u8]) -> Option<(u64, u64)> {
    if bytes.len() != KEY_SIZE {
        return None;
    }
    Some((decode_id(&bytes[..ID_SIZE])?, decode_id(&bytes[ID_SIZE..])?))
}

/// Encode an identifier as a big-endian key.
pub fn encode_id(id: u64) -> [u8; ID_SIZE] {
    id.to_be_bytes()
}

/// Decode a big-endian identifier.
pub fn decode_id(bytes: &[u8]) -> Option<u64> {
    let buf: [u8; ID_SIZE] = bytes.try_into().ok()?;
    Some(u64::from_be_bytes(buf))
}

/// Build a `name\0suffix` key used by the string-keyed indexes.
pub fn named_key(name: &str, suffix: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(name.len() + 1 + suffix.len());
    key.extend_from_slice(name.as_bytes());
    key.push(0); // Null separator
    key.extend_from_slice(suffix);
    key
}

/// Get current timestamp in microseconds since Unix epoch.
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}
