//! Profile field definitions.

use serde::Serialize;

use usertax_core::storage::aligned;

use crate::error::Error;

/// Kind of a profile field.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Offers the terms of a taxonomy.
    Taxonomy,
    /// Free text.
    Text,
    /// Any other field type, by name.
    Other(String),
}

/// Order in which a field lists its choices.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// A profile field.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
)]
pub struct ProfileField {
    /// Field identifier.
    pub id: u64,
    /// Display name.
    pub name: String,
    /// Field kind.
    pub field_type: FieldType,
    /// Choice order.
    pub order_by: SortDirection,
}

impl ProfileField {
    /// Check whether the field is taxonomy-backed.
    pub fn is_taxonomy(&self) -> bool {
        self.field_type == FieldType::Taxonomy
    }

    pub(crate) fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    pub(crate) fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(&aligned(bytes))
            .map_err(|e| Error::Deserialization(e.to_string()))
    }
}
