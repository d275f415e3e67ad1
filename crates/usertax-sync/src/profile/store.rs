//! Profile store: fields, field settings, and per-user values.

use std::sync::Arc;

use sled::Tree;
use tracing::debug;
use usertax_core::storage::key::{decode_id, encode_id};
use usertax_core::StorageEngine;

use super::{FieldSettings, FieldType, ProfileField, ProfileValue, SortDirection};
use crate::error::Error;

/// Tree name for field definitions.
const FIELDS_TREE: &str = "xprofile:fields";

/// Tree name for field settings.
const META_TREE: &str = "xprofile:meta";

/// Tree name for field values, keyed by `[field_id][user_id]`.
const DATA_TREE: &str = "xprofile:data";

/// Persistent profile fields and values.
///
/// Writes here never publish events; the facade decides what a change
/// triggers.
pub struct ProfileStore {
    engine: Arc<StorageEngine>,
    fields: Tree,
    meta: Tree,
    data: Tree,
}

impl ProfileStore {
    /// Open the profile trees inside the storage engine's database.
    pub fn open(engine: Arc<StorageEngine>) -> Result<Self, Error> {
        let fields = engine.db().open_tree(FIELDS_TREE)?;
        let meta = engine.db().open_tree(META_TREE)?;
        let data = engine.db().open_tree(DATA_TREE)?;
        Ok(Self {
            engine,
            fields,
            meta,
            data,
        })
    }

    // ========== Fields ==========

    /// Create a field.
    pub fn create_field(
        &self,
        name: impl Into<String>,
        field_type: FieldType,
        order_by: SortDirection,
    ) -> Result<ProfileField, Error> {
        let field = ProfileField {
            id: self.engine.generate_id()?,
            name: name.into(),
            field_type,
            order_by,
        };
        self.fields.insert(encode_id(field.id), field.to_bytes()?)?;
        debug!(field_id = field.id, name = %field.name, "profile field created");
        Ok(field)
    }

    /// Get a field.
    pub fn get_field(&self, field_id: u64) -> Result<Option<ProfileField>, Error> {
        match self.fields.get(encode_id(field_id))? {
            Some(bytes) => Ok(Some(ProfileField::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Get a field, failing if it does not exist.
    pub fn require_field(&self, field_id: u64) -> Result<ProfileField, Error> {
        self.get_field(field_id)?
            .ok_or(Error::FieldNotFound(field_id))
    }

    /// All fields, by ascending id.
    pub fn fields(&self) -> Result<Vec<ProfileField>, Error> {
        self.fields
            .iter()
            .values()
            .map(|result| ProfileField::from_bytes(&result?))
            .collect()
    }

    /// Settings of a field; defaults when none were saved.
    pub fn settings(&self, field_id: u64) -> Result<FieldSettings, Error> {
        match self.meta.get(encode_id(field_id))? {
            Some(bytes) => FieldSettings::from_bytes(&bytes),
            None => Ok(FieldSettings::default()),
        }
    }

    /// Replace a field's settings.
    pub fn put_settings(&self, field_id: u64, settings: &FieldSettings) -> Result<(), Error> {
        self.meta.insert(encode_id(field_id), settings.to_bytes()?)?;
        Ok(())
    }

    /// Taxonomy fields bound to `taxonomy`, with their settings.
    pub fn fields_for_taxonomy(
        &self,
        taxonomy: &str,
    ) -> Result<Vec<(ProfileField, FieldSettings)>, Error> {
        let mut out = Vec::new();
        for field in self.fields()? {
            if !field.is_taxonomy() {
                continue;
            }
            let settings = self.settings(field.id)?;
            if settings.is_for(taxonomy) {
                out.push((field, settings));
            }
        }
        Ok(out)
    }

    // ========== Values ==========

    /// Stored value of a field for a user.
    pub fn get_value(&self, field_id: u64, user_id: u64) -> Result<Option<ProfileValue>, Error> {
        match self.data.get(value_key(field_id, user_id))? {
            Some(bytes) => Ok(Some(ProfileValue::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Store a value. Returns false when the stored value was already equal.
    pub fn set_value(&self, field_id: u64, user_id: u64, value: &ProfileValue) -> Result<bool, Error> {
        if self.get_value(field_id, user_id)?.as_ref() == Some(value) {
            return Ok(false);
        }
        self.data.insert(value_key(field_id, user_id), value.to_bytes()?)?;
        Ok(true)
    }

    /// Delete a value, returning what was stored.
    pub fn delete_value(&self, field_id: u64, user_id: u64) -> Result<Option<ProfileValue>, Error> {
        match self.data.remove(value_key(field_id, user_id))? {
            Some(bytes) => Ok(Some(ProfileValue::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Every stored value of a field, by ascending user id.
    pub fn values_for_field(&self, field_id: u64) -> Result<Vec<(u64, ProfileValue)>, Error> {
        let mut out = Vec::new();
        for result in self.data.scan_prefix(encode_id(field_id)) {
            let (key, bytes) = result?;
            let user_id = key
                .get(8..)
                .and_then(decode_id)
                .ok_or(usertax_core::Error::InvalidKey)?;
            out.push((user_id, ProfileValue::from_bytes(&bytes)?));
        }
        Ok(out)
    }
}

fn value_key(field_id: u64, user_id: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&encode_id(field_id));
    key[8..].copy_from_slice(&encode_id(user_id));
    key
}
