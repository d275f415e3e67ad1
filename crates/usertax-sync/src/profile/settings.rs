//! Profile field settings.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use usertax_core::storage::aligned;

use crate::error::Error;

/// How a taxonomy field renders its choices.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DisplayStyle {
    /// A list box.
    #[default]
    Select,
    /// Checkboxes or radio buttons.
    Choice,
}

/// Settings of a taxonomy-backed profile field.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
)]
#[serde(default)]
pub struct FieldSettings {
    /// Taxonomy whose terms the field offers.
    pub taxonomy: Option<String>,
    /// Push saved values into term assignments.
    pub sync_terms: bool,
    /// Mirror term assignments into the field.
    pub sync_to_profile: bool,
    /// Whether the field holds several slugs.
    pub multiple: bool,
    /// Rendering of the choices.
    pub display: DisplayStyle,
    /// Label of the empty choice.
    pub empty_label: String,
}

impl FieldSettings {
    /// Settings for a field bound to `taxonomy`, with both directions synced.
    pub fn synced(taxonomy: impl Into<String>) -> Self {
        Self {
            taxonomy: Some(taxonomy.into()),
            sync_terms: true,
            sync_to_profile: true,
            ..Default::default()
        }
    }

    /// Make the field multi-valued.
    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    /// Check whether the field is bound to `taxonomy`.
    pub fn is_for(&self, taxonomy: &str) -> bool {
        self.taxonomy.as_deref() == Some(taxonomy)
    }

    /// Serialize the settings to bytes using rkyv.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize settings from bytes using rkyv.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(&aligned(bytes))
            .map_err(|e| Error::Deserialization(e.to_string()))
    }
}

/// A partial settings update. Absent keys keep their current value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FieldSettingsPatch {
    /// New taxonomy; an empty string unbinds the field.
    pub taxonomy: Option<String>,
    pub sync_terms: Option<bool>,
    pub sync_to_profile: Option<bool>,
    pub multiple: Option<bool>,
    pub display: Option<DisplayStyle>,
    pub empty_label: Option<String>,
}

impl FieldSettingsPatch {
    /// Build a patch from a key/value bag as submitted by a settings form.
    ///
    /// Unknown keys are ignored.
    pub fn from_bag(bag: &HashMap<String, String>) -> Result<Self, Error> {
        let mut patch = Self::default();
        for (key, value) in bag {
            match key.as_str() {
                "taxonomy" => patch.taxonomy = Some(value.trim().to_string()),
                "sync_terms" => patch.sync_terms = Some(parse_flag(key, value)?),
                "sync_to_profile" => patch.sync_to_profile = Some(parse_flag(key, value)?),
                "multiple" => patch.multiple = Some(parse_flag(key, value)?),
                "display" => {
                    patch.display = Some(match value.trim() {
                        "select" => DisplayStyle::Select,
                        "choice" | "checkbox" | "radio" => DisplayStyle::Choice,
                        other => {
                            return Err(Error::InvalidSettings(format!(
                                "unknown display '{other}'"
                            )))
                        }
                    })
                }
                "empty_label" => patch.empty_label = Some(value.clone()),
                _ => {}
            }
        }
        Ok(patch)
    }

    /// Apply the patch on top of `current`.
    pub fn apply(&self, current: &FieldSettings) -> FieldSettings {
        let taxonomy = match &self.taxonomy {
            Some(name) if name.is_empty() => None,
            Some(name) => Some(name.clone()),
            None => current.taxonomy.clone(),
        };
        FieldSettings {
            taxonomy,
            sync_terms: self.sync_terms.unwrap_or(current.sync_terms),
            sync_to_profile: self.sync_to_profile.unwrap_or(current.sync_to_profile),
            multiple: self.multiple.unwrap_or(current.multiple),
            display: self.display.unwrap_or(current.display),
            empty_label: self
                .empty_label
                .clone()
                .unwrap_or_else(|| current.empty_label.clone()),
        }
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, Error> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::InvalidSettings(format!("{key}: '{other}' is not a flag"))),
    }
}
