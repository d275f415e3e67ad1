//! Profile field values.

use std::collections::BTreeSet;

use usertax_core::storage::aligned;
use usertax_core::taxonomy::sanitize_slug;

use crate::error::Error;

/// A stored profile value of a taxonomy-backed field.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(untagged)]
pub enum ProfileValue {
    /// One slug.
    Single(String),
    /// Several slugs, sorted and distinct.
    Many(Vec<String>),
}

impl ProfileValue {
    /// Build a multi-value in canonical order.
    pub fn many<I, S>(slugs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: BTreeSet<String> = slugs.into_iter().map(Into::into).collect();
        ProfileValue::Many(set.into_iter().collect())
    }

    /// Build the value a field should hold for `slugs`.
    ///
    /// Multi-value fields keep every slug; single fields keep the first.
    /// Returns `None` for an empty set.
    pub fn for_field(slugs: &[String], multiple: bool) -> Option<Self> {
        if multiple {
            (!slugs.is_empty()).then(|| Self::many(slugs.iter().cloned()))
        } else {
            slugs.first().cloned().map(ProfileValue::Single)
        }
    }

    /// Slugs held by the value.
    pub fn slug_set(&self) -> BTreeSet<String> {
        match self {
            ProfileValue::Single(slug) => std::iter::once(slug.clone()).collect(),
            ProfileValue::Many(slugs) => slugs.iter().cloned().collect(),
        }
    }

    /// Check whether the value holds no slug.
    pub fn is_empty(&self) -> bool {
        match self {
            ProfileValue::Single(slug) => slug.is_empty(),
            ProfileValue::Many(slugs) => slugs.is_empty(),
        }
    }

    /// Serialize the value to bytes using rkyv.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize a value from bytes using rkyv.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(&aligned(bytes))
            .map_err(|e| Error::Deserialization(e.to_string()))
    }
}

/// A value as posted by a form: one slug or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum PostedValue {
    /// A single selection.
    One(String),
    /// A multi-selection.
    Many(Vec<String>),
}

impl PostedValue {
    /// Decode a posted JSON value.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|e| Error::InvalidValue(e.to_string()))
    }

    /// Normalized slugs in posted order, blanks and repeats dropped.
    pub fn ordered_slugs(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            PostedValue::One(slug) => vec![slug.as_str()],
            PostedValue::Many(slugs) => slugs.iter().map(String::as_str).collect(),
        };
        let mut out: Vec<String> = Vec::with_capacity(raw.len());
        for slug in raw.into_iter().map(sanitize_slug) {
            if !slug.is_empty() && !out.contains(&slug) {
                out.push(slug);
            }
        }
        out
    }

    /// Normalized slugs as a set.
    pub fn slugs(&self) -> BTreeSet<String> {
        self.ordered_slugs().into_iter().collect()
    }

    /// Value to store for a field. A single-value field keeps the first posted slug.
    pub fn to_profile_value(&self, multiple: bool) -> Option<ProfileValue> {
        ProfileValue::for_field(&self.ordered_slugs(), multiple)
    }
}

impl From<&str> for PostedValue {
    fn from(slug: &str) -> Self {
        PostedValue::One(slug.to_string())
    }
}

impl From<Vec<&str>> for PostedValue {
    fn from(slugs: Vec<&str>) -> Self {
        PostedValue::Many(slugs.into_iter().map(str::to_string).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_many_is_canonical() {
        let value = ProfileValue::many(["red", "blue", "red"]);
        assert_eq!(value, ProfileValue::Many(vec!["blue".into(), "red".into()]));
    }

    #[test]
    fn test_for_field() {
        let slugs = vec!["red".to_string(), "blue".to_string()];
        assert_eq!(
            ProfileValue::for_field(&slugs, false),
            Some(ProfileValue::Single("red".into()))
        );
        assert_eq!(
            ProfileValue::for_field(&slugs, true),
            Some(ProfileValue::many(["blue", "red"]))
        );
        assert_eq!(ProfileValue::for_field(&[], true), None);
    }

    #[test]
    fn test_stored_bytes() {
        let value = ProfileValue::many(["gold", "silver"]);
        let bytes = value.to_bytes().unwrap();
        assert_eq!(ProfileValue::from_bytes(&bytes).unwrap(), value);
    }

    #[test]
    fn test_posted_json() {
        let one = PostedValue::from_json("\"Sales\"").unwrap();
        assert_eq!(one, PostedValue::One("Sales".into()));
        assert_eq!(one.slugs().into_iter().collect::<Vec<_>>(), vec!["sales"]);

        let many = PostedValue::from_json("[\"b\", \"a\", \"\"]").unwrap();
        assert_eq!(many.to_profile_value(true), Some(ProfileValue::many(["a", "b"])));

        assert!(PostedValue::from_json("42").is_err());
    }

    #[test]
    fn test_single_keeps_first_posted() {
        let posted = PostedValue::from(vec!["support", "sales", "support"]);
        assert_eq!(posted.ordered_slugs(), vec!["support", "sales"]);
        assert_eq!(
            posted.to_profile_value(false),
            Some(ProfileValue::Single("support".into()))
        );
    }
}
