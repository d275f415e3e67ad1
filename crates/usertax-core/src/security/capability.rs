//! Capability-based access control.
//!
//! Capabilities are named the way the host platform names them. A handful
//! have dedicated meaning here; every other name is kept verbatim and matched
//! against the capabilities a taxonomy requires.

use std::collections::HashSet;
use std::fmt;

use super::error::{SecurityError, SecurityResult};

/// A capability held by an actor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Grants every capability.
    Admin,
    /// Edit any user's profile and term assignments.
    EditUsers,
    /// List user accounts.
    ListUsers,
    /// Any other capability, by name (e.g. `manage_categories`).
    Named(String),
}

impl Capability {
    /// Parse a capability from its name.
    ///
    /// `admin`, `edit_users` and `list_users` map to dedicated variants;
    /// other names must be non-empty and made of lowercase ASCII letters,
    /// digits, and underscores.
    pub fn parse(s: &str) -> SecurityResult<Self> {
        match s.trim() {
            "admin" => Ok(Capability::Admin),
            "edit_users" => Ok(Capability::EditUsers),
            "list_users" => Ok(Capability::ListUsers),
            "" => Err(SecurityError::InvalidCapabilityFormat(
                "empty capability name".to_string(),
            )),
            name if name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') =>
            {
                Ok(Capability::Named(name.to_string()))
            }
            other => Err(SecurityError::InvalidCapabilityFormat(format!(
                "invalid capability name: {other}"
            ))),
        }
    }

    /// Capability name.
    pub fn as_str(&self) -> &str {
        match self {
            Capability::Admin => "admin",
            Capability::EditUsers => "edit_users",
            Capability::ListUsers => "list_users",
            Capability::Named(name) => name,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A set of capabilities with efficient lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    capabilities: HashSet<Capability>,
}

impl CapabilitySet {
    /// Create an empty capability set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a capability set from a list of capabilities.
    pub fn from_capabilities(caps: Vec<Capability>) -> Self {
        Self {
            capabilities: caps.into_iter().collect(),
        }
    }

    /// Parse capabilities from their names.
    pub fn from_strings<S: AsRef<str>>(strings: &[S]) -> SecurityResult<Self> {
        let capabilities = strings
            .iter()
            .map(|s| Capability::parse(s.as_ref()))
            .collect::<SecurityResult<HashSet<_>>>()?;
        Ok(Self { capabilities })
    }

    /// Add a capability to the set.
    pub fn add(&mut self, cap: Capability) {
        self.capabilities.insert(cap);
    }

    /// Check if the set has admin.
    pub fn has_admin(&self) -> bool {
        self.capabilities.contains(&Capability::Admin)
    }

    /// Check for a capability; admin implies all of them.
    pub fn has(&self, cap: &Capability) -> bool {
        self.has_admin() || self.capabilities.contains(cap)
    }

    /// Check for a capability by name.
    pub fn has_named(&self, name: &str) -> bool {
        match Capability::parse(name) {
            Ok(cap) => self.has(&cap),
            Err(_) => false,
        }
    }

    /// Check if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Number of capabilities.
    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    /// Capability names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.capabilities.iter().map(Capability::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_capabilities() {
        assert_eq!(Capability::parse("admin").unwrap(), Capability::Admin);
        assert_eq!(Capability::parse("edit_users").unwrap(), Capability::EditUsers);
        assert_eq!(
            Capability::parse("manage_categories").unwrap(),
            Capability::Named("manage_categories".into())
        );
        assert!(Capability::parse("").is_err());
        assert!(Capability::parse("Manage Terms").is_err());
    }

    #[test]
    fn test_admin_implies_everything() {
        let caps = CapabilitySet::from_strings(&["admin"]).unwrap();
        assert!(caps.has(&Capability::EditUsers));
        assert!(caps.has_named("edit_posts"));
    }

    #[test]
    fn test_named_lookup() {
        let caps = CapabilitySet::from_strings(&["edit_posts", "list_users"]).unwrap();
        assert!(caps.has_named("edit_posts"));
        assert!(caps.has(&Capability::ListUsers));
        assert!(!caps.has_named("manage_categories"));
        assert_eq!(caps.names(), vec!["edit_posts", "list_users"]);
    }
}
