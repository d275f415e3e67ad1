//! Bulk term edits over a list of users.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::Error;

/// One bulk action, written `add-<slug>`, `remove-<slug>`, `set-<slug>` or `unset-all`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkAction {
    /// Append a term if absent.
    Add(String),
    /// Drop a term.
    Remove(String),
    /// Replace every term with one.
    Set(String),
    /// Drop every term.
    UnsetAll,
}

impl BulkAction {
    /// Apply the action to a slug list, keeping the order of untouched slugs.
    pub fn apply(&self, current: &[String]) -> Vec<String> {
        match self {
            BulkAction::Add(slug) => {
                let mut next = current.to_vec();
                if !next.contains(slug) {
                    next.push(slug.clone());
                }
                next
            }
            BulkAction::Remove(slug) => current.iter().filter(|s| *s != slug).cloned().collect(),
            BulkAction::Set(slug) => vec![slug.clone()],
            BulkAction::UnsetAll => Vec::new(),
        }
    }
}

impl FromStr for BulkAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "unset-all" {
            return Ok(BulkAction::UnsetAll);
        }
        let (action, slug) = s
            .split_once('-')
            .ok_or_else(|| Error::InvalidAction(s.to_string()))?;
        if slug.is_empty() {
            return Err(Error::InvalidAction(s.to_string()));
        }
        match action {
            "add" => Ok(BulkAction::Add(slug.to_string())),
            "remove" => Ok(BulkAction::Remove(slug.to_string())),
            "set" => Ok(BulkAction::Set(slug.to_string())),
            _ => Err(Error::InvalidAction(s.to_string())),
        }
    }
}

impl fmt::Display for BulkAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BulkAction::Add(slug) => write!(f, "add-{slug}"),
            BulkAction::Remove(slug) => write!(f, "remove-{slug}"),
            BulkAction::Set(slug) => write!(f, "set-{slug}"),
            BulkAction::UnsetAll => f.write_str("unset-all"),
        }
    }
}

/// Per-user result of a bulk edit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkEditReport {
    /// Users whose terms were rewritten.
    pub updated: Vec<u64>,
    /// Users already in the requested state.
    pub unchanged: Vec<u64>,
    /// Users the actor may not edit.
    pub skipped: Vec<u64>,
}
