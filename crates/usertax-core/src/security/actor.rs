//! The account on whose behalf an operation runs.

use super::capability::{Capability, CapabilitySet};
use super::error::{SecurityError, SecurityResult};
use crate::taxonomy::TaxonomyDef;

/// Identity and capabilities of the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    /// Account id, `None` for anonymous callers.
    pub user_id: Option<u64>,
    /// Granted capabilities.
    pub capabilities: CapabilitySet,
}

impl Actor {
    /// Create an actor for a signed-in account.
    pub fn new(user_id: u64, capabilities: CapabilitySet) -> Self {
        Self {
            user_id: Some(user_id),
            capabilities,
        }
    }

    /// An anonymous actor with no capabilities.
    pub fn anonymous() -> Self {
        Self {
            user_id: None,
            capabilities: CapabilitySet::new(),
        }
    }

    /// An actor holding every capability, for maintenance tasks.
    pub fn admin() -> Self {
        Self {
            user_id: None,
            capabilities: CapabilitySet::from_capabilities(vec![Capability::Admin]),
        }
    }

    /// Add a capability.
    pub fn with_capability(mut self, cap: Capability) -> Self {
        self.capabilities.add(cap);
        self
    }

    /// Accounts may always edit themselves.
    pub fn can_edit_user(&self, user_id: u64) -> bool {
        self.user_id == Some(user_id) || self.capabilities.has(&Capability::EditUsers)
    }

    pub fn can_assign_terms(&self, taxonomy: &TaxonomyDef) -> bool {
        self.capabilities.has_named(&taxonomy.cap.assign_terms)
    }

    pub fn can_manage_terms(&self, taxonomy: &TaxonomyDef) -> bool {
        self.capabilities.has_named(&taxonomy.cap.manage_terms)
    }

    pub fn can_list_users(&self) -> bool {
        self.capabilities.has(&Capability::ListUsers)
    }

    /// Fail unless the actor may both edit `user_id` and assign terms of `taxonomy`.
    pub fn require_term_assignment(&self, user_id: u64, taxonomy: &TaxonomyDef) -> SecurityResult<()> {
        if !self.can_edit_user(user_id) {
            return Err(SecurityError::PermissionDenied(format!("edit user {user_id}")));
        }
        if !self.can_assign_terms(taxonomy) {
            return Err(SecurityError::PermissionDenied(format!(
                "assign terms of '{}'",
                taxonomy.name
            )));
        }
        Ok(())
    }
}
