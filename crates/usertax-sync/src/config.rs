//! Synchronizer configuration.

/// Which synchronization directions are active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    /// Whether the profile-field subsystem is present at all.
    pub profile_enabled: bool,

    /// Write term assignments back into mapped profile fields.
    pub terms_to_profile: bool,

    /// Push saved or deleted profile values into term assignments.
    pub profile_to_terms: bool,

    /// Backfill term assignments when a field starts syncing.
    pub backfill_on_enable: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            profile_enabled: true,
            terms_to_profile: true,
            profile_to_terms: true,
            backfill_on_enable: true,
        }
    }
}

impl SyncConfig {
    /// Configuration for installations without a profile-field subsystem.
    pub fn disabled() -> Self {
        Self {
            profile_enabled: false,
            terms_to_profile: false,
            profile_to_terms: false,
            backfill_on_enable: false,
        }
    }

    /// Enable or disable terms-to-profile writes.
    pub fn with_terms_to_profile(mut self, enabled: bool) -> Self {
        self.terms_to_profile = enabled;
        self
    }

    /// Enable or disable profile-to-terms writes.
    pub fn with_profile_to_terms(mut self, enabled: bool) -> Self {
        self.profile_to_terms = enabled;
        self
    }

    /// Enable or disable backfill on enable.
    pub fn with_backfill_on_enable(mut self, enabled: bool) -> Self {
        self.backfill_on_enable = enabled;
        self
    }
}
