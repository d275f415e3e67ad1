//! Events exchanged between the facade and the synchronizer.

use crate::backfill::BackfillReport;
use crate::profile::{FieldSettings, ProfileValue};

/// Kind of a [`SyncEvent`], used to index subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    TermsAssigned,
    ProfileFieldSaved,
    ProfileFieldDeleted,
    FieldSettingsChanged,
}

/// A completed mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A user's terms in a user taxonomy changed.
    TermsAssigned {
        user_id: u64,
        taxonomy: String,
        /// The user's resulting term set.
        term_taxonomy_ids: Vec<u64>,
    },
    /// A profile value was saved.
    ProfileFieldSaved {
        field_id: u64,
        user_id: u64,
        /// Value stored before the save.
        previous: Option<ProfileValue>,
        /// Value stored by the save.
        value: ProfileValue,
    },
    /// A profile value was deleted.
    ProfileFieldDeleted {
        field_id: u64,
        user_id: u64,
        previous: Option<ProfileValue>,
    },
    /// A field's settings were saved.
    FieldSettingsChanged {
        field_id: u64,
        previous: FieldSettings,
        current: FieldSettings,
    },
}

impl SyncEvent {
    /// Kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            SyncEvent::TermsAssigned { .. } => EventKind::TermsAssigned,
            SyncEvent::ProfileFieldSaved { .. } => EventKind::ProfileFieldSaved,
            SyncEvent::ProfileFieldDeleted { .. } => EventKind::ProfileFieldDeleted,
            SyncEvent::FieldSettingsChanged { .. } => EventKind::FieldSettingsChanged,
        }
    }
}

/// What a subscriber did with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Changes were written.
    Applied,
    /// Nothing to do.
    Skipped,
    /// Existing profile values were pushed into the taxonomy.
    Backfilled(BackfillReport),
}
