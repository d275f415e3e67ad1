//! usertax sync - Profile fields synchronized with user taxonomies.
//!
//! Profile values and user term assignments are two views of the same
//! classification. [`UserTaxonomies`] publishes an event after every mutation
//! and the [`Synchronizer`] carries the change across to the other side.

pub mod backfill;
pub mod bulk;
pub mod config;
pub mod directory;
pub mod error;
pub mod events;
pub mod locks;
pub mod profile;
pub mod sync;

pub use backfill::{BackfillConfig, BackfillError, BackfillExecutor, BackfillReport};
pub use bulk::{BulkAction, BulkEditReport};
pub use config::SyncConfig;
pub use directory::{FieldChoices, UserTaxonomies};
pub use error::Error;
pub use events::{EventBus, EventKind, Outcome, Subscriber, SyncEvent};
pub use locks::PairLocks;
pub use profile::{
    DisplayStyle, FieldSettings, FieldSettingsPatch, FieldType, PostedValue, ProfileField,
    ProfileStore, ProfileValue, SortDirection,
};
pub use sync::Synchronizer;
