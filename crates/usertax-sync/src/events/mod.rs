//! Typed event bus connecting mutations to synchronization.

mod bus;
mod event;

pub use bus::{EventBus, Subscriber};
pub use event::{EventKind, Outcome, SyncEvent};
