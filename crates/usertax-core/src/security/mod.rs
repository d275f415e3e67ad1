//! Capability checks for operations acting on users and their terms.
//!
//! Every mutating entry point of the user-taxonomy facade takes an
//! [`Actor`]. Checks are plain predicates; callers decide whether a denied
//! check is an error or a silent skip.
//!
//! # Example
//!
//! ```ignore
//! use usertax_core::security::{Actor, CapabilitySet};
//!
//! let editor = Actor::new(1, CapabilitySet::from_strings(&["edit_users", "edit_posts"])?);
//! if editor.can_edit_user(42) {
//!     // assign terms...
//! }
//! ```

mod actor;
mod capability;
mod error;

pub use actor::Actor;
pub use capability::{Capability, CapabilitySet};
pub use error::{SecurityError, SecurityResult};
