//! Profile fields mapped onto user taxonomies.

mod field;
mod settings;
mod store;
mod value;

pub use field::{FieldType, ProfileField, SortDirection};
pub use settings::{DisplayStyle, FieldSettings, FieldSettingsPatch};
pub use store::ProfileStore;
pub use value::{PostedValue, ProfileValue};
