//! `oac-model` - editable item model for oac-tree procedures.
//!
//! Procedures, instructions and variables live as items in a
//! [`SessionModel`]. The [`transform`] module maps item trees to engine
//! objects and back, [`xml`] reads and writes the oac-tree XML format.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

/// Conversions between `AnyValue` and item subtrees.
pub mod anyvalue_items;
/// Domain type → item shape registry.
pub mod catalogue;
/// Model errors.
pub mod error;
/// Item type, tag and property names plus typed helpers.
pub mod items;
/// Item arena with tagged children and change events.
pub mod model;
/// Item → Domain and Domain → Item builders.
pub mod transform;
/// oac-tree XML import/export.
pub mod xml;

pub use catalogue::ItemCatalogue;
pub use error::ModelError;
pub use model::{DataRole, ItemId, ModelEvent, SessionModel, SubscriberId, TagIndex, Variant};
