//! Model errors.

#![allow(missing_docs)]

use oac_engine::EngineError;
use smol_str::SmolStr;
use thiserror::Error;

use crate::model::ItemId;

/// Errors raised by the item model, the transforms and XML import/export.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// Item id not present in the model.
    #[error("item {0} does not exist")]
    UnknownItem(ItemId),

    /// Item must be detached before insertion.
    #[error("item {0} already has a parent")]
    AlreadyAttached(ItemId),

    /// Insertion would make an item its own ancestor.
    #[error("item {item} cannot be inserted into its own subtree")]
    CyclicInsert { item: ItemId },

    /// Tag/index pair outside the parent's child slots.
    #[error("invalid tag index '{tag}':{index} under item {parent}")]
    InvalidTagIndex {
        parent: ItemId,
        tag: SmolStr,
        index: usize,
    },

    /// Item has a different model type than the operation needs.
    #[error("item {item} is a '{found}', expected '{expected}'")]
    WrongItemType {
        item: ItemId,
        expected: SmolStr,
        found: SmolStr,
    },

    /// Instruction or variable item without a domain type name.
    #[error("item {0} has no domain type")]
    MissingDomainType(ItemId),

    /// Expected structural child is missing.
    #[error("item {item} has no child under tag '{tag}'")]
    MissingChild { item: ItemId, tag: SmolStr },

    /// Target domain procedure already holds instructions or variables.
    #[error("Error in DomainObjectBuilder: non-empty domain {0}")]
    NonEmptyDomain(SmolStr),

    /// Two variable items share a name.
    #[error("Error in DomainObjectBuilder: variable name '{0}' already exists")]
    DuplicateVariableName(SmolStr),

    /// Correlation lookup before any successful build.
    #[error("Error in DomainObjectBuilder: domain objects have not been built")]
    NotBuilt,

    /// Value subtree does not describe a valid value.
    #[error("invalid value item: {0}")]
    InvalidValue(SmolStr),

    /// Malformed or unsupported procedure XML.
    #[error("xml error: {0}")]
    Xml(SmolStr),

    /// Error from the domain engine.
    #[error(transparent)]
    Engine(#[from] EngineError),
}
