//! Engine errors.

#![allow(missing_docs)]

use smol_str::SmolStr;
use thiserror::Error;

/// Errors raised while building, setting up or controlling procedures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Type description could not be parsed or resolved.
    #[error("invalid type '{0}'")]
    InvalidType(SmolStr),

    /// Value does not fit the requested type.
    #[error("invalid value for type '{type_name}': {message}")]
    InvalidValue { type_name: SmolStr, message: SmolStr },

    /// No instruction registered under this type name.
    #[error("unknown instruction type '{0}'")]
    UnknownInstruction(SmolStr),

    /// No variable registered under this type name.
    #[error("unknown variable type '{0}'")]
    UnknownVariable(SmolStr),

    /// Mandatory attribute missing.
    #[error("missing attribute '{attribute}' on '{owner}'")]
    MissingAttribute { owner: SmolStr, attribute: SmolStr },

    /// Attribute present but malformed.
    #[error("invalid attribute '{attribute}' on '{owner}': {message}")]
    InvalidAttribute {
        owner: SmolStr,
        attribute: SmolStr,
        message: SmolStr,
    },

    /// Instruction tree shape is not accepted by the parent instruction.
    #[error("instruction '{0}' cannot take more children")]
    ChildNotAllowed(SmolStr),

    /// Insertion index outside the child range.
    #[error("insertion index {index} out of range (children: {len})")]
    InvalidIndex { index: usize, len: usize },

    /// Workspace already contains a variable with this name.
    #[error("variable '{0}' already exists")]
    DuplicateVariable(SmolStr),

    /// Workspace does not contain a variable with this name.
    #[error("undefined variable '{0}'")]
    UndefinedVariable(SmolStr),

    /// New value does not match the variable type.
    #[error("type mismatch for variable '{0}'")]
    TypeMismatch(SmolStr),

    /// Workspace was modified after setup.
    #[error("workspace is already set up")]
    WorkspaceLocked,

    /// Procedure failed to set up.
    #[error("procedure setup failed: {0}")]
    Setup(SmolStr),

    /// Job thread could not be spawned.
    #[error("thread spawn error '{0}'")]
    ThreadSpawn(SmolStr),

    /// Job control channel error.
    #[error("job control error '{0}'")]
    Control(SmolStr),
}
