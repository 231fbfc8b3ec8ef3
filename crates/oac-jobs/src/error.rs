//! Job errors.

#![allow(missing_docs)]

use oac_engine::EngineError;
use oac_model::{ItemId, ModelError};
use smol_str::SmolStr;
use thiserror::Error;

/// Errors raised while submitting, controlling or synchronising jobs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    /// Submission without a job item.
    #[error("Attempt to submit undefined job")]
    UndefinedJob,

    /// Job item already has a handler.
    #[error("Attempt to submit already existing job {0}")]
    JobAlreadySubmitted(ItemId),

    /// Job item has no handler.
    #[error("job {0} has not been submitted")]
    UnknownJob(ItemId),

    /// Job is running, paused or stepping.
    #[error("Attempt to modify running job {0}")]
    RunningJob(ItemId),

    /// Local job without a linked procedure item.
    #[error("job {0} has no procedure to execute")]
    MissingProcedure(ItemId),

    /// Job item type has no handler kind.
    #[error("job {item} has unsupported type '{model_type}'")]
    UnsupportedJob { item: ItemId, model_type: SmolStr },

    /// Remote server unreachable or not allowed.
    #[error("cannot connect to server '{server}': {message}")]
    Connection { server: SmolStr, message: SmolStr },

    /// Remote client refused a request.
    #[error("remote job error: {0}")]
    Remote(SmolStr),

    /// Item and domain workspaces hold different variables.
    #[error("workspace mismatch: {0}")]
    WorkspaceMismatch(SmolStr),

    /// Synchronizer for this workspace item was already started.
    #[error("workspace synchronizer for item {0} already started")]
    SynchronizerStarted(ItemId),

    /// Runner configuration rejected.
    #[error("invalid config: {0}")]
    InvalidConfig(SmolStr),

    /// Error from the item model.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Error from the domain engine.
    #[error(transparent)]
    Engine(#[from] EngineError),
}
