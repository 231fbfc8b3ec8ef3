//! `oac-engine` - execution engine for oac-tree procedures.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

/// Typed, nested values and their JSON codec.
pub mod anyvalue;
/// Ordered instruction/variable attribute maps.
pub mod attributes;
/// Engine errors.
pub mod error;
/// Instruction tree, behaviors and registry.
pub mod instruction;
/// Background job execution.
pub mod job;
/// Procedure container and preamble.
pub mod procedure;
/// Execution and job status enums.
pub mod status;
/// Variables, backends and registry.
pub mod variable;
/// Shared variable workspace.
pub mod workspace;

pub use anyvalue::{AnyType, AnyValue, ScalarType, TypeRegistry};
pub use attributes::AttributeMap;
pub use error::EngineError;
pub use instruction::{Category, Instruction, InstructionHandle, InstructionRegistry};
pub use job::{InstructionInfo, JobInfo, JobObserver, LocalJob, LogEntry, Severity};
pub use procedure::{Preamble, Procedure, TypeRegistration};
pub use status::{ExecutionStatus, JobState};
pub use variable::{Variable, VariableHandle, VariableInfo, VariableRegistry};
pub use workspace::{ListenerId, Workspace, WorkspaceListener};
