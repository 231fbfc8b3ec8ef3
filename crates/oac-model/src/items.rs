//! Item type, tag and property names plus typed accessors.
//!
//! Procedure layout:
//!
//! ```text
//! Procedure
//! ├── container: InstructionContainer ── instructions: <instruction>*
//! ├── workspace: Workspace ── variables: <variable>* ── anyvalue: AnyValue*
//! └── preamble:  Preamble ── plugins: PluginPath*, types: TypeRegistration*
//! ```
//!
//! Jobs live under the model root (tag `jobs`), procedures under `procedures`.

#![allow(missing_docs)]

use std::fmt;

use oac_engine::{ExecutionStatus, JobState};

use crate::error::ModelError;
use crate::model::{ItemId, SessionModel, Variant};

pub mod types {
    pub const PROCEDURE: &str = "Procedure";
    pub const INSTRUCTION_CONTAINER: &str = "InstructionContainer";
    pub const WORKSPACE: &str = "Workspace";
    pub const PREAMBLE: &str = "Preamble";
    pub const PLUGIN_PATH: &str = "PluginPath";
    pub const TYPE_REGISTRATION: &str = "TypeRegistration";
    pub const UNIVERSAL_INSTRUCTION: &str = "UniversalInstruction";
    pub const UNIVERSAL_VARIABLE: &str = "UniversalVariable";
    pub const LOCAL_JOB: &str = "LocalJob";
    pub const REMOTE_JOB: &str = "RemoteJob";
    pub const ANYVALUE_EMPTY: &str = "AnyValueEmpty";
    pub const ANYVALUE_SCALAR: &str = "AnyValueScalar";
    pub const ANYVALUE_STRUCT: &str = "AnyValueStruct";
    pub const ANYVALUE_ARRAY: &str = "AnyValueArray";
}

pub mod tags {
    pub const PROCEDURES: &str = "procedures";
    pub const JOBS: &str = "jobs";
    pub const CONTAINER: &str = "container";
    pub const WORKSPACE: &str = "workspace";
    pub const PREAMBLE: &str = "preamble";
    pub const INSTRUCTIONS: &str = "instructions";
    pub const VARIABLES: &str = "variables";
    pub const PLUGINS: &str = "plugins";
    pub const TYPE_REGISTRATIONS: &str = "types";
    pub const ANYVALUE: &str = "anyvalue";
    pub const FIELDS: &str = "fields";
    pub const ELEMENTS: &str = "elements";
    pub const EXPANDED: &str = "expanded";
}

pub mod props {
    pub const DOMAIN_TYPE: &str = "domain_type";
    pub const NAME: &str = "name";
    pub const DESCRIPTION: &str = "description";
    pub const X: &str = "x";
    pub const Y: &str = "y";
    pub const STATUS: &str = "status";
    pub const BREAKPOINT: &str = "breakpoint";
    pub const IS_AVAILABLE: &str = "is_available";
    pub const TYPE_NAME: &str = "type_name";
    pub const ELEMENT_TYPE: &str = "element_type";
    pub const VALUE: &str = "value";
    pub const REGISTRATION_MODE: &str = "registration_mode";
    pub const JOB_STATUS: &str = "job_status";
    pub const TICK_TIMEOUT: &str = "tick_timeout";
    pub const PROCEDURE: &str = "procedure";
    pub const SERVER_NAME: &str = "server_name";
    pub const REMOTE_JOB_INDEX: &str = "remote_job_index";
}

/// Breakpoint marker on an instruction item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BreakpointStatus {
    #[default]
    NotSet,
    Set,
    Disabled,
}

impl BreakpointStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotSet => "not-set",
            Self::Set => "set",
            Self::Disabled => "disabled",
        }
    }

    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "not-set" | "" => Some(Self::NotSet),
            "set" => Some(Self::Set),
            "disabled" => Some(Self::Disabled),
            _ => None,
        }
    }

    /// Not set → set → disabled → not set.
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::NotSet => Self::Set,
            Self::Set => Self::Disabled,
            Self::Disabled => Self::NotSet,
        }
    }
}

impl fmt::Display for BreakpointStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a type registration is given in the preamble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationMode {
    JsonString,
    JsonFile,
}

impl RegistrationMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::JsonString => "json",
            Self::JsonFile => "file",
        }
    }

    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "json" => Some(Self::JsonString),
            "file" => Some(Self::JsonFile),
            _ => None,
        }
    }
}

pub(crate) fn expect_type(model: &SessionModel, item: ItemId, expected: &str) -> Result<(), ModelError> {
    let found = model.model_type(item).ok_or(ModelError::UnknownItem(item))?;
    if found == expected {
        Ok(())
    } else {
        Err(ModelError::WrongItemType {
            item,
            expected: expected.into(),
            found: found.into(),
        })
    }
}

pub(crate) fn required_child(model: &SessionModel, item: ItemId, tag: &str) -> Result<ItemId, ModelError> {
    model.child(item, tag).ok_or_else(|| ModelError::MissingChild {
        item,
        tag: tag.into(),
    })
}

/// Detached, empty procedure item with container, workspace and preamble.
pub fn new_procedure(model: &mut SessionModel) -> Result<ItemId, ModelError> {
    let procedure = model.new_item(types::PROCEDURE);
    for (child_type, child_tag) in [
        (types::INSTRUCTION_CONTAINER, tags::CONTAINER),
        (types::WORKSPACE, tags::WORKSPACE),
        (types::PREAMBLE, tags::PREAMBLE),
    ] {
        let child = model.new_item(child_type);
        model.append_item(child, procedure, child_tag)?;
    }
    Ok(procedure)
}

/// Empty procedure appended under `parent`/`tag`.
pub fn create_procedure(
    model: &mut SessionModel,
    parent: ItemId,
    tag: &str,
) -> Result<ItemId, ModelError> {
    let procedure = new_procedure(model)?;
    model.append_item(procedure, parent, tag)?;
    Ok(procedure)
}

pub fn instruction_container(model: &SessionModel, procedure: ItemId) -> Result<ItemId, ModelError> {
    expect_type(model, procedure, types::PROCEDURE)?;
    required_child(model, procedure, tags::CONTAINER)
}

pub fn workspace_item(model: &SessionModel, procedure: ItemId) -> Result<ItemId, ModelError> {
    expect_type(model, procedure, types::PROCEDURE)?;
    required_child(model, procedure, tags::WORKSPACE)
}

pub fn preamble_item(model: &SessionModel, procedure: ItemId) -> Result<ItemId, ModelError> {
    expect_type(model, procedure, types::PROCEDURE)?;
    required_child(model, procedure, tags::PREAMBLE)
}

/// Top-level instruction items of a procedure.
pub fn top_instructions(model: &SessionModel, procedure: ItemId) -> Result<Vec<ItemId>, ModelError> {
    let container = instruction_container(model, procedure)?;
    Ok(model.children(container, tags::INSTRUCTIONS))
}

pub fn variable_items(model: &SessionModel, procedure: ItemId) -> Result<Vec<ItemId>, ModelError> {
    let workspace = workspace_item(model, procedure)?;
    Ok(model.children(workspace, tags::VARIABLES))
}

/// Instruction items of a procedure, depth first in child order.
pub fn all_instructions(model: &SessionModel, procedure: ItemId) -> Result<Vec<ItemId>, ModelError> {
    let mut out = Vec::new();
    for top in top_instructions(model, procedure)? {
        collect_instructions(model, top, &mut out);
    }
    Ok(out)
}

fn collect_instructions(model: &SessionModel, item: ItemId, out: &mut Vec<ItemId>) {
    out.push(item);
    for child in model.children(item, tags::INSTRUCTIONS) {
        collect_instructions(model, child, out);
    }
}

#[must_use]
pub fn domain_type(model: &SessionModel, item: ItemId) -> Option<&str> {
    model.str_data(item, props::DOMAIN_TYPE)
}

/// Variable item whose `name` attribute equals `name`.
#[must_use]
pub fn find_variable_by_name(model: &SessionModel, workspace: ItemId, name: &str) -> Option<ItemId> {
    model
        .children(workspace, tags::VARIABLES)
        .into_iter()
        .find(|item| variable_name(model, *item).as_deref() == Some(name))
}

#[must_use]
pub fn variable_name(model: &SessionModel, variable: ItemId) -> Option<String> {
    model
        .attribute(variable, oac_engine::attributes::names::NAME)
        .map(Variant::to_text)
}

/// Root of the variable's value subtree.
#[must_use]
pub fn anyvalue_item(model: &SessionModel, variable: ItemId) -> Option<ItemId> {
    model.child(variable, tags::ANYVALUE)
}

#[must_use]
pub fn instruction_status(model: &SessionModel, instruction: ItemId) -> Option<ExecutionStatus> {
    model
        .str_data(instruction, props::STATUS)
        .and_then(ExecutionStatus::parse)
}

pub fn set_instruction_status(
    model: &mut SessionModel,
    instruction: ItemId,
    status: ExecutionStatus,
) -> Result<bool, ModelError> {
    model.set_data(instruction, props::STATUS, status.as_str())
}

#[must_use]
pub fn breakpoint_status(model: &SessionModel, instruction: ItemId) -> BreakpointStatus {
    model
        .str_data(instruction, props::BREAKPOINT)
        .and_then(BreakpointStatus::parse)
        .unwrap_or_default()
}

pub fn set_breakpoint_status(
    model: &mut SessionModel,
    instruction: ItemId,
    status: BreakpointStatus,
) -> Result<bool, ModelError> {
    model.set_data(instruction, props::BREAKPOINT, status.as_str())
}

#[must_use]
pub fn is_available(model: &SessionModel, variable: ItemId) -> bool {
    model.bool_data(variable, props::IS_AVAILABLE).unwrap_or(false)
}

pub fn set_available(model: &mut SessionModel, variable: ItemId, available: bool) -> Result<bool, ModelError> {
    model.set_data(variable, props::IS_AVAILABLE, available)
}

/// Creates a job item of `job_type` under the model root.
pub fn create_job(model: &mut SessionModel, job_type: &str) -> Result<ItemId, ModelError> {
    let root = model.root();
    let job = model.append_new_item(job_type, root, tags::JOBS)?;
    model.set_data(job, props::JOB_STATUS, JobState::Initial.as_str())?;
    Ok(job)
}

pub fn create_local_job(model: &mut SessionModel, procedure: ItemId) -> Result<ItemId, ModelError> {
    expect_type(model, procedure, types::PROCEDURE)?;
    let job = create_job(model, types::LOCAL_JOB)?;
    model.set_data(job, props::PROCEDURE, procedure.raw())?;
    Ok(job)
}

pub fn create_remote_job(
    model: &mut SessionModel,
    server_name: &str,
    remote_job_index: usize,
) -> Result<ItemId, ModelError> {
    let job = create_job(model, types::REMOTE_JOB)?;
    model.set_data(job, props::SERVER_NAME, server_name)?;
    model.set_data(job, props::REMOTE_JOB_INDEX, remote_job_index as u64)?;
    Ok(job)
}

/// Procedure item a local job executes.
#[must_use]
pub fn linked_procedure(model: &SessionModel, job: ItemId) -> Option<ItemId> {
    let raw = match model.data(job, props::PROCEDURE)? {
        Variant::UInt(raw) => *raw,
        _ => return None,
    };
    model
        .subtree(model.root())
        .into_iter()
        .find(|item| item.raw() == raw && model.model_type(*item) == Some(types::PROCEDURE))
}

#[must_use]
pub fn job_state(model: &SessionModel, job: ItemId) -> Option<JobState> {
    model.str_data(job, props::JOB_STATUS).and_then(JobState::parse)
}

pub fn set_job_state(model: &mut SessionModel, job: ItemId, state: JobState) -> Result<bool, ModelError> {
    model.set_data(job, props::JOB_STATUS, state.as_str())
}

/// Expanded procedure created under a job during execution.
#[must_use]
pub fn expanded_procedure(model: &SessionModel, job: ItemId) -> Option<ItemId> {
    model.child(job, tags::EXPANDED)
}

/// Tick timeout of a job in milliseconds; 0 when unset.
#[must_use]
pub fn tick_timeout_ms(model: &SessionModel, job: ItemId) -> u64 {
    model
        .int_data(job, props::TICK_TIMEOUT)
        .and_then(|ms| u64::try_from(ms).ok())
        .unwrap_or(0)
}
