//! Background job execution.
//!
//! A [`LocalJob`] moves a set-up [`Procedure`](crate::Procedure) onto a
//! dedicated thread and drives it with commands. Everything the thread
//! observes is reported through a [`JobObserver`], whose methods are
//! called on the job thread.

#![allow(missing_docs)]

mod local;

use std::fmt;

use smol_str::SmolStr;

use crate::anyvalue::AnyValue;
use crate::attributes::AttributeMap;
use crate::instruction::{Category, Instruction, InstructionHandle};
use crate::procedure::Preamble;
use crate::status::{ExecutionStatus, JobState};
use crate::variable::VariableInfo;

pub use local::LocalJob;

/// Log severity, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Critical,
    Error,
    Warning,
    Info,
    Debug,
}

impl Severity {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL",
            Self::Error => "ERROR",
            Self::Warning => "WARNING",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
        }
    }

    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        match text.to_ascii_lowercase().as_str() {
            "critical" => Some(Self::Critical),
            "error" => Some(Self::Error),
            "warning" | "warn" => Some(Self::Warning),
            "info" => Some(Self::Info),
            "debug" => Some(Self::Debug),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message emitted by an instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub severity: Severity,
    pub message: String,
}

impl LogEntry {
    #[must_use]
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
        }
    }
}

/// Receives job notifications on the job thread.
pub trait JobObserver: Send + Sync {
    fn instruction_status_changed(&self, handle: InstructionHandle, status: ExecutionStatus);

    fn variable_updated(&self, name: &str, value: &AnyValue, connected: bool);

    fn job_state_changed(&self, state: JobState);

    fn log(&self, entry: LogEntry);

    /// Leaves the next tick will execute.
    fn next_leaves_changed(&self, leaves: &[InstructionHandle]);

    /// Execution paused in front of a breakpoint.
    fn breakpoint_hit(&self, _handle: InstructionHandle) {}
}

/// Instruction tree snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionInfo {
    pub handle: InstructionHandle,
    pub type_name: SmolStr,
    pub category: Category,
    pub attributes: AttributeMap,
    pub children: Vec<InstructionInfo>,
}

impl InstructionInfo {
    #[must_use]
    pub fn from_instruction(instruction: &Instruction) -> Self {
        Self {
            handle: instruction.handle(),
            type_name: instruction.type_name().into(),
            category: instruction.category(),
            attributes: instruction.attributes().clone(),
            children: instruction
                .children()
                .iter()
                .map(Self::from_instruction)
                .collect(),
        }
    }

    #[must_use]
    pub fn find(&self, handle: InstructionHandle) -> Option<&InstructionInfo> {
        if self.handle == handle {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(handle))
    }

    /// Number of nodes in this subtree.
    #[must_use]
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(Self::count).sum::<usize>()
    }
}

/// Procedure shape taken before the procedure moves to the job thread.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JobInfo {
    pub root: Option<InstructionInfo>,
    pub variables: Vec<VariableInfo>,
    pub preamble: Preamble,
}

impl JobInfo {
    #[must_use]
    pub fn instruction_count(&self) -> usize {
        self.root.as_ref().map_or(0, InstructionInfo::count)
    }

    #[must_use]
    pub fn find_instruction(&self, handle: InstructionHandle) -> Option<&InstructionInfo> {
        self.root.as_ref().and_then(|root| root.find(handle))
    }
}
