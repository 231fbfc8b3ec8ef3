//! Domain events.
//!
//! Produced on the job thread, consumed on the thread that owns the item
//! model. Plain values; nothing in them refers back into the domain.

#![allow(missing_docs)]

use oac_engine::{AnyValue, ExecutionStatus, InstructionHandle, JobState, LogEntry};
use smol_str::SmolStr;

#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    InstructionStateUpdated {
        handle: InstructionHandle,
        status: ExecutionStatus,
    },
    VariableUpdated {
        name: SmolStr,
        value: AnyValue,
        connected: bool,
    },
    JobStateChanged(JobState),
    LogEvent(LogEntry),
    NextLeavesChanged(Vec<InstructionHandle>),
    BreakpointHit(InstructionHandle),
}

impl DomainEvent {
    /// Short event name for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InstructionStateUpdated { .. } => "InstructionStateUpdated",
            Self::VariableUpdated { .. } => "VariableUpdated",
            Self::JobStateChanged(_) => "JobStateChanged",
            Self::LogEvent(_) => "LogEvent",
            Self::NextLeavesChanged(_) => "NextLeavesChanged",
            Self::BreakpointHit(_) => "BreakpointHit",
        }
    }
}
