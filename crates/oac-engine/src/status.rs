//! Execution and job status enums.

#![allow(missing_docs)]

use std::fmt;

/// Execution status of a single instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExecutionStatus {
    #[default]
    NotStarted,
    NotFinished,
    Running,
    Success,
    Failure,
}

impl ExecutionStatus {
    /// Success or failure.
    #[must_use]
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Success | Self::Failure)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "Not started",
            Self::NotFinished => "Not finished",
            Self::Running => "Running",
            Self::Success => "Success",
            Self::Failure => "Failure",
        }
    }

    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "Not started" => Some(Self::NotStarted),
            "Not finished" => Some(Self::NotFinished),
            "Running" => Some(Self::Running),
            "Success" => Some(Self::Success),
            "Failure" => Some(Self::Failure),
            _ => None,
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job-level state machine.
///
/// `Initial -> Running <-> Paused -> (Succeeded | Failed | Halted)`, with
/// `Stepping` reachable from `Paused` for exactly one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum JobState {
    #[default]
    Initial,
    Paused,
    Stepping,
    Running,
    Succeeded,
    Failed,
    Halted,
}

impl JobState {
    /// Terminal states; only `Reset` leaves them.
    #[must_use]
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Halted)
    }

    /// States in which the job thread holds an active execution.
    #[must_use]
    pub fn is_busy(self) -> bool {
        matches!(self, Self::Running | Self::Paused | Self::Stepping)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "Initial",
            Self::Paused => "Paused",
            Self::Stepping => "Stepping",
            Self::Running => "Running",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Halted => "Halted",
        }
    }

    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "Initial" => Some(Self::Initial),
            "Paused" => Some(Self::Paused),
            "Stepping" => Some(Self::Stepping),
            "Running" => Some(Self::Running),
            "Succeeded" => Some(Self::Succeeded),
            "Failed" => Some(Self::Failed),
            "Halted" => Some(Self::Halted),
            _ => None,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
