//! Compound and decorator behaviors.

use super::{Category, Instruction, InstructionBehavior, TickContext};
use crate::attributes::AttributeMap;
use crate::error::EngineError;
use crate::status::ExecutionStatus;
use crate::workspace::Workspace;

/// Runs children in order; fails on the first failure.
#[derive(Debug)]
pub(super) struct Sequence;

impl InstructionBehavior for Sequence {
    fn category(&self) -> Category {
        Category::Compound
    }

    fn tick(&mut self, ctx: &mut TickContext<'_>, children: &mut [Instruction]) -> ExecutionStatus {
        let Some(child) = children
            .iter_mut()
            .find(|child| child.status() != ExecutionStatus::Success)
        else {
            return ExecutionStatus::Success;
        };
        child.execute_single(ctx);
        match child.status() {
            ExecutionStatus::Success => {
                if children
                    .iter()
                    .all(|child| child.status() == ExecutionStatus::Success)
                {
                    ExecutionStatus::Success
                } else {
                    ExecutionStatus::NotFinished
                }
            }
            other => other,
        }
    }
}

/// Runs children in order until one succeeds.
#[derive(Debug)]
pub(super) struct Fallback;

impl InstructionBehavior for Fallback {
    fn category(&self) -> Category {
        Category::Compound
    }

    fn tick(&mut self, ctx: &mut TickContext<'_>, children: &mut [Instruction]) -> ExecutionStatus {
        if children.is_empty() {
            return ExecutionStatus::Success;
        }
        let Some(child) = children
            .iter_mut()
            .find(|child| child.status() != ExecutionStatus::Failure)
        else {
            return ExecutionStatus::Failure;
        };
        child.execute_single(ctx);
        match child.status() {
            ExecutionStatus::Failure => {
                if children
                    .iter()
                    .all(|child| child.status() == ExecutionStatus::Failure)
                {
                    ExecutionStatus::Failure
                } else {
                    ExecutionStatus::NotFinished
                }
            }
            other => other,
        }
    }
}

/// Re-runs its child until it fails or `maxCount` successes (negative: forever).
#[derive(Debug)]
pub(super) struct Repeat {
    max_count: i64,
    count: i64,
}

impl Default for Repeat {
    fn default() -> Self {
        Self {
            max_count: -1,
            count: 0,
        }
    }
}

impl InstructionBehavior for Repeat {
    fn category(&self) -> Category {
        Category::Decorator
    }

    fn setup(&mut self, attributes: &AttributeMap, _workspace: &Workspace) -> Result<(), EngineError> {
        self.max_count = attributes.get_i64("Repeat", "maxCount")?.unwrap_or(-1);
        Ok(())
    }

    fn init(&mut self, _ctx: &mut TickContext<'_>) {
        self.count = 0;
    }

    fn tick(&mut self, ctx: &mut TickContext<'_>, children: &mut [Instruction]) -> ExecutionStatus {
        if self.max_count == 0 {
            return ExecutionStatus::Success;
        }
        let Some(child) = children.first_mut() else {
            return ExecutionStatus::Failure;
        };
        child.execute_single(ctx);
        match child.status() {
            ExecutionStatus::Success => {
                self.count += 1;
                if self.max_count > 0 && self.count >= self.max_count {
                    ExecutionStatus::Success
                } else {
                    child.reset(ctx);
                    ExecutionStatus::NotFinished
                }
            }
            other => other,
        }
    }
}

/// Swaps success and failure of its child.
#[derive(Debug)]
pub(super) struct Inverter;

impl InstructionBehavior for Inverter {
    fn category(&self) -> Category {
        Category::Decorator
    }

    fn tick(&mut self, ctx: &mut TickContext<'_>, children: &mut [Instruction]) -> ExecutionStatus {
        let Some(child) = children.first_mut() else {
            return ExecutionStatus::Failure;
        };
        child.execute_single(ctx);
        match child.status() {
            ExecutionStatus::Success => ExecutionStatus::Failure,
            ExecutionStatus::Failure => ExecutionStatus::Success,
            other => other,
        }
    }
}

#[derive(Debug)]
pub(super) struct ForceSuccess;

impl InstructionBehavior for ForceSuccess {
    fn category(&self) -> Category {
        Category::Decorator
    }

    fn tick(&mut self, ctx: &mut TickContext<'_>, children: &mut [Instruction]) -> ExecutionStatus {
        let Some(child) = children.first_mut() else {
            return ExecutionStatus::Success;
        };
        child.execute_single(ctx);
        match child.status() {
            ExecutionStatus::Success | ExecutionStatus::Failure => ExecutionStatus::Success,
            other => other,
        }
    }
}
