//! Leaf behaviors.

use std::time::{Duration, Instant};

use smol_str::SmolStr;

use super::{Category, Instruction, InstructionBehavior, TickContext};
use crate::attributes::AttributeMap;
use crate::error::EngineError;
use crate::job::Severity;
use crate::status::ExecutionStatus;
use crate::workspace::Workspace;

fn require_variable(
    attributes: &AttributeMap,
    owner: &str,
    attribute: &str,
    workspace: &Workspace,
) -> Result<SmolStr, EngineError> {
    let name = attributes.require(owner, attribute)?;
    if !workspace.contains(name) {
        return Err(EngineError::UndefinedVariable(name.into()));
    }
    Ok(name.into())
}

fn status_from(success: bool) -> ExecutionStatus {
    if success {
        ExecutionStatus::Success
    } else {
        ExecutionStatus::Failure
    }
}

/// Succeeds once `timeout` seconds have elapsed since the first tick.
#[derive(Debug, Default)]
pub(super) struct Wait {
    timeout: Duration,
    started: Option<Instant>,
}

impl InstructionBehavior for Wait {
    fn category(&self) -> Category {
        Category::Action
    }

    fn setup(&mut self, attributes: &AttributeMap, workspace: &Workspace) -> Result<(), EngineError> {
        let seconds = attributes
            .resolve_f64("Wait", "timeout", workspace)?
            .unwrap_or(0.0);
        self.timeout = Duration::try_from_secs_f64(seconds).map_err(|_| {
            EngineError::InvalidAttribute {
                owner: "Wait".into(),
                attribute: "timeout".into(),
                message: format!("invalid duration {seconds}").into(),
            }
        })?;
        Ok(())
    }

    fn init(&mut self, _ctx: &mut TickContext<'_>) {
        self.started = Some(Instant::now());
    }

    fn tick(&mut self, _ctx: &mut TickContext<'_>, _children: &mut [Instruction]) -> ExecutionStatus {
        match self.started {
            Some(started) if started.elapsed() < self.timeout => ExecutionStatus::Running,
            _ => {
                self.started = None;
                ExecutionStatus::Success
            }
        }
    }

    fn halt(&mut self) {
        self.started = None;
    }
}

/// Logs `text` at info severity.
#[derive(Debug, Default)]
pub(super) struct Message {
    text: String,
}

impl InstructionBehavior for Message {
    fn category(&self) -> Category {
        Category::Action
    }

    fn setup(&mut self, attributes: &AttributeMap, _workspace: &Workspace) -> Result<(), EngineError> {
        self.text = attributes.require("Message", "text")?.to_string();
        Ok(())
    }

    fn tick(&mut self, ctx: &mut TickContext<'_>, _children: &mut [Instruction]) -> ExecutionStatus {
        ctx.log(Severity::Info, self.text.clone());
        ExecutionStatus::Success
    }
}

/// Copies `inputVar` into `outputVar`.
#[derive(Debug, Default)]
pub(super) struct CopyVariable {
    input: SmolStr,
    output: SmolStr,
}

impl InstructionBehavior for CopyVariable {
    fn category(&self) -> Category {
        Category::Action
    }

    fn setup(&mut self, attributes: &AttributeMap, workspace: &Workspace) -> Result<(), EngineError> {
        self.input = require_variable(attributes, "Copy", "inputVar", workspace)?;
        self.output = require_variable(attributes, "Copy", "outputVar", workspace)?;
        Ok(())
    }

    fn tick(&mut self, ctx: &mut TickContext<'_>, _children: &mut [Instruction]) -> ExecutionStatus {
        let result = ctx
            .workspace()
            .get_value(&self.input)
            .ok_or_else(|| EngineError::UndefinedVariable(self.input.clone()))
            .and_then(|value| ctx.workspace().set_value(&self.output, value));
        match result {
            Ok(()) => ExecutionStatus::Success,
            Err(err) => {
                ctx.log(Severity::Error, format!("Copy: {err}"));
                ExecutionStatus::Failure
            }
        }
    }
}

/// Succeeds when both variables hold equal values.
#[derive(Debug, Default)]
pub(super) struct Equals {
    left: SmolStr,
    right: SmolStr,
}

impl InstructionBehavior for Equals {
    fn category(&self) -> Category {
        Category::Action
    }

    fn setup(&mut self, attributes: &AttributeMap, workspace: &Workspace) -> Result<(), EngineError> {
        self.left = require_variable(attributes, "Equals", "leftVar", workspace)?;
        self.right = require_variable(attributes, "Equals", "rightVar", workspace)?;
        Ok(())
    }

    fn tick(&mut self, ctx: &mut TickContext<'_>, _children: &mut [Instruction]) -> ExecutionStatus {
        let workspace = ctx.workspace();
        match (workspace.get_value(&self.left), workspace.get_value(&self.right)) {
            (Some(left), Some(right)) => status_from(left == right),
            _ => ExecutionStatus::Failure,
        }
    }
}

/// Adds one to a numeric variable.
#[derive(Debug, Default)]
pub(super) struct Increment {
    variable: SmolStr,
}

impl InstructionBehavior for Increment {
    fn category(&self) -> Category {
        Category::Action
    }

    fn setup(&mut self, attributes: &AttributeMap, workspace: &Workspace) -> Result<(), EngineError> {
        self.variable = require_variable(attributes, "Increment", "varName", workspace)?;
        Ok(())
    }

    fn tick(&mut self, ctx: &mut TickContext<'_>, _children: &mut [Instruction]) -> ExecutionStatus {
        let Some(next) = ctx
            .workspace()
            .get_value(&self.variable)
            .and_then(|value| value.incremented())
        else {
            ctx.log(
                Severity::Error,
                format!("Increment: variable '{}' is not an incrementable number", self.variable),
            );
            return ExecutionStatus::Failure;
        };
        match ctx.workspace().set_value(&self.variable, next) {
            Ok(()) => ExecutionStatus::Success,
            Err(err) => {
                ctx.log(Severity::Error, format!("Increment: {err}"));
                ExecutionStatus::Failure
            }
        }
    }
}

/// Succeeds when the variable is true or non-zero.
#[derive(Debug, Default)]
pub(super) struct Condition {
    variable: SmolStr,
}

impl InstructionBehavior for Condition {
    fn category(&self) -> Category {
        Category::Action
    }

    fn setup(&mut self, attributes: &AttributeMap, workspace: &Workspace) -> Result<(), EngineError> {
        self.variable = require_variable(attributes, "Condition", "varName", workspace)?;
        Ok(())
    }

    fn tick(&mut self, ctx: &mut TickContext<'_>, _children: &mut [Instruction]) -> ExecutionStatus {
        let value = ctx.workspace().get_value(&self.variable);
        status_from(value.is_some_and(|value| value.is_truthy()))
    }
}

#[derive(Debug)]
pub(super) struct Succeed;

impl InstructionBehavior for Succeed {
    fn category(&self) -> Category {
        Category::Action
    }

    fn tick(&mut self, _ctx: &mut TickContext<'_>, _children: &mut [Instruction]) -> ExecutionStatus {
        ExecutionStatus::Success
    }
}

#[derive(Debug)]
pub(super) struct Fail;

impl InstructionBehavior for Fail {
    fn category(&self) -> Category {
        Category::Action
    }

    fn tick(&mut self, _ctx: &mut TickContext<'_>, _children: &mut [Instruction]) -> ExecutionStatus {
        ExecutionStatus::Failure
    }
}
