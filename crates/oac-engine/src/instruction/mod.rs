//! Instruction tree.
//!
//! An [`Instruction`] owns its children and a boxed [`InstructionBehavior`]
//! created by the [`InstructionRegistry`]. Execution is tick based: the job
//! thread calls `execute_single` on the root, compounds forward the tick to
//! their first unfinished child, and every status change is reported to the
//! job observer.

mod action;
mod compound;
mod registry;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use smol_str::SmolStr;

use crate::attributes::{names, AttributeMap};
use crate::error::EngineError;
use crate::job::{JobObserver, LogEntry, Severity};
use crate::status::ExecutionStatus;
use crate::workspace::Workspace;

pub use registry::{BehaviorFactory, InstructionDefinition, InstructionRegistry};

static NEXT_INSTRUCTION: AtomicU64 = AtomicU64::new(1);

/// Process-unique instruction identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstructionHandle(u64);

impl InstructionHandle {
    fn next() -> Self {
        Self(NEXT_INSTRUCTION.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstructionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Structural role of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Leaf; never has children.
    Action,
    /// Any number of children.
    Compound,
    /// Exactly one child.
    Decorator,
}

impl Category {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Action => "action",
            Self::Compound => "compound",
            Self::Decorator => "decorator",
        }
    }
}

/// State passed to behaviors while ticking.
pub struct TickContext<'a> {
    workspace: &'a Workspace,
    observer: &'a dyn JobObserver,
}

impl<'a> TickContext<'a> {
    pub(crate) fn new(workspace: &'a Workspace, observer: &'a dyn JobObserver) -> Self {
        Self {
            workspace,
            observer,
        }
    }

    #[must_use]
    pub fn workspace(&self) -> &Workspace {
        self.workspace
    }

    pub fn log(&self, severity: Severity, message: impl Into<String>) {
        self.observer.log(LogEntry::new(severity, message));
    }

    fn status_changed(&self, handle: InstructionHandle, status: ExecutionStatus) {
        self.observer.instruction_status_changed(handle, status);
    }
}

/// Per-type instruction logic.
pub trait InstructionBehavior: Send + fmt::Debug {
    fn category(&self) -> Category;

    /// Reads attributes once, before the first tick.
    fn setup(&mut self, _attributes: &AttributeMap, _workspace: &Workspace) -> Result<(), EngineError> {
        Ok(())
    }

    /// Called when the instruction leaves `NotStarted`.
    fn init(&mut self, _ctx: &mut TickContext<'_>) {}

    fn tick(&mut self, ctx: &mut TickContext<'_>, children: &mut [Instruction]) -> ExecutionStatus;

    fn halt(&mut self) {}
}

/// Node of the instruction tree.
#[derive(Debug)]
pub struct Instruction {
    handle: InstructionHandle,
    type_name: SmolStr,
    attributes: AttributeMap,
    children: Vec<Instruction>,
    status: ExecutionStatus,
    behavior: Box<dyn InstructionBehavior>,
}

impl Instruction {
    pub(crate) fn new(type_name: SmolStr, behavior: Box<dyn InstructionBehavior>) -> Self {
        Self {
            handle: InstructionHandle::next(),
            type_name,
            attributes: AttributeMap::new(),
            children: Vec::new(),
            status: ExecutionStatus::NotStarted,
            behavior,
        }
    }

    #[must_use]
    pub fn handle(&self) -> InstructionHandle {
        self.handle
    }

    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.attributes.get(names::NAME)
    }

    #[must_use]
    pub fn category(&self) -> Category {
        self.behavior.category()
    }

    #[must_use]
    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    /// Sets a raw attribute, returning the previous value.
    pub fn set_attribute(&mut self, name: &str, value: impl Into<String>) -> Option<String> {
        self.attributes.set(name, value)
    }

    #[must_use]
    pub fn children(&self) -> &[Instruction] {
        &self.children
    }

    #[must_use]
    pub fn status(&self) -> ExecutionStatus {
        self.status
    }

    fn max_children(&self) -> Option<usize> {
        match self.category() {
            Category::Action => Some(0),
            Category::Decorator => Some(1),
            Category::Compound => None,
        }
    }

    /// Inserts a child at `index`; actions take none, decorators one.
    pub fn insert_instruction(&mut self, child: Instruction, index: usize) -> Result<(), EngineError> {
        if self
            .max_children()
            .is_some_and(|max| self.children.len() >= max)
        {
            return Err(EngineError::ChildNotAllowed(self.type_name.clone()));
        }
        if index > self.children.len() {
            return Err(EngineError::InvalidIndex {
                index,
                len: self.children.len(),
            });
        }
        self.children.insert(index, child);
        Ok(())
    }

    pub fn push_instruction(&mut self, child: Instruction) -> Result<(), EngineError> {
        let index = self.children.len();
        self.insert_instruction(child, index)
    }

    /// Depth-first lookup by handle.
    #[must_use]
    pub fn find(&self, handle: InstructionHandle) -> Option<&Instruction> {
        if self.handle == handle {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(handle))
    }

    /// Pre-order traversal.
    pub fn visit<'s>(&'s self, visitor: &mut impl FnMut(&'s Instruction)) {
        visitor(self);
        for child in &self.children {
            child.visit(visitor);
        }
    }

    pub(crate) fn setup(&mut self, workspace: &Workspace) -> Result<(), EngineError> {
        if self.category() == Category::Decorator && self.children.len() != 1 {
            return Err(EngineError::Setup(
                format!("decorator '{}' requires exactly one child", self.type_name).into(),
            ));
        }
        self.behavior.setup(&self.attributes, workspace)?;
        for child in &mut self.children {
            child.setup(workspace)?;
        }
        Ok(())
    }

    /// Runs one tick of this instruction; finished instructions are left alone.
    pub(crate) fn execute_single(&mut self, ctx: &mut TickContext<'_>) {
        if self.status.is_finished() {
            return;
        }
        if self.status == ExecutionStatus::NotStarted {
            self.behavior.init(ctx);
            self.update_status(ExecutionStatus::NotFinished, ctx);
        }
        let status = self.behavior.tick(ctx, &mut self.children);
        self.update_status(status, ctx);
    }

    /// Aborts unfinished instructions; they end in `Failure`.
    pub(crate) fn halt(&mut self, ctx: &mut TickContext<'_>) {
        if !matches!(
            self.status,
            ExecutionStatus::NotFinished | ExecutionStatus::Running
        ) {
            return;
        }
        self.behavior.halt();
        for child in &mut self.children {
            child.halt(ctx);
        }
        self.update_status(ExecutionStatus::Failure, ctx);
    }

    pub(crate) fn reset(&mut self, ctx: &mut TickContext<'_>) {
        for child in &mut self.children {
            child.reset(ctx);
        }
        self.update_status(ExecutionStatus::NotStarted, ctx);
    }

    /// Leaves that the next tick will execute.
    pub(crate) fn collect_next_leaves(&self, leaves: &mut Vec<InstructionHandle>) {
        if self.status.is_finished() {
            return;
        }
        if self.category() == Category::Action {
            leaves.push(self.handle);
            return;
        }
        if let Some(child) = self.children.iter().find(|child| !child.status.is_finished()) {
            child.collect_next_leaves(leaves);
        }
    }

    fn update_status(&mut self, status: ExecutionStatus, ctx: &TickContext<'_>) {
        if self.status != status {
            self.status = status;
            ctx.status_changed(self.handle, status);
        }
    }
}
