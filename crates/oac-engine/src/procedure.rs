//! Procedure container and preamble.

#![allow(missing_docs)]

use std::path::PathBuf;

use crate::anyvalue::json;
use crate::attributes::names;
use crate::error::EngineError;
use crate::instruction::{Instruction, InstructionHandle, TickContext};
use crate::job::{InstructionInfo, JobInfo, JobObserver};
use crate::status::ExecutionStatus;
use crate::variable::{Variable, VariableHandle};
use crate::workspace::Workspace;

/// Source of a registered type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRegistration {
    /// Inline JSON type description.
    JsonType(String),
    /// Path to a file holding a JSON type description.
    JsonFile(PathBuf),
}

/// Plugin paths and type registrations, processed before setup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preamble {
    pub plugin_paths: Vec<String>,
    pub type_registrations: Vec<TypeRegistration>,
}

impl Preamble {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugin_paths.is_empty() && self.type_registrations.is_empty()
    }
}

/// Top-level instructions, a workspace and a preamble.
#[derive(Debug, Default)]
pub struct Procedure {
    instructions: Vec<Instruction>,
    workspace: Workspace,
    preamble: Preamble,
    is_setup: bool,
}

impl Procedure {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_instruction(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    pub fn insert_instruction(
        &mut self,
        instruction: Instruction,
        index: usize,
    ) -> Result<(), EngineError> {
        if index > self.instructions.len() {
            return Err(EngineError::InvalidIndex {
                index,
                len: self.instructions.len(),
            });
        }
        self.instructions.insert(index, instruction);
        Ok(())
    }

    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    #[must_use]
    pub fn instruction_count(&self) -> usize {
        self.instructions.len()
    }

    #[must_use]
    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn add_variable(&self, variable: Variable) -> Result<VariableHandle, EngineError> {
        self.workspace.add_variable(variable)
    }

    #[must_use]
    pub fn variable_count(&self) -> usize {
        self.workspace.len()
    }

    #[must_use]
    pub fn preamble(&self) -> &Preamble {
        &self.preamble
    }

    pub fn preamble_mut(&mut self) -> &mut Preamble {
        &mut self.preamble
    }

    fn root_index(&self) -> Result<Option<usize>, EngineError> {
        let marked: Vec<usize> = self
            .instructions
            .iter()
            .enumerate()
            .filter(|(_, instruction)| {
                instruction
                    .attributes()
                    .get_bool(instruction.type_name(), names::IS_ROOT)
                    .ok()
                    .flatten()
                    .unwrap_or(false)
            })
            .map(|(index, _)| index)
            .collect();
        match (marked.as_slice(), self.instructions.len()) {
            ([index], _) => Ok(Some(*index)),
            ([], 0) => Ok(None),
            ([], 1) => Ok(Some(0)),
            ([], _) => Err(EngineError::Setup(
                "several top-level instructions and none marked as root".into(),
            )),
            _ => Err(EngineError::Setup(
                "more than one instruction marked as root".into(),
            )),
        }
    }

    /// Instruction executed by a job; `None` for an empty procedure.
    pub fn root_instruction(&self) -> Result<Option<&Instruction>, EngineError> {
        Ok(self.root_index()?.map(|index| &self.instructions[index]))
    }

    #[must_use]
    pub fn is_setup(&self) -> bool {
        self.is_setup
    }

    /// Registers preamble types, sets up the workspace and the root
    /// instruction tree. Idempotent.
    pub fn setup(&mut self) -> Result<(), EngineError> {
        if self.is_setup {
            return Ok(());
        }
        for path in &self.preamble.plugin_paths {
            tracing::debug!(plugin = %path, "plugin libraries are not loaded; ignoring");
        }
        for registration in &self.preamble.type_registrations {
            let text = match registration {
                TypeRegistration::JsonType(text) => text.clone(),
                TypeRegistration::JsonFile(path) => std::fs::read_to_string(path).map_err(|err| {
                    EngineError::Setup(format!("cannot read type file {}: {err}", path.display()).into())
                })?,
            };
            let ty = json::parse_type(&text, &self.workspace.types())?;
            self.workspace.register_type(ty)?;
        }
        self.workspace.setup()?;
        if let Some(index) = self.root_index()? {
            let workspace = self.workspace.clone();
            self.instructions[index].setup(&workspace)?;
        }
        self.is_setup = true;
        Ok(())
    }

    /// Status of the root; an empty procedure counts as succeeded.
    #[must_use]
    pub fn status(&self) -> ExecutionStatus {
        match self.root_index() {
            Ok(Some(index)) => self.instructions[index].status(),
            Ok(None) => ExecutionStatus::Success,
            Err(_) => ExecutionStatus::Failure,
        }
    }

    #[must_use]
    pub fn find_instruction(&self, handle: InstructionHandle) -> Option<&Instruction> {
        self.instructions
            .iter()
            .find_map(|instruction| instruction.find(handle))
    }

    /// Shape snapshot for observers on other threads.
    #[must_use]
    pub fn info(&self) -> JobInfo {
        let root = self
            .root_instruction()
            .ok()
            .flatten()
            .map(InstructionInfo::from_instruction);
        JobInfo {
            root,
            variables: self.workspace.variables(),
            preamble: self.preamble.clone(),
        }
    }

    fn root_mut(&mut self) -> Option<&mut Instruction> {
        let index = self.root_index().ok().flatten()?;
        self.instructions.get_mut(index)
    }

    pub(crate) fn execute_single(&mut self, observer: &dyn JobObserver) {
        let workspace = self.workspace.clone();
        let mut ctx = TickContext::new(&workspace, observer);
        if let Some(root) = self.root_mut() {
            root.execute_single(&mut ctx);
        }
    }

    pub(crate) fn halt(&mut self, observer: &dyn JobObserver) {
        let workspace = self.workspace.clone();
        let mut ctx = TickContext::new(&workspace, observer);
        if let Some(root) = self.root_mut() {
            root.halt(&mut ctx);
        }
    }

    /// Instruction statuses back to `NotStarted`, variables to initial values.
    pub(crate) fn reset(&mut self, observer: &dyn JobObserver) {
        let workspace = self.workspace.clone();
        let mut ctx = TickContext::new(&workspace, observer);
        if let Some(root) = self.root_mut() {
            root.reset(&mut ctx);
        }
        workspace.reset();
    }

    pub(crate) fn next_leaves(&self) -> Vec<InstructionHandle> {
        let mut leaves = Vec::new();
        if let Ok(Some(root)) = self.root_instruction() {
            root.collect_next_leaves(&mut leaves);
        }
        leaves
    }
}
