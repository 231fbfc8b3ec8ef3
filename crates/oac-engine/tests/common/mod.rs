#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use oac_engine::{
    AnyValue, ExecutionStatus, Instruction, InstructionHandle, InstructionRegistry, JobObserver,
    JobState, LogEntry, Variable, VariableRegistry,
};

pub const TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    Status(InstructionHandle, ExecutionStatus),
    Variable(String, AnyValue, bool),
    State(JobState),
    Log(LogEntry),
    Leaves(Vec<InstructionHandle>),
    Breakpoint(InstructionHandle),
}

#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<Recorded>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Recorded> {
        self.events.lock().expect("events poisoned").clone()
    }

    pub fn states(&self) -> Vec<JobState> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Recorded::State(state) => Some(state),
                _ => None,
            })
            .collect()
    }

    pub fn statuses_of(&self, handle: InstructionHandle) -> Vec<ExecutionStatus> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Recorded::Status(h, status) if h == handle => Some(status),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: Recorded) {
        self.events.lock().expect("events poisoned").push(event);
    }
}

impl JobObserver for RecordingObserver {
    fn instruction_status_changed(&self, handle: InstructionHandle, status: ExecutionStatus) {
        self.push(Recorded::Status(handle, status));
    }

    fn variable_updated(&self, name: &str, value: &AnyValue, connected: bool) {
        self.push(Recorded::Variable(name.to_string(), value.clone(), connected));
    }

    fn job_state_changed(&self, state: JobState) {
        self.push(Recorded::State(state));
    }

    fn log(&self, entry: LogEntry) {
        self.push(Recorded::Log(entry));
    }

    fn next_leaves_changed(&self, leaves: &[InstructionHandle]) {
        self.push(Recorded::Leaves(leaves.to_vec()));
    }

    fn breakpoint_hit(&self, handle: InstructionHandle) {
        self.push(Recorded::Breakpoint(handle));
    }
}

pub fn instruction(type_name: &str, attributes: &[(&str, &str)]) -> Instruction {
    let mut instruction = InstructionRegistry::with_standard()
        .create(type_name)
        .expect("standard instruction");
    for (name, value) in attributes {
        instruction.set_attribute(name, *value);
    }
    instruction
}

pub fn with_children(mut parent: Instruction, children: Vec<Instruction>) -> Instruction {
    for child in children {
        parent.push_instruction(child).expect("child accepted");
    }
    parent
}

pub fn local(name: &str, type_json: &str, value_json: &str) -> Variable {
    let mut variable = VariableRegistry::with_standard()
        .create("Local")
        .expect("local variable");
    variable.set_attribute("name", name);
    variable.set_attribute("type", type_json);
    variable.set_attribute("value", value_json);
    variable
}
