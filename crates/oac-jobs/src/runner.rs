//! Domain runners.
//!
//! [`AbstractDomainRunner`] is the control surface a job handler drives.
//! [`DomainRunner`] runs a local procedure on its own thread and turns
//! every engine callback into a queued [`DomainEvent`].

#![allow(missing_docs)]

use std::sync::Arc;
use std::time::Duration;

use oac_engine::{
    AnyValue, ExecutionStatus, InstructionHandle, JobInfo, JobObserver, JobState, LocalJob,
    LogEntry, Procedure, Workspace,
};

use crate::error::JobError;
use crate::events::DomainEvent;
use crate::queue::EventSender;

/// Job control. Every command is a request; state changes arrive through
/// the event queue.
pub trait AbstractDomainRunner {
    fn start(&self) -> Result<(), JobError>;

    fn pause(&self) -> Result<(), JobError>;

    fn step(&self) -> Result<(), JobError>;

    /// Requests `Halted`. Advisory while an instruction is blocked.
    fn stop(&self) -> Result<(), JobError>;

    fn reset(&self) -> Result<(), JobError>;

    fn set_breakpoint(&self, handle: InstructionHandle) -> Result<(), JobError>;

    fn remove_breakpoint(&self, handle: InstructionHandle) -> Result<(), JobError>;

    fn set_tick_timeout(&self, timeout: Duration) -> Result<(), JobError>;

    fn state(&self) -> JobState;

    /// Shape of the procedure as it was set up.
    fn job_info(&self) -> &JobInfo;

    /// Blocks until a terminal state or `timeout`.
    fn wait_for_finished(&self, timeout: Duration) -> Option<JobState>;

    fn is_running(&self) -> bool {
        self.state().is_busy()
    }

    /// Domain workspace when it lives in this process.
    fn workspace(&self) -> Option<&Workspace> {
        None
    }
}

/// Pushes engine callbacks onto the job's event queue.
struct QueueObserver {
    sender: EventSender,
}

impl JobObserver for QueueObserver {
    fn instruction_status_changed(&self, handle: InstructionHandle, status: ExecutionStatus) {
        self.sender
            .push(DomainEvent::InstructionStateUpdated { handle, status });
    }

    fn variable_updated(&self, name: &str, value: &AnyValue, connected: bool) {
        self.sender.push(DomainEvent::VariableUpdated {
            name: name.into(),
            value: value.clone(),
            connected,
        });
    }

    fn job_state_changed(&self, state: JobState) {
        self.sender.push(DomainEvent::JobStateChanged(state));
    }

    fn log(&self, entry: LogEntry) {
        self.sender.push(DomainEvent::LogEvent(entry));
    }

    fn next_leaves_changed(&self, leaves: &[InstructionHandle]) {
        self.sender.push(DomainEvent::NextLeavesChanged(leaves.to_vec()));
    }

    fn breakpoint_hit(&self, handle: InstructionHandle) {
        self.sender.push(DomainEvent::BreakpointHit(handle));
    }
}

/// Local procedure on a dedicated job thread.
#[derive(Debug)]
pub struct DomainRunner {
    job: LocalJob,
}

impl DomainRunner {
    /// Sets up `procedure` and spawns its thread. Setup errors are returned
    /// here, before any thread exists.
    pub fn new(
        name: impl Into<String>,
        procedure: Procedure,
        sender: EventSender,
    ) -> Result<Self, JobError> {
        let observer: Arc<dyn JobObserver> = Arc::new(QueueObserver { sender });
        let job = LocalJob::spawn(name, procedure, observer)?;
        Ok(Self { job })
    }
}

impl AbstractDomainRunner for DomainRunner {
    fn start(&self) -> Result<(), JobError> {
        Ok(self.job.start()?)
    }

    fn pause(&self) -> Result<(), JobError> {
        Ok(self.job.pause()?)
    }

    fn step(&self) -> Result<(), JobError> {
        Ok(self.job.step()?)
    }

    fn stop(&self) -> Result<(), JobError> {
        Ok(self.job.halt()?)
    }

    fn reset(&self) -> Result<(), JobError> {
        Ok(self.job.reset()?)
    }

    fn set_breakpoint(&self, handle: InstructionHandle) -> Result<(), JobError> {
        Ok(self.job.set_breakpoint(handle)?)
    }

    fn remove_breakpoint(&self, handle: InstructionHandle) -> Result<(), JobError> {
        Ok(self.job.remove_breakpoint(handle)?)
    }

    fn set_tick_timeout(&self, timeout: Duration) -> Result<(), JobError> {
        Ok(self.job.set_tick_timeout(timeout)?)
    }

    fn state(&self) -> JobState {
        self.job.state()
    }

    fn job_info(&self) -> &JobInfo {
        self.job.info()
    }

    fn wait_for_finished(&self, timeout: Duration) -> Option<JobState> {
        self.job.wait_for_finished(timeout)
    }

    fn workspace(&self) -> Option<&Workspace> {
        Some(self.job.workspace())
    }
}

#[cfg(test)]
mod tests {
    use oac_engine::InstructionRegistry;

    use super::*;
    use crate::queue::{event_channel, DomainEventHandler};

    #[derive(Default)]
    struct States(Vec<JobState>);

    impl DomainEventHandler for States {
        fn job_state_changed(&mut self, state: JobState) {
            self.0.push(state);
        }
    }

    #[test]
    fn stop_halts_a_blocked_wait() {
        let registry = InstructionRegistry::with_standard();
        let mut wait = registry.create("Wait").unwrap();
        wait.set_attribute("timeout", "60");
        let mut procedure = Procedure::new();
        procedure.push_instruction(wait);

        let (sender, dispatcher) = event_channel(None);
        let runner = DomainRunner::new("runner-test", procedure, sender).unwrap();
        runner.start().unwrap();
        runner.stop().unwrap();
        assert_eq!(
            runner.wait_for_finished(Duration::from_secs(5)),
            Some(JobState::Halted)
        );
        assert!(!runner.is_running());

        let mut states = States::default();
        dispatcher.process_events(&mut states);
        assert_eq!(states.0.first(), Some(&JobState::Initial));
        assert_eq!(states.0.last(), Some(&JobState::Halted));
    }
}
