//! Local job thread.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashSet;

use super::{JobInfo, JobObserver};
use crate::anyvalue::AnyValue;
use crate::error::EngineError;
use crate::instruction::InstructionHandle;
use crate::procedure::Procedure;
use crate::status::{ExecutionStatus, JobState};
use crate::workspace::{ListenerId, Workspace, WorkspaceListener};

/// Poll interval while the root waits on a running leaf.
const RUNNING_POLL: Duration = Duration::from_millis(1);

#[derive(Debug)]
enum JobCommand {
    Start,
    Pause,
    Step,
    Halt,
    Reset,
    SetBreakpoint(InstructionHandle),
    RemoveBreakpoint(InstructionHandle),
    SetTickTimeout(Duration),
    Terminate,
}

#[derive(Default)]
struct JobShared {
    state: Mutex<JobState>,
    changed: Condvar,
}

struct ObserverListener(Arc<dyn JobObserver>);

impl WorkspaceListener for ObserverListener {
    fn variable_updated(&self, name: &str, value: &AnyValue, connected: bool) {
        self.0.variable_updated(name, value, connected);
    }
}

/// Procedure running on its own thread.
///
/// Dropping the job halts it and joins the thread, so the procedure never
/// outlives its owner.
pub struct LocalJob {
    commands: Sender<JobCommand>,
    shared: Arc<JobShared>,
    workspace: Workspace,
    listener: ListenerId,
    info: JobInfo,
    join: Option<thread::JoinHandle<()>>,
}

impl LocalJob {
    /// Sets up `procedure` and spawns its job thread. The thread starts in
    /// `Initial` and waits for commands.
    pub fn spawn(
        name: impl Into<String>,
        mut procedure: Procedure,
        observer: Arc<dyn JobObserver>,
    ) -> Result<Self, EngineError> {
        let workspace = procedure.workspace().clone();
        let listener = workspace.add_listener(Arc::new(ObserverListener(Arc::clone(&observer))));
        if let Err(err) = procedure.setup() {
            workspace.remove_listener(listener);
            return Err(err);
        }
        let info = procedure.info();
        let shared = Arc::new(JobShared::default());
        let (commands, command_rx) = crossbeam_channel::unbounded();

        let shared_thread = Arc::clone(&shared);
        let spawned = thread::Builder::new().name(name.into()).spawn(move || {
            JobLoop::new(procedure, observer, shared_thread).run(&command_rx);
        });
        let join = match spawned {
            Ok(join) => join,
            Err(err) => {
                workspace.remove_listener(listener);
                return Err(EngineError::ThreadSpawn(err.to_string().into()));
            }
        };

        Ok(Self {
            commands,
            shared,
            workspace,
            listener,
            info,
            join: Some(join),
        })
    }

    fn send(&self, command: JobCommand) -> Result<(), EngineError> {
        self.commands
            .send(command)
            .map_err(|_| EngineError::Control("job thread has exited".into()))
    }

    pub fn start(&self) -> Result<(), EngineError> {
        self.send(JobCommand::Start)
    }

    pub fn pause(&self) -> Result<(), EngineError> {
        self.send(JobCommand::Pause)
    }

    pub fn step(&self) -> Result<(), EngineError> {
        self.send(JobCommand::Step)
    }

    /// Requests a halt; a blocked instruction only notices at its next tick.
    pub fn halt(&self) -> Result<(), EngineError> {
        self.send(JobCommand::Halt)
    }

    pub fn reset(&self) -> Result<(), EngineError> {
        self.send(JobCommand::Reset)
    }

    pub fn set_breakpoint(&self, handle: InstructionHandle) -> Result<(), EngineError> {
        self.send(JobCommand::SetBreakpoint(handle))
    }

    pub fn remove_breakpoint(&self, handle: InstructionHandle) -> Result<(), EngineError> {
        self.send(JobCommand::RemoveBreakpoint(handle))
    }

    /// Sleep between ticks while running.
    pub fn set_tick_timeout(&self, timeout: Duration) -> Result<(), EngineError> {
        self.send(JobCommand::SetTickTimeout(timeout))
    }

    #[must_use]
    pub fn state(&self) -> JobState {
        *self.shared.state.lock()
    }

    #[must_use]
    pub fn info(&self) -> &JobInfo {
        &self.info
    }

    #[must_use]
    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Blocks until `state` is reached; `false` on timeout.
    #[must_use]
    pub fn wait_for_state(&self, state: JobState, timeout: Duration) -> bool {
        self.wait_until(timeout, |current| current == state).is_some()
    }

    /// Blocks until a terminal state is reached.
    #[must_use]
    pub fn wait_for_finished(&self, timeout: Duration) -> Option<JobState> {
        self.wait_until(timeout, JobState::is_finished)
    }

    /// A `timeout` past the clock's range waits without a deadline.
    fn wait_until(&self, timeout: Duration, done: impl Fn(JobState) -> bool) -> Option<JobState> {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.shared.state.lock();
        while !done(*state) {
            match deadline {
                Some(deadline) => {
                    if self.shared.changed.wait_until(&mut state, deadline).timed_out() {
                        return done(*state).then_some(*state);
                    }
                }
                None => self.shared.changed.wait(&mut state),
            }
        }
        Some(*state)
    }
}

impl Drop for LocalJob {
    fn drop(&mut self) {
        let _ = self.commands.send(JobCommand::Terminate);
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                tracing::error!("job thread panicked");
            }
        }
        self.workspace.remove_listener(self.listener);
    }
}

impl std::fmt::Debug for LocalJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalJob")
            .field("state", &self.state())
            .field("instructions", &self.info.instruction_count())
            .finish_non_exhaustive()
    }
}

struct JobLoop {
    procedure: Procedure,
    observer: Arc<dyn JobObserver>,
    shared: Arc<JobShared>,
    state: JobState,
    breakpoints: FxHashSet<InstructionHandle>,
    tick_timeout: Duration,
    leaves: Vec<InstructionHandle>,
    resume_past_breakpoint: bool,
}

impl JobLoop {
    fn new(procedure: Procedure, observer: Arc<dyn JobObserver>, shared: Arc<JobShared>) -> Self {
        Self {
            procedure,
            observer,
            shared,
            state: JobState::Initial,
            breakpoints: FxHashSet::default(),
            tick_timeout: Duration::ZERO,
            leaves: Vec::new(),
            resume_past_breakpoint: false,
        }
    }

    fn run(mut self, commands: &Receiver<JobCommand>) {
        self.observer.job_state_changed(JobState::Initial);
        self.publish_leaves();
        loop {
            let command = if self.state == JobState::Running {
                match commands.try_recv() {
                    Ok(command) => Some(command),
                    Err(TryRecvError::Empty) => None,
                    Err(TryRecvError::Disconnected) => break,
                }
            } else {
                match commands.recv() {
                    Ok(command) => Some(command),
                    Err(_) => break,
                }
            };

            match command {
                Some(JobCommand::Terminate) => break,
                Some(command) => self.apply(command),
                None => {
                    self.tick();
                    let Some(delay) = self.pacing_delay() else {
                        continue;
                    };
                    match commands.recv_timeout(delay) {
                        Ok(JobCommand::Terminate) | Err(RecvTimeoutError::Disconnected) => break,
                        Ok(command) => self.apply(command),
                        Err(RecvTimeoutError::Timeout) => {}
                    }
                }
            }
        }
        if self.state.is_busy() {
            self.halt();
        }
        tracing::debug!("job thread exiting");
    }

    fn apply(&mut self, command: JobCommand) {
        match command {
            JobCommand::Start => match self.state {
                JobState::Initial | JobState::Paused => {
                    self.resume_past_breakpoint = self.state == JobState::Paused;
                    self.set_state(JobState::Running);
                }
                state => tracing::debug!(%state, "start ignored"),
            },
            JobCommand::Pause => {
                if self.state == JobState::Running {
                    self.set_state(JobState::Paused);
                }
            }
            JobCommand::Step => {
                if matches!(self.state, JobState::Initial | JobState::Paused) {
                    self.set_state(JobState::Stepping);
                    self.execute_tick();
                    if !self.state.is_finished() {
                        self.set_state(JobState::Paused);
                    }
                }
            }
            JobCommand::Halt => {
                if !self.state.is_finished() {
                    self.halt();
                }
            }
            JobCommand::Reset => {
                if self.state.is_busy() {
                    self.halt();
                }
                self.procedure.reset(&*self.observer);
                self.set_state(JobState::Initial);
                self.publish_leaves();
            }
            JobCommand::SetBreakpoint(handle) => {
                self.breakpoints.insert(handle);
            }
            JobCommand::RemoveBreakpoint(handle) => {
                self.breakpoints.remove(&handle);
            }
            JobCommand::SetTickTimeout(timeout) => self.tick_timeout = timeout,
            JobCommand::Terminate => {}
        }
    }

    fn halt(&mut self) {
        self.procedure.halt(&*self.observer);
        self.set_state(JobState::Halted);
        self.publish_leaves();
    }

    fn tick(&mut self) {
        if !std::mem::take(&mut self.resume_past_breakpoint) {
            if let Some(hit) = self.breakpoint_ahead() {
                self.observer.breakpoint_hit(hit);
                self.set_state(JobState::Paused);
                return;
            }
        }
        self.execute_tick();
    }

    /// Marked leaf that is about to start.
    fn breakpoint_ahead(&self) -> Option<InstructionHandle> {
        self.leaves.iter().copied().find(|handle| {
            self.breakpoints.contains(handle)
                && self
                    .procedure
                    .find_instruction(*handle)
                    .is_some_and(|instruction| instruction.status() == ExecutionStatus::NotStarted)
        })
    }

    fn execute_tick(&mut self) {
        self.procedure.execute_single(&*self.observer);
        self.publish_leaves();
        match self.procedure.status() {
            ExecutionStatus::Success => self.set_state(JobState::Succeeded),
            ExecutionStatus::Failure => self.set_state(JobState::Failed),
            _ => {}
        }
    }

    fn pacing_delay(&self) -> Option<Duration> {
        if self.state != JobState::Running {
            return None;
        }
        if !self.tick_timeout.is_zero() {
            return Some(self.tick_timeout);
        }
        (self.procedure.status() == ExecutionStatus::Running).then_some(RUNNING_POLL)
    }

    fn publish_leaves(&mut self) {
        let leaves = self.procedure.next_leaves();
        if leaves != self.leaves {
            self.observer.next_leaves_changed(&leaves);
            self.leaves = leaves;
        }
    }

    /// Observer first, so anything queued by the observer is visible once
    /// waiters on the shared state wake up.
    fn set_state(&mut self, state: JobState) {
        if self.state == state {
            return;
        }
        tracing::debug!(from = %self.state, to = %state, "job state");
        self.state = state;
        self.observer.job_state_changed(state);
        *self.shared.state.lock() = state;
        self.shared.changed.notify_all();
    }
}
