//! Job manager.
//!
//! Owns one [`JobHandler`] per submitted job item and is the only place
//! that advances GUI-visible job state, through [`JobManager::process_events`].

#![allow(missing_docs)]

use std::fmt;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use oac_engine::{InstructionRegistry, JobState, VariableRegistry};
use oac_model::items::{props, types};
use oac_model::{ItemCatalogue, ItemId, ModelError, SessionModel};

use crate::config::RunnerConfig;
use crate::error::JobError;
use crate::handler::{ActiveInstructionCallback, JobHandler};
use crate::queue::Notifier;
use crate::remote::RemoteConnectionService;

/// Longest single block inside [`JobManager::wait_for_finished`].
const WAIT_SLICE: Duration = Duration::from_millis(20);

/// Registries and defaults shared by every job, built once at start-up.
#[derive(Debug)]
pub struct JobContext {
    pub instructions: InstructionRegistry,
    pub variables: VariableRegistry,
    pub catalogue: ItemCatalogue,
    /// Used when a job item does not set its own tick timeout.
    pub tick_timeout: Duration,
}

impl JobContext {
    /// Standard instruction and variable types.
    #[must_use]
    pub fn standard() -> Self {
        let instructions = InstructionRegistry::with_standard();
        let variables = VariableRegistry::with_standard();
        let catalogue = ItemCatalogue::from_registries(&instructions, &variables);
        Self {
            instructions,
            variables,
            catalogue,
            tick_timeout: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn from_config(config: &RunnerConfig) -> Self {
        Self {
            tick_timeout: config.tick_timeout,
            ..Self::standard()
        }
    }
}

pub struct JobManager {
    context: JobContext,
    handlers: IndexMap<ItemId, JobHandler>,
    connections: Option<RemoteConnectionService>,
    notifier: Option<Notifier>,
    active_job: Option<ItemId>,
    on_active_instructions: Option<Box<ActiveInstructionCallback>>,
}

impl JobManager {
    #[must_use]
    pub fn new(context: JobContext) -> Self {
        Self {
            context,
            handlers: IndexMap::new(),
            connections: None,
            notifier: None,
            active_job: None,
            on_active_instructions: None,
        }
    }

    /// Enables remote jobs.
    #[must_use]
    pub fn with_connections(mut self, connections: RemoteConnectionService) -> Self {
        self.connections = Some(connections);
        self
    }

    /// Called from job threads whenever a new event is queued. Applies to
    /// jobs submitted afterwards.
    pub fn set_notifier(&mut self, notifier: Notifier) {
        self.notifier = Some(notifier);
    }

    #[must_use]
    pub fn context(&self) -> &JobContext {
        &self.context
    }

    /// Creates the handler for `job`. Nothing is registered on failure.
    pub fn submit_job(&mut self, model: &mut SessionModel, job: Option<ItemId>) -> Result<(), JobError> {
        let job = job.ok_or(JobError::UndefinedJob)?;
        if self.handlers.contains_key(&job) {
            return Err(JobError::JobAlreadySubmitted(job));
        }
        let handler = match model.model_type(job) {
            Some(types::LOCAL_JOB) => {
                JobHandler::local(model, job, &self.context, self.notifier.clone())?
            }
            Some(types::REMOTE_JOB) => {
                let connections = self.connections.as_mut().ok_or_else(|| JobError::Connection {
                    server: model
                        .str_data(job, props::SERVER_NAME)
                        .unwrap_or_default()
                        .into(),
                    message: "remote jobs are not enabled".into(),
                })?;
                JobHandler::remote(model, job, &self.context, connections, self.notifier.clone())?
            }
            Some(other) => {
                return Err(JobError::UnsupportedJob {
                    item: job,
                    model_type: other.into(),
                })
            }
            None => return Err(ModelError::UnknownItem(job).into()),
        };
        tracing::info!(%job, "job submitted");
        self.handlers.insert(job, handler);
        Ok(())
    }

    /// Drops the handler of `job`. Rejected while the job runs.
    pub fn remove_job(&mut self, model: &mut SessionModel, job: ItemId) -> Result<(), JobError> {
        let handler = self.handlers.get(&job).ok_or(JobError::UnknownJob(job))?;
        if handler.is_running() {
            return Err(JobError::RunningJob(job));
        }
        if let Some(mut handler) = self.handlers.shift_remove(&job) {
            handler.shutdown(model)?;
        }
        if self.active_job == Some(job) {
            self.active_job = None;
        }
        tracing::info!(%job, "job removed");
        Ok(())
    }

    #[must_use]
    pub fn handler(&self, job: ItemId) -> Option<&JobHandler> {
        self.handlers.get(&job)
    }

    fn handler_mut(&mut self, job: ItemId) -> Result<&mut JobHandler, JobError> {
        self.handlers.get_mut(&job).ok_or(JobError::UnknownJob(job))
    }

    /// Submitted jobs in submission order.
    pub fn jobs(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.handlers.keys().copied()
    }

    #[must_use]
    pub fn job_count(&self) -> usize {
        self.handlers.len()
    }

    /// Starts `job`, resetting it first when it already finished.
    pub fn start(&mut self, job: ItemId) -> Result<(), JobError> {
        let handler = self.handler_mut(job)?;
        if handler.state().is_finished() {
            handler.reset()?;
        }
        handler.start()
    }

    pub fn pause(&mut self, job: ItemId) -> Result<(), JobError> {
        self.handler_mut(job)?.pause()
    }

    /// Single tick, resetting first when the job already finished.
    pub fn step(&mut self, job: ItemId) -> Result<(), JobError> {
        let handler = self.handler_mut(job)?;
        if handler.state().is_finished() {
            handler.reset()?;
        }
        handler.step()
    }

    pub fn stop(&mut self, job: ItemId) -> Result<(), JobError> {
        self.handler_mut(job)?.stop()
    }

    pub fn reset(&mut self, job: ItemId) -> Result<(), JobError> {
        self.handler_mut(job)?.reset()
    }

    pub fn toggle_breakpoint(
        &mut self,
        model: &mut SessionModel,
        job: ItemId,
        instruction: ItemId,
    ) -> Result<bool, JobError> {
        self.handler_mut(job)?.toggle_breakpoint(model, instruction)
    }

    /// Requests a stop of every running job.
    pub fn stop_all_jobs(&mut self) -> Result<(), JobError> {
        for handler in self.handlers.values_mut() {
            if handler.is_running() {
                handler.stop()?;
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn has_running_jobs(&self) -> bool {
        self.handlers.values().any(JobHandler::is_running)
    }

    /// Only the active job reports its next leaves.
    pub fn set_active_job(&mut self, job: Option<ItemId>) {
        self.active_job = job;
    }

    #[must_use]
    pub fn active_job(&self) -> Option<ItemId> {
        self.active_job
    }

    pub fn set_active_instruction_callback(&mut self, callback: impl Fn(ItemId, &[ItemId]) + 'static) {
        self.on_active_instructions = Some(Box::new(callback));
    }

    /// Dispatches pending events of every job; returns the total handled.
    pub fn process_events(&mut self, model: &mut SessionModel) -> usize {
        let active = self.active_job;
        let callback = self.on_active_instructions.as_deref();
        self.handlers
            .iter_mut()
            .map(|(job, handler)| {
                let on_leaves = if active == Some(*job) { callback } else { None };
                handler.process_events(model, on_leaves)
            })
            .sum()
    }

    /// Pumps events until `job` reaches a terminal state, or `timeout`
    /// elapses. Returns the final state if one was reached. A `timeout` past
    /// the clock's range never expires.
    pub fn wait_for_finished(
        &mut self,
        model: &mut SessionModel,
        job: ItemId,
        timeout: Duration,
    ) -> Result<Option<JobState>, JobError> {
        let deadline = Instant::now().checked_add(timeout);
        loop {
            self.process_events(model);
            let active = self.active_job;
            let callback = self.on_active_instructions.as_deref();
            let handler = self.handlers.get_mut(&job).ok_or(JobError::UnknownJob(job))?;
            let state = handler.state();
            if state.is_finished() {
                let on_leaves = if active == Some(job) { callback } else { None };
                handler.process_events(model, on_leaves);
                return Ok(Some(state));
            }
            let slice = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(None);
                    }
                    WAIT_SLICE.min(deadline - now)
                }
                None => WAIT_SLICE,
            };
            let on_leaves = if active == Some(job) { callback } else { None };
            handler.wait_and_process(model, on_leaves, slice);
        }
    }
}

impl fmt::Debug for JobManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobManager")
            .field("jobs", &self.handlers.keys().collect::<Vec<_>>())
            .field("active_job", &self.active_job)
            .field("connections", &self.connections)
            .finish_non_exhaustive()
    }
}
