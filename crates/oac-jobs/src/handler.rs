//! Job handler.
//!
//! Owns the runner and the consuming end of a job's event queue. Events
//! are applied to the "expanded procedure", the item tree created under
//! the job from the procedure the runner actually set up.

#![allow(missing_docs)]

use std::fmt;
use std::time::Duration;

use oac_engine::{AnyValue, ExecutionStatus, InstructionHandle, JobState, LogEntry, Severity};
use oac_model::anyvalue_items::set_variable_value;
use oac_model::items::{self, props, tags, BreakpointStatus};
use oac_model::transform::{DomainObjectBuilder, ProcedureItemBuilder};
use oac_model::{ItemId, ModelError, SessionModel, Variant};

use crate::error::JobError;
use crate::log::{JobLog, JobLogEntry};
use crate::manager::JobContext;
use crate::queue::{event_channel, DomainEventDispatcher, DomainEventHandler, Notifier};
use crate::remote::RemoteConnectionService;
use crate::runner::{AbstractDomainRunner, DomainRunner};
use crate::synchronizer::{VariableUpdate, WorkspaceSynchronizer};

/// Receives `(job, instruction items)` whenever the next leaves change.
pub type ActiveInstructionCallback = dyn Fn(ItemId, &[ItemId]);

enum VariableRouting {
    Synchronized(WorkspaceSynchronizer),
    Direct,
}

struct HandlerState {
    job_item: ItemId,
    expanded: ItemId,
    item_builder: ProcedureItemBuilder,
    routing: VariableRouting,
    log: JobLog,
    active_breakpoint: Option<ItemId>,
}

pub struct JobHandler {
    runner: Box<dyn AbstractDomainRunner>,
    dispatcher: DomainEventDispatcher,
    state: HandlerState,
}

impl JobHandler {
    /// Builds the job's linked procedure and runs it on a local thread.
    pub fn local(
        model: &mut SessionModel,
        job_item: ItemId,
        context: &JobContext,
        notifier: Option<Notifier>,
    ) -> Result<Self, JobError> {
        let procedure_item =
            items::linked_procedure(model, job_item).ok_or(JobError::MissingProcedure(job_item))?;
        let mut builder = DomainObjectBuilder::new(&context.instructions, &context.variables);
        let procedure = builder.build_procedure(model, procedure_item)?;
        let (sender, dispatcher) = event_channel(notifier);
        let runner = DomainRunner::new(format!("oac-job-{job_item}"), procedure, sender)?;
        Self::with_runner(model, job_item, context, Box::new(runner), dispatcher, true)
    }

    /// Attaches to job `remoteJobIndex` on the job's server.
    pub fn remote(
        model: &mut SessionModel,
        job_item: ItemId,
        context: &JobContext,
        connections: &mut RemoteConnectionService,
        notifier: Option<Notifier>,
    ) -> Result<Self, JobError> {
        let server = model
            .str_data(job_item, props::SERVER_NAME)
            .filter(|server| !server.is_empty())
            .ok_or_else(|| JobError::Remote(format!("job {job_item} has no server name").into()))?
            .to_string();
        let index = match model.data(job_item, props::REMOTE_JOB_INDEX) {
            Some(Variant::UInt(index)) => usize::try_from(*index).ok(),
            Some(Variant::Int(index)) => usize::try_from(*index).ok(),
            _ => None,
        }
        .ok_or_else(|| JobError::Remote(format!("job {job_item} has no remote job index").into()))?;
        let client = connections.connect(&server)?;
        let (sender, dispatcher) = event_channel(notifier);
        let runner = client.create_runner(index, sender)?;
        tracing::debug!(%server, index, "attached remote job");
        Self::with_runner(model, job_item, context, runner, dispatcher, false)
    }

    fn with_runner(
        model: &mut SessionModel,
        job_item: ItemId,
        context: &JobContext,
        runner: Box<dyn AbstractDomainRunner>,
        dispatcher: DomainEventDispatcher,
        synchronize: bool,
    ) -> Result<Self, JobError> {
        let saved_breakpoints = previous_breakpoints(model, job_item)?;
        let mut item_builder = ProcedureItemBuilder::new();
        let expanded = item_builder.create_procedure_item(model, &context.catalogue, runner.job_info())?;

        // The new tree stays detached until the runner and synchronizer accept it.
        let prepared = configure_runner(
            model,
            job_item,
            context,
            runner.as_ref(),
            &item_builder,
            expanded,
            &saved_breakpoints,
        )
        .and_then(|()| variable_routing(model, expanded, runner.as_ref(), synchronize));
        let routing = match prepared {
            Ok(routing) => routing,
            Err(err) => {
                if let Err(cleanup) = model.remove_item(expanded) {
                    tracing::warn!(%expanded, %cleanup, "cannot discard expanded procedure");
                }
                return Err(err);
            }
        };
        if let Some(previous) = items::expanded_procedure(model, job_item) {
            model.remove_item(previous)?;
        }
        model.append_item(expanded, job_item, tags::EXPANDED)?;
        items::set_job_state(model, job_item, runner.state())?;

        Ok(Self {
            runner,
            dispatcher,
            state: HandlerState {
                job_item,
                expanded,
                item_builder,
                routing,
                log: JobLog::new(),
                active_breakpoint: None,
            },
        })
    }

    #[must_use]
    pub fn job_item(&self) -> ItemId {
        self.state.job_item
    }

    #[must_use]
    pub fn expanded_procedure(&self) -> ItemId {
        self.state.expanded
    }

    #[must_use]
    pub fn log(&self) -> &JobLog {
        &self.state.log
    }

    #[must_use]
    pub fn runner(&self) -> &dyn AbstractDomainRunner {
        self.runner.as_ref()
    }

    #[must_use]
    pub fn state(&self) -> JobState {
        self.runner.state()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.runner.is_running()
    }

    /// Instruction item of the last breakpoint hit, until stop or reset.
    #[must_use]
    pub fn active_breakpoint(&self) -> Option<ItemId> {
        self.state.active_breakpoint
    }

    /// Expanded instruction item standing for `handle`.
    #[must_use]
    pub fn instruction_item(&self, handle: InstructionHandle) -> Option<ItemId> {
        self.state.item_builder.instruction_item(handle)
    }

    pub fn start(&mut self) -> Result<(), JobError> {
        if !self.is_running() {
            self.state.log.clear();
        }
        self.runner.start()
    }

    pub fn pause(&self) -> Result<(), JobError> {
        self.runner.pause()
    }

    pub fn step(&self) -> Result<(), JobError> {
        self.runner.step()
    }

    pub fn stop(&mut self) -> Result<(), JobError> {
        self.state
            .log
            .append(JobLogEntry::new(Severity::Warning, "Stop request"));
        self.state.active_breakpoint = None;
        self.runner.stop()
    }

    pub fn reset(&mut self) -> Result<(), JobError> {
        self.state.active_breakpoint = None;
        self.runner.reset()
    }

    /// Cycles the breakpoint of an expanded instruction item and forwards
    /// it to the domain. Ignored while the job runs; returns whether the
    /// toggle was applied.
    pub fn toggle_breakpoint(
        &mut self,
        model: &mut SessionModel,
        instruction: ItemId,
    ) -> Result<bool, JobError> {
        if self.is_running() {
            tracing::debug!(%instruction, "breakpoint toggle ignored while running");
            return Ok(false);
        }
        let handle = self
            .state
            .item_builder
            .instruction_handle(instruction)
            .ok_or(ModelError::UnknownItem(instruction))?;
        let status = items::breakpoint_status(model, instruction).toggled();
        items::set_breakpoint_status(model, instruction, status)?;
        if status == BreakpointStatus::Set {
            self.runner.set_breakpoint(handle)?;
        } else {
            self.runner.remove_breakpoint(handle)?;
        }
        Ok(true)
    }

    /// Dispatches every queued event; returns how many were handled.
    pub fn process_events(
        &mut self,
        model: &mut SessionModel,
        on_leaves: Option<&ActiveInstructionCallback>,
    ) -> usize {
        let mut updater = ItemUpdater {
            model,
            state: &mut self.state,
            on_leaves,
        };
        self.dispatcher.process_events(&mut updater)
    }

    /// Like [`Self::process_events`], blocking up to `timeout` for the
    /// first event.
    pub fn wait_and_process(
        &mut self,
        model: &mut SessionModel,
        on_leaves: Option<&ActiveInstructionCallback>,
        timeout: Duration,
    ) -> usize {
        let mut updater = ItemUpdater {
            model,
            state: &mut self.state,
            on_leaves,
        };
        self.dispatcher.wait_and_process(&mut updater, timeout)
    }

    /// Detaches the expanded workspace from the domain.
    pub fn shutdown(&mut self, model: &mut SessionModel) -> Result<(), JobError> {
        if let VariableRouting::Synchronized(synchronizer) = &mut self.state.routing {
            synchronizer.shutdown(model)?;
        }
        self.state.routing = VariableRouting::Direct;
        Ok(())
    }
}

impl fmt::Debug for JobHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobHandler")
            .field("job_item", &self.state.job_item)
            .field("expanded", &self.state.expanded)
            .field("state", &self.runner.state())
            .field("log_entries", &self.state.log.len())
            .finish_non_exhaustive()
    }
}

/// Applies the tick timeout and the breakpoints saved from the previous
/// expanded procedure, matched by depth-first position.
fn configure_runner(
    model: &mut SessionModel,
    job_item: ItemId,
    context: &JobContext,
    runner: &dyn AbstractDomainRunner,
    item_builder: &ProcedureItemBuilder,
    expanded: ItemId,
    saved_breakpoints: &[BreakpointStatus],
) -> Result<(), JobError> {
    let tick_ms = items::tick_timeout_ms(model, job_item);
    let tick_timeout = if tick_ms > 0 {
        Duration::from_millis(tick_ms)
    } else {
        context.tick_timeout
    };
    if !tick_timeout.is_zero() {
        runner.set_tick_timeout(tick_timeout)?;
    }

    let instructions = items::all_instructions(model, expanded)?;
    if saved_breakpoints.len() != instructions.len() {
        return Ok(());
    }
    for (item, status) in instructions.into_iter().zip(saved_breakpoints.iter().copied()) {
        items::set_breakpoint_status(model, item, status)?;
        if status == BreakpointStatus::Set {
            if let Some(handle) = item_builder.instruction_handle(item) {
                runner.set_breakpoint(handle)?;
            }
        }
    }
    Ok(())
}

/// Starts a synchronizer for local workspaces; everything else is
/// updated item by item.
fn variable_routing(
    model: &mut SessionModel,
    expanded: ItemId,
    runner: &dyn AbstractDomainRunner,
    synchronize: bool,
) -> Result<VariableRouting, JobError> {
    let Some(domain) = runner.workspace().filter(|_| synchronize) else {
        return Ok(VariableRouting::Direct);
    };
    let workspace_item = items::workspace_item(model, expanded)?;
    let mut synchronizer = WorkspaceSynchronizer::for_workspace(model, workspace_item, domain.clone());
    if let Err(err) = synchronizer.start(model) {
        synchronizer.shutdown(model)?;
        return Err(err);
    }
    Ok(VariableRouting::Synchronized(synchronizer))
}

/// Breakpoint statuses of a previous expanded procedure, depth first.
fn previous_breakpoints(
    model: &SessionModel,
    job_item: ItemId,
) -> Result<Vec<BreakpointStatus>, JobError> {
    let Some(previous) = items::expanded_procedure(model, job_item) else {
        return Ok(Vec::new());
    };
    Ok(items::all_instructions(model, previous)?
        .into_iter()
        .map(|item| items::breakpoint_status(model, item))
        .collect())
}

struct ItemUpdater<'a> {
    model: &'a mut SessionModel,
    state: &'a mut HandlerState,
    on_leaves: Option<&'a ActiveInstructionCallback>,
}

impl ItemUpdater<'_> {
    fn direct_update(&mut self, update: &VariableUpdate) -> Result<(), JobError> {
        let workspace_item = items::workspace_item(self.model, self.state.expanded)?;
        let Some(variable) = items::find_variable_by_name(self.model, workspace_item, &update.name) else {
            tracing::warn!(variable = %update.name, "remote update for unknown variable item");
            return Ok(());
        };
        items::set_available(self.model, variable, update.connected)?;
        if update.connected {
            set_variable_value(self.model, variable, &update.value)?;
        }
        Ok(())
    }
}

impl DomainEventHandler for ItemUpdater<'_> {
    fn instruction_state_updated(&mut self, handle: InstructionHandle, status: ExecutionStatus) {
        let Some(item) = self.state.item_builder.instruction_item(handle) else {
            tracing::warn!(%handle, %status, "no instruction item for domain instruction");
            return;
        };
        if let Err(err) = items::set_instruction_status(self.model, item, status) {
            tracing::warn!(%item, %err, "cannot update instruction status");
        }
    }

    fn variable_updated(&mut self, name: &str, value: &AnyValue, connected: bool) {
        let update = VariableUpdate {
            name: name.into(),
            value: value.clone(),
            connected,
        };
        let result = match &self.state.routing {
            VariableRouting::Synchronized(synchronizer) => {
                synchronizer.process_event_from_domain(self.model, &update)
            }
            VariableRouting::Direct => self.direct_update(&update),
        };
        if let Err(err) = result {
            tracing::warn!(variable = name, %err, "cannot apply variable update");
        }
    }

    fn job_state_changed(&mut self, state: JobState) {
        tracing::debug!(job = %self.state.job_item, %state, "job state changed");
        if let Err(err) = items::set_job_state(self.model, self.state.job_item, state) {
            tracing::warn!(job = %self.state.job_item, %err, "cannot update job status");
        }
    }

    fn log_event(&mut self, entry: &LogEntry) {
        self.state.log.append(entry.clone());
    }

    fn next_leaves_changed(&mut self, leaves: &[InstructionHandle]) {
        let Some(callback) = self.on_leaves else {
            return;
        };
        let items: Vec<ItemId> = leaves
            .iter()
            .filter_map(|handle| {
                let item = self.state.item_builder.instruction_item(*handle);
                if item.is_none() {
                    tracing::warn!(%handle, "no instruction item for active instruction");
                }
                item
            })
            .collect();
        callback(self.state.job_item, &items);
    }

    fn breakpoint_hit(&mut self, handle: InstructionHandle) {
        let Some(item) = self.state.item_builder.instruction_item(handle) else {
            tracing::warn!(%handle, "breakpoint hit on unknown instruction");
            return;
        };
        tracing::debug!(job = %self.state.job_item, instruction = %item, "breakpoint hit");
        self.state.active_breakpoint = Some(item);
        if let Err(err) = items::set_breakpoint_status(self.model, item, BreakpointStatus::Set) {
            tracing::warn!(%item, %err, "cannot mark breakpoint");
        }
    }
}

#[cfg(test)]
mod tests {
    use oac_engine::{JobInfo, Procedure, VariableRegistry, Workspace};

    use super::*;

    /// Runner that reports `info` but exposes an unrelated workspace.
    struct FixedRunner {
        info: JobInfo,
        workspace: Workspace,
    }

    impl AbstractDomainRunner for FixedRunner {
        fn start(&self) -> Result<(), JobError> {
            Ok(())
        }

        fn pause(&self) -> Result<(), JobError> {
            Ok(())
        }

        fn step(&self) -> Result<(), JobError> {
            Ok(())
        }

        fn stop(&self) -> Result<(), JobError> {
            Ok(())
        }

        fn reset(&self) -> Result<(), JobError> {
            Ok(())
        }

        fn set_breakpoint(&self, _handle: InstructionHandle) -> Result<(), JobError> {
            Ok(())
        }

        fn remove_breakpoint(&self, _handle: InstructionHandle) -> Result<(), JobError> {
            Ok(())
        }

        fn set_tick_timeout(&self, _timeout: Duration) -> Result<(), JobError> {
            Ok(())
        }

        fn state(&self) -> JobState {
            JobState::Initial
        }

        fn job_info(&self) -> &JobInfo {
            &self.info
        }

        fn wait_for_finished(&self, _timeout: Duration) -> Option<JobState> {
            None
        }

        fn workspace(&self) -> Option<&Workspace> {
            Some(&self.workspace)
        }
    }

    fn local(name: &str) -> oac_engine::Variable {
        let mut variable = VariableRegistry::with_standard().create("Local").unwrap();
        variable.set_attribute("name", name);
        variable.set_attribute("type", r#"{"type":"int32"}"#);
        variable.set_attribute("value", "1");
        variable
    }

    fn attach(
        model: &mut SessionModel,
        job: ItemId,
        context: &JobContext,
        runner: FixedRunner,
    ) -> Result<JobHandler, JobError> {
        let (_sender, dispatcher) = event_channel(None);
        JobHandler::with_runner(model, job, context, Box::new(runner), dispatcher, true)
    }

    #[test]
    fn failed_synchronizer_start_keeps_the_previous_expansion() {
        let context = JobContext::standard();
        let mut model = SessionModel::new();
        let root = model.root();
        let procedure_item = items::create_procedure(&mut model, root, tags::PROCEDURES).unwrap();
        let job = items::create_local_job(&mut model, procedure_item).unwrap();

        let mut procedure = Procedure::new();
        procedure.add_variable(local("a")).unwrap();
        procedure.setup().unwrap();
        let matching = FixedRunner {
            info: procedure.info(),
            workspace: procedure.workspace().clone(),
        };
        let _handler = attach(&mut model, job, &context, matching).unwrap();
        let expanded = items::expanded_procedure(&model, job).unwrap();
        let item_count = model.len();

        let foreign = Workspace::new();
        foreign.add_variable(local("b")).unwrap();
        let mismatched = FixedRunner {
            info: procedure.info(),
            workspace: foreign,
        };
        let err = attach(&mut model, job, &context, mismatched).unwrap_err();
        assert!(matches!(err, JobError::WorkspaceMismatch(_)));
        assert_eq!(items::expanded_procedure(&model, job), Some(expanded));
        assert_eq!(model.len(), item_count);
    }
}
