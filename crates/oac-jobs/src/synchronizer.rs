//! Item workspace ⇄ domain workspace synchronisation.
//!
//! Domain updates reach the items through
//! [`WorkspaceSynchronizer::process_event_from_domain`]. Edits made on the
//! item side are picked up from model events and written to the domain
//! through a callback. While a domain update is being applied the variable
//! is flagged, so it is not echoed back. Nothing flows in either direction
//! until [`WorkspaceSynchronizer::start`] succeeds.

#![allow(missing_docs)]

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use oac_engine::{AnyValue, Workspace};
use oac_model::anyvalue_items::{set_variable_value, variable_value};
use oac_model::items::{self, tags};
use oac_model::{DataRole, ItemId, ModelEvent, SessionModel, SubscriberId};
use rustc_hash::FxHashSet;
use smol_str::SmolStr;

use crate::error::JobError;

/// Writes an item-side value into the domain workspace.
pub type DomainWriter = Box<dyn FnMut(&str, &AnyValue)>;

#[derive(Debug, Clone, PartialEq)]
pub struct VariableUpdate {
    pub name: SmolStr,
    pub value: AnyValue,
    pub connected: bool,
}

struct SyncState {
    workspace_item: ItemId,
    started: bool,
    domain_originated: FxHashSet<SmolStr>,
    writer: DomainWriter,
}

pub struct WorkspaceSynchronizer {
    state: Rc<RefCell<SyncState>>,
    subscriber: Option<SubscriberId>,
    domain: Option<Workspace>,
}

impl WorkspaceSynchronizer {
    /// Watches the variables under `workspace_item`; item-side edits are
    /// passed to `writer`.
    pub fn with_writer(
        model: &mut SessionModel,
        workspace_item: ItemId,
        writer: DomainWriter,
    ) -> Self {
        let state = Rc::new(RefCell::new(SyncState {
            workspace_item,
            started: false,
            domain_originated: FxHashSet::default(),
            writer,
        }));
        let weak = Rc::downgrade(&state);
        let subscriber = model.subscribe(move |model, event| forward_item_change(&weak, model, event));
        Self {
            state,
            subscriber: Some(subscriber),
            domain: None,
        }
    }

    /// Synchronises `workspace_item` with a local domain workspace.
    pub fn for_workspace(
        model: &mut SessionModel,
        workspace_item: ItemId,
        domain: Workspace,
    ) -> Self {
        let target = domain.clone();
        let writer: DomainWriter = Box::new(move |name, value| {
            if let Err(err) = target.set_value(name, value.clone()) {
                tracing::warn!(variable = name, %err, "cannot write item value to domain workspace");
            }
        });
        let mut synchronizer = Self::with_writer(model, workspace_item, writer);
        synchronizer.domain = Some(domain);
        synchronizer
    }

    #[must_use]
    pub fn workspace_item(&self) -> ItemId {
        self.state.borrow().workspace_item
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        self.state.borrow().started
    }

    /// Checks that both sides hold the same variable names, sets up the
    /// domain workspace and copies its current values into the items.
    /// Starting twice is an error.
    pub fn start(&mut self, model: &mut SessionModel) -> Result<(), JobError> {
        if self.is_started() {
            return Err(JobError::SynchronizerStarted(self.workspace_item()));
        }
        if let Some(domain) = &self.domain {
            let workspace_item = self.workspace_item();
            let mut item_names: Vec<String> = model
                .children(workspace_item, tags::VARIABLES)
                .into_iter()
                .filter_map(|variable| items::variable_name(model, variable))
                .collect();
            item_names.sort();
            let mut domain_names: Vec<String> = domain
                .variable_names()
                .into_iter()
                .map(|name| name.to_string())
                .collect();
            domain_names.sort();
            if item_names != domain_names {
                return Err(JobError::WorkspaceMismatch(
                    format!("items {item_names:?}, domain {domain_names:?}").into(),
                ));
            }
            domain.setup()?;
        }
        self.state.borrow_mut().started = true;
        let initial = self.domain.as_ref().map(Workspace::variables).unwrap_or_default();
        for info in initial {
            self.process_event_from_domain(
                model,
                &VariableUpdate {
                    name: info.name,
                    value: info.value,
                    connected: info.connected,
                },
            )?;
        }
        Ok(())
    }

    /// Applies a domain-side change to the matching variable item without
    /// writing it back. Ignored before start.
    pub fn process_event_from_domain(
        &self,
        model: &mut SessionModel,
        update: &VariableUpdate,
    ) -> Result<(), JobError> {
        if !self.is_started() {
            tracing::debug!(variable = %update.name, "domain update before start dropped");
            return Ok(());
        }
        let workspace_item = self.workspace_item();
        let Some(variable) = items::find_variable_by_name(model, workspace_item, &update.name) else {
            tracing::warn!(variable = %update.name, "domain update for unknown variable item");
            return Ok(());
        };
        self.state
            .borrow_mut()
            .domain_originated
            .insert(update.name.clone());
        let result = apply_update(model, variable, update);
        self.state.borrow_mut().domain_originated.remove(&update.name);
        result
    }

    /// Stops forwarding, tears the domain workspace down and marks every
    /// variable item unavailable.
    pub fn shutdown(&mut self, model: &mut SessionModel) -> Result<(), JobError> {
        if let Some(subscriber) = self.subscriber.take() {
            model.unsubscribe(subscriber);
        }
        if let Some(domain) = &self.domain {
            domain.teardown();
        }
        let workspace_item = self.workspace_item();
        if model.contains(workspace_item) {
            for variable in model.children(workspace_item, tags::VARIABLES) {
                items::set_available(model, variable, false)?;
            }
        }
        self.state.borrow_mut().started = false;
        Ok(())
    }
}

impl fmt::Debug for WorkspaceSynchronizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkspaceSynchronizer")
            .field("workspace_item", &self.workspace_item())
            .field("started", &self.is_started())
            .field("local_domain", &self.domain.is_some())
            .finish_non_exhaustive()
    }
}

fn apply_update(
    model: &mut SessionModel,
    variable: ItemId,
    update: &VariableUpdate,
) -> Result<(), JobError> {
    items::set_available(model, variable, update.connected)?;
    if update.connected {
        set_variable_value(model, variable, &update.value)?;
    }
    Ok(())
}

fn forward_item_change(state: &Weak<RefCell<SyncState>>, model: &SessionModel, event: &ModelEvent) {
    let Some(shared) = state.upgrade() else {
        return;
    };
    let changed = match event {
        ModelEvent::DataChanged {
            item,
            role: DataRole::Property,
            ..
        }
        | ModelEvent::ItemInserted { item, .. } => *item,
        _ => return,
    };
    let mut state = shared.borrow_mut();
    if !state.started {
        return;
    }
    let Some(variable) = owning_variable(model, state.workspace_item, changed) else {
        return;
    };
    let Some(name) = items::variable_name(model, variable) else {
        return;
    };
    if state.domain_originated.contains(name.as_str()) {
        return;
    }
    match variable_value(model, variable) {
        Ok(value) => (state.writer)(name.as_str(), &value),
        Err(err) => tracing::warn!(variable = %name, %err, "cannot read variable item value"),
    }
}

/// Variable whose value subtree contains `item`.
fn owning_variable(model: &SessionModel, workspace_item: ItemId, item: ItemId) -> Option<ItemId> {
    let mut below = None;
    let mut current = item;
    loop {
        let parent = model.parent(current)?;
        if parent == workspace_item {
            let value_root = below?;
            return (model.tag_index(value_root)?.tag == tags::ANYVALUE).then_some(current);
        }
        below = Some(current);
        current = parent;
    }
}
