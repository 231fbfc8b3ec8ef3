//! Shared variable workspace.
//!
//! `Workspace` is a cheap, clonable handle. The job thread reads and writes
//! values while other threads observe them through listeners; listeners are
//! always invoked after the state lock is released. Every write holds the
//! order lock from the store until its listeners return, so listeners see
//! writes in store order.

#![allow(missing_docs)]

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::{Mutex, ReentrantMutex};
use smol_str::SmolStr;

use crate::anyvalue::{AnyValue, TypeRegistry};
use crate::error::EngineError;
use crate::variable::{Variable, VariableHandle, VariableInfo, VariableSetup};

/// Receives `(name, value, connected)` after every value change.
pub trait WorkspaceListener: Send + Sync {
    fn variable_updated(&self, name: &str, value: &AnyValue, connected: bool);
}

impl<F> WorkspaceListener for F
where
    F: Fn(&str, &AnyValue, bool) + Send + Sync,
{
    fn variable_updated(&self, name: &str, value: &AnyValue, connected: bool) {
        self(name, value, connected);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
struct WorkspaceState {
    variables: IndexMap<SmolStr, Variable>,
    types: TypeRegistry,
    is_setup: bool,
}

#[derive(Default)]
struct WorkspaceInner {
    state: Mutex<WorkspaceState>,
    /// Taken before `state`; reentrant so a listener may write back.
    order: ReentrantMutex<()>,
    listeners: Mutex<Vec<(ListenerId, Arc<dyn WorkspaceListener>)>>,
    next_listener: AtomicU64,
}

type Notification = (SmolStr, AnyValue, bool);

impl WorkspaceInner {
    fn notify(&self, notifications: &[Notification]) {
        if notifications.is_empty() {
            return;
        }
        let listeners: Vec<_> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for (name, value, connected) in notifications {
            for listener in &listeners {
                listener.variable_updated(name, value, *connected);
            }
        }
    }

    fn external_update(&self, name: &str, value: AnyValue, connected: bool) -> bool {
        let _order = self.order.lock();
        let notification = {
            let mut state = self.state.lock();
            let Some(variable) = state.variables.get_mut(name) else {
                return false;
            };
            variable.value = value.clone();
            variable.connected = connected;
            (SmolStr::new(name), value, connected)
        };
        self.notify(&[notification]);
        true
    }
}

/// Handle given to variable backends for asynchronous updates.
#[derive(Clone)]
pub struct VariableUpdater {
    workspace: Weak<WorkspaceInner>,
    name: SmolStr,
}

impl VariableUpdater {
    /// Stores a new value/connection state and notifies listeners. Returns
    /// `false` when the workspace is gone.
    pub fn update(&self, value: AnyValue, connected: bool) -> bool {
        self.workspace
            .upgrade()
            .is_some_and(|inner| inner.external_update(&self.name, value, connected))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for VariableUpdater {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariableUpdater")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Named variable collection shared between the job thread and observers.
#[derive(Clone, Default)]
pub struct Workspace {
    inner: Arc<WorkspaceInner>,
}

impl Workspace {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a named variable; names are unique.
    pub fn add_variable(&self, variable: Variable) -> Result<VariableHandle, EngineError> {
        let mut state = self.inner.state.lock();
        if state.is_setup {
            return Err(EngineError::WorkspaceLocked);
        }
        let name = SmolStr::new(variable.name().unwrap_or_default());
        if name.is_empty() {
            return Err(EngineError::MissingAttribute {
                owner: variable.type_name().into(),
                attribute: "name".into(),
            });
        }
        if state.variables.contains_key(&name) {
            return Err(EngineError::DuplicateVariable(name));
        }
        let handle = variable.handle();
        state.variables.insert(name, variable);
        Ok(handle)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.inner.state.lock().variables.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.state.lock().variables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names in insertion order.
    #[must_use]
    pub fn variable_names(&self) -> Vec<SmolStr> {
        self.inner.state.lock().variables.keys().cloned().collect()
    }

    #[must_use]
    pub fn variable_info(&self, name: &str) -> Option<VariableInfo> {
        self.inner.state.lock().variables.get(name).map(Variable::info)
    }

    #[must_use]
    pub fn variables(&self) -> Vec<VariableInfo> {
        self.inner
            .state
            .lock()
            .variables
            .values()
            .map(Variable::info)
            .collect()
    }

    #[must_use]
    pub fn handle_of(&self, name: &str) -> Option<VariableHandle> {
        self.inner
            .state
            .lock()
            .variables
            .get(name)
            .map(Variable::handle)
    }

    /// Registers a named type for later `type` attributes.
    pub fn register_type(&self, ty: crate::anyvalue::AnyType) -> Result<(), EngineError> {
        self.inner.state.lock().types.register(ty)
    }

    #[must_use]
    pub fn types(&self) -> TypeRegistry {
        self.inner.state.lock().types.clone()
    }

    #[must_use]
    pub fn is_setup(&self) -> bool {
        self.inner.state.lock().is_setup
    }

    /// Resolves initial values through the backends and notifies listeners
    /// once per variable.
    pub fn setup(&self) -> Result<(), EngineError> {
        let _order = self.inner.order.lock();
        let notifications = {
            let mut guard = self.inner.state.lock();
            if guard.is_setup {
                return Ok(());
            }
            let state = &mut *guard;
            let mut notifications = Vec::with_capacity(state.variables.len());
            for (name, variable) in &mut state.variables {
                let updater = VariableUpdater {
                    workspace: Arc::downgrade(&self.inner),
                    name: name.clone(),
                };
                let resolved = variable.backend.setup(VariableSetup {
                    name,
                    attributes: &variable.attributes,
                    types: &state.types,
                    updater,
                })?;
                variable.initial = resolved.value.clone();
                variable.value = resolved.value;
                variable.connected = resolved.connected;
                notifications.push((name.clone(), variable.value.clone(), variable.connected));
            }
            state.is_setup = true;
            notifications
        };
        tracing::debug!(variables = notifications.len(), "workspace set up");
        self.inner.notify(&notifications);
        Ok(())
    }

    pub fn teardown(&self) {
        let mut state = self.inner.state.lock();
        for variable in state.variables.values_mut() {
            variable.backend.teardown();
        }
        state.is_setup = false;
    }

    /// Restores every variable to its value at setup.
    pub fn reset(&self) {
        let _order = self.inner.order.lock();
        let notifications: Vec<_> = {
            let mut state = self.inner.state.lock();
            state
                .variables
                .iter_mut()
                .filter(|(_, variable)| variable.value != variable.initial)
                .map(|(name, variable)| {
                    variable.value = variable.initial.clone();
                    (name.clone(), variable.value.clone(), variable.connected)
                })
                .collect()
        };
        self.inner.notify(&notifications);
    }

    #[must_use]
    pub fn get_value(&self, name: &str) -> Option<AnyValue> {
        self.inner
            .state
            .lock()
            .variables
            .get(name)
            .map(|variable| variable.value.clone())
    }

    /// Writes a value; an untyped (empty) variable accepts any value.
    pub fn set_value(&self, name: &str, value: AnyValue) -> Result<(), EngineError> {
        let _order = self.inner.order.lock();
        let notification = {
            let mut state = self.inner.state.lock();
            let variable = state
                .variables
                .get_mut(name)
                .ok_or_else(|| EngineError::UndefinedVariable(name.into()))?;
            if !variable.value.is_empty() && !variable.value.same_type(&value) {
                return Err(EngineError::TypeMismatch(name.into()));
            }
            variable.backend.write(&value)?;
            variable.value = value.clone();
            (SmolStr::new(name), value, variable.connected)
        };
        self.inner.notify(&[notification]);
        Ok(())
    }

    pub fn add_listener(&self, listener: Arc<dyn WorkspaceListener>) -> ListenerId {
        let id = ListenerId(self.inner.next_listener.fetch_add(1, Ordering::Relaxed));
        self.inner.listeners.lock().push((id, listener));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }
}

impl fmt::Debug for Workspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workspace")
            .field("variables", &self.variable_names())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variable::VariableRegistry;

    fn local(name: &str, ty: &str, value: &str) -> Variable {
        let mut variable = VariableRegistry::with_standard().create("Local").unwrap();
        variable.set_attribute("name", name);
        variable.set_attribute("type", ty);
        variable.set_attribute("value", value);
        variable
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let workspace = Workspace::new();
        workspace
            .add_variable(local("a", r#"{"type":"int32"}"#, "1"))
            .unwrap();
        assert_eq!(
            workspace.add_variable(local("a", r#"{"type":"int32"}"#, "2")),
            Err(EngineError::DuplicateVariable("a".into()))
        );
        assert_eq!(workspace.len(), 1);
    }

    #[test]
    fn set_value_is_type_checked_and_notifies() {
        let workspace = Workspace::new();
        workspace
            .add_variable(local("a", r#"{"type":"int32"}"#, "1"))
            .unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        workspace.add_listener(Arc::new(move |name: &str, value: &AnyValue, connected: bool| {
            sink.lock().push((name.to_string(), value.clone(), connected));
        }));
        workspace.setup().unwrap();
        workspace.set_value("a", AnyValue::Int32(5)).unwrap();
        assert_eq!(
            workspace.set_value("a", AnyValue::from("x")),
            Err(EngineError::TypeMismatch("a".into()))
        );
        assert_eq!(
            *seen.lock(),
            vec![
                ("a".to_string(), AnyValue::Int32(1), true),
                ("a".to_string(), AnyValue::Int32(5), true),
            ]
        );

        workspace.reset();
        assert_eq!(workspace.get_value("a"), Some(AnyValue::Int32(1)));
        assert_eq!(seen.lock().len(), 3);
    }

    #[test]
    fn workspace_is_locked_after_setup() {
        let workspace = Workspace::new();
        workspace.setup().unwrap();
        assert_eq!(
            workspace.add_variable(local("a", r#"{"type":"int32"}"#, "1")),
            Err(EngineError::WorkspaceLocked)
        );
        workspace.teardown();
        assert!(workspace
            .add_variable(local("a", r#"{"type":"int32"}"#, "1"))
            .is_ok());
    }

    #[test]
    fn removed_listener_is_silent() {
        let workspace = Workspace::new();
        workspace
            .add_variable(local("a", r#"{"type":"int32"}"#, "1"))
            .unwrap();
        let count = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&count);
        let id = workspace.add_listener(Arc::new(move |_: &str, _: &AnyValue, _: bool| {
            counter.fetch_add(1, Ordering::Relaxed);
        }));
        assert!(workspace.remove_listener(id));
        workspace.setup().unwrap();
        assert_eq!(count.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn concurrent_writes_are_notified_in_store_order() {
        let workspace = Workspace::new();
        workspace
            .add_variable(local("v", r#"{"type":"int32"}"#, "0"))
            .unwrap();
        workspace.setup().unwrap();

        let (stalled_tx, stalled_rx) = crossbeam_channel::bounded(1);
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&delivered);
        workspace.add_listener(Arc::new(move |_: &str, value: &AnyValue, _: bool| {
            if *value == AnyValue::Int32(6) {
                let _ = stalled_tx.send(());
                std::thread::sleep(std::time::Duration::from_millis(100));
            }
            sink.lock().push(value.clone());
        }));

        let first = {
            let workspace = workspace.clone();
            std::thread::spawn(move || workspace.set_value("v", AnyValue::Int32(6)).unwrap())
        };
        stalled_rx
            .recv_timeout(std::time::Duration::from_secs(10))
            .unwrap();
        let second = {
            let workspace = workspace.clone();
            std::thread::spawn(move || workspace.set_value("v", AnyValue::Int32(7)).unwrap())
        };
        first.join().unwrap();
        second.join().unwrap();

        assert_eq!(workspace.get_value("v"), Some(AnyValue::Int32(7)));
        assert_eq!(
            *delivered.lock(),
            vec![AnyValue::Int32(6), AnyValue::Int32(7)]
        );
    }

    #[test]
    fn listener_may_write_back_from_its_callback() {
        let workspace = Workspace::new();
        workspace
            .add_variable(local("a", r#"{"type":"int32"}"#, "1"))
            .unwrap();
        workspace
            .add_variable(local("b", r#"{"type":"int32"}"#, "0"))
            .unwrap();
        workspace.setup().unwrap();
        let mirror = workspace.clone();
        workspace.add_listener(Arc::new(move |name: &str, value: &AnyValue, _: bool| {
            if name == "a" {
                mirror.set_value("b", value.clone()).unwrap();
            }
        }));
        workspace.set_value("a", AnyValue::Int32(3)).unwrap();
        assert_eq!(workspace.get_value("b"), Some(AnyValue::Int32(3)));
    }
}
