//! Variables, backends and the variable registry.

#![allow(missing_docs)]

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::anyvalue::{json, AnyType, AnyValue, TypeRegistry};
use crate::attributes::{names, AttributeDefinition, AttributeKind, AttributeMap};
use crate::error::EngineError;
use crate::workspace::VariableUpdater;

static NEXT_VARIABLE: AtomicU64 = AtomicU64::new(1);

/// Process-unique variable identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariableHandle(u64);

impl VariableHandle {
    fn next() -> Self {
        Self(NEXT_VARIABLE.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Value and connection state reported by a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableState {
    pub value: AnyValue,
    pub connected: bool,
}

/// Inputs handed to a backend during workspace setup.
pub struct VariableSetup<'a> {
    pub name: &'a str,
    pub attributes: &'a AttributeMap,
    pub types: &'a TypeRegistry,
    /// Pushes asynchronous updates into the workspace. Must not be invoked
    /// from inside `setup` itself.
    pub updater: VariableUpdater,
}

/// Storage behind a variable.
pub trait VariableBackend: Send + fmt::Debug {
    /// Resolves the initial value and connection state.
    fn setup(&mut self, setup: VariableSetup<'_>) -> Result<VariableState, EngineError>;

    /// Forwards a workspace write to the external side.
    fn write(&mut self, _value: &AnyValue) -> Result<(), EngineError> {
        Ok(())
    }

    fn teardown(&mut self) {}
}

/// In-memory variable initialised from JSON `type` and `value` attributes.
#[derive(Debug, Default)]
pub struct LocalBackend;

impl VariableBackend for LocalBackend {
    fn setup(&mut self, setup: VariableSetup<'_>) -> Result<VariableState, EngineError> {
        let value = local_initial_value(setup.attributes, setup.types)?;
        Ok(VariableState {
            value,
            connected: true,
        })
    }
}

/// Initial value described by `type`/`value` JSON attributes.
pub fn local_initial_value(
    attributes: &AttributeMap,
    types: &TypeRegistry,
) -> Result<AnyValue, EngineError> {
    let Some(type_text) = attributes.get(names::TYPE) else {
        return Ok(AnyValue::Empty);
    };
    let ty: AnyType = json::parse_type(type_text, types)?;
    match attributes.get(names::VALUE) {
        Some(value_text) => json::parse_value(&ty, value_text),
        None => Ok(AnyValue::default_for(&ty)),
    }
}

/// Workspace variable.
#[derive(Debug)]
pub struct Variable {
    handle: VariableHandle,
    type_name: SmolStr,
    pub(crate) attributes: AttributeMap,
    pub(crate) value: AnyValue,
    pub(crate) initial: AnyValue,
    pub(crate) connected: bool,
    pub(crate) backend: Box<dyn VariableBackend>,
}

impl Variable {
    pub(crate) fn new(type_name: SmolStr, backend: Box<dyn VariableBackend>) -> Self {
        Self {
            handle: VariableHandle::next(),
            type_name,
            attributes: AttributeMap::new(),
            value: AnyValue::Empty,
            initial: AnyValue::Empty,
            connected: false,
            backend,
        }
    }

    #[must_use]
    pub fn handle(&self) -> VariableHandle {
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
    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    pub fn set_attribute(&mut self, name: &str, value: impl Into<String>) -> Option<String> {
        self.attributes.set(name, value)
    }

    #[must_use]
    pub fn value(&self) -> &AnyValue {
        &self.value
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    #[must_use]
    pub fn info(&self) -> VariableInfo {
        VariableInfo {
            handle: self.handle,
            type_name: self.type_name.clone(),
            name: self.name().unwrap_or_default().into(),
            attributes: self.attributes.clone(),
            value: self.value.clone(),
            connected: self.connected,
        }
    }
}

/// Snapshot of a variable, safe to send across threads.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableInfo {
    pub handle: VariableHandle,
    pub type_name: SmolStr,
    pub name: SmolStr,
    pub attributes: AttributeMap,
    pub value: AnyValue,
    pub connected: bool,
}

/// Declared shape of a variable type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableDefinition {
    pub type_name: SmolStr,
    pub attributes: Vec<AttributeDefinition>,
}

type BackendFactory = Box<dyn Fn() -> Box<dyn VariableBackend> + Send + Sync>;

struct Entry {
    definition: VariableDefinition,
    factory: BackendFactory,
}

/// Type name → backend factory.
#[derive(Default)]
pub struct VariableRegistry {
    entries: IndexMap<SmolStr, Entry>,
}

impl VariableRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding `Local`.
    #[must_use]
    pub fn with_standard() -> Self {
        let mut registry = Self::new();
        registry.register(
            VariableDefinition {
                type_name: "Local".into(),
                attributes: vec![
                    AttributeDefinition::mandatory(names::NAME, AttributeKind::String),
                    AttributeDefinition::optional(names::TYPE, AttributeKind::String),
                    AttributeDefinition::optional(names::VALUE, AttributeKind::String),
                ],
            },
            || Box::new(LocalBackend),
        );
        registry
    }

    pub fn register<F>(&mut self, definition: VariableDefinition, factory: F)
    where
        F: Fn() -> Box<dyn VariableBackend> + Send + Sync + 'static,
    {
        let key = definition.type_name.clone();
        self.entries.insert(
            key,
            Entry {
                definition,
                factory: Box::new(factory),
            },
        );
    }

    pub fn create(&self, type_name: &str) -> Result<Variable, EngineError> {
        let entry = self
            .entries
            .get(type_name)
            .ok_or_else(|| EngineError::UnknownVariable(type_name.into()))?;
        Ok(Variable::new(
            entry.definition.type_name.clone(),
            (entry.factory)(),
        ))
    }

    #[must_use]
    pub fn definition(&self, type_name: &str) -> Option<&VariableDefinition> {
        self.entries.get(type_name).map(|entry| &entry.definition)
    }

    #[must_use]
    pub fn contains(&self, type_name: &str) -> bool {
        self.entries.contains_key(type_name)
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(SmolStr::as_str)
    }
}

impl fmt::Debug for VariableRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariableRegistry")
            .field("types", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}
