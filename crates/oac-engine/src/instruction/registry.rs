//! Instruction type registry.

#![allow(missing_docs)]

use indexmap::IndexMap;
use smol_str::SmolStr;

use super::action::{Condition, CopyVariable, Equals, Fail, Increment, Message, Succeed, Wait};
use super::compound::{Fallback, ForceSuccess, Inverter, Repeat, Sequence};
use super::{Category, Instruction, InstructionBehavior};
use crate::attributes::{AttributeDefinition, AttributeKind};
use crate::error::EngineError;

/// Declared shape of an instruction type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionDefinition {
    pub type_name: SmolStr,
    pub category: Category,
    pub attributes: Vec<AttributeDefinition>,
}

impl InstructionDefinition {
    /// Definition carrying the common `name` attribute plus `attributes`.
    #[must_use]
    pub fn new(type_name: &str, category: Category, attributes: Vec<AttributeDefinition>) -> Self {
        let mut all = vec![AttributeDefinition::optional("name", AttributeKind::String)];
        all.extend(attributes);
        Self {
            type_name: type_name.into(),
            category,
            attributes: all,
        }
    }
}

pub type BehaviorFactory = Box<dyn Fn() -> Box<dyn InstructionBehavior> + Send + Sync>;

struct Entry {
    definition: InstructionDefinition,
    factory: BehaviorFactory,
}

/// Type name → behavior factory. Built once and passed by reference.
#[derive(Default)]
pub struct InstructionRegistry {
    entries: IndexMap<SmolStr, Entry>,
}

impl InstructionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the standard instruction set.
    #[must_use]
    pub fn with_standard() -> Self {
        use AttributeKind::{Float, Int, String as Text};

        let mut registry = Self::new();
        registry.register(
            InstructionDefinition::new("Sequence", Category::Compound, Vec::new()),
            || Box::new(Sequence),
        );
        registry.register(
            InstructionDefinition::new("Fallback", Category::Compound, Vec::new()),
            || Box::new(Fallback),
        );
        registry.register(
            InstructionDefinition::new(
                "Repeat",
                Category::Decorator,
                vec![AttributeDefinition::optional("maxCount", Int)],
            ),
            || Box::<Repeat>::default(),
        );
        registry.register(
            InstructionDefinition::new("Inverter", Category::Decorator, Vec::new()),
            || Box::new(Inverter),
        );
        registry.register(
            InstructionDefinition::new("ForceSuccess", Category::Decorator, Vec::new()),
            || Box::new(ForceSuccess),
        );
        registry.register(
            InstructionDefinition::new(
                "Wait",
                Category::Action,
                vec![AttributeDefinition::optional("timeout", Float)],
            ),
            || Box::<Wait>::default(),
        );
        registry.register(
            InstructionDefinition::new(
                "Message",
                Category::Action,
                vec![AttributeDefinition::mandatory("text", Text)],
            ),
            || Box::<Message>::default(),
        );
        registry.register(
            InstructionDefinition::new(
                "Copy",
                Category::Action,
                vec![
                    AttributeDefinition::mandatory("inputVar", Text),
                    AttributeDefinition::mandatory("outputVar", Text),
                ],
            ),
            || Box::<CopyVariable>::default(),
        );
        registry.register(
            InstructionDefinition::new(
                "Equals",
                Category::Action,
                vec![
                    AttributeDefinition::mandatory("leftVar", Text),
                    AttributeDefinition::mandatory("rightVar", Text),
                ],
            ),
            || Box::<Equals>::default(),
        );
        registry.register(
            InstructionDefinition::new(
                "Increment",
                Category::Action,
                vec![AttributeDefinition::mandatory("varName", Text)],
            ),
            || Box::<Increment>::default(),
        );
        registry.register(
            InstructionDefinition::new(
                "Condition",
                Category::Action,
                vec![AttributeDefinition::mandatory("varName", Text)],
            ),
            || Box::<Condition>::default(),
        );
        registry.register(
            InstructionDefinition::new("Succeed", Category::Action, Vec::new()),
            || Box::new(Succeed),
        );
        registry.register(
            InstructionDefinition::new("Fail", Category::Action, Vec::new()),
            || Box::new(Fail),
        );
        registry
    }

    /// Registers (or replaces) a type.
    pub fn register<F>(&mut self, definition: InstructionDefinition, factory: F)
    where
        F: Fn() -> Box<dyn InstructionBehavior> + Send + Sync + 'static,
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

    /// Fresh, attribute-less instruction of the given type.
    pub fn create(&self, type_name: &str) -> Result<Instruction, EngineError> {
        let entry = self
            .entries
            .get(type_name)
            .ok_or_else(|| EngineError::UnknownInstruction(type_name.into()))?;
        Ok(Instruction::new(
            entry.definition.type_name.clone(),
            (entry.factory)(),
        ))
    }

    #[must_use]
    pub fn definition(&self, type_name: &str) -> Option<&InstructionDefinition> {
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

impl std::fmt::Debug for InstructionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstructionRegistry")
            .field("types", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_type_is_an_error() {
        let registry = InstructionRegistry::with_standard();
        assert_eq!(
            registry.create("Bogus").unwrap_err(),
            EngineError::UnknownInstruction("Bogus".into())
        );
        assert!(InstructionRegistry::new().create("Wait").is_err());
    }

    #[test]
    fn definitions_describe_attributes() {
        let registry = InstructionRegistry::with_standard();
        let copy = registry.definition("Copy").unwrap();
        assert_eq!(copy.category, Category::Action);
        let names: Vec<_> = copy.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["name", "inputVar", "outputVar"]);
        assert!(registry.type_names().any(|name| name == "Repeat"));
    }
}
