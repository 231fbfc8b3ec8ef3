//! Domain type → item shape.
//!
//! Built once from the engine registries and passed by reference. Known
//! types get an item whose model type is the domain type and whose
//! attributes are seeded from the attribute definitions; anything else
//! falls back to a universal item that keeps raw attributes.

#![allow(missing_docs)]

use indexmap::IndexMap;
use oac_engine::attributes::{names, AttributeDefinition, AttributeKind};
use oac_engine::instruction::InstructionDefinition;
use oac_engine::variable::VariableDefinition;
use oac_engine::{InstructionRegistry, VariableRegistry};
use smol_str::SmolStr;

use crate::items::{props, types, BreakpointStatus};
use crate::model::{ItemId, SessionModel, Variant};
use crate::error::ModelError;

#[derive(Debug, Clone, Default)]
pub struct ItemCatalogue {
    instructions: IndexMap<SmolStr, InstructionDefinition>,
    variables: IndexMap<SmolStr, VariableDefinition>,
}

impl ItemCatalogue {
    #[must_use]
    pub fn from_registries(instructions: &InstructionRegistry, variables: &VariableRegistry) -> Self {
        Self {
            instructions: instructions
                .type_names()
                .filter_map(|name| instructions.definition(name))
                .map(|definition| (definition.type_name.clone(), definition.clone()))
                .collect(),
            variables: variables
                .type_names()
                .filter_map(|name| variables.definition(name))
                .map(|definition| (definition.type_name.clone(), definition.clone()))
                .collect(),
        }
    }

    /// Catalogue of the standard engine registries.
    #[must_use]
    pub fn standard() -> Self {
        Self::from_registries(
            &InstructionRegistry::with_standard(),
            &VariableRegistry::with_standard(),
        )
    }

    #[must_use]
    pub fn instruction_definition(&self, domain_type: &str) -> Option<&InstructionDefinition> {
        self.instructions.get(domain_type)
    }

    #[must_use]
    pub fn variable_definition(&self, domain_type: &str) -> Option<&VariableDefinition> {
        self.variables.get(domain_type)
    }

    pub fn instruction_types(&self) -> impl Iterator<Item = &str> {
        self.instructions.keys().map(SmolStr::as_str)
    }

    pub fn variable_types(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(SmolStr::as_str)
    }

    /// Detached instruction item for `domain_type`.
    pub fn new_instruction(&self, model: &mut SessionModel, domain_type: &str) -> Result<ItemId, ModelError> {
        let definition = self.instructions.get(domain_type);
        let model_type = definition.map_or(types::UNIVERSAL_INSTRUCTION, |_| domain_type);
        let item = model.new_item(model_type);
        model.set_data(item, props::DOMAIN_TYPE, domain_type)?;
        model.set_data(item, props::STATUS, "")?;
        model.set_data(item, props::BREAKPOINT, BreakpointStatus::NotSet.as_str())?;
        model.set_data(item, props::X, 0.0)?;
        model.set_data(item, props::Y, 0.0)?;
        if let Some(definition) = definition {
            seed_attributes(model, item, &definition.attributes)?;
        }
        Ok(item)
    }

    /// Detached variable item for `domain_type`. `type` and `value` are
    /// carried by the value subtree, not by attributes.
    pub fn new_variable(&self, model: &mut SessionModel, domain_type: &str) -> Result<ItemId, ModelError> {
        let definition = self.variables.get(domain_type);
        let model_type = definition.map_or(types::UNIVERSAL_VARIABLE, |_| domain_type);
        let item = model.new_item(model_type);
        model.set_data(item, props::DOMAIN_TYPE, domain_type)?;
        model.set_data(item, props::IS_AVAILABLE, false)?;
        if let Some(definition) = definition {
            let seeded: Vec<AttributeDefinition> = definition
                .attributes
                .iter()
                .filter(|attribute| !is_value_attribute(&attribute.name))
                .cloned()
                .collect();
            seed_attributes(model, item, &seeded)?;
        }
        Ok(item)
    }

    /// Typed attribute value for an instruction attribute given as text.
    #[must_use]
    pub fn instruction_attribute(&self, domain_type: &str, name: &str, text: &str) -> Variant {
        let kind = self
            .instructions
            .get(domain_type)
            .and_then(|definition| find_kind(&definition.attributes, name));
        typed_variant(kind, text)
    }

    #[must_use]
    pub fn variable_attribute(&self, domain_type: &str, name: &str, text: &str) -> Variant {
        let kind = self
            .variables
            .get(domain_type)
            .and_then(|definition| find_kind(&definition.attributes, name));
        typed_variant(kind, text)
    }
}

pub(crate) fn is_value_attribute(name: &str) -> bool {
    name == names::TYPE || name == names::VALUE
}

fn seed_attributes(
    model: &mut SessionModel,
    item: ItemId,
    attributes: &[AttributeDefinition],
) -> Result<(), ModelError> {
    for attribute in attributes {
        model.set_attribute(item, &attribute.name, Variant::Null)?;
    }
    Ok(())
}

fn find_kind(attributes: &[AttributeDefinition], name: &str) -> Option<AttributeKind> {
    attributes
        .iter()
        .find(|attribute| attribute.name == name)
        .map(|attribute| attribute.kind)
}

/// Text parsed according to the declared kind; raw text when the kind is
/// unknown, text, or the parse fails (e.g. `@variable` references).
fn typed_variant(kind: Option<AttributeKind>, text: &str) -> Variant {
    let trimmed = text.trim();
    let parsed = match kind {
        Some(AttributeKind::Bool) => match trimmed {
            "true" => Some(Variant::Bool(true)),
            "false" => Some(Variant::Bool(false)),
            _ => None,
        },
        Some(AttributeKind::Int) => trimmed.parse::<i64>().ok().map(Variant::Int),
        Some(AttributeKind::Float) => trimmed.parse::<f64>().ok().map(Variant::Double),
        Some(AttributeKind::String) | None => None,
    };
    parsed.unwrap_or_else(|| Variant::Str(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_instruction_gets_definition_attributes() {
        let catalogue = ItemCatalogue::standard();
        let mut model = SessionModel::new();
        let wait = catalogue.new_instruction(&mut model, "Wait").unwrap();
        assert_eq!(model.model_type(wait), Some("Wait"));
        let names: Vec<_> = model
            .attributes(wait)
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, ["name", "timeout"]);
        assert_eq!(
            catalogue.instruction_attribute("Wait", "timeout", "1.5"),
            Variant::Double(1.5)
        );
        assert_eq!(
            catalogue.instruction_attribute("Wait", "timeout", "@delay"),
            Variant::Str("@delay".into())
        );
    }

    #[test]
    fn unknown_types_fall_back_to_universal_items() {
        let catalogue = ItemCatalogue::standard();
        let mut model = SessionModel::new();
        let instruction = catalogue.new_instruction(&mut model, "PvAccessRead").unwrap();
        assert_eq!(model.model_type(instruction), Some(types::UNIVERSAL_INSTRUCTION));
        assert_eq!(model.str_data(instruction, props::DOMAIN_TYPE), Some("PvAccessRead"));
        assert!(model.attributes(instruction).is_empty());

        let variable = catalogue.new_variable(&mut model, "ChannelAccessClient").unwrap();
        assert_eq!(model.model_type(variable), Some(types::UNIVERSAL_VARIABLE));
    }

    #[test]
    fn local_variable_keeps_only_name_attribute() {
        let catalogue = ItemCatalogue::standard();
        let mut model = SessionModel::new();
        let variable = catalogue.new_variable(&mut model, "Local").unwrap();
        let names: Vec<_> = model
            .attributes(variable)
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, ["name"]);
    }
}
