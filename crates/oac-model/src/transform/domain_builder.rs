//! Item → Domain.

use std::borrow::Borrow;
use std::hash::Hash;

use oac_engine::attributes::names;
use oac_engine::{
    EngineError, Instruction, InstructionHandle, InstructionRegistry, Preamble, Procedure,
    TypeRegistration, Variable, VariableHandle, VariableRegistry,
};
use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::anyvalue_items::variable_value;
use crate::catalogue::is_value_attribute;
use crate::error::ModelError;
use crate::items::{self, props, tags, RegistrationMode};
use crate::model::{ItemId, SessionModel};

/// Builds domain procedures from procedure items and keeps the
/// handle → item correlation of the last build. The correlation is only
/// valid while the procedure item it was built from is in the model.
#[derive(Debug)]
pub struct DomainObjectBuilder<'a> {
    instruction_registry: &'a InstructionRegistry,
    variable_registry: &'a VariableRegistry,
    procedure_item: Option<ItemId>,
    instructions: Option<FxHashMap<InstructionHandle, ItemId>>,
    variables: Option<FxHashMap<VariableHandle, ItemId>>,
    variable_names: Option<FxHashMap<SmolStr, ItemId>>,
}

impl<'a> DomainObjectBuilder<'a> {
    #[must_use]
    pub fn new(
        instruction_registry: &'a InstructionRegistry,
        variable_registry: &'a VariableRegistry,
    ) -> Self {
        Self {
            instruction_registry,
            variable_registry,
            procedure_item: None,
            instructions: None,
            variables: None,
            variable_names: None,
        }
    }

    /// Builds a fresh domain procedure: instructions depth first, then
    /// variables in item order, then the preamble. Any failure discards
    /// the partial result and leaves no correlation behind.
    pub fn build_procedure(
        &mut self,
        model: &SessionModel,
        procedure_item: ItemId,
    ) -> Result<Procedure, ModelError> {
        self.clear();
        let mut procedure = Procedure::new();
        if let Err(err) = self.populate_all(model, procedure_item, &mut procedure) {
            self.clear();
            return Err(err);
        }
        tracing::debug!(
            instructions = procedure.instruction_count(),
            variables = procedure.variable_count(),
            "built domain procedure"
        );
        Ok(procedure)
    }

    fn populate_all(
        &mut self,
        model: &SessionModel,
        procedure_item: ItemId,
        procedure: &mut Procedure,
    ) -> Result<(), ModelError> {
        self.populate_domain_instructions(model, procedure_item, procedure)?;
        self.populate_domain_workspace(model, procedure_item, procedure)?;
        self.populate_domain_preamble(model, procedure_item, procedure)
    }

    /// Adds the top-level instructions of `procedure_item` to `target`.
    /// Fails without touching `target` when it already has instructions.
    pub fn populate_domain_instructions(
        &mut self,
        model: &SessionModel,
        procedure_item: ItemId,
        target: &mut Procedure,
    ) -> Result<(), ModelError> {
        if target.instruction_count() > 0 {
            return Err(ModelError::NonEmptyDomain("procedure".into()));
        }
        let mut table = FxHashMap::default();
        let built = items::top_instructions(model, procedure_item)?
            .into_iter()
            .map(|item| self.build_instruction(model, item, &mut table))
            .collect::<Result<Vec<_>, _>>()?;
        for instruction in built {
            target.push_instruction(instruction);
        }
        self.instructions.get_or_insert_with(FxHashMap::default).extend(table);
        self.procedure_item = Some(procedure_item);
        Ok(())
    }

    /// Adds the variables of `procedure_item` to the workspace of `target`.
    /// Fails without touching `target` when it already has variables.
    pub fn populate_domain_workspace(
        &mut self,
        model: &SessionModel,
        procedure_item: ItemId,
        target: &Procedure,
    ) -> Result<(), ModelError> {
        if target.variable_count() > 0 {
            return Err(ModelError::NonEmptyDomain("workspace".into()));
        }
        let mut built: Vec<(Variable, ItemId)> = Vec::new();
        let mut by_name: FxHashMap<SmolStr, ItemId> = FxHashMap::default();
        for item in items::variable_items(model, procedure_item)? {
            let variable = self.build_variable(model, item)?;
            let name: SmolStr = variable
                .name()
                .ok_or_else(|| EngineError::MissingAttribute {
                    owner: variable.type_name().into(),
                    attribute: names::NAME.into(),
                })?
                .into();
            if by_name.insert(name.clone(), item).is_some() {
                return Err(ModelError::DuplicateVariableName(name));
            }
            built.push((variable, item));
        }
        let mut table = FxHashMap::default();
        for (variable, item) in built {
            let handle = target.add_variable(variable)?;
            table.insert(handle, item);
        }
        self.variables.get_or_insert_with(FxHashMap::default).extend(table);
        self.variable_names.get_or_insert_with(FxHashMap::default).extend(by_name);
        self.procedure_item = Some(procedure_item);
        Ok(())
    }

    /// Copies plugin paths and type registrations into `target`.
    pub fn populate_domain_preamble(
        &mut self,
        model: &SessionModel,
        procedure_item: ItemId,
        target: &mut Procedure,
    ) -> Result<(), ModelError> {
        let preamble_item = items::preamble_item(model, procedure_item)?;
        let mut preamble = Preamble::default();
        for plugin in model.children(preamble_item, tags::PLUGINS) {
            if let Some(path) = model.str_data(plugin, props::VALUE) {
                preamble.plugin_paths.push(path.to_string());
            }
        }
        for registration in model.children(preamble_item, tags::TYPE_REGISTRATIONS) {
            let text = model.str_data(registration, props::VALUE).unwrap_or_default();
            let mode = model
                .str_data(registration, props::REGISTRATION_MODE)
                .and_then(RegistrationMode::parse)
                .unwrap_or(RegistrationMode::JsonString);
            preamble.type_registrations.push(match mode {
                RegistrationMode::JsonString => TypeRegistration::JsonType(text.to_string()),
                RegistrationMode::JsonFile => TypeRegistration::JsonFile(text.into()),
            });
        }
        let target_preamble = target.preamble_mut();
        target_preamble.plugin_paths.extend(preamble.plugin_paths);
        target_preamble
            .type_registrations
            .extend(preamble.type_registrations);
        Ok(())
    }

    fn build_instruction(
        &self,
        model: &SessionModel,
        item: ItemId,
        table: &mut FxHashMap<InstructionHandle, ItemId>,
    ) -> Result<Instruction, ModelError> {
        let domain_type = items::domain_type(model, item).ok_or(ModelError::MissingDomainType(item))?;
        let mut instruction = self.instruction_registry.create(domain_type)?;
        for (name, value) in model.attributes(item) {
            let text = value.to_text();
            if !text.is_empty() {
                instruction.set_attribute(&name, text);
            }
        }
        table.insert(instruction.handle(), item);
        for child in model.children(item, tags::INSTRUCTIONS) {
            let child = self.build_instruction(model, child, table)?;
            instruction.push_instruction(child)?;
        }
        Ok(instruction)
    }

    fn build_variable(&self, model: &SessionModel, item: ItemId) -> Result<Variable, ModelError> {
        let domain_type = items::domain_type(model, item).ok_or(ModelError::MissingDomainType(item))?;
        let mut variable = self.variable_registry.create(domain_type)?;
        let has_value_item = items::anyvalue_item(model, item).is_some();
        for (name, value) in model.attributes(item) {
            let text = value.to_text();
            if text.is_empty() || (has_value_item && is_value_attribute(&name)) {
                continue;
            }
            variable.set_attribute(&name, text);
        }
        let value = variable_value(model, item)?;
        if !value.is_empty() {
            variable.set_attribute(names::TYPE, value.any_type().to_json_string());
            variable.set_attribute(names::VALUE, value.to_json_string());
        }
        Ok(variable)
    }

    fn clear(&mut self) {
        self.procedure_item = None;
        self.instructions = None;
        self.variables = None;
        self.variable_names = None;
    }

    fn correlated<K, Q>(
        &self,
        model: &SessionModel,
        table: &Option<FxHashMap<K, ItemId>>,
        key: &Q,
    ) -> Result<Option<ItemId>, ModelError>
    where
        K: Borrow<Q> + Hash + Eq,
        Q: Hash + Eq + ?Sized,
    {
        let table = table.as_ref().ok_or(ModelError::NotBuilt)?;
        match self.procedure_item {
            Some(source) if !model.contains(source) => Err(ModelError::UnknownItem(source)),
            _ => Ok(table.get(key).copied()),
        }
    }

    /// Item the domain instruction was built from.
    pub fn find_instruction_identifier(
        &self,
        model: &SessionModel,
        handle: InstructionHandle,
    ) -> Result<Option<ItemId>, ModelError> {
        self.correlated(model, &self.instructions, &handle)
    }

    pub fn find_variable_item_identifier(
        &self,
        model: &SessionModel,
        handle: VariableHandle,
    ) -> Result<Option<ItemId>, ModelError> {
        self.correlated(model, &self.variables, &handle)
    }

    pub fn find_variable_item_identifier_by_name(
        &self,
        model: &SessionModel,
        name: &str,
    ) -> Result<Option<ItemId>, ModelError> {
        self.correlated(model, &self.variable_names, name)
    }

    /// Number of correlated instructions; `None` before a build.
    #[must_use]
    pub fn instruction_count(&self) -> Option<usize> {
        self.instructions.as_ref().map(FxHashMap::len)
    }

    #[must_use]
    pub fn variable_count(&self) -> Option<usize> {
        self.variables.as_ref().map(FxHashMap::len)
    }
}

#[cfg(test)]
mod tests {
    use oac_engine::AnyValue;

    use super::*;
    use crate::anyvalue_items::set_variable_value;
    use crate::catalogue::ItemCatalogue;
    use crate::model::Variant;

    struct Fixture {
        model: SessionModel,
        procedure: ItemId,
        catalogue: ItemCatalogue,
    }

    impl Fixture {
        fn new() -> Self {
            let mut model = SessionModel::new();
            let root = model.root();
            let procedure = items::create_procedure(&mut model, root, tags::PROCEDURES).unwrap();
            Self {
                model,
                procedure,
                catalogue: ItemCatalogue::standard(),
            }
        }

        fn instruction(&mut self, domain_type: &str, parent: Option<ItemId>) -> ItemId {
            let item = self.catalogue.new_instruction(&mut self.model, domain_type).unwrap();
            let parent = parent
                .unwrap_or_else(|| items::instruction_container(&self.model, self.procedure).unwrap());
            self.model.append_item(item, parent, tags::INSTRUCTIONS).unwrap();
            item
        }

        fn variable(&mut self, name: &str, value: AnyValue) -> ItemId {
            let item = self.catalogue.new_variable(&mut self.model, "Local").unwrap();
            self.model.set_attribute(item, "name", name).unwrap();
            set_variable_value(&mut self.model, item, &value).unwrap();
            let workspace = items::workspace_item(&self.model, self.procedure).unwrap();
            self.model.append_item(item, workspace, tags::VARIABLES).unwrap();
            item
        }
    }

    #[test]
    fn lookups_before_build_fail() {
        let instructions = InstructionRegistry::with_standard();
        let variables = VariableRegistry::with_standard();
        let builder = DomainObjectBuilder::new(&instructions, &variables);
        assert_eq!(
            builder.find_variable_item_identifier_by_name(&SessionModel::new(), "x"),
            Err(ModelError::NotBuilt)
        );
        assert_eq!(builder.instruction_count(), None);
    }

    #[test]
    fn attributes_and_values_reach_the_domain() {
        let mut fixture = Fixture::new();
        let wait = fixture.instruction("Wait", None);
        fixture.model.set_attribute(wait, "timeout", Variant::Double(0.5)).unwrap();
        fixture.variable("var0", AnyValue::UInt32(42));

        let instructions = InstructionRegistry::with_standard();
        let variables = VariableRegistry::with_standard();
        let mut builder = DomainObjectBuilder::new(&instructions, &variables);
        let procedure = builder.build_procedure(&fixture.model, fixture.procedure).unwrap();

        let built = &procedure.instructions()[0];
        assert_eq!(built.attributes().get("timeout"), Some("0.5"));
        assert!(!built.attributes().contains("name"));
        let info = procedure.workspace().variable_info("var0").unwrap();
        assert_eq!(info.attributes.get("type"), Some(r#"{"type":"uint32"}"#));
        assert_eq!(info.attributes.get("value"), Some("42"));
    }

    #[test]
    fn failed_build_leaves_no_correlation() {
        let mut fixture = Fixture::new();
        let sequence = fixture.instruction("Sequence", None);

        let instructions = InstructionRegistry::with_standard();
        let variables = VariableRegistry::with_standard();
        let mut builder = DomainObjectBuilder::new(&instructions, &variables);
        let first = builder.build_procedure(&fixture.model, fixture.procedure).unwrap();
        let handle = first.instructions()[0].handle();
        assert_eq!(builder.find_instruction_identifier(&fixture.model, handle), Ok(Some(sequence)));

        let bogus = fixture.instruction("Bogus", Some(sequence));
        assert_eq!(
            fixture.model.model_type(bogus),
            Some(crate::items::types::UNIVERSAL_INSTRUCTION)
        );
        let err = builder.build_procedure(&fixture.model, fixture.procedure).unwrap_err();
        assert_eq!(err, ModelError::Engine(EngineError::UnknownInstruction("Bogus".into())));
        assert_eq!(
            builder.find_instruction_identifier(&fixture.model, handle),
            Err(ModelError::NotBuilt)
        );
    }

    #[test]
    fn lookups_fail_once_the_procedure_item_is_removed() {
        let mut fixture = Fixture::new();
        let wait = fixture.instruction("Wait", None);
        fixture.variable("var0", AnyValue::Int32(1));

        let instructions = InstructionRegistry::with_standard();
        let variables = VariableRegistry::with_standard();
        let mut builder = DomainObjectBuilder::new(&instructions, &variables);
        let procedure = builder.build_procedure(&fixture.model, fixture.procedure).unwrap();
        let handle = procedure.instructions()[0].handle();
        assert_eq!(
            builder.find_instruction_identifier(&fixture.model, handle),
            Ok(Some(wait))
        );

        fixture.model.remove_item(fixture.procedure).unwrap();
        let gone: Result<Option<ItemId>, ModelError> =
            Err(ModelError::UnknownItem(fixture.procedure));
        assert_eq!(builder.find_instruction_identifier(&fixture.model, handle), gone);
        let variable = procedure.workspace().handle_of("var0").unwrap();
        assert_eq!(
            builder.find_variable_item_identifier(&fixture.model, variable),
            gone
        );
        assert_eq!(
            builder.find_variable_item_identifier_by_name(&fixture.model, "var0"),
            gone
        );
    }
}
