//! Domain → Item.

use oac_engine::{InstructionHandle, InstructionInfo, JobInfo, TypeRegistration, VariableHandle, VariableInfo};
use rustc_hash::FxHashMap;

use crate::anyvalue_items::create_anyvalue_item;
use crate::catalogue::{is_value_attribute, ItemCatalogue};
use crate::error::ModelError;
use crate::items::{self, props, tags, types, RegistrationMode};
use crate::model::{ItemId, SessionModel};

/// Creates procedure items from job snapshots and remembers which item
/// stands for which domain handle.
#[derive(Debug, Default)]
pub struct ProcedureItemBuilder {
    instruction_items: FxHashMap<InstructionHandle, ItemId>,
    instruction_handles: FxHashMap<ItemId, InstructionHandle>,
    variable_items: FxHashMap<VariableHandle, ItemId>,
}

impl ProcedureItemBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Detached procedure item mirroring `info`. Replaces the tables of any
    /// previous call.
    pub fn create_procedure_item(
        &mut self,
        model: &mut SessionModel,
        catalogue: &ItemCatalogue,
        info: &JobInfo,
    ) -> Result<ItemId, ModelError> {
        self.instruction_items.clear();
        self.instruction_handles.clear();
        self.variable_items.clear();

        let procedure = items::new_procedure(model)?;
        if let Some(root) = &info.root {
            let container = items::instruction_container(model, procedure)?;
            let item = self.create_instruction_item(model, catalogue, root)?;
            model.append_item(item, container, tags::INSTRUCTIONS)?;
        }
        let workspace = items::workspace_item(model, procedure)?;
        for variable in &info.variables {
            let item = self.create_variable_item(model, catalogue, variable)?;
            model.append_item(item, workspace, tags::VARIABLES)?;
        }
        let preamble = items::preamble_item(model, procedure)?;
        for path in &info.preamble.plugin_paths {
            let plugin = model.append_new_item(types::PLUGIN_PATH, preamble, tags::PLUGINS)?;
            model.set_data(plugin, props::VALUE, path.as_str())?;
        }
        for registration in &info.preamble.type_registrations {
            let (mode, text) = match registration {
                TypeRegistration::JsonType(text) => (RegistrationMode::JsonString, text.clone()),
                TypeRegistration::JsonFile(path) => {
                    (RegistrationMode::JsonFile, path.display().to_string())
                }
            };
            let item = model.append_new_item(types::TYPE_REGISTRATION, preamble, tags::TYPE_REGISTRATIONS)?;
            model.set_data(item, props::REGISTRATION_MODE, mode.as_str())?;
            model.set_data(item, props::VALUE, text)?;
        }
        Ok(procedure)
    }

    fn create_instruction_item(
        &mut self,
        model: &mut SessionModel,
        catalogue: &ItemCatalogue,
        info: &InstructionInfo,
    ) -> Result<ItemId, ModelError> {
        let item = catalogue.new_instruction(model, &info.type_name)?;
        for (name, text) in info.attributes.iter() {
            let value = catalogue.instruction_attribute(&info.type_name, name, text);
            model.set_attribute(item, name, value)?;
        }
        self.instruction_items.insert(info.handle, item);
        self.instruction_handles.insert(item, info.handle);
        for child in &info.children {
            let child_item = self.create_instruction_item(model, catalogue, child)?;
            model.append_item(child_item, item, tags::INSTRUCTIONS)?;
        }
        Ok(item)
    }

    fn create_variable_item(
        &mut self,
        model: &mut SessionModel,
        catalogue: &ItemCatalogue,
        info: &VariableInfo,
    ) -> Result<ItemId, ModelError> {
        let item = catalogue.new_variable(model, &info.type_name)?;
        let has_value = !info.value.is_empty();
        for (name, text) in info.attributes.iter() {
            if has_value && is_value_attribute(name) {
                continue;
            }
            let value = catalogue.variable_attribute(&info.type_name, name, text);
            model.set_attribute(item, name, value)?;
        }
        if has_value {
            let value_item = create_anyvalue_item(model, &info.value)?;
            model.append_item(value_item, item, tags::ANYVALUE)?;
        }
        items::set_available(model, item, info.connected)?;
        self.variable_items.insert(info.handle, item);
        Ok(item)
    }

    #[must_use]
    pub fn instruction_item(&self, handle: InstructionHandle) -> Option<ItemId> {
        self.instruction_items.get(&handle).copied()
    }

    #[must_use]
    pub fn instruction_handle(&self, item: ItemId) -> Option<InstructionHandle> {
        self.instruction_handles.get(&item).copied()
    }

    #[must_use]
    pub fn variable_item(&self, handle: VariableHandle) -> Option<ItemId> {
        self.variable_items.get(&handle).copied()
    }

    /// Handles of every mirrored instruction.
    pub fn instruction_handles(&self) -> impl Iterator<Item = InstructionHandle> + '_ {
        self.instruction_items.keys().copied()
    }
}
