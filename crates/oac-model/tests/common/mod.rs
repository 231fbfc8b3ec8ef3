#![allow(dead_code)]

use oac_engine::AnyValue;
use oac_model::anyvalue_items::set_variable_value;
use oac_model::items::{self, tags};
use oac_model::{ItemCatalogue, ItemId, SessionModel, Variant};

/// Session model holding one procedure item.
pub struct ProcedureFixture {
    pub model: SessionModel,
    pub procedure: ItemId,
    pub catalogue: ItemCatalogue,
}

impl ProcedureFixture {
    pub fn new() -> Self {
        let mut model = SessionModel::new();
        let root = model.root();
        let procedure =
            items::create_procedure(&mut model, root, tags::PROCEDURES).expect("procedure item");
        Self {
            model,
            procedure,
            catalogue: ItemCatalogue::standard(),
        }
    }

    /// Appends an instruction under `parent`, or at top level.
    pub fn instruction(
        &mut self,
        domain_type: &str,
        parent: Option<ItemId>,
        attributes: &[(&str, Variant)],
    ) -> ItemId {
        let item = self
            .catalogue
            .new_instruction(&mut self.model, domain_type)
            .expect("instruction item");
        for (name, value) in attributes {
            self.model
                .set_attribute(item, name, value.clone())
                .expect("attribute");
        }
        let parent = parent.unwrap_or_else(|| {
            items::instruction_container(&self.model, self.procedure).expect("container")
        });
        self.model
            .append_item(item, parent, tags::INSTRUCTIONS)
            .expect("append instruction");
        item
    }

    pub fn local(&mut self, name: &str, value: AnyValue) -> ItemId {
        let item = self
            .catalogue
            .new_variable(&mut self.model, "Local")
            .expect("variable item");
        self.model.set_attribute(item, "name", name).expect("name");
        set_variable_value(&mut self.model, item, &value).expect("value");
        let workspace = items::workspace_item(&self.model, self.procedure).expect("workspace");
        self.model
            .append_item(item, workspace, tags::VARIABLES)
            .expect("append variable");
        item
    }
}
