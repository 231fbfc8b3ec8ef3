//! oac-tree XML import/export.
//!
//! ```xml
//! <Procedure>
//!   <Plugin>libsequencer-ca.so</Plugin>
//!   <RegisterType jsontype='{"type":"Pair","attributes":[...]}'/>
//!   <Sequence>
//!     <Wait timeout="1"/>
//!   </Sequence>
//!   <Workspace>
//!     <Local name="var0" type='{"type":"uint32"}' value="42"/>
//!   </Workspace>
//! </Procedure>
//! ```
//!
//! Elements other than `Plugin`, `RegisterType` and `Workspace` directly
//! under `Procedure` are instructions; their children are child
//! instructions. Variables with a parsable `type` get a value subtree.

#![allow(missing_docs)]

use oac_engine::anyvalue::json;
use oac_engine::attributes::names;
use oac_engine::TypeRegistry;
use roxmltree::{Document, Node};

use crate::anyvalue_items::{create_anyvalue_item, variable_value};
use crate::catalogue::ItemCatalogue;
use crate::error::ModelError;
use crate::items::{self, props, tags, types, RegistrationMode};
use crate::model::{ItemId, SessionModel};

const PROCEDURE: &str = "Procedure";
const PLUGIN: &str = "Plugin";
const REGISTER_TYPE: &str = "RegisterType";
const WORKSPACE: &str = "Workspace";
const JSON_TYPE: &str = "jsontype";
const JSON_FILE: &str = "jsonfile";
const INDENT: &str = "  ";

fn xml_error(err: impl std::fmt::Display) -> ModelError {
    ModelError::Xml(err.to_string().into())
}

/// Parses `xml` and appends the resulting procedure item under
/// `parent`/`tag`.
pub fn import_procedure(
    xml: &str,
    model: &mut SessionModel,
    catalogue: &ItemCatalogue,
    parent: ItemId,
    tag: &str,
) -> Result<ItemId, ModelError> {
    let document = Document::parse(xml).map_err(xml_error)?;
    let root = document.root_element();
    if root.tag_name().name() != PROCEDURE {
        return Err(xml_error(format!(
            "expected <{PROCEDURE}> root element, found <{}>",
            root.tag_name().name()
        )));
    }
    let procedure = items::new_procedure(model)?;
    if let Err(err) = populate_procedure(root, model, catalogue, procedure) {
        model.remove_item(procedure)?;
        return Err(err);
    }
    model.append_item(procedure, parent, tag)?;
    Ok(procedure)
}

fn populate_procedure(
    root: Node<'_, '_>,
    model: &mut SessionModel,
    catalogue: &ItemCatalogue,
    procedure: ItemId,
) -> Result<(), ModelError> {
    let container = items::instruction_container(model, procedure)?;
    let workspace = items::workspace_item(model, procedure)?;
    let preamble = items::preamble_item(model, procedure)?;
    let mut types_seen = TypeRegistry::new();

    for node in root.children().filter(Node::is_element) {
        match node.tag_name().name() {
            PLUGIN => {
                let item = model.append_new_item(types::PLUGIN_PATH, preamble, tags::PLUGINS)?;
                model.set_data(item, props::VALUE, node.text().unwrap_or_default().trim())?;
            }
            REGISTER_TYPE => {
                let (mode, text) = if let Some(text) = node.attribute(JSON_TYPE) {
                    if let Ok(ty) = json::parse_type(text, &types_seen) {
                        types_seen.register(ty)?;
                    }
                    (RegistrationMode::JsonString, text)
                } else if let Some(path) = node.attribute(JSON_FILE) {
                    (RegistrationMode::JsonFile, path)
                } else {
                    return Err(xml_error(format!(
                        "<{REGISTER_TYPE}> needs a '{JSON_TYPE}' or '{JSON_FILE}' attribute"
                    )));
                };
                let item =
                    model.append_new_item(types::TYPE_REGISTRATION, preamble, tags::TYPE_REGISTRATIONS)?;
                model.set_data(item, props::REGISTRATION_MODE, mode.as_str())?;
                model.set_data(item, props::VALUE, text)?;
            }
            WORKSPACE => {
                for variable in node.children().filter(Node::is_element) {
                    let item = import_variable(variable, model, catalogue, &types_seen)?;
                    model.append_item(item, workspace, tags::VARIABLES)?;
                }
            }
            _ => {
                let item = import_instruction(node, model, catalogue)?;
                model.append_item(item, container, tags::INSTRUCTIONS)?;
            }
        }
    }
    Ok(())
}

fn import_instruction(
    node: Node<'_, '_>,
    model: &mut SessionModel,
    catalogue: &ItemCatalogue,
) -> Result<ItemId, ModelError> {
    let domain_type = node.tag_name().name();
    let item = catalogue.new_instruction(model, domain_type)?;
    for attribute in node.attributes() {
        let value = catalogue.instruction_attribute(domain_type, attribute.name(), attribute.value());
        model.set_attribute(item, attribute.name(), value)?;
    }
    for child in node.children().filter(Node::is_element) {
        let child_item = import_instruction(child, model, catalogue)?;
        model.append_item(child_item, item, tags::INSTRUCTIONS)?;
    }
    Ok(item)
}

fn import_variable(
    node: Node<'_, '_>,
    model: &mut SessionModel,
    catalogue: &ItemCatalogue,
    types_seen: &TypeRegistry,
) -> Result<ItemId, ModelError> {
    let domain_type = node.tag_name().name();
    let item = catalogue.new_variable(model, domain_type)?;
    let parsed = node.attribute(names::TYPE).and_then(|type_text| {
        let ty = json::parse_type(type_text, types_seen).ok()?;
        match node.attribute(names::VALUE) {
            Some(value_text) => json::parse_value(&ty, value_text).ok(),
            None => Some(oac_engine::AnyValue::default_for(&ty)),
        }
    });
    for attribute in node.attributes() {
        let name = attribute.name();
        if parsed.is_some() && (name == names::TYPE || name == names::VALUE) {
            continue;
        }
        let value = catalogue.variable_attribute(domain_type, name, attribute.value());
        model.set_attribute(item, name, value)?;
    }
    match parsed {
        Some(value) => {
            let value_item = create_anyvalue_item(model, &value)?;
            model.append_item(value_item, item, tags::ANYVALUE)?;
        }
        None if node.has_attribute(names::TYPE) => {
            tracing::debug!(variable = domain_type, "type not resolved at import; keeping raw attributes");
        }
        None => {}
    }
    Ok(item)
}

/// Serialises a procedure item as oac-tree XML.
pub fn export_procedure(model: &SessionModel, procedure: ItemId) -> Result<String, ModelError> {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Procedure>\n");
    let preamble = items::preamble_item(model, procedure)?;
    for plugin in model.children(preamble, tags::PLUGINS) {
        let path = model.str_data(plugin, props::VALUE).unwrap_or_default();
        out.push_str(&format!("{INDENT}<{PLUGIN}>{}</{PLUGIN}>\n", escape_text(path)));
    }
    for registration in model.children(preamble, tags::TYPE_REGISTRATIONS) {
        let mode = model
            .str_data(registration, props::REGISTRATION_MODE)
            .and_then(RegistrationMode::parse)
            .unwrap_or(RegistrationMode::JsonString);
        let attribute = match mode {
            RegistrationMode::JsonString => JSON_TYPE,
            RegistrationMode::JsonFile => JSON_FILE,
        };
        let text = model.str_data(registration, props::VALUE).unwrap_or_default();
        out.push_str(&format!(
            "{INDENT}<{REGISTER_TYPE} {attribute}=\"{}\"/>\n",
            escape_attribute(text)
        ));
    }
    for instruction in items::top_instructions(model, procedure)? {
        write_instruction(model, instruction, 1, &mut out)?;
    }
    let variables = items::variable_items(model, procedure)?;
    if variables.is_empty() {
        out.push_str(&format!("{INDENT}<{WORKSPACE}/>\n"));
    } else {
        out.push_str(&format!("{INDENT}<{WORKSPACE}>\n"));
        for variable in variables {
            write_variable(model, variable, &mut out)?;
        }
        out.push_str(&format!("{INDENT}</{WORKSPACE}>\n"));
    }
    out.push_str("</Procedure>\n");
    Ok(out)
}

fn element_name(model: &SessionModel, item: ItemId) -> Result<String, ModelError> {
    items::domain_type(model, item)
        .map(str::to_string)
        .ok_or(ModelError::MissingDomainType(item))
}

fn attribute_text(model: &SessionModel, item: ItemId) -> String {
    model
        .attributes(item)
        .into_iter()
        .filter_map(|(name, value)| {
            let text = value.to_text();
            (!text.is_empty()).then(|| format!(" {name}=\"{}\"", escape_attribute(&text)))
        })
        .collect()
}

fn write_instruction(
    model: &SessionModel,
    item: ItemId,
    depth: usize,
    out: &mut String,
) -> Result<(), ModelError> {
    let indent = INDENT.repeat(depth);
    let name = element_name(model, item)?;
    let attributes = attribute_text(model, item);
    let children = model.children(item, tags::INSTRUCTIONS);
    if children.is_empty() {
        out.push_str(&format!("{indent}<{name}{attributes}/>\n"));
        return Ok(());
    }
    out.push_str(&format!("{indent}<{name}{attributes}>\n"));
    for child in children {
        write_instruction(model, child, depth + 1, out)?;
    }
    out.push_str(&format!("{indent}</{name}>\n"));
    Ok(())
}

fn write_variable(model: &SessionModel, item: ItemId, out: &mut String) -> Result<(), ModelError> {
    let name = element_name(model, item)?;
    let mut attributes = attribute_text(model, item);
    let value = variable_value(model, item)?;
    if !value.is_empty() {
        attributes.push_str(&format!(
            " {}=\"{}\" {}=\"{}\"",
            names::TYPE,
            escape_attribute(&value.any_type().to_json_string()),
            names::VALUE,
            escape_attribute(&value.to_json_string())
        ));
    }
    out.push_str(&format!("{INDENT}{INDENT}<{name}{attributes}/>\n"));
    Ok(())
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attribute(text: &str) -> String {
    escape_text(text).replace('"', "&quot;")
}
