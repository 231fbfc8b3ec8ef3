//! `AnyValue` ⇄ item subtree.
//!
//! Scalars become `AnyValueScalar` leaves holding a [`Variant`]; structs
//! and arrays become containers with their members under `fields` and
//! `elements`. Every node carries its type name, struct fields also their
//! field name.

#![allow(missing_docs)]

use indexmap::IndexMap;
use oac_engine::anyvalue::{json, ArrayValue, StructValue};
use oac_engine::{AnyType, AnyValue, ScalarType, TypeRegistry};

use crate::error::ModelError;
use crate::items::{props, tags, types};
use crate::model::{ItemId, SessionModel, Variant};

/// Scalar as item data.
#[must_use]
pub fn scalar_to_variant(value: &AnyValue) -> Variant {
    match value {
        AnyValue::Bool(v) => Variant::Bool(*v),
        AnyValue::Char8(v) | AnyValue::UInt8(v) => Variant::UInt(u64::from(*v)),
        AnyValue::UInt16(v) => Variant::UInt(u64::from(*v)),
        AnyValue::UInt32(v) => Variant::UInt(u64::from(*v)),
        AnyValue::UInt64(v) => Variant::UInt(*v),
        AnyValue::Int8(v) => Variant::Int(i64::from(*v)),
        AnyValue::Int16(v) => Variant::Int(i64::from(*v)),
        AnyValue::Int32(v) => Variant::Int(i64::from(*v)),
        AnyValue::Int64(v) => Variant::Int(*v),
        AnyValue::Float32(v) => Variant::Double(f64::from(*v)),
        AnyValue::Float64(v) => Variant::Double(*v),
        AnyValue::String(text) => Variant::Str(text.clone()),
        AnyValue::Empty | AnyValue::Struct(_) | AnyValue::Array(_) => Variant::Null,
    }
}

/// Item data back to a scalar of the given type.
pub fn variant_to_scalar(scalar: ScalarType, variant: &Variant) -> Result<AnyValue, ModelError> {
    let value = match variant {
        Variant::Bool(v) if scalar == ScalarType::Bool => AnyValue::Bool(*v),
        Variant::Int(v) if scalar.is_integer() || scalar.is_float() => {
            AnyValue::from_integer(scalar, i128::from(*v))?
        }
        Variant::UInt(v) if scalar.is_integer() || scalar.is_float() => {
            AnyValue::from_integer(scalar, i128::from(*v))?
        }
        #[allow(clippy::cast_possible_truncation)]
        Variant::Double(v) if scalar == ScalarType::Float32 => AnyValue::Float32(*v as f32),
        Variant::Double(v) if scalar == ScalarType::Float64 => AnyValue::Float64(*v),
        Variant::Str(text) => AnyValue::from_scalar_str(scalar, text)?,
        other => {
            return Err(ModelError::InvalidValue(
                format!("{other:?} is not a valid {}", scalar.name()).into(),
            ))
        }
    };
    Ok(value)
}

/// Detached item subtree describing `value`.
pub fn create_anyvalue_item(model: &mut SessionModel, value: &AnyValue) -> Result<ItemId, ModelError> {
    create_named(model, value, "")
}

fn create_named(model: &mut SessionModel, value: &AnyValue, name: &str) -> Result<ItemId, ModelError> {
    let item = match value {
        AnyValue::Empty => model.new_item(types::ANYVALUE_EMPTY),
        AnyValue::Struct(value) => {
            let item = model.new_item(types::ANYVALUE_STRUCT);
            model.set_data(item, props::TYPE_NAME, value.type_name.as_str())?;
            for (field, member) in &value.fields {
                let child = create_named(model, member, field)?;
                model.append_item(child, item, tags::FIELDS)?;
            }
            item
        }
        AnyValue::Array(value) => {
            let item = model.new_item(types::ANYVALUE_ARRAY);
            model.set_data(item, props::TYPE_NAME, value.type_name.as_str())?;
            model.set_data(
                item,
                props::ELEMENT_TYPE,
                json::type_to_json(&value.element_type).to_string(),
            )?;
            for element in &value.elements {
                let child = create_named(model, element, "")?;
                model.append_item(child, item, tags::ELEMENTS)?;
            }
            item
        }
        scalar => {
            let item = model.new_item(types::ANYVALUE_SCALAR);
            let type_name = scalar.scalar_type().map_or("", ScalarType::name);
            model.set_data(item, props::TYPE_NAME, type_name)?;
            model.set_data(item, props::VALUE, scalar_to_variant(scalar))?;
            item
        }
    };
    model.set_data(item, props::NAME, name)?;
    Ok(item)
}

/// Value described by an item subtree.
pub fn anyvalue_from_item(model: &SessionModel, item: ItemId) -> Result<AnyValue, ModelError> {
    let model_type = model.model_type(item).ok_or(ModelError::UnknownItem(item))?;
    let type_name = model.str_data(item, props::TYPE_NAME).unwrap_or_default();
    match model_type {
        types::ANYVALUE_EMPTY => Ok(AnyValue::Empty),
        types::ANYVALUE_SCALAR => {
            let scalar = ScalarType::parse(type_name).ok_or_else(|| {
                ModelError::InvalidValue(format!("unknown scalar type '{type_name}'").into())
            })?;
            let variant = model.data(item, props::VALUE).cloned().unwrap_or_default();
            if variant.is_null() {
                return Ok(AnyValue::default_for(&AnyType::Scalar(scalar)));
            }
            variant_to_scalar(scalar, &variant)
        }
        types::ANYVALUE_STRUCT => {
            let mut fields = IndexMap::new();
            for child in model.children(item, tags::FIELDS) {
                let name = model.str_data(child, props::NAME).unwrap_or_default().to_string();
                fields.insert(name.into(), anyvalue_from_item(model, child)?);
            }
            Ok(AnyValue::Struct(StructValue {
                type_name: type_name.into(),
                fields,
            }))
        }
        types::ANYVALUE_ARRAY => {
            let elements = model
                .children(item, tags::ELEMENTS)
                .into_iter()
                .map(|child| anyvalue_from_item(model, child))
                .collect::<Result<Vec<_>, _>>()?;
            let element_type = match elements.first() {
                Some(first) => first.any_type(),
                None => match model.str_data(item, props::ELEMENT_TYPE) {
                    Some(text) => json::parse_type(text, &TypeRegistry::new())?,
                    None => AnyType::Empty,
                },
            };
            Ok(AnyValue::Array(ArrayValue {
                type_name: type_name.into(),
                element_type,
                elements,
            }))
        }
        other => Err(ModelError::WrongItemType {
            item,
            expected: "AnyValue".into(),
            found: other.into(),
        }),
    }
}

/// `true` when `item` can take `value` without structural changes.
#[must_use]
pub fn same_shape(model: &SessionModel, item: ItemId, value: &AnyValue) -> bool {
    let type_name = model.str_data(item, props::TYPE_NAME).unwrap_or_default();
    match (model.model_type(item), value) {
        (Some(types::ANYVALUE_EMPTY), AnyValue::Empty) => true,
        (Some(types::ANYVALUE_STRUCT), AnyValue::Struct(value)) => {
            let children = model.children(item, tags::FIELDS);
            type_name == value.type_name
                && children.len() == value.fields.len()
                && children.iter().zip(&value.fields).all(|(child, (name, member))| {
                    model.str_data(*child, props::NAME) == Some(name.as_str())
                        && same_shape(model, *child, member)
                })
        }
        (Some(types::ANYVALUE_ARRAY), AnyValue::Array(value)) => {
            let children = model.children(item, tags::ELEMENTS);
            type_name == value.type_name
                && children.len() == value.elements.len()
                && children
                    .iter()
                    .zip(&value.elements)
                    .all(|(child, element)| same_shape(model, *child, element))
        }
        (Some(types::ANYVALUE_SCALAR), scalar) => scalar
            .scalar_type()
            .is_some_and(|scalar| scalar.name() == type_name),
        _ => false,
    }
}

/// Writes `value` into an existing subtree of the same shape. Only leaves
/// whose value differs emit `DataChanged`.
pub fn update_anyvalue_item(model: &mut SessionModel, item: ItemId, value: &AnyValue) -> Result<(), ModelError> {
    if !same_shape(model, item, value) {
        return Err(ModelError::InvalidValue(
            format!("value of type '{}' does not fit item {item}", value.any_type().type_name()).into(),
        ));
    }
    update_leaves(model, item, value)
}

fn update_leaves(model: &mut SessionModel, item: ItemId, value: &AnyValue) -> Result<(), ModelError> {
    match value {
        AnyValue::Empty => {}
        AnyValue::Struct(value) => {
            for (child, member) in model.children(item, tags::FIELDS).into_iter().zip(value.fields.values()) {
                update_leaves(model, child, member)?;
            }
        }
        AnyValue::Array(value) => {
            for (child, element) in model.children(item, tags::ELEMENTS).into_iter().zip(&value.elements) {
                update_leaves(model, child, element)?;
            }
        }
        scalar => {
            model.set_data(item, props::VALUE, scalar_to_variant(scalar))?;
        }
    }
    Ok(())
}

/// Sets the value subtree of a variable item: in place when the shape
/// matches, otherwise the old subtree is replaced.
pub fn set_variable_value(model: &mut SessionModel, variable: ItemId, value: &AnyValue) -> Result<(), ModelError> {
    if let Some(existing) = model.child(variable, tags::ANYVALUE) {
        if same_shape(model, existing, value) {
            return update_leaves(model, existing, value);
        }
        model.remove_item(existing)?;
    }
    let item = create_anyvalue_item(model, value)?;
    model.insert_item(item, variable, tags::ANYVALUE, 0)
}

/// Value of a variable item; `Empty` when it has no value subtree.
pub fn variable_value(model: &SessionModel, variable: ItemId) -> Result<AnyValue, ModelError> {
    match model.child(variable, tags::ANYVALUE) {
        Some(item) => anyvalue_from_item(model, item),
        None => Ok(AnyValue::Empty),
    }
}
