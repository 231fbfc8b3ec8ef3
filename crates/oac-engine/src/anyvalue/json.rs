//! JSON codec for types and values.
//!
//! Types are objects with a `type` name; structs add an ordered
//! `attributes` list of single-entry objects, arrays add `element` and an
//! optional `multiplicity`:
//!
//! ```text
//! {"type":"int32"}
//! {"type":"Pair","attributes":[{"a":{"type":"int32"}},{"b":{"type":"string"}}]}
//! {"type":"Bytes","multiplicity":2,"element":{"type":"uint8"}}
//! ```
//!
//! Values are plain JSON (`42`, `{"a":1,"b":"x"}`, `[1,2]`).

use serde_json::{Map, Value};
use smol_str::SmolStr;

use super::types::{AnyType, ArrayType, ScalarType, StructType, TypeRegistry};
use super::value::{AnyValue, ArrayValue, StructValue};
use crate::error::EngineError;

fn invalid_type(text: impl Into<SmolStr>) -> EngineError {
    EngineError::InvalidType(text.into())
}

fn invalid_value(ty: &AnyType, message: impl Into<SmolStr>) -> EngineError {
    EngineError::InvalidValue {
        type_name: ty.type_name().into(),
        message: message.into(),
    }
}

/// Parses a JSON type description, resolving registered names.
pub fn parse_type(text: &str, registry: &TypeRegistry) -> Result<AnyType, EngineError> {
    let json: Value = serde_json::from_str(text).map_err(|err| invalid_type(err.to_string()))?;
    type_from_json(&json, registry)
}

/// Converts a parsed JSON type description.
pub fn type_from_json(json: &Value, registry: &TypeRegistry) -> Result<AnyType, EngineError> {
    let Some(object) = json.as_object() else {
        return Err(invalid_type(json.to_string()));
    };
    let name = object.get("type").and_then(Value::as_str).unwrap_or_default();

    if let Some(attributes) = object.get("attributes") {
        let Some(entries) = attributes.as_array() else {
            return Err(invalid_type(format!("'{name}': attributes must be a list")));
        };
        let mut fields = Vec::with_capacity(entries.len());
        for entry in entries {
            let Some((field, field_type)) = entry.as_object().and_then(single_entry) else {
                return Err(invalid_type(format!("'{name}': malformed attribute entry")));
            };
            fields.push((SmolStr::new(field), type_from_json(field_type, registry)?));
        }
        return Ok(AnyType::Struct(StructType {
            name: name.into(),
            fields,
        }));
    }

    if let Some(element) = object.get("element") {
        let length = match object.get("multiplicity") {
            None => 0,
            Some(value) => value
                .as_u64()
                .and_then(|value| usize::try_from(value).ok())
                .ok_or_else(|| invalid_type(format!("'{name}': invalid multiplicity")))?,
        };
        return Ok(AnyType::Array(ArrayType {
            name: name.into(),
            element: Box::new(type_from_json(element, registry)?),
            length,
        }));
    }

    if name.is_empty() {
        return Ok(AnyType::Empty);
    }
    if let Some(scalar) = ScalarType::parse(name) {
        return Ok(AnyType::Scalar(scalar));
    }
    registry.get(name).cloned().ok_or_else(|| invalid_type(name))
}

fn single_entry(object: &Map<String, Value>) -> Option<(&str, &Value)> {
    if object.len() != 1 {
        return None;
    }
    object.iter().next().map(|(key, value)| (key.as_str(), value))
}

#[must_use]
pub fn type_to_json(ty: &AnyType) -> Value {
    let mut object = Map::new();
    object.insert("type".into(), Value::String(ty.type_name().to_string()));
    match ty {
        AnyType::Empty | AnyType::Scalar(_) => {}
        AnyType::Struct(ty) => {
            let fields = ty
                .fields
                .iter()
                .map(|(name, field)| {
                    let mut entry = Map::new();
                    entry.insert(name.to_string(), type_to_json(field));
                    Value::Object(entry)
                })
                .collect();
            object.insert("attributes".into(), Value::Array(fields));
        }
        AnyType::Array(ty) => {
            object.insert("multiplicity".into(), Value::from(ty.length));
            object.insert("element".into(), type_to_json(&ty.element));
        }
    }
    Value::Object(object)
}

/// Parses a JSON value against a known type.
pub fn parse_value(ty: &AnyType, text: &str) -> Result<AnyValue, EngineError> {
    let json: Value =
        serde_json::from_str(text).map_err(|err| invalid_value(ty, err.to_string()))?;
    value_from_json(ty, &json)
}

pub fn value_from_json(ty: &AnyType, json: &Value) -> Result<AnyValue, EngineError> {
    match ty {
        AnyType::Empty => {
            if json.is_null() {
                Ok(AnyValue::Empty)
            } else {
                Err(invalid_value(ty, "expected null"))
            }
        }
        AnyType::Scalar(scalar) => scalar_from_json(*scalar, json),
        AnyType::Struct(struct_type) => {
            let Some(object) = json.as_object() else {
                return Err(invalid_value(ty, "expected object"));
            };
            if let Some(unknown) = object
                .keys()
                .find(|key| !struct_type.fields.iter().any(|(name, _)| name == key.as_str()))
            {
                return Err(invalid_value(ty, format!("unknown field '{unknown}'")));
            }
            let mut fields = indexmap::IndexMap::with_capacity(struct_type.fields.len());
            for (name, field_type) in &struct_type.fields {
                let value = match object.get(name.as_str()) {
                    Some(field) => value_from_json(field_type, field)?,
                    None => AnyValue::default_for(field_type),
                };
                fields.insert(name.clone(), value);
            }
            Ok(AnyValue::Struct(StructValue {
                type_name: struct_type.name.clone(),
                fields,
            }))
        }
        AnyType::Array(array_type) => {
            let Some(items) = json.as_array() else {
                return Err(invalid_value(ty, "expected array"));
            };
            if array_type.length != 0 && items.len() != array_type.length {
                return Err(invalid_value(
                    ty,
                    format!("expected {} elements, got {}", array_type.length, items.len()),
                ));
            }
            let elements = items
                .iter()
                .map(|item| value_from_json(&array_type.element, item))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(AnyValue::Array(ArrayValue {
                type_name: array_type.name.clone(),
                element_type: (*array_type.element).clone(),
                elements,
            }))
        }
    }
}

fn scalar_from_json(scalar: ScalarType, json: &Value) -> Result<AnyValue, EngineError> {
    let ty = AnyType::Scalar(scalar);
    match scalar {
        ScalarType::Bool => match json {
            Value::Bool(value) => Ok(AnyValue::Bool(*value)),
            Value::Number(number) if number.as_u64().is_some_and(|v| v <= 1) => {
                Ok(AnyValue::Bool(number.as_u64() == Some(1)))
            }
            _ => Err(invalid_value(&ty, "expected boolean")),
        },
        ScalarType::String => json
            .as_str()
            .map(|text| AnyValue::String(text.to_string()))
            .ok_or_else(|| invalid_value(&ty, "expected string")),
        ScalarType::Float32 | ScalarType::Float64 => {
            let value = json
                .as_f64()
                .ok_or_else(|| invalid_value(&ty, "expected number"))?;
            #[allow(clippy::cast_possible_truncation)]
            let converted = if scalar == ScalarType::Float32 {
                AnyValue::Float32(value as f32)
            } else {
                AnyValue::Float64(value)
            };
            Ok(converted)
        }
        ScalarType::Char8 => {
            if let Some(text) = json.as_str() {
                let mut bytes = text.bytes();
                return match (bytes.next(), bytes.next()) {
                    (Some(byte), None) => Ok(AnyValue::Char8(byte)),
                    _ => Err(invalid_value(&ty, "expected single character")),
                };
            }
            integer_from_json(scalar, json)
        }
        _ => integer_from_json(scalar, json),
    }
}

fn integer_from_json(scalar: ScalarType, json: &Value) -> Result<AnyValue, EngineError> {
    let value = json
        .as_i64()
        .map(i128::from)
        .or_else(|| json.as_u64().map(i128::from))
        .ok_or_else(|| invalid_value(&AnyType::Scalar(scalar), "expected integer"))?;
    AnyValue::from_integer(scalar, value)
}

#[must_use]
pub fn value_to_json(value: &AnyValue) -> Value {
    match value {
        AnyValue::Empty => Value::Null,
        AnyValue::Bool(v) => Value::Bool(*v),
        AnyValue::Char8(v) | AnyValue::UInt8(v) => Value::from(*v),
        AnyValue::Int8(v) => Value::from(*v),
        AnyValue::Int16(v) => Value::from(*v),
        AnyValue::UInt16(v) => Value::from(*v),
        AnyValue::Int32(v) => Value::from(*v),
        AnyValue::UInt32(v) => Value::from(*v),
        AnyValue::Int64(v) => Value::from(*v),
        AnyValue::UInt64(v) => Value::from(*v),
        AnyValue::Float32(v) => Value::from(f64::from(*v)),
        AnyValue::Float64(v) => Value::from(*v),
        AnyValue::String(text) => Value::String(text.clone()),
        AnyValue::Struct(value) => Value::Object(
            value
                .fields
                .iter()
                .map(|(name, field)| (name.to_string(), value_to_json(field)))
                .collect(),
        ),
        AnyValue::Array(value) => Value::Array(value.elements.iter().map(value_to_json).collect()),
    }
}

impl AnyType {
    #[must_use]
    pub fn to_json(&self) -> Value {
        type_to_json(self)
    }

    /// Compact JSON text of the type description.
    #[must_use]
    pub fn to_json_string(&self) -> String {
        type_to_json(self).to_string()
    }
}

impl AnyValue {
    #[must_use]
    pub fn to_json(&self) -> Value {
        value_to_json(self)
    }

    /// Compact JSON text of the value.
    #[must_use]
    pub fn to_json_string(&self) -> String {
        value_to_json(self).to_string()
    }

    pub fn from_json(ty: &AnyType, json: &Value) -> Result<Self, EngineError> {
        value_from_json(ty, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_struct_type_with_field_order() {
        let ty = parse_type(
            r#"{"type":"Pair","attributes":[{"b":{"type":"string"}},{"a":{"type":"int32"}}]}"#,
            &TypeRegistry::new(),
        )
        .unwrap();
        let AnyType::Struct(struct_type) = &ty else {
            panic!("expected struct");
        };
        let names: Vec<_> = struct_type.fields.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["b", "a"]);
        assert_eq!(type_from_json(&ty.to_json(), &TypeRegistry::new()), Ok(ty));
    }

    #[test]
    fn resolves_registered_names() {
        let mut registry = TypeRegistry::new();
        let bytes = parse_type(
            r#"{"type":"Bytes","multiplicity":2,"element":{"type":"uint8"}}"#,
            &registry,
        )
        .unwrap();
        registry.register(bytes.clone()).unwrap();
        assert_eq!(parse_type(r#"{"type":"Bytes"}"#, &registry), Ok(bytes));
        assert_eq!(
            parse_type(r#"{"type":"Missing"}"#, &registry),
            Err(EngineError::InvalidType("Missing".into()))
        );
    }

    #[test]
    fn struct_values_fill_missing_fields() {
        let ty = parse_type(
            r#"{"type":"Pair","attributes":[{"a":{"type":"int32"}},{"b":{"type":"bool"}}]}"#,
            &TypeRegistry::new(),
        )
        .unwrap();
        let value = value_from_json(&ty, &json!({"a": 7})).unwrap();
        assert_eq!(value.child("a"), Some(&AnyValue::Int32(7)));
        assert_eq!(value.child("b"), Some(&AnyValue::Bool(false)));
        assert!(value_from_json(&ty, &json!({"c": 1})).is_err());
        assert_eq!(value.to_json(), json!({"a": 7, "b": false}));
    }

    #[test]
    fn array_length_is_enforced() {
        let ty = parse_type(
            r#"{"type":"Bytes","multiplicity":2,"element":{"type":"uint8"}}"#,
            &TypeRegistry::new(),
        )
        .unwrap();
        assert!(parse_value(&ty, "[1,2]").is_ok());
        assert!(parse_value(&ty, "[1]").is_err());
        assert!(parse_value(&ty, "[1,300]").is_err());
    }

    #[test]
    fn scalar_values() {
        let int32 = AnyType::Scalar(ScalarType::Int32);
        assert_eq!(parse_value(&int32, "42"), Ok(AnyValue::Int32(42)));
        assert!(parse_value(&int32, "\"42\"").is_err());
        let char8 = AnyType::Scalar(ScalarType::Char8);
        assert_eq!(parse_value(&char8, "\"a\""), Ok(AnyValue::Char8(b'a')));
    }
}
