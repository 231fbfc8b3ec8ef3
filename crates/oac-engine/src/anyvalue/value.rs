//! Value instances.

#![allow(missing_docs)]

use indexmap::IndexMap;
use smol_str::SmolStr;

use super::types::{AnyType, ArrayType, ScalarType, StructType};
use crate::error::EngineError;

/// Struct instance with ordered fields.
#[derive(Debug, Clone, PartialEq)]
pub struct StructValue {
    pub type_name: SmolStr,
    pub fields: IndexMap<SmolStr, AnyValue>,
}

/// Array instance; `element_type` is kept so empty arrays still carry a shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayValue {
    pub type_name: SmolStr,
    pub element_type: AnyType,
    pub elements: Vec<AnyValue>,
}

/// Typed, nested value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AnyValue {
    #[default]
    Empty,
    Bool(bool),
    Char8(u8),
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    String(String),
    Struct(StructValue),
    Array(ArrayValue),
}

impl AnyValue {
    /// Zero value of the given shape.
    #[must_use]
    pub fn default_for(ty: &AnyType) -> Self {
        match ty {
            AnyType::Empty => Self::Empty,
            AnyType::Scalar(scalar) => Self::scalar_default(*scalar),
            AnyType::Struct(ty) => Self::Struct(StructValue {
                type_name: ty.name.clone(),
                fields: ty
                    .fields
                    .iter()
                    .map(|(name, field)| (name.clone(), Self::default_for(field)))
                    .collect(),
            }),
            AnyType::Array(ty) => Self::Array(ArrayValue {
                type_name: ty.name.clone(),
                element_type: (*ty.element).clone(),
                elements: (0..ty.length)
                    .map(|_| Self::default_for(&ty.element))
                    .collect(),
            }),
        }
    }

    fn scalar_default(scalar: ScalarType) -> Self {
        match scalar {
            ScalarType::Bool => Self::Bool(false),
            ScalarType::Char8 => Self::Char8(0),
            ScalarType::Int8 => Self::Int8(0),
            ScalarType::UInt8 => Self::UInt8(0),
            ScalarType::Int16 => Self::Int16(0),
            ScalarType::UInt16 => Self::UInt16(0),
            ScalarType::Int32 => Self::Int32(0),
            ScalarType::UInt32 => Self::UInt32(0),
            ScalarType::Int64 => Self::Int64(0),
            ScalarType::UInt64 => Self::UInt64(0),
            ScalarType::Float32 => Self::Float32(0.0),
            ScalarType::Float64 => Self::Float64(0.0),
            ScalarType::String => Self::String(String::new()),
        }
    }

    #[must_use]
    pub fn scalar_type(&self) -> Option<ScalarType> {
        Some(match self {
            Self::Bool(_) => ScalarType::Bool,
            Self::Char8(_) => ScalarType::Char8,
            Self::Int8(_) => ScalarType::Int8,
            Self::UInt8(_) => ScalarType::UInt8,
            Self::Int16(_) => ScalarType::Int16,
            Self::UInt16(_) => ScalarType::UInt16,
            Self::Int32(_) => ScalarType::Int32,
            Self::UInt32(_) => ScalarType::UInt32,
            Self::Int64(_) => ScalarType::Int64,
            Self::UInt64(_) => ScalarType::UInt64,
            Self::Float32(_) => ScalarType::Float32,
            Self::Float64(_) => ScalarType::Float64,
            Self::String(_) => ScalarType::String,
            Self::Empty | Self::Struct(_) | Self::Array(_) => return None,
        })
    }

    #[must_use]
    pub fn any_type(&self) -> AnyType {
        match self {
            Self::Empty => AnyType::Empty,
            Self::Struct(value) => AnyType::Struct(StructType {
                name: value.type_name.clone(),
                fields: value
                    .fields
                    .iter()
                    .map(|(name, field)| (name.clone(), field.any_type()))
                    .collect(),
            }),
            Self::Array(value) => AnyType::Array(ArrayType {
                name: value.type_name.clone(),
                element: Box::new(value.element_type.clone()),
                length: value.elements.len(),
            }),
            scalar => scalar
                .scalar_type()
                .map_or(AnyType::Empty, AnyType::Scalar),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    #[must_use]
    pub fn is_scalar(&self) -> bool {
        self.scalar_type().is_some()
    }

    /// Same shape, values ignored.
    #[must_use]
    pub fn same_type(&self, other: &Self) -> bool {
        self.any_type() == other.any_type()
    }

    /// Integer payload widened to `i128`.
    #[must_use]
    pub fn as_integer(&self) -> Option<i128> {
        Some(match self {
            Self::Char8(v) | Self::UInt8(v) => i128::from(*v),
            Self::Int8(v) => i128::from(*v),
            Self::Int16(v) => i128::from(*v),
            Self::UInt16(v) => i128::from(*v),
            Self::Int32(v) => i128::from(*v),
            Self::UInt32(v) => i128::from(*v),
            Self::Int64(v) => i128::from(*v),
            Self::UInt64(v) => i128::from(*v),
            _ => return None,
        })
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float32(v) => Some(f64::from(*v)),
            Self::Float64(v) => Some(*v),
            #[allow(clippy::cast_precision_loss)]
            other => other.as_integer().map(|v| v as f64),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(text) => Some(text),
            _ => None,
        }
    }

    /// `true` for `Bool(true)` and any non-zero number.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(v) => *v,
            Self::Float32(_) | Self::Float64(_) => self.as_f64().is_some_and(|v| v != 0.0),
            other => other.as_integer().is_some_and(|v| v != 0),
        }
    }

    /// Builds an integer scalar of the given type, checking its range.
    pub fn from_integer(scalar: ScalarType, value: i128) -> Result<Self, EngineError> {
        let out_of_range = || EngineError::InvalidValue {
            type_name: scalar.name().into(),
            message: format!("{value} out of range").into(),
        };
        Ok(match scalar {
            ScalarType::Bool => Self::Bool(value != 0),
            ScalarType::Char8 => Self::Char8(u8::try_from(value).map_err(|_| out_of_range())?),
            ScalarType::Int8 => Self::Int8(i8::try_from(value).map_err(|_| out_of_range())?),
            ScalarType::UInt8 => Self::UInt8(u8::try_from(value).map_err(|_| out_of_range())?),
            ScalarType::Int16 => Self::Int16(i16::try_from(value).map_err(|_| out_of_range())?),
            ScalarType::UInt16 => Self::UInt16(u16::try_from(value).map_err(|_| out_of_range())?),
            ScalarType::Int32 => Self::Int32(i32::try_from(value).map_err(|_| out_of_range())?),
            ScalarType::UInt32 => Self::UInt32(u32::try_from(value).map_err(|_| out_of_range())?),
            ScalarType::Int64 => Self::Int64(i64::try_from(value).map_err(|_| out_of_range())?),
            ScalarType::UInt64 => Self::UInt64(u64::try_from(value).map_err(|_| out_of_range())?),
            #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
            ScalarType::Float32 => Self::Float32(value as f32),
            #[allow(clippy::cast_precision_loss)]
            ScalarType::Float64 => Self::Float64(value as f64),
            ScalarType::String => Self::String(value.to_string()),
        })
    }

    /// Parses the textual form used by attributes and item properties.
    pub fn from_scalar_str(scalar: ScalarType, text: &str) -> Result<Self, EngineError> {
        let invalid = || EngineError::InvalidValue {
            type_name: scalar.name().into(),
            message: format!("cannot parse '{text}'").into(),
        };
        let trimmed = text.trim();
        match scalar {
            ScalarType::String => Ok(Self::String(text.to_string())),
            ScalarType::Bool => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(Self::Bool(true)),
                "false" | "0" => Ok(Self::Bool(false)),
                _ => Err(invalid()),
            },
            ScalarType::Float32 => trimmed
                .parse::<f32>()
                .map(Self::Float32)
                .map_err(|_| invalid()),
            ScalarType::Float64 => trimmed
                .parse::<f64>()
                .map(Self::Float64)
                .map_err(|_| invalid()),
            _ => {
                let value = trimmed.parse::<i128>().map_err(|_| invalid())?;
                Self::from_integer(scalar, value)
            }
        }
    }

    /// Textual form of a scalar; `None` for empty, struct and array values.
    #[must_use]
    pub fn to_scalar_string(&self) -> Option<String> {
        match self {
            Self::Bool(v) => Some(v.to_string()),
            Self::Float32(v) => Some(v.to_string()),
            Self::Float64(v) => Some(v.to_string()),
            Self::String(text) => Some(text.clone()),
            other => other.as_integer().map(|v| v.to_string()),
        }
    }

    /// Numeric value plus one, same scalar type.
    #[must_use]
    pub fn incremented(&self) -> Option<Self> {
        match self {
            Self::Float32(v) => Some(Self::Float32(v + 1.0)),
            Self::Float64(v) => Some(Self::Float64(v + 1.0)),
            other => {
                let scalar = other.scalar_type()?;
                if !scalar.is_integer() {
                    return None;
                }
                Self::from_integer(scalar, other.as_integer()? + 1).ok()
            }
        }
    }

    /// Struct field or array element by path segment.
    #[must_use]
    pub fn child(&self, key: &str) -> Option<&AnyValue> {
        match self {
            Self::Struct(value) => value.fields.get(key),
            Self::Array(value) => key
                .parse::<usize>()
                .ok()
                .and_then(|index| value.elements.get(index)),
            _ => None,
        }
    }
}

impl From<bool> for AnyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for AnyValue {
    fn from(value: i32) -> Self {
        Self::Int32(value)
    }
}

impl From<i64> for AnyValue {
    fn from(value: i64) -> Self {
        Self::Int64(value)
    }
}

impl From<u32> for AnyValue {
    fn from(value: u32) -> Self {
        Self::UInt32(value)
    }
}

impl From<f64> for AnyValue {
    fn from(value: f64) -> Self {
        Self::Float64(value)
    }
}

impl From<&str> for AnyValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AnyValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_for_struct_zeroes_fields_in_order() {
        let ty = AnyType::Struct(StructType {
            name: "Pair".into(),
            fields: vec![
                ("a".into(), AnyType::Scalar(ScalarType::Int32)),
                ("b".into(), AnyType::Scalar(ScalarType::String)),
            ],
        });
        let value = AnyValue::default_for(&ty);
        let AnyValue::Struct(fields) = &value else {
            panic!("expected struct");
        };
        let names: Vec<_> = fields.fields.keys().map(SmolStr::as_str).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(value.child("a"), Some(&AnyValue::Int32(0)));
        assert_eq!(value.any_type(), ty);
    }

    #[test]
    fn integer_range_is_checked() {
        assert_eq!(
            AnyValue::from_integer(ScalarType::UInt8, 255),
            Ok(AnyValue::UInt8(255))
        );
        assert!(AnyValue::from_integer(ScalarType::UInt8, 256).is_err());
        assert!(AnyValue::from_integer(ScalarType::Int8, -129).is_err());
    }

    #[test]
    fn scalar_strings_parse_per_type() {
        assert_eq!(
            AnyValue::from_scalar_str(ScalarType::Int32, " 42 "),
            Ok(AnyValue::Int32(42))
        );
        assert_eq!(
            AnyValue::from_scalar_str(ScalarType::Bool, "TRUE"),
            Ok(AnyValue::Bool(true))
        );
        assert!(AnyValue::from_scalar_str(ScalarType::UInt16, "-1").is_err());
        assert_eq!(AnyValue::Int32(42).to_scalar_string().as_deref(), Some("42"));
    }

    #[test]
    fn increment_keeps_scalar_type() {
        assert_eq!(AnyValue::UInt8(1).incremented(), Some(AnyValue::UInt8(2)));
        assert_eq!(AnyValue::UInt8(255).incremented(), None);
        assert_eq!(AnyValue::from("x").incremented(), None);
    }

    #[test]
    fn truthiness() {
        assert!(AnyValue::Bool(true).is_truthy());
        assert!(!AnyValue::Int32(0).is_truthy());
        assert!(AnyValue::Float64(0.5).is_truthy());
        assert!(!AnyValue::Empty.is_truthy());
    }
}
