//! Type descriptions.

#![allow(missing_docs)]

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::error::EngineError;

/// Scalar leaf types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Bool,
    Char8,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
    String,
}

impl ScalarType {
    pub const ALL: [ScalarType; 13] = [
        Self::Bool,
        Self::Char8,
        Self::Int8,
        Self::UInt8,
        Self::Int16,
        Self::UInt16,
        Self::Int32,
        Self::UInt32,
        Self::Int64,
        Self::UInt64,
        Self::Float32,
        Self::Float64,
        Self::String,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Char8 => "char8",
            Self::Int8 => "int8",
            Self::UInt8 => "uint8",
            Self::Int16 => "int16",
            Self::UInt16 => "uint16",
            Self::Int32 => "int32",
            Self::UInt32 => "uint32",
            Self::Int64 => "int64",
            Self::UInt64 => "uint64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::String => "string",
        }
    }

    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| ty.name() == name)
    }

    #[must_use]
    pub fn is_integer(self) -> bool {
        !matches!(self, Self::Bool | Self::Float32 | Self::Float64 | Self::String)
    }

    #[must_use]
    pub fn is_float(self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }
}

/// Struct shape: named type with ordered, named fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructType {
    pub name: SmolStr,
    pub fields: Vec<(SmolStr, AnyType)>,
}

/// Array shape: named type with an element type and fixed length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayType {
    pub name: SmolStr,
    pub element: Box<AnyType>,
    pub length: usize,
}

/// Shape of an [`AnyValue`](super::AnyValue).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AnyType {
    #[default]
    Empty,
    Scalar(ScalarType),
    Struct(StructType),
    Array(ArrayType),
}

impl AnyType {
    /// Type name as written in JSON type descriptions.
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Self::Empty => "",
            Self::Scalar(scalar) => scalar.name(),
            Self::Struct(ty) => ty.name.as_str(),
            Self::Array(ty) => ty.name.as_str(),
        }
    }

    #[must_use]
    pub fn is_scalar(&self) -> bool {
        matches!(self, Self::Scalar(_))
    }
}

/// Named types registered through the procedure preamble.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: IndexMap<SmolStr, AnyType>,
}

impl TypeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a named type. Scalar names are reserved.
    pub fn register(&mut self, ty: AnyType) -> Result<(), EngineError> {
        let name = ty.type_name();
        if name.is_empty() || ScalarType::parse(name).is_some() {
            return Err(EngineError::InvalidType(name.into()));
        }
        self.types.insert(SmolStr::new(name), ty);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AnyType> {
        self.types.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(SmolStr::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
