//! Typed, nested values.
//!
//! `AnyType` describes a shape (scalar, struct with ordered fields, fixed
//! length array); `AnyValue` is an instance of such a shape. Both have a
//! JSON representation following the oac-tree convention, see [`json`].

pub mod json;
mod types;
mod value;

pub use types::{AnyType, ArrayType, ScalarType, StructType, TypeRegistry};
pub use value::{ArrayValue, AnyValue, StructValue};
