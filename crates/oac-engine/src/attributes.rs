//! Ordered attribute maps.

#![allow(missing_docs)]

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::anyvalue::AnyValue;
use crate::error::EngineError;
use crate::workspace::Workspace;

/// Attribute names shared by instructions and variables.
pub mod names {
    pub const NAME: &str = "name";
    pub const IS_ROOT: &str = "isRoot";
    pub const TYPE: &str = "type";
    pub const VALUE: &str = "value";
}

/// Value kind of a declared attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    Bool,
    Int,
    Float,
    String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDefinition {
    pub name: SmolStr,
    pub kind: AttributeKind,
    pub mandatory: bool,
}

impl AttributeDefinition {
    #[must_use]
    pub fn optional(name: &str, kind: AttributeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            mandatory: false,
        }
    }

    #[must_use]
    pub fn mandatory(name: &str, kind: AttributeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            mandatory: true,
        }
    }
}

/// Name → raw string attribute map, insertion ordered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeMap {
    entries: IndexMap<SmolStr, String>,
}

impl AttributeMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an attribute, returning the previous value.
    pub fn set(&mut self, name: impl Into<SmolStr>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(name.into(), value.into())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.entries.shift_remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mandatory attribute; `owner` names the instruction/variable type in the error.
    pub fn require(&self, owner: &str, name: &str) -> Result<&str, EngineError> {
        self.get(name).ok_or_else(|| EngineError::MissingAttribute {
            owner: owner.into(),
            attribute: name.into(),
        })
    }

    pub fn get_bool(&self, owner: &str, name: &str) -> Result<Option<bool>, EngineError> {
        let Some(raw) = self.get(name) else {
            return Ok(None);
        };
        match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(Some(true)),
            "false" | "no" | "0" => Ok(Some(false)),
            _ => Err(invalid(owner, name, raw)),
        }
    }

    pub fn get_f64(&self, owner: &str, name: &str) -> Result<Option<f64>, EngineError> {
        self.get(name)
            .map(|raw| raw.trim().parse::<f64>().map_err(|_| invalid(owner, name, raw)))
            .transpose()
    }

    pub fn get_i64(&self, owner: &str, name: &str) -> Result<Option<i64>, EngineError> {
        self.get(name)
            .map(|raw| raw.trim().parse::<i64>().map_err(|_| invalid(owner, name, raw)))
            .transpose()
    }

    /// Variable name when the attribute is a `@variable` reference.
    #[must_use]
    pub fn variable_reference(&self, name: &str) -> Option<&str> {
        self.get(name)
            .and_then(|raw| raw.strip_prefix('@'))
            .filter(|reference| !reference.is_empty())
    }

    /// Numeric attribute, read from the workspace when it is a `@variable` reference.
    pub fn resolve_f64(
        &self,
        owner: &str,
        name: &str,
        workspace: &Workspace,
    ) -> Result<Option<f64>, EngineError> {
        let Some(reference) = self.variable_reference(name) else {
            return self.get_f64(owner, name);
        };
        let value = workspace
            .get_value(reference)
            .ok_or_else(|| EngineError::UndefinedVariable(reference.into()))?;
        value
            .as_f64()
            .map(Some)
            .ok_or_else(|| invalid(owner, name, &value_text(&value)))
    }
}

fn value_text(value: &AnyValue) -> String {
    value
        .to_scalar_string()
        .unwrap_or_else(|| value.to_json_string())
}

fn invalid(owner: &str, name: &str, raw: &str) -> EngineError {
    EngineError::InvalidAttribute {
        owner: owner.into(),
        attribute: name.into(),
        message: format!("unexpected value '{raw}'").into(),
    }
}

impl<K: Into<SmolStr>, V: Into<String>> FromIterator<(K, V)> for AttributeMap {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_insertion_order_and_overwrites_in_place() {
        let mut attributes = AttributeMap::new();
        attributes.set("b", "1");
        attributes.set("a", "2");
        assert_eq!(attributes.set("b", "3").as_deref(), Some("1"));
        let pairs: Vec<_> = attributes.iter().collect();
        assert_eq!(pairs, [("b", "3"), ("a", "2")]);
    }

    #[test]
    fn typed_getters_report_owner() {
        let attributes: AttributeMap = [("timeout", "abc"), ("flag", "yes")].into_iter().collect();
        assert_eq!(attributes.get_bool("Wait", "flag"), Ok(Some(true)));
        assert_eq!(attributes.get_f64("Wait", "missing"), Ok(None));
        let err = attributes.get_f64("Wait", "timeout").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid attribute 'timeout' on 'Wait': unexpected value 'abc'"
        );
        assert_eq!(
            attributes.require("Wait", "other"),
            Err(EngineError::MissingAttribute {
                owner: "Wait".into(),
                attribute: "other".into()
            })
        );
    }

    #[test]
    fn variable_reference_requires_name() {
        let attributes: AttributeMap = [("a", "@var"), ("b", "@"), ("c", "plain")]
            .into_iter()
            .collect();
        assert_eq!(attributes.variable_reference("a"), Some("var"));
        assert_eq!(attributes.variable_reference("b"), None);
        assert_eq!(attributes.variable_reference("c"), None);
    }
}
