//! Port descriptors for components.
//!
//! Every component declares its inputs and outputs as `PortDescriptor`s.
//! The graph uses them to validate connections and the matcher uses them to
//! decide how each input is read. Template definitions deserialize straight
//! into descriptors, so the field names follow the project file format.

use crate::types::{DataType, InterpretAs};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

fn default_true() -> bool {
    true
}

/// Declaration of one input or output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortDescriptor {
    pub short_name: Cow<'static, str>,

    #[serde(rename = "type", default)]
    pub data_type: DataType,

    #[serde(default)]
    pub interpret_as: InterpretAs,

    /// Inputs only: the component is insufficient while this input is empty.
    #[serde(default = "default_true")]
    pub required: bool,

    /// Inputs only: force this input to drive the matcher's rows.
    #[serde(default)]
    pub is_master: bool,

    /// Inputs only: value used when nothing is connected or assigned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Outputs only: values are created by the component, so clearing the
    /// output releases their resources. Rearranging components set this to false.
    #[serde(default = "default_true")]
    pub contains_new_data: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl PortDescriptor {
    pub fn new(short_name: impl Into<Cow<'static, str>>, data_type: DataType) -> Self {
        Self {
            short_name: short_name.into(),
            data_type,
            interpret_as: InterpretAs::Item,
            required: true,
            is_master: false,
            default: None,
            contains_new_data: true,
            description: String::new(),
        }
    }

    pub fn input(short_name: &'static str, data_type: DataType) -> Self {
        Self::new(short_name, data_type)
    }

    pub fn output(short_name: &'static str, data_type: DataType) -> Self {
        Self::new(short_name, data_type)
    }

    pub fn list(mut self) -> Self {
        self.interpret_as = InterpretAs::List;
        self
    }

    pub fn tree(mut self) -> Self {
        self.interpret_as = InterpretAs::Tree;
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn master(mut self) -> Self {
        self.is_master = true;
        self
    }

    /// Give the input a default value. Inputs with a default are optional.
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self.required = false;
        self
    }

    /// Mark an output as passing through values it did not create.
    pub fn rearranging(mut self) -> Self {
        self.contains_new_data = false;
        self
    }

    pub fn describe(mut self, text: &str) -> Self {
        self.description = text.to_string();
        self
    }

    pub fn name(&self) -> &str {
        &self.short_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let port = PortDescriptor::input("L", DataType::Wild).list().master();
        assert_eq!(port.name(), "L");
        assert!(port.required);
        assert!(port.is_master);
        assert_eq!(port.interpret_as, InterpretAs::List);

        let port = PortDescriptor::input("W", DataType::Boolean).with_default(true);
        assert!(!port.required);
        assert_eq!(port.default, Some(Value::Bool(true)));
    }

    #[test]
    fn test_deserializes_from_definition() {
        let port: PortDescriptor =
            serde_json::from_str(r#"{"shortName": "a", "type": 0, "interpretAs": 1}"#).unwrap();
        assert_eq!(port.name(), "a");
        assert_eq!(port.data_type, DataType::Number);
        assert_eq!(port.interpret_as, InterpretAs::List);
        assert!(port.required);
        assert!(port.contains_new_data);
    }
}
