//! User-scripted component backed by Rhai.

use crate::graph::PortDescriptor;
use crate::scripting::ScriptEngine;
use crate::types::DataType;
use crate::value::{Record, Value};
use std::sync::Arc;

/// Runs the script from input `F` once per item with `x` and `y` bound.
#[derive(Debug, Clone)]
pub struct ScriptComponent {
    engine: Arc<ScriptEngine>,
}

impl ScriptComponent {
    pub fn new(engine: Arc<ScriptEngine>) -> Self {
        Self { engine }
    }

    pub fn inputs() -> Vec<PortDescriptor> {
        vec![
            PortDescriptor::input("X", DataType::Wild),
            PortDescriptor::input("Y", DataType::Wild).optional(),
            PortDescriptor::input("F", DataType::String).describe("Rhai source"),
        ]
    }

    pub fn outputs() -> Vec<PortDescriptor> {
        vec![PortDescriptor::output("R", DataType::Wild)]
    }

    pub fn calculate(&self, args: &[Value]) -> std::result::Result<Record, String> {
        let source = args
            .get(2)
            .and_then(Value::as_str)
            .ok_or_else(|| "F must be script source text".to_string())?;
        let x = args.first().cloned().unwrap_or_default();
        let y = args.get(1).cloned().unwrap_or_default();

        let script = self.engine.compile(source).map_err(|e| e.to_string())?;
        let result = self
            .engine
            .execute(&script, &x, &y)
            .map_err(|e| e.to_string())?;

        let mut record = Record::new();
        record.insert("R".to_string(), result);
        Ok(record)
    }
}
