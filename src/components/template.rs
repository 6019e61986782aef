//! Components generated from code templates.
//!
//! A template definition describes the ports of a component and a snippet of
//! external source with `<%= TOKEN %>` placeholders. Every calculation fills
//! the placeholders with the input values and a fresh result variable name,
//! hands the code to a [`CalculationBackend`] and resolves to that variable
//! name once the backend has run it. Downstream templates then reference the
//! variable rather than the value itself.
//!
//! ```json
//! {
//!   "functionName": "add",
//!   "componentPrettyName": "Add Numbers",
//!   "inputs": [{"shortName": "A", "type": 0}, {"shortName": "B", "type": 0}],
//!   "outputs": [{"shortName": "N", "type": 0}],
//!   "template": "<%= RESULT %> = <%= IN_A %> + <%= IN_B %>\n"
//! }
//! ```

use crate::error::{FlowError, Result};
use crate::graph::PortDescriptor;
use crate::matcher::Calculation;
use crate::value::{Record, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Token replaced by the generated result variable name.
pub const RESULT_TOKEN: &str = "RESULT";

/// Prefix of the token replaced by an input's value.
pub const INPUT_TOKEN_PREFIX: &str = "IN_";

const OPEN: &str = "<%=";
const CLOSE: &str = "%>";

pub type BackendFuture = Pin<Box<dyn Future<Output = std::result::Result<(), String>> + Send>>;

/// Executes generated code somewhere outside the engine, typically a
/// notebook kernel. The future resolves once the code has run.
pub trait CalculationBackend: Send + Sync + fmt::Debug {
    fn execute(&self, code: String) -> BackendFuture;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDefinition {
    pub function_name: String,
    #[serde(default)]
    pub component_pretty_name: String,
    #[serde(default)]
    pub inputs: Vec<PortDescriptor>,
    #[serde(default)]
    pub outputs: Vec<PortDescriptor>,
    #[serde(alias = "pythonTemplate")]
    pub template: String,
}

impl TemplateDefinition {
    /// Check that the template references every input and the result.
    pub fn validate(&self) -> Result<()> {
        if self.function_name.trim().is_empty() {
            return Err(FlowError::Template(
                "template definition has no functionName".to_string(),
            ));
        }
        if self.outputs.is_empty() {
            return Err(FlowError::Template(format!(
                "{} declares no outputs",
                self.function_name
            )));
        }

        let missing: Vec<String> = self
            .inputs
            .iter()
            .map(|input| format!("{}{}", INPUT_TOKEN_PREFIX, input.name()))
            .chain(std::iter::once(RESULT_TOKEN.to_string()))
            .filter(|token| !self.template.contains(token.as_str()))
            .collect();
        if !missing.is_empty() {
            return Err(FlowError::Template(format!(
                "{} never references {}",
                self.function_name,
                missing.join(", ")
            )));
        }
        Ok(())
    }

    pub fn display_name(&self) -> &str {
        if self.component_pretty_name.is_empty() {
            &self.function_name
        } else {
            &self.component_pretty_name
        }
    }

    /// Prefix of generated variable names: the display name lowercased, with
    /// everything outside `a-z` turned into underscores.
    pub fn variable_prefix(&self) -> String {
        let mut prefix: String = self
            .display_name()
            .to_lowercase()
            .chars()
            .map(|c| if c.is_ascii_lowercase() { c } else { '_' })
            .collect();
        prefix.push('_');
        prefix
    }
}

/// Replace every `<%= TOKEN %>` with its value. Unknown tokens are left as is.
pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find(OPEN) {
        let after_open = &rest[start + OPEN.len()..];
        let Some(end) = after_open.find(CLOSE) else {
            break;
        };
        out.push_str(&rest[..start]);
        let token = after_open[..end].trim();
        match vars.get(token) {
            Some(value) => out.push_str(value),
            None => out.push_str(&rest[start..start + OPEN.len() + end + CLOSE.len()]),
        }
        rest = &after_open[end + CLOSE.len()..];
    }
    out.push_str(rest);
    out
}

/// A component instance built from a [`TemplateDefinition`].
#[derive(Debug, Clone)]
pub struct TemplateComponent {
    definition: Arc<TemplateDefinition>,
    backend: Arc<dyn CalculationBackend>,
    issued: u64,
}

impl TemplateComponent {
    pub fn new(definition: Arc<TemplateDefinition>, backend: Arc<dyn CalculationBackend>) -> Self {
        Self {
            definition,
            backend,
            issued: 0,
        }
    }

    pub fn definition(&self) -> &TemplateDefinition {
        &self.definition
    }

    pub fn inputs(&self) -> Vec<PortDescriptor> {
        self.definition.inputs.clone()
    }

    pub fn outputs(&self) -> Vec<PortDescriptor> {
        self.definition.outputs.clone()
    }

    fn next_variable(&mut self) -> String {
        self.issued += 1;
        format!("{}{}", self.definition.variable_prefix(), self.issued)
    }

    /// Render the code for one item and dispatch it.
    pub fn calculate(&mut self, args: &[Value]) -> Calculation {
        let variable = self.next_variable();
        let mut vars = HashMap::with_capacity(args.len() + 1);
        vars.insert(RESULT_TOKEN.to_string(), variable.clone());
        for (input, value) in self.definition.inputs.iter().zip(args) {
            vars.insert(
                format!("{}{}", INPUT_TOKEN_PREFIX, input.name()),
                value.to_string(),
            );
        }
        let code = render(&self.definition.template, &vars);
        tracing::debug!("Dispatching {} as {}", self.definition.function_name, variable);

        let outputs: Vec<String> = self
            .definition
            .outputs
            .iter()
            .map(|o| o.name().to_string())
            .collect();
        let execution = self.backend.execute(code);
        Calculation::deferred(async move {
            execution.await?;
            let mut record = Record::new();
            if let [only] = outputs.as_slice() {
                record.insert(only.clone(), Value::String(variable));
            } else {
                for (index, name) in outputs.into_iter().enumerate() {
                    record.insert(name, Value::String(format!("{}[{}]", variable, index)));
                }
            }
            Ok(record)
        })
    }
}
