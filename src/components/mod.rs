//! Component catalog.
//!
//! Every component a graph can hold is one [`Behavior`] variant. A behavior
//! either transforms whole trees ([`TreeOp`]) or calculates per item through
//! the matcher (everything else). New instances are created by name through
//! the [`ComponentRegistry`], which also owns template definitions and the
//! calculation backend they dispatch to.

pub mod lists;
pub mod math;
pub mod script;
pub mod template;
pub mod tree_ops;

pub use lists::ListOp;
pub use math::ValueOp;
pub use script::ScriptComponent;
pub use template::{
    render, BackendFuture, CalculationBackend, TemplateComponent, TemplateDefinition,
};
pub use tree_ops::TreeOp;

use crate::config::ScriptLimits;
use crate::error::{FlowError, Result};
use crate::graph::{GraphError, PortDescriptor};
use crate::matcher::Calculation;
use crate::scripting::ScriptEngine;
use crate::tree::DataTree;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Kinds of components the engine knows how to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    // Whole-tree transforms
    Graft,
    Flatten,
    Remap,

    // Lists
    Shift,
    CullIndex,
    CullPattern,
    CullNth,
    InsertItems,
    ListItem,
    Duplicate,
    ListLength,

    // Values and math
    Number,
    Text,
    Series,
    Add,
    Subtract,

    /// Rhai expression evaluated per item.
    Script,
    /// Generated from a registered template definition.
    Template,
}

impl ComponentKind {
    /// Name stored as `componentType` in project files.
    pub fn type_name(&self) -> &'static str {
        match self {
            ComponentKind::Graft => "graft",
            ComponentKind::Flatten => "flatten",
            ComponentKind::Remap => "remap",
            ComponentKind::Shift => "shift",
            ComponentKind::CullIndex => "cullIndex",
            ComponentKind::CullPattern => "cullPattern",
            ComponentKind::CullNth => "cullNth",
            ComponentKind::InsertItems => "insertItems",
            ComponentKind::ListItem => "listItem",
            ComponentKind::Duplicate => "duplicate",
            ComponentKind::ListLength => "listLength",
            ComponentKind::Number => "number",
            ComponentKind::Text => "string",
            ComponentKind::Series => "series",
            ComponentKind::Add => "addition",
            ComponentKind::Subtract => "subtraction",
            ComponentKind::Script => "script",
            ComponentKind::Template => "template",
        }
    }

    /// Built-in kind for a `componentType`. Template names are resolved by the registry.
    pub fn from_type_name(name: &str) -> Option<ComponentKind> {
        Self::all()
            .iter()
            .copied()
            .filter(|k| *k != ComponentKind::Template)
            .find(|k| k.type_name() == name)
    }

    /// Get the display name for this component kind.
    pub fn display_name(&self) -> &'static str {
        match self {
            ComponentKind::Graft => "Graft Tree",
            ComponentKind::Flatten => "Flatten Tree",
            ComponentKind::Remap => "Path Mapper",
            ComponentKind::Shift => "Shift List",
            ComponentKind::CullIndex => "Cull Index",
            ComponentKind::CullPattern => "Cull Pattern",
            ComponentKind::CullNth => "Cull Nth",
            ComponentKind::InsertItems => "Insert Items",
            ComponentKind::ListItem => "List Item",
            ComponentKind::Duplicate => "Duplicate Data",
            ComponentKind::ListLength => "List Length",
            ComponentKind::Number => "Number",
            ComponentKind::Text => "String",
            ComponentKind::Series => "Series",
            ComponentKind::Add => "Addition",
            ComponentKind::Subtract => "Subtraction",
            ComponentKind::Script => "Rhai Script",
            ComponentKind::Template => "Code Template",
        }
    }

    /// Get all component kinds.
    pub fn all() -> &'static [ComponentKind] {
        &[
            ComponentKind::Graft,
            ComponentKind::Flatten,
            ComponentKind::Remap,
            ComponentKind::Shift,
            ComponentKind::CullIndex,
            ComponentKind::CullPattern,
            ComponentKind::CullNth,
            ComponentKind::InsertItems,
            ComponentKind::ListItem,
            ComponentKind::Duplicate,
            ComponentKind::ListLength,
            ComponentKind::Number,
            ComponentKind::Text,
            ComponentKind::Series,
            ComponentKind::Add,
            ComponentKind::Subtract,
            ComponentKind::Script,
            ComponentKind::Template,
        ]
    }

    /// Check if this kind restructures whole trees instead of calculating per item.
    pub fn is_whole_tree(&self) -> bool {
        matches!(
            self,
            ComponentKind::Graft | ComponentKind::Flatten | ComponentKind::Remap
        )
    }

    /// Get a short description of what this component does.
    pub fn description(&self) -> &'static str {
        match self {
            ComponentKind::Graft => "Moves every value onto its own sub-branch.",
            ComponentKind::Flatten => {
                "Collects every value into one branch.\n\
                 The target path defaults to {0}."
            }
            ComponentKind::Remap => {
                "Rewrites branch paths with a mapping such as {A;B}(i):{B;i}(A).\n\
                 Moving the item placeholder redistributes single items."
            }
            ComponentKind::Shift => "Rotates a list by an offset, optionally wrapping.",
            ComponentKind::CullIndex => "Removes the items at the given indices.",
            ComponentKind::CullPattern => "Keeps items where a repeating boolean mask is true.",
            ComponentKind::CullNth => "Removes every Nth item.",
            ComponentKind::InsertItems => "Inserts items at the given indices.",
            ComponentKind::ListItem => "Picks one item from a list.",
            ComponentKind::Duplicate => "Repeats a list a number of times.",
            ComponentKind::ListLength => "Counts the items in each list.",
            ComponentKind::Number => "A number, usually entered by the user.",
            ComponentKind::Text => "A piece of text, usually entered by the user.",
            ComponentKind::Series => "Builds an arithmetic series from a start, step and count.",
            ComponentKind::Add => "Adds A and B.",
            ComponentKind::Subtract => "Subtracts B from A.",
            ComponentKind::Script => {
                "Evaluates a Rhai script once per item.\n\
                 The script sees x and y, or defines fn calc(x, y)."
            }
            ComponentKind::Template => {
                "Generates code from a template and runs it on the calculation backend.\n\
                 Outputs hold the names of the resulting variables."
            }
        }
    }
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// The calculation strategy of one component instance.
#[derive(Debug, Clone)]
pub enum Behavior {
    Tree(TreeOp),
    List(ListOp),
    Value(ValueOp),
    Script(ScriptComponent),
    Template(TemplateComponent),
}

impl Behavior {
    pub fn kind(&self) -> ComponentKind {
        match self {
            Behavior::Tree(TreeOp::Graft) => ComponentKind::Graft,
            Behavior::Tree(TreeOp::Flatten) => ComponentKind::Flatten,
            Behavior::Tree(TreeOp::Remap) => ComponentKind::Remap,
            Behavior::List(op) => match op {
                ListOp::Shift => ComponentKind::Shift,
                ListOp::CullIndex => ComponentKind::CullIndex,
                ListOp::CullPattern => ComponentKind::CullPattern,
                ListOp::CullNth => ComponentKind::CullNth,
                ListOp::InsertItems => ComponentKind::InsertItems,
                ListOp::ListItem => ComponentKind::ListItem,
                ListOp::Duplicate => ComponentKind::Duplicate,
                ListOp::ListLength => ComponentKind::ListLength,
            },
            Behavior::Value(op) => match op {
                ValueOp::Number => ComponentKind::Number,
                ValueOp::Text => ComponentKind::Text,
                ValueOp::Series => ComponentKind::Series,
                ValueOp::Add => ComponentKind::Add,
                ValueOp::Subtract => ComponentKind::Subtract,
            },
            Behavior::Script(_) => ComponentKind::Script,
            Behavior::Template(_) => ComponentKind::Template,
        }
    }

    /// `componentType` written to project files.
    pub fn type_name(&self) -> &str {
        match self {
            Behavior::Template(t) => &t.definition().function_name,
            other => other.kind().type_name(),
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Behavior::Template(t) => t.definition().display_name(),
            other => other.kind().display_name(),
        }
    }

    pub fn inputs(&self) -> Vec<PortDescriptor> {
        match self {
            Behavior::Tree(op) => op.inputs(),
            Behavior::List(op) => op.inputs(),
            Behavior::Value(op) => op.inputs(),
            Behavior::Script(_) => ScriptComponent::inputs(),
            Behavior::Template(t) => t.inputs(),
        }
    }

    pub fn outputs(&self) -> Vec<PortDescriptor> {
        match self {
            Behavior::Tree(op) => op.outputs(),
            Behavior::List(op) => op.outputs(),
            Behavior::Value(op) => op.outputs(),
            Behavior::Script(_) => ScriptComponent::outputs(),
            Behavior::Template(t) => t.outputs(),
        }
    }

    pub fn is_whole_tree(&self) -> bool {
        matches!(self, Behavior::Tree(_))
    }

    /// Whole-tree calculation: one tree per output.
    pub fn transform(&self, inputs: &[DataTree]) -> Result<Vec<DataTree>> {
        match self {
            Behavior::Tree(op) => op.transform(inputs),
            other => Err(FlowError::Graph(GraphError::Calculation {
                component: crate::graph::ComponentId::INVALID,
                message: format!("{} calculates per item", other.display_name()),
            })),
        }
    }

    /// Per-item calculation, called by the matcher once per aligned item.
    pub fn calculate(&mut self, args: &[Value]) -> Calculation {
        match self {
            Behavior::Tree(_) => Calculation::err("whole-tree components do not calculate per item"),
            Behavior::List(op) => Calculation::Ready(op.calculate(args)),
            Behavior::Value(op) => Calculation::Ready(op.calculate(args)),
            Behavior::Script(script) => Calculation::Ready(script.calculate(args)),
            Behavior::Template(template) => template.calculate(args),
        }
    }
}

/// Builds component behaviors by type name.
#[derive(Debug, Clone)]
pub struct ComponentRegistry {
    templates: HashMap<String, Arc<TemplateDefinition>>,
    backend: Option<Arc<dyn CalculationBackend>>,
    engine: Arc<ScriptEngine>,
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new(&ScriptLimits::default())
    }
}

impl ComponentRegistry {
    pub fn new(limits: &ScriptLimits) -> Self {
        Self {
            templates: HashMap::new(),
            backend: None,
            engine: Arc::new(ScriptEngine::with_limits(limits)),
        }
    }

    pub fn set_backend(&mut self, backend: Arc<dyn CalculationBackend>) {
        self.backend = Some(backend);
    }

    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    pub fn script_engine(&self) -> &Arc<ScriptEngine> {
        &self.engine
    }

    /// Register a template definition under its function name.
    ///
    /// Built-in type names cannot be shadowed. Registering the same name
    /// twice replaces the earlier definition.
    pub fn register_template(&mut self, definition: TemplateDefinition) -> Result<()> {
        definition.validate()?;
        if ComponentKind::from_type_name(&definition.function_name).is_some() {
            return Err(FlowError::Template(format!(
                "{} is a built-in component type",
                definition.function_name
            )));
        }
        tracing::debug!("Registered template component {}", definition.function_name);
        self.templates
            .insert(definition.function_name.clone(), Arc::new(definition));
        Ok(())
    }

    /// Register every definition in a JSON array. Returns how many were added.
    pub fn register_templates_from_json(&mut self, json: &str) -> Result<usize> {
        let definitions: Vec<TemplateDefinition> = serde_json::from_str(json)?;
        let count = definitions.len();
        for definition in definitions {
            self.register_template(definition)?;
        }
        Ok(count)
    }

    pub fn template(&self, name: &str) -> Option<&TemplateDefinition> {
        self.templates.get(name).map(Arc::as_ref)
    }

    /// Every type name the registry can build, built-ins first.
    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = ComponentKind::all()
            .iter()
            .filter(|k| **k != ComponentKind::Template)
            .map(|k| k.type_name().to_string())
            .collect();
        let mut templates: Vec<String> = self.templates.keys().cloned().collect();
        templates.sort();
        names.extend(templates);
        names
    }

    /// Create a behavior for a built-in kind.
    pub fn create_kind(&self, kind: ComponentKind) -> Result<Behavior> {
        let behavior = match kind {
            ComponentKind::Graft => Behavior::Tree(TreeOp::Graft),
            ComponentKind::Flatten => Behavior::Tree(TreeOp::Flatten),
            ComponentKind::Remap => Behavior::Tree(TreeOp::Remap),
            ComponentKind::Shift => Behavior::List(ListOp::Shift),
            ComponentKind::CullIndex => Behavior::List(ListOp::CullIndex),
            ComponentKind::CullPattern => Behavior::List(ListOp::CullPattern),
            ComponentKind::CullNth => Behavior::List(ListOp::CullNth),
            ComponentKind::InsertItems => Behavior::List(ListOp::InsertItems),
            ComponentKind::ListItem => Behavior::List(ListOp::ListItem),
            ComponentKind::Duplicate => Behavior::List(ListOp::Duplicate),
            ComponentKind::ListLength => Behavior::List(ListOp::ListLength),
            ComponentKind::Number => Behavior::Value(ValueOp::Number),
            ComponentKind::Text => Behavior::Value(ValueOp::Text),
            ComponentKind::Series => Behavior::Value(ValueOp::Series),
            ComponentKind::Add => Behavior::Value(ValueOp::Add),
            ComponentKind::Subtract => Behavior::Value(ValueOp::Subtract),
            ComponentKind::Script => Behavior::Script(ScriptComponent::new(self.engine.clone())),
            ComponentKind::Template => {
                return Err(FlowError::Template(
                    "template components are created by function name".to_string(),
                ))
            }
        };
        Ok(behavior)
    }

    /// Create a behavior from a project file's `componentType`.
    pub fn create(&self, type_name: &str) -> Result<Behavior> {
        if let Some(kind) = ComponentKind::from_type_name(type_name) {
            return self.create_kind(kind);
        }
        let definition = self
            .templates
            .get(type_name)
            .ok_or_else(|| GraphError::UnknownComponentType(type_name.to_string()))?;
        let backend = self.backend.clone().ok_or_else(|| {
            FlowError::Backend(format!(
                "{} needs a calculation backend, none is configured",
                type_name
            ))
        })?;
        Ok(Behavior::Template(TemplateComponent::new(
            definition.clone(),
            backend,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct NullKernel;

    impl CalculationBackend for NullKernel {
        fn execute(&self, _code: String) -> BackendFuture {
            Box::pin(async { Ok(()) })
        }
    }

    const TEMPLATES: &str = r#"[{
        "functionName": "mean",
        "componentPrettyName": "Mean",
        "inputs": [{"shortName": "L", "type": 2, "interpretAs": 1}],
        "outputs": [{"shortName": "M", "type": 0}],
        "template": "<%= RESULT %> = np.mean(<%= IN_L %>)"
    }]"#;

    #[test]
    fn test_type_names_round_trip() {
        for kind in ComponentKind::all() {
            if *kind == ComponentKind::Template {
                assert_eq!(ComponentKind::from_type_name(kind.type_name()), None);
            } else {
                assert_eq!(ComponentKind::from_type_name(kind.type_name()), Some(*kind));
            }
        }
    }

    #[test]
    fn test_create_builtin() {
        let registry = ComponentRegistry::default();
        let behavior = registry.create("addition").unwrap();
        assert_eq!(behavior.kind(), ComponentKind::Add);
        assert_eq!(behavior.inputs().len(), 2);
        assert!(!behavior.is_whole_tree());
        assert!(registry.create("graft").unwrap().is_whole_tree());

        let err = registry.create("fourier").unwrap_err();
        assert!(matches!(
            err,
            FlowError::Graph(GraphError::UnknownComponentType(_))
        ));
    }

    #[test]
    fn test_templates_need_a_backend() {
        let mut registry = ComponentRegistry::default();
        assert_eq!(registry.register_templates_from_json(TEMPLATES).unwrap(), 1);
        assert!(matches!(registry.create("mean"), Err(FlowError::Backend(_))));

        registry.set_backend(Arc::new(NullKernel));
        let behavior = registry.create("mean").unwrap();
        assert_eq!(behavior.kind(), ComponentKind::Template);
        assert_eq!(behavior.type_name(), "mean");
        assert_eq!(behavior.inputs()[0].interpret_as, crate::types::InterpretAs::List);
        assert!(registry.type_names().contains(&"mean".to_string()));
    }

    #[test]
    fn test_builtin_names_cannot_be_shadowed() {
        let mut registry = ComponentRegistry::default();
        let mut definition = registry_definition();
        definition.function_name = "series".to_string();
        assert!(registry.register_template(definition).is_err());
    }

    fn registry_definition() -> TemplateDefinition {
        let mut definitions: Vec<TemplateDefinition> = serde_json::from_str(TEMPLATES).unwrap();
        definitions.remove(0)
    }

    #[test]
    fn test_per_item_dispatch() {
        let registry = ComponentRegistry::default();
        let mut behavior = registry.create("subtraction").unwrap();
        match behavior.calculate(&[Value::from(5), Value::from(3)]) {
            Calculation::Ready(Ok(record)) => assert_eq!(record["N"], Value::from(2.0)),
            other => panic!("unexpected {:?}", other),
        }
        assert!(behavior.transform(&[]).is_err());
    }
}
