//! Project files.
//!
//! A project is a JSON document listing every component with its ports,
//! the user data stored on them and the ids of the ports they connect to.
//! Ids in the file become the runtime ids of the loaded graph, and the
//! allocator is seeded above the highest one so later additions never reuse
//! a persisted id.
//!
//! Loading happens in three passes: create every component, evaluate it and
//! restore output data, then connect. Connections are made last because a
//! record may reference ports of components further down the file.

use crate::components::ComponentRegistry;
use crate::config::EngineConfig;
use crate::error::{FlowError, Result, ResultExt};
use crate::graph::component::Position;
use crate::graph::id::{ComponentId, IdAllocator, InputId, OutputId};
use crate::graph::{Graph, GraphError, PortDescriptor};
use crate::tree::{DataTree, FlatMap};
use crate::types::{DataType, InterpretAs};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectFile {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author_name: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub components: Vec<ComponentRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    pub component_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pretty_name: Option<String>,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub inputs: Vec<PortRecord>,
    #[serde(default, alias = "output")]
    pub outputs: Vec<PortRecord>,
}

/// One input or output. `connections` lists the ids of the peer ports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    pub short_name: String,
    #[serde(rename = "type", default)]
    pub data_type: DataType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpret_as: Option<InterpretAs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persisted_data: Option<FlatMap>,
    #[serde(default)]
    pub connections: Vec<u32>,
}

#[derive(Debug, Clone, Copy)]
enum Port {
    Input(InputId),
    Output(OutputId),
}

impl ProjectFile {
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            title: title.into(),
            description: String::new(),
            author_name: String::new(),
            created_at: now,
            updated_at: now,
            components: Vec::new(),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(FlowError::from)
            .with_context(|| format!("Failed to read project {:?}", path))?;
        let project: ProjectFile = serde_json::from_str(&content)
            .map_err(FlowError::from)
            .with_context(|| format!("Failed to parse project {:?}", path))?;
        tracing::info!(
            "Read project '{}' ({} components) from {:?}",
            project.title,
            project.components.len(),
            path
        );
        Ok(project)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .map_err(FlowError::from)
            .with_context(|| format!("Failed to write project {:?}", path))?;
        tracing::info!("Saved project '{}' to {:?}", self.title, path);
        Ok(())
    }

    /// Replace the component list with the current state of `graph`.
    pub fn capture(&mut self, graph: &Graph) {
        self.components = graph.to_records();
        self.updated_at = Utc::now();
    }

    /// Highest id used anywhere in the file.
    pub fn max_id(&self) -> Option<u32> {
        self.components
            .iter()
            .flat_map(|c| {
                c.id.into_iter().chain(
                    c.inputs
                        .iter()
                        .chain(c.outputs.iter())
                        .filter_map(|p| p.id),
                )
            })
            .max()
    }

    fn check_unique_ids(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for component in &self.components {
            let ports = component.inputs.iter().chain(component.outputs.iter());
            for id in component.id.into_iter().chain(ports.filter_map(|p| p.id)) {
                if !seen.insert(id) {
                    return Err(GraphError::DuplicateId(id).into());
                }
            }
        }
        Ok(())
    }
}

impl Graph {
    /// Build a graph from a project file.
    pub fn from_project(
        project: &ProjectFile,
        config: EngineConfig,
        registry: ComponentRegistry,
    ) -> Result<Graph> {
        project.check_unique_ids()?;
        let ids = project
            .max_id()
            .map_or_else(IdAllocator::new, IdAllocator::seeded_above);
        let mut graph = Graph::with_allocator(config, registry, ids);

        let mut ports: HashMap<u32, Port> = HashMap::new();
        let mut created = Vec::with_capacity(project.components.len());
        for record in &project.components {
            let id = graph
                .create_from_record(record, &mut ports)
                .with_context(|| {
                    format!(
                        "Failed to create {} component {:?}",
                        record.component_type, record.id
                    )
                })?;
            created.push((id, record));
        }

        for (id, record) in &created {
            graph.handle_input_change(*id, None);
            graph.restore_output_data(*id, record)?;
        }

        for (output, input) in connection_pairs(project, &ports) {
            graph
                .connect_additional(output, input)
                .map_err(FlowError::from)
                .with_context(|| format!("Failed to connect {} -> {}", output, input))?;
        }

        tracing::info!(
            "Loaded project '{}' with {} components, next id {}",
            project.title,
            graph.len(),
            graph.ids.peek()
        );
        Ok(graph)
    }

    fn create_from_record(
        &mut self,
        record: &ComponentRecord,
        ports: &mut HashMap<u32, Port>,
    ) -> Result<ComponentId> {
        let behavior = self.registry.create(&record.component_type)?;
        let id = record
            .id
            .map(ComponentId)
            .unwrap_or_else(|| self.ids.component());

        let inputs = behavior.inputs();
        let outputs = behavior.outputs();
        warn_unknown_ports(id, "input", &record.inputs, &inputs);
        warn_unknown_ports(id, "output", &record.outputs, &outputs);

        let mut input_ids = Vec::with_capacity(inputs.len());
        for descriptor in &inputs {
            let saved = find_port(&record.inputs, descriptor.name());
            check_type(id, descriptor.name(), descriptor.data_type, saved);
            let input_id = saved
                .and_then(|p| p.id)
                .map(InputId)
                .unwrap_or_else(|| self.ids.input());
            if let Some(raw) = saved.and_then(|p| p.id) {
                ports.insert(raw, Port::Input(input_id));
            }
            input_ids.push(input_id);
        }

        let mut output_ids = Vec::with_capacity(outputs.len());
        for descriptor in &outputs {
            let saved = find_port(&record.outputs, descriptor.name());
            check_type(id, descriptor.name(), descriptor.data_type, saved);
            let output_id = saved
                .and_then(|p| p.id)
                .map(OutputId)
                .unwrap_or_else(|| self.ids.output());
            if let Some(raw) = saved.and_then(|p| p.id) {
                ports.insert(raw, Port::Output(output_id));
            }
            output_ids.push(output_id);
        }

        self.insert_component(id, behavior, input_ids.clone(), output_ids);
        if let Some(component) = self.components.get_mut(&id) {
            component.pretty_name = record.pretty_name.clone();
            component.position = record.position;
        }

        for (input_id, descriptor) in input_ids.iter().zip(&inputs) {
            let Some(saved) = find_port(&record.inputs, descriptor.name()) else {
                continue;
            };
            let Some(input) = self.inputs.get_mut(input_id) else {
                continue;
            };
            if let Some(required) = saved.required {
                input.descriptor.required = required;
            }
            if let Some(interpret_as) = saved.interpret_as {
                input.descriptor.interpret_as = interpret_as;
            }
            if let Some(flat) = &saved.persisted_data {
                input.persisted = Some(DataTree::from_flat_map(flat)?);
            }
            input.merge(std::iter::empty());
        }
        Ok(id)
    }

    fn restore_output_data(&mut self, id: ComponentId, record: &ComponentRecord) -> Result<()> {
        let Some(component) = self.components.get(&id) else {
            return Ok(());
        };
        for output_id in &component.outputs {
            let Some(output) = self.outputs.get_mut(output_id) else {
                continue;
            };
            let flat = find_port(&record.outputs, output.short_name())
                .and_then(|p| p.persisted_data.as_ref());
            if let Some(flat) = flat {
                output.assign_persisted(DataTree::from_flat_map(flat)?);
            }
        }
        Ok(())
    }

    /// Records for every component, in the order they were added.
    pub fn to_records(&self) -> Vec<ComponentRecord> {
        self.components()
            .map(|component| ComponentRecord {
                id: Some(component.id.raw()),
                component_type: component.type_name().to_string(),
                pretty_name: component.pretty_name.clone(),
                position: component.position,
                inputs: component
                    .inputs
                    .iter()
                    .filter_map(|i| self.inputs.get(i))
                    .map(|input| PortRecord {
                        id: Some(input.id.raw()),
                        short_name: input.short_name().to_string(),
                        data_type: input.descriptor.data_type,
                        required: Some(input.descriptor.required),
                        interpret_as: Some(input.descriptor.interpret_as),
                        persisted_data: input.persisted.as_ref().map(DataTree::to_flat_map),
                        connections: input.connections.iter().map(|o| o.raw()).collect(),
                    })
                    .collect(),
                outputs: component
                    .outputs
                    .iter()
                    .filter_map(|o| self.outputs.get(o))
                    .map(|output| PortRecord {
                        id: Some(output.id.raw()),
                        short_name: output.short_name().to_string(),
                        data_type: output.descriptor.data_type,
                        required: None,
                        interpret_as: Some(output.descriptor.interpret_as),
                        persisted_data: output.persisted().map(DataTree::to_flat_map),
                        connections: output.subscribers.iter().map(|i| i.raw()).collect(),
                    })
                    .collect(),
            })
            .collect()
    }
}

fn find_port<'a>(records: &'a [PortRecord], name: &str) -> Option<&'a PortRecord> {
    records.iter().find(|p| p.short_name == name)
}

fn check_type(component: ComponentId, name: &str, declared: DataType, saved: Option<&PortRecord>) {
    if let Some(saved) = saved {
        if saved.data_type != declared {
            tracing::warn!(
                "{} port {} was saved as {} but is declared {}, using {}",
                component,
                name,
                saved.data_type,
                declared,
                declared
            );
        }
    }
}

fn warn_unknown_ports(
    component: ComponentId,
    kind: &str,
    records: &[PortRecord],
    declared: &[PortDescriptor],
) {
    for record in records {
        if !declared.iter().any(|d| d.name() == record.short_name) {
            tracing::warn!(
                "{} has no {} named {}, skipping its saved data",
                component,
                kind,
                record.short_name
            );
        }
    }
}

/// Every `(output, input)` pair recorded on either side, in file order, once.
fn connection_pairs(project: &ProjectFile, ports: &HashMap<u32, Port>) -> Vec<(OutputId, InputId)> {
    let mut pairs = Vec::new();
    let mut seen = HashSet::new();
    let mut push = |pair: (OutputId, InputId)| {
        if seen.insert(pair) {
            pairs.push(pair);
        }
    };

    for component in &project.components {
        for record in &component.inputs {
            let Some(Port::Input(input)) = record.id.and_then(|id| ports.get(&id).copied()) else {
                continue;
            };
            for peer in &record.connections {
                match ports.get(peer) {
                    Some(Port::Output(output)) => push((*output, input)),
                    _ => tracing::warn!("Input {} references unknown output {}, skipping", input, peer),
                }
            }
        }
        for record in &component.outputs {
            let Some(Port::Output(output)) = record.id.and_then(|id| ports.get(&id).copied()) else {
                continue;
            };
            for peer in &record.connections {
                match ports.get(peer) {
                    Some(Port::Input(input)) => push((output, *input)),
                    _ => tracing::warn!("Output {} references unknown input {}, skipping", output, peer),
                }
            }
        }
    }
    pairs
}
