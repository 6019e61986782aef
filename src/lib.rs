//! # treeflow: Dataflow Engine for Node Graphs
//!
//! The execution engine behind a visual node/wire programming environment.
//! Components are wired output to input; every port carries a [`DataTree`],
//! a collection of value lists addressed by integer paths.
//!
//! ## Architecture
//!
//! - **Tree**: Path-addressed value storage with flatten, graft and remap
//! - **Pulse**: Two-phase change propagation, so every component calculates
//!   once per change no matter how many paths reach it
//! - **Matcher**: Aligns differently shaped inputs into per-item calculations
//! - **Graph**: Components, ports, wiring, events and project files
//! - **Components**: The closed catalog of behaviors, including Rhai scripts
//!   and code templates run on an external backend
//!
//! ## Configuration
//!
//! Engine settings are read from `engine.toml` in the platform config
//! directory under `treeflow` (see [`config`]), or from `TREEFLOW_CONFIG`.
//!
//! ## Example
//!
//! ```ignore
//! use treeflow::{components::Behavior, components::ValueOp, Graph, DataTree, Value};
//!
//! let mut graph = Graph::default();
//! let a = graph.add_component(Behavior::Value(ValueOp::Number));
//! let add = graph.add_component(Behavior::Value(ValueOp::Add));
//!
//! let out = graph.output_by_name(a, "N")?;
//! graph.assign_output_data(out, DataTree::from_values(vec![Value::from(1), Value::from(2)]))?;
//! graph.connect(out, graph.input_by_name(add, "A")?)?;
//! graph.connect(out, graph.input_by_name(add, "B")?)?;
//!
//! let sums = graph.output_value(graph.output_by_name(add, "N")?);
//! ```

pub mod components;
pub mod config;
pub mod error;
pub mod graph;
pub mod matcher;
pub mod pulse;
pub mod resource;
pub mod scripting;
pub mod tree;
pub mod types;
pub mod value;

// Re-export commonly used types
pub use components::{Behavior, CalculationBackend, ComponentKind, ComponentRegistry};
pub use config::EngineConfig;
pub use error::{FlowError, Result};
pub use graph::{ComponentId, Graph, GraphEvent, InputId, OutputId, ProjectFile, PulseReport};
pub use pulse::{Pulse, PulseOrigin, PulseState};
pub use resource::{Resource, ResourceHandle};
pub use tree::{DataTree, TreePath};
pub use types::{DataType, InterpretAs, Sufficiency};
pub use value::{Record, Value};
