//! Graph-specific error types.

use crate::graph::id::{ComponentId, InputId, OutputId};
use crate::types::DataType;
use thiserror::Error;

/// Structural errors raised by graph edits and project loading.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("Unknown component {0}")]
    UnknownComponent(ComponentId),

    #[error("Unknown input {0}")]
    UnknownInput(InputId),

    #[error("Unknown output {0}")]
    UnknownOutput(OutputId),

    #[error("Component {component} has no port named '{name}'")]
    UnknownPort { component: ComponentId, name: String },

    #[error("Unknown component type '{0}'")]
    UnknownComponentType(String),

    #[error("Cannot connect {output} ({output_type}) to {input} ({input_type})")]
    TypeMismatch {
        output: OutputId,
        output_type: DataType,
        input: InputId,
        input_type: DataType,
    },

    #[error("Cycle detected: connecting {output} to {input} would feed a component into itself")]
    CycleDetected { output: OutputId, input: InputId },

    #[error("Identifier {0} is used more than once")]
    DuplicateId(u32),

    #[error("Component {component} failed: {message}")]
    Calculation {
        component: ComponentId,
        message: String,
    },
}

pub type GraphResult<T> = std::result::Result<T, GraphError>;
