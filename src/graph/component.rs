//! Components: a behavior plus the ports wired around it.

use crate::components::Behavior;
use crate::graph::id::{ComponentId, InputId, OutputId};
use crate::matcher::CalculationError;
use crate::types::Sufficiency;
use serde::{Deserialize, Serialize};

/// Editor position, kept only so projects round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone)]
pub struct Component {
    pub(crate) id: ComponentId,
    pub(crate) behavior: Behavior,
    pub(crate) pretty_name: Option<String>,
    pub(crate) position: Position,
    pub(crate) inputs: Vec<InputId>,
    pub(crate) outputs: Vec<OutputId>,
    pub(crate) sufficiency: Sufficiency,
    /// Bumped on every calculation; deferred results carry the value they started with.
    pub(crate) generation: u64,
    pub(crate) last_errors: Vec<CalculationError>,
}

impl Component {
    pub(crate) fn new(id: ComponentId, behavior: Behavior) -> Self {
        Self {
            id,
            behavior,
            pretty_name: None,
            position: Position::default(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            sufficiency: Sufficiency::False,
            generation: 0,
            last_errors: Vec::new(),
        }
    }

    pub fn id(&self) -> ComponentId {
        self.id
    }

    pub fn behavior(&self) -> &Behavior {
        &self.behavior
    }

    pub fn type_name(&self) -> &str {
        self.behavior.type_name()
    }

    /// The user's name for this instance, falling back to the type's display name.
    pub fn name(&self) -> &str {
        self.pretty_name
            .as_deref()
            .unwrap_or_else(|| self.behavior.display_name())
    }

    pub fn pretty_name(&self) -> Option<&str> {
        self.pretty_name.as_deref()
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn inputs(&self) -> &[InputId] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[OutputId] {
        &self.outputs
    }

    pub fn sufficiency(&self) -> Sufficiency {
        self.sufficiency
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Row errors from the most recent calculation.
    pub fn errors(&self) -> &[CalculationError] {
        &self.last_errors
    }
}
