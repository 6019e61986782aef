//! Two-phase change propagation.
//!
//! A pulse first walks everything reachable from its origin without
//! calculating anything (discovery), counting how many times each component
//! will be reached. It then walks again (recalculation); a component only
//! calculates once every expected delivery has arrived, so a component at
//! the bottom of a diamond runs once per change instead of once per path.
//!
//! The pulse only keeps counters. [`Graph`](crate::graph::Graph) drives the
//! walk and reports each visit.
//!
//! ```text
//! Discovery ──(closed == opened)──> Recalculation ──> Completed
//!     │                                   │
//!     └──────────── cancel() ─────────────┴──> Cancelled
//! ```

use crate::graph::{ComponentId, InputId, OutputId, PulseId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Where a pulse started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PulseOrigin {
    /// User data changed on an input; its owning component is already one open path.
    Input(InputId),
    /// An output's data changed.
    Output(OutputId),
    /// A component produced results outside a pulse (deferred calculation).
    Component(ComponentId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseState {
    Discovery,
    Recalculation,
    Completed,
    Cancelled,
}

/// Cloneable handle that stops a pulse from anywhere.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of one discovery visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryVisit {
    /// First time this component was reached; only then is the pulse forwarded.
    pub first: bool,
    /// Every opened path is closed; recalculation may begin.
    pub complete: bool,
}

#[derive(Debug)]
pub struct Pulse {
    id: PulseId,
    origin: PulseOrigin,
    state: PulseState,
    paths_opened: usize,
    paths_closed: usize,
    hits: HashMap<ComponentId, usize>,
    cancel: CancelToken,
}

impl Pulse {
    /// Start a pulse. `fan_out` is the number of inputs subscribed to the
    /// origin (ignored for input origins).
    pub fn new(id: PulseId, origin: PulseOrigin, fan_out: usize) -> Self {
        let paths_opened = match origin {
            PulseOrigin::Input(_) => 1,
            PulseOrigin::Output(_) | PulseOrigin::Component(_) => fan_out,
        };
        let mut pulse = Self {
            id,
            origin,
            state: PulseState::Discovery,
            paths_opened,
            paths_closed: 0,
            hits: HashMap::new(),
            cancel: CancelToken::default(),
        };
        if paths_opened == 0 {
            pulse.begin_recalculation();
        }
        pulse
    }

    pub fn id(&self) -> PulseId {
        self.id
    }

    pub fn origin(&self) -> PulseOrigin {
        self.origin
    }

    pub fn state(&self) -> PulseState {
        if self.cancel.is_cancelled() {
            PulseState::Cancelled
        } else {
            self.state
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.state() == PulseState::Cancelled
    }

    pub fn cancel(&mut self) {
        tracing::debug!("Pulse {} cancelled", self.id);
        self.cancel.cancel();
        self.state = PulseState::Cancelled;
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn paths_opened(&self) -> usize {
        self.paths_opened
    }

    pub fn paths_closed(&self) -> usize {
        self.paths_closed
    }

    /// Deliveries still expected at `component` during recalculation.
    pub fn hits(&self, component: ComponentId) -> usize {
        self.hits.get(&component).copied().unwrap_or(0)
    }

    /// Record that discovery reached `component`, which feeds `fan_out` inputs.
    pub fn visit_discovery(&mut self, component: ComponentId, fan_out: usize) -> DiscoveryVisit {
        self.paths_closed += 1;
        let first = match self.hits.get_mut(&component) {
            Some(hits) => {
                *hits += 1;
                false
            }
            None => {
                self.hits.insert(component, 1);
                self.paths_opened += fan_out;
                true
            }
        };
        let complete = self.paths_closed == self.paths_opened;
        if complete {
            self.begin_recalculation();
        }
        DiscoveryVisit { first, complete }
    }

    /// Record a recalculation delivery. Returns true when `component` has
    /// received every delivery and should calculate now.
    pub fn visit_recalculation(&mut self, component: ComponentId) -> bool {
        match self.hits.get_mut(&component) {
            Some(hits) if *hits > 0 => {
                *hits -= 1;
                *hits == 0
            }
            _ => false,
        }
    }

    fn begin_recalculation(&mut self) {
        if self.state == PulseState::Discovery {
            tracing::debug!(
                "Pulse {} discovered {} paths, recalculating",
                self.id,
                self.paths_opened
            );
            self.state = PulseState::Recalculation;
        }
    }

    pub(crate) fn complete(&mut self) {
        if self.state == PulseState::Recalculation {
            self.state = PulseState::Completed;
        }
    }
}
