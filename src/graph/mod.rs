//! The live component graph.
//!
//! A [`Graph`] owns every component together with its inputs and outputs and
//! moves data between them with pulses. Edits made through the graph
//! (connecting, disconnecting, assigning user data, removing components)
//! each start one pulse; the pulse runs to completion before the call
//! returns. Calculations that are handed to an external backend are queued
//! and finished later by [`Graph::settle`].
//!
//! # Propagation
//!
//! ```text
//!   edit ──> start_pulse ──> discovery (count deliveries per component)
//!                               │
//!                               v
//!                          recalculation (merge inputs, calculate when
//!                               │          every delivery has arrived)
//!                               v
//!                          PulseCompleted event
//! ```

mod component;
mod error;
mod events;
mod id;
mod input;
mod output;
mod port;
pub mod project;

pub use component::{Component, Position};
pub use error::{GraphError, GraphResult};
pub use events::GraphEvent;
pub use id::{ComponentId, IdAllocator, InputId, OutputId, PulseId};
pub use input::Input;
pub use output::Output;
pub use port::PortDescriptor;
pub use project::{ComponentRecord, PortRecord, ProjectFile};

use crate::components::{Behavior, ComponentRegistry};
use crate::config::{EngineConfig, StaleResultPolicy};
use crate::error::Result;
use crate::matcher::{self, CalculationError, MatchInput, MatchOutput, MatchResult, PendingMatch};
use crate::pulse::{Pulse, PulseOrigin, PulseState};
use crate::tree::{DataTree, TreePath};
use crate::types::Sufficiency;
use crossbeam_channel::Receiver;
use events::EventBus;
use std::collections::{HashMap, HashSet, VecDeque};

/// Outcome of one pulse.
#[derive(Debug, Clone, PartialEq)]
pub struct PulseReport {
    pub pulse: PulseId,
    pub origin: PulseOrigin,
    pub state: PulseState,
    /// Components that calculated, in the order they did.
    pub recalculated: Vec<ComponentId>,
}

impl PulseReport {
    /// How many times `component` calculated during this pulse.
    pub fn calculations(&self, component: ComponentId) -> usize {
        self.recalculated.iter().filter(|c| **c == component).count()
    }
}

/// A deferred per-item calculation waiting for [`Graph::settle`].
struct PendingWork {
    component: ComponentId,
    generation: u64,
    work: PendingMatch,
}

pub struct Graph {
    components: HashMap<ComponentId, Component>,
    /// Insertion order, used for every iteration over components.
    order: Vec<ComponentId>,
    inputs: HashMap<InputId, Input>,
    outputs: HashMap<OutputId, Output>,
    ids: IdAllocator,
    next_pulse: u32,
    events: EventBus,
    pending: VecDeque<PendingWork>,
    registry: ComponentRegistry,
    config: EngineConfig,
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("components", &self.order.len())
            .field("inputs", &self.inputs.len())
            .field("outputs", &self.outputs.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Graph {
    pub fn new(config: EngineConfig) -> Self {
        let registry = ComponentRegistry::new(&config.script);
        Self::with_registry(config, registry)
    }

    pub fn with_registry(config: EngineConfig, registry: ComponentRegistry) -> Self {
        Self::with_allocator(config, registry, IdAllocator::new())
    }

    pub(crate) fn with_allocator(
        config: EngineConfig,
        registry: ComponentRegistry,
        ids: IdAllocator,
    ) -> Self {
        Self {
            components: HashMap::new(),
            order: Vec::new(),
            inputs: HashMap::new(),
            outputs: HashMap::new(),
            ids,
            next_pulse: 0,
            events: EventBus::default(),
            pending: VecDeque::new(),
            registry,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ComponentRegistry {
        &mut self.registry
    }

    /// Receive every [`GraphEvent`] from now on.
    pub fn subscribe(&mut self) -> Receiver<GraphEvent> {
        self.events.subscribe()
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn component(&self, id: ComponentId) -> Option<&Component> {
        self.components.get(&id)
    }

    /// Components in the order they were added.
    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.order.iter().filter_map(|id| self.components.get(id))
    }

    pub fn input(&self, id: InputId) -> Option<&Input> {
        self.inputs.get(&id)
    }

    pub fn output(&self, id: OutputId) -> Option<&Output> {
        self.outputs.get(&id)
    }

    pub fn output_value(&self, id: OutputId) -> Option<&DataTree> {
        self.outputs.get(&id).map(Output::value)
    }

    pub fn sufficiency(&self, id: ComponentId) -> Option<Sufficiency> {
        self.components.get(&id).map(Component::sufficiency)
    }

    pub fn input_by_name(&self, component: ComponentId, name: &str) -> GraphResult<InputId> {
        let c = self
            .components
            .get(&component)
            .ok_or(GraphError::UnknownComponent(component))?;
        c.inputs
            .iter()
            .copied()
            .find(|i| self.inputs.get(i).is_some_and(|i| i.short_name() == name))
            .ok_or_else(|| GraphError::UnknownPort {
                component,
                name: name.to_string(),
            })
    }

    pub fn output_by_name(&self, component: ComponentId, name: &str) -> GraphResult<OutputId> {
        let c = self
            .components
            .get(&component)
            .ok_or(GraphError::UnknownComponent(component))?;
        c.outputs
            .iter()
            .copied()
            .find(|o| self.outputs.get(o).is_some_and(|o| o.short_name() == name))
            .ok_or_else(|| GraphError::UnknownPort {
                component,
                name: name.to_string(),
            })
    }

    // ------------------------------------------------------------------
    // Components
    // ------------------------------------------------------------------

    /// Add a component and evaluate it once.
    pub fn add_component(&mut self, behavior: Behavior) -> ComponentId {
        let id = self.ids.component();
        let inputs = behavior.inputs().iter().map(|_| self.ids.input()).collect();
        let outputs = behavior.outputs().iter().map(|_| self.ids.output()).collect();
        self.insert_component(id, behavior, inputs, outputs);
        self.handle_input_change(id, None);
        id
    }

    /// Create a component by type name through the registry and add it.
    pub fn add_component_by_type(&mut self, type_name: &str) -> Result<ComponentId> {
        let behavior = self.registry.create(type_name)?;
        Ok(self.add_component(behavior))
    }

    /// Register a component under ids chosen by the caller. Ports get the
    /// given ids in declaration order. Nothing is evaluated.
    pub(crate) fn insert_component(
        &mut self,
        id: ComponentId,
        behavior: Behavior,
        input_ids: Vec<InputId>,
        output_ids: Vec<OutputId>,
    ) {
        let mut component = Component::new(id, behavior);
        for (descriptor, input_id) in component.behavior.inputs().into_iter().zip(input_ids) {
            self.inputs
                .insert(input_id, Input::new(input_id, id, descriptor));
            component.inputs.push(input_id);
        }
        for (descriptor, output_id) in component.behavior.outputs().into_iter().zip(output_ids) {
            self.outputs
                .insert(output_id, Output::new(output_id, id, descriptor));
            component.outputs.push(output_id);
        }
        tracing::debug!(
            "Added {} {} with {} inputs and {} outputs",
            component.type_name(),
            id,
            component.inputs.len(),
            component.outputs.len()
        );
        self.components.insert(id, component);
        self.order.push(id);
    }

    pub fn set_pretty_name(&mut self, id: ComponentId, name: Option<String>) -> GraphResult<()> {
        let component = self
            .components
            .get_mut(&id)
            .ok_or(GraphError::UnknownComponent(id))?;
        component.pretty_name = name;
        Ok(())
    }

    pub fn set_position(&mut self, id: ComponentId, position: Position) -> GraphResult<()> {
        let component = self
            .components
            .get_mut(&id)
            .ok_or(GraphError::UnknownComponent(id))?;
        component.position = position;
        Ok(())
    }

    /// Remove a component. Its outputs are destroyed and every input they
    /// fed is disconnected and pulsed.
    pub fn remove_component(&mut self, id: ComponentId) -> GraphResult<()> {
        let component = self
            .components
            .remove(&id)
            .ok_or(GraphError::UnknownComponent(id))?;
        self.order.retain(|c| *c != id);

        for input_id in &component.inputs {
            let Some(input) = self.inputs.remove(input_id) else {
                continue;
            };
            for output_id in input.connections {
                if let Some(output) = self.outputs.get_mut(&output_id) {
                    output.unsubscribe(*input_id);
                }
                self.events.emit(GraphEvent::Disconnected {
                    output: output_id,
                    input: *input_id,
                });
            }
        }

        let mut orphaned = Vec::new();
        for output_id in &component.outputs {
            let Some(mut output) = self.outputs.remove(output_id) else {
                continue;
            };
            output.destroy();
            for input_id in output.subscribers {
                if let Some(input) = self.inputs.get_mut(&input_id) {
                    input.detach(*output_id);
                }
                self.events.emit(GraphEvent::Disconnected {
                    output: *output_id,
                    input: input_id,
                });
                if !orphaned.contains(&input_id) {
                    orphaned.push(input_id);
                }
            }
        }

        let dropped = self.cancel_pending(id);
        self.events.emit(GraphEvent::Removed { component: id });
        tracing::info!(
            "Removed {} {} ({} inputs to re-pulse, {} pending calculations dropped)",
            component.behavior.type_name(),
            id,
            orphaned.len(),
            dropped
        );

        for input_id in orphaned {
            self.pulse(PulseOrigin::Input(input_id));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Wiring
    // ------------------------------------------------------------------

    /// Connect `output` to `input`, replacing whatever the input was connected to.
    pub fn connect(&mut self, output: OutputId, input: InputId) -> GraphResult<PulseReport> {
        self.validate_connection(output, input)?;
        let existing: Vec<OutputId> = self.inputs[&input]
            .connections
            .iter()
            .copied()
            .filter(|o| *o != output)
            .collect();
        for old in existing {
            self.unlink(old, input);
        }
        self.link(output, input);
        Ok(self.pulse(PulseOrigin::Input(input)))
    }

    /// Connect `output` to `input` next to its existing connections. The
    /// output becomes the most recently connected one.
    pub fn connect_additional(
        &mut self,
        output: OutputId,
        input: InputId,
    ) -> GraphResult<PulseReport> {
        self.validate_connection(output, input)?;
        self.link(output, input);
        Ok(self.pulse(PulseOrigin::Input(input)))
    }

    /// Disconnect `output` from `input`. Returns `None` when they were not connected.
    pub fn disconnect(
        &mut self,
        output: OutputId,
        input: InputId,
    ) -> GraphResult<Option<PulseReport>> {
        if !self.outputs.contains_key(&output) {
            return Err(GraphError::UnknownOutput(output));
        }
        let connected = self
            .inputs
            .get(&input)
            .ok_or(GraphError::UnknownInput(input))?
            .connections
            .contains(&output);
        if !connected {
            return Ok(None);
        }
        self.unlink(output, input);
        Ok(Some(self.pulse(PulseOrigin::Input(input))))
    }

    fn validate_connection(&self, output: OutputId, input: InputId) -> GraphResult<()> {
        let out = self
            .outputs
            .get(&output)
            .ok_or(GraphError::UnknownOutput(output))?;
        let inp = self
            .inputs
            .get(&input)
            .ok_or(GraphError::UnknownInput(input))?;

        if !inp.descriptor.data_type.accepts(out.descriptor.data_type) {
            return Err(GraphError::TypeMismatch {
                output,
                output_type: out.descriptor.data_type,
                input,
                input_type: inp.descriptor.data_type,
            });
        }
        if self.would_create_cycle(out.component, inp.component) {
            return Err(GraphError::CycleDetected { output, input });
        }
        Ok(())
    }

    /// Check if feeding `from` into `to` would create a cycle.
    fn would_create_cycle(&self, from: ComponentId, to: ComponentId) -> bool {
        // If `to` can already reach `from`, the new wire closes a loop.
        let mut visited = HashSet::new();
        let mut stack = vec![to];

        while let Some(current) = stack.pop() {
            if current == from {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            stack.extend(self.downstream(current).map(|(_, c)| c));
        }
        false
    }

    fn link(&mut self, output: OutputId, input: InputId) {
        if let Some(i) = self.inputs.get_mut(&input) {
            i.attach(output);
        }
        if let Some(o) = self.outputs.get_mut(&output) {
            o.subscribe(input);
        }
        self.events.emit(GraphEvent::Connected { output, input });
        tracing::info!("Connected {} -> {}", output, input);
    }

    fn unlink(&mut self, output: OutputId, input: InputId) {
        if let Some(i) = self.inputs.get_mut(&input) {
            i.detach(output);
        }
        if let Some(o) = self.outputs.get_mut(&output) {
            o.unsubscribe(input);
        }
        self.events.emit(GraphEvent::Disconnected { output, input });
        tracing::info!("Disconnected {} -> {}", output, input);
    }

    // ------------------------------------------------------------------
    // User data
    // ------------------------------------------------------------------

    /// Store user data on an input and pulse from it. Connected outputs
    /// still take precedence over the stored data.
    pub fn assign_input_data(&mut self, input: InputId, tree: DataTree) -> GraphResult<PulseReport> {
        let i = self
            .inputs
            .get_mut(&input)
            .ok_or(GraphError::UnknownInput(input))?;
        i.persisted = Some(tree);
        Ok(self.pulse(PulseOrigin::Input(input)))
    }

    pub fn clear_input_data(&mut self, input: InputId) -> GraphResult<PulseReport> {
        let i = self
            .inputs
            .get_mut(&input)
            .ok_or(GraphError::UnknownInput(input))?;
        i.persisted = None;
        Ok(self.pulse(PulseOrigin::Input(input)))
    }

    /// Store user data on an output and pulse from it. The data overrides
    /// whatever the component calculates until it is cleared.
    pub fn assign_output_data(
        &mut self,
        output: OutputId,
        tree: DataTree,
    ) -> GraphResult<PulseReport> {
        let o = self
            .outputs
            .get_mut(&output)
            .ok_or(GraphError::UnknownOutput(output))?;
        o.assign_persisted(tree);
        let component = o.component;
        self.events.emit(GraphEvent::ValueChanged {
            component,
            output,
            pulse: None,
        });
        Ok(self.pulse(PulseOrigin::Output(output)))
    }

    /// Drop the user data on an output, exposing its calculated value again.
    /// Returns `None` when there was nothing to clear.
    pub fn clear_output_data(&mut self, output: OutputId) -> GraphResult<Option<PulseReport>> {
        let o = self
            .outputs
            .get_mut(&output)
            .ok_or(GraphError::UnknownOutput(output))?;
        if !o.take_persisted() {
            return Ok(None);
        }
        let component = o.component;
        self.events.emit(GraphEvent::ValueChanged {
            component,
            output,
            pulse: None,
        });
        Ok(Some(self.pulse(PulseOrigin::Output(output))))
    }

    // ------------------------------------------------------------------
    // Pulses
    // ------------------------------------------------------------------

    /// Start and drive a pulse from `origin`.
    pub fn pulse(&mut self, origin: PulseOrigin) -> PulseReport {
        let mut pulse = self.start_pulse(origin);
        self.drive(&mut pulse)
    }

    /// Create a pulse without running it, so the caller can hold on to its
    /// cancel token first.
    pub fn start_pulse(&mut self, origin: PulseOrigin) -> Pulse {
        let id = PulseId(self.next_pulse);
        self.next_pulse = self.next_pulse.wrapping_add(1);
        let fan_out = self.deliveries_from(origin).len();
        Pulse::new(id, origin, fan_out)
    }

    /// Run discovery and recalculation for `pulse`.
    pub fn drive(&mut self, pulse: &mut Pulse) -> PulseReport {
        let origin = pulse.origin();
        let seed = self.deliveries_from(origin);

        let mut queue: VecDeque<ComponentId> = seed.iter().map(|(_, c)| *c).collect();
        while let Some(component) = queue.pop_front() {
            if pulse.is_cancelled() {
                break;
            }
            let fan_out = self.fan_out(component);
            if pulse.visit_discovery(component, fan_out).first {
                queue.extend(self.downstream(component).map(|(_, c)| c));
            }
        }

        let mut recalculated = Vec::new();
        let mut deliveries: VecDeque<(InputId, ComponentId)> = seed.into();
        while let Some((input, component)) = deliveries.pop_front() {
            if pulse.is_cancelled() {
                break;
            }
            self.refresh_input(input);
            if pulse.visit_recalculation(component) {
                self.handle_input_change(component, Some(pulse.id()));
                recalculated.push(component);
                deliveries.extend(self.downstream(component));
            }
        }

        pulse.complete();
        let report = PulseReport {
            pulse: pulse.id(),
            origin,
            state: pulse.state(),
            recalculated,
        };
        tracing::debug!(
            "Pulse {} from {:?} finished {:?}, {} components recalculated",
            report.pulse,
            origin,
            report.state,
            report.recalculated.len()
        );
        self.events.emit(GraphEvent::PulseCompleted {
            pulse: report.pulse,
            origin,
            state: report.state,
            recalculated: report.recalculated.len(),
        });
        report
    }

    /// First deliveries of a pulse: `(input, owning component)` pairs.
    fn deliveries_from(&self, origin: PulseOrigin) -> Vec<(InputId, ComponentId)> {
        match origin {
            PulseOrigin::Input(input) => self
                .inputs
                .get(&input)
                .map(|i| vec![(input, i.component)])
                .unwrap_or_default(),
            PulseOrigin::Output(output) => self.subscribers_of(output).collect(),
            PulseOrigin::Component(component) => self.downstream(component).collect(),
        }
    }

    fn subscribers_of(&self, output: OutputId) -> impl Iterator<Item = (InputId, ComponentId)> + '_ {
        self.outputs
            .get(&output)
            .into_iter()
            .flat_map(|o| o.subscribers.iter())
            .filter_map(move |i| self.inputs.get(i).map(|input| (*i, input.component)))
    }

    /// Every input fed by `component`, output by output in connection order.
    fn downstream(&self, component: ComponentId) -> impl Iterator<Item = (InputId, ComponentId)> + '_ {
        self.components
            .get(&component)
            .into_iter()
            .flat_map(|c| c.outputs.iter())
            .flat_map(move |o| self.subscribers_of(*o))
    }

    fn fan_out(&self, component: ComponentId) -> usize {
        self.downstream(component).count()
    }

    fn refresh_input(&mut self, input: InputId) {
        let outputs = &self.outputs;
        if let Some(i) = self.inputs.get_mut(&input) {
            let connections = i.connections.clone();
            i.merge(
                connections
                    .iter()
                    .filter_map(|o| outputs.get(o))
                    .map(Output::value),
            );
        }
    }

    // ------------------------------------------------------------------
    // Calculation
    // ------------------------------------------------------------------

    /// Recompute sufficiency and, when possible, the outputs of `id`.
    fn handle_input_change(&mut self, id: ComponentId, pulse: Option<PulseId>) {
        let Some(component) = self.components.get_mut(&id) else {
            return;
        };
        component.generation += 1;
        let generation = component.generation;
        let input_ids = component.inputs.clone();

        let sufficient = input_ids
            .iter()
            .filter_map(|i| self.inputs.get(i))
            .all(|i| !i.descriptor.required || !i.is_empty());
        if !sufficient {
            self.clear_outputs(id, pulse);
            self.finish_calculation(id, Sufficiency::False, Vec::new());
            return;
        }

        if component.behavior.is_whole_tree() {
            let trees: Vec<DataTree> = input_ids
                .iter()
                .map(|i| self.inputs.get(i).map(|i| i.value.clone()).unwrap_or_default())
                .collect();
            match component.behavior.transform(&trees) {
                Ok(outputs) => {
                    self.replace_outputs(id, outputs, pulse);
                    self.finish_calculation(id, Sufficiency::True, Vec::new());
                }
                Err(e) => {
                    tracing::warn!("{} failed: {}", id, e);
                    self.clear_outputs(id, pulse);
                    let error = CalculationError {
                        row: 0,
                        path: TreePath::default(),
                        message: e.to_string(),
                    };
                    self.finish_calculation(id, Sufficiency::Error, vec![error]);
                }
            }
            return;
        }

        let match_inputs: Vec<MatchInput<'_>> = input_ids
            .iter()
            .filter_map(|i| self.inputs.get(i))
            .map(|i| {
                let input = MatchInput::new(&i.value, i.descriptor.interpret_as);
                if i.descriptor.is_master {
                    input.master()
                } else {
                    input
                }
            })
            .collect();
        let match_outputs: Vec<MatchOutput> = component
            .outputs
            .iter()
            .filter_map(|o| self.outputs.get(o))
            .map(|o| MatchOutput::new(o.short_name(), o.descriptor.interpret_as))
            .collect();
        let behavior = &mut component.behavior;
        let pending = matcher::run(&match_inputs, &match_outputs, |args| behavior.calculate(args));

        match pending.try_finish() {
            Ok(result) => self.apply_result(id, result, pulse),
            Err(work) => {
                tracing::debug!("{} deferred its calculation (generation {})", id, generation);
                self.clear_outputs(id, pulse);
                self.pending.push_back(PendingWork {
                    component: id,
                    generation,
                    work,
                });
                self.finish_calculation(id, Sufficiency::True, Vec::new());
            }
        }
    }

    fn apply_result(&mut self, id: ComponentId, result: MatchResult, pulse: Option<PulseId>) {
        let MatchResult {
            outputs,
            errors,
            calls,
        } = result;
        tracing::debug!(
            "{} calculated {} items with {} row errors",
            id,
            calls,
            errors.len()
        );
        for error in &errors {
            tracing::warn!("{} {}", id, error);
        }
        self.replace_outputs(id, outputs, pulse);
        let state = if errors.is_empty() {
            Sufficiency::True
        } else {
            Sufficiency::Error
        };
        self.finish_calculation(id, state, errors);
    }

    fn finish_calculation(&mut self, id: ComponentId, to: Sufficiency, errors: Vec<CalculationError>) {
        let Some(component) = self.components.get_mut(&id) else {
            return;
        };
        component.last_errors = errors;
        let from = component.sufficiency;
        if from != to {
            component.sufficiency = to;
            tracing::debug!("{} went from {} to {}", id, from, to);
            self.events.emit(GraphEvent::SufficiencyChanged {
                component: id,
                from,
                to,
            });
        }
    }

    fn replace_outputs(&mut self, id: ComponentId, trees: Vec<DataTree>, pulse: Option<PulseId>) {
        let Some(component) = self.components.get(&id) else {
            return;
        };
        let mut trees = trees.into_iter();
        for output_id in &component.outputs {
            if let Some(output) = self.outputs.get_mut(output_id) {
                output.replace(trees.next().unwrap_or_default());
                self.events.emit(GraphEvent::ValueChanged {
                    component: id,
                    output: *output_id,
                    pulse,
                });
            }
        }
    }

    fn clear_outputs(&mut self, id: ComponentId, pulse: Option<PulseId>) {
        let Some(component) = self.components.get(&id) else {
            return;
        };
        for output_id in &component.outputs {
            if let Some(output) = self.outputs.get_mut(output_id) {
                output.clear();
                self.events.emit(GraphEvent::ValueChanged {
                    component: id,
                    output: *output_id,
                    pulse,
                });
            }
        }
    }

    // ------------------------------------------------------------------
    // Deferred calculations
    // ------------------------------------------------------------------

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Drop queued calculations of `component`. Returns how many were dropped.
    pub fn cancel_pending(&mut self, component: ComponentId) -> usize {
        let before = self.pending.len();
        self.pending.retain(|p| p.component != component);
        before - self.pending.len()
    }

    /// Await every queued calculation in the order it was queued, write the
    /// results and pulse from each finished component. Calculations queued
    /// by those pulses are settled as well.
    pub async fn settle(&mut self) -> Vec<PulseReport> {
        let mut reports = Vec::new();
        while let Some(PendingWork {
            component,
            generation,
            work,
        }) = self.pending.pop_front()
        {
            let result = work.resolve().await;

            let Some(current) = self.components.get(&component).map(|c| c.generation) else {
                tracing::debug!("{} was removed before its calculation finished", component);
                continue;
            };
            if current != generation {
                match self.config.stale_results {
                    StaleResultPolicy::Discard => {
                        tracing::warn!(
                            "Discarding stale result of {} (generation {}, now {})",
                            component,
                            generation,
                            current
                        );
                        continue;
                    }
                    StaleResultPolicy::Apply => {
                        tracing::debug!(
                            "Applying stale result of {} (generation {}, now {})",
                            component,
                            generation,
                            current
                        );
                    }
                }
            }

            self.apply_result(component, result, None);
            reports.push(self.pulse(PulseOrigin::Component(component)));
        }
        reports
    }
}
