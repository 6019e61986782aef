//! Component inputs.

use crate::graph::id::{ComponentId, InputId, OutputId};
use crate::graph::port::PortDescriptor;
use crate::tree::DataTree;

/// An input port. Holds the merged data its component calculates from.
///
/// The value resolves, in order of preference, from the connected outputs,
/// from data the user assigned, or from the descriptor's default.
#[derive(Debug, Clone)]
pub struct Input {
    pub(crate) id: InputId,
    pub(crate) component: ComponentId,
    pub(crate) descriptor: PortDescriptor,
    /// Connected outputs, most recently connected last.
    pub(crate) connections: Vec<OutputId>,
    pub(crate) persisted: Option<DataTree>,
    pub(crate) value: DataTree,
}

impl Input {
    pub(crate) fn new(id: InputId, component: ComponentId, descriptor: PortDescriptor) -> Self {
        let mut input = Self {
            id,
            component,
            descriptor,
            connections: Vec::new(),
            persisted: None,
            value: DataTree::new(),
        };
        input.merge(std::iter::empty());
        input
    }

    pub fn id(&self) -> InputId {
        self.id
    }

    pub fn component(&self) -> ComponentId {
        self.component
    }

    pub fn descriptor(&self) -> &PortDescriptor {
        &self.descriptor
    }

    pub fn short_name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn connections(&self) -> &[OutputId] {
        &self.connections
    }

    pub fn is_connected(&self) -> bool {
        !self.connections.is_empty()
    }

    /// Data assigned directly by the user, if any.
    pub fn persisted(&self) -> Option<&DataTree> {
        self.persisted.as_ref()
    }

    /// The data the component currently sees.
    pub fn value(&self) -> &DataTree {
        &self.value
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Rebuild the value from the trees of the connected outputs.
    ///
    /// The first tree is copied and every later one is concatenated onto it
    /// branch by branch. With nothing connected the persisted data or the
    /// default takes over.
    pub(crate) fn merge<'a>(&mut self, mut trees: impl Iterator<Item = &'a DataTree>) {
        if let Some(first) = trees.next() {
            let mut merged = first.copy();
            for tree in trees {
                merged.concat_from(tree);
            }
            self.value = merged;
            return;
        }

        self.value = match (&self.persisted, &self.descriptor.default) {
            (Some(tree), _) => tree.copy(),
            (None, Some(default)) => DataTree::from_values(vec![default.clone()]),
            (None, None) => DataTree::new(),
        };
    }

    /// Move `output` to the end of the connection list, adding it if absent.
    pub(crate) fn attach(&mut self, output: OutputId) {
        self.connections.retain(|o| *o != output);
        self.connections.push(output);
    }

    pub(crate) fn detach(&mut self, output: OutputId) -> bool {
        let before = self.connections.len();
        self.connections.retain(|o| *o != output);
        self.connections.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataType;
    use crate::value::Value;

    fn input(descriptor: PortDescriptor) -> Input {
        Input::new(InputId(1), ComponentId(0), descriptor)
    }

    #[test]
    fn test_merge_concatenates_outputs() {
        let mut input = input(PortDescriptor::input("A", DataType::Number));
        let a = DataTree::from_values(vec![Value::from(1)]);
        let mut b = DataTree::from_values(vec![Value::from(2)]);
        b.set_data_at_path(vec![Value::from(3)], &[1]).unwrap();

        input.merge([&a, &b].into_iter());
        assert_eq!(input.value().data_at_path(&[0]), &[Value::from(1), Value::from(2)]);
        assert_eq!(input.value().data_at_path(&[1]), &[Value::from(3)]);
    }

    #[test]
    fn test_unconnected_falls_back_to_persisted_then_default() {
        let mut input = input(PortDescriptor::input("N", DataType::Number).with_default(2));
        assert_eq!(input.value().data_at_path(&[0]), &[Value::from(2)]);

        input.persisted = Some(DataTree::from_values(vec![Value::from(7)]));
        input.merge(std::iter::empty());
        assert_eq!(input.value().data_at_path(&[0]), &[Value::from(7)]);
    }

    #[test]
    fn test_attach_moves_to_end() {
        let mut input = input(PortDescriptor::input("A", DataType::Wild));
        input.attach(OutputId(5));
        input.attach(OutputId(6));
        input.attach(OutputId(5));
        assert_eq!(input.connections(), &[OutputId(6), OutputId(5)]);
        assert!(input.detach(OutputId(6)));
        assert!(!input.detach(OutputId(6)));
    }
}
