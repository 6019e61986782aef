//! Component outputs.

use crate::graph::id::{ComponentId, InputId, OutputId};
use crate::graph::port::PortDescriptor;
use crate::tree::DataTree;

/// An output port. Owns the tree its component produced, an optional
/// user-entered override, and the list of inputs subscribed to it.
///
/// The override takes precedence over calculated data and survives
/// recalculation; only clearing the user data drops it.
#[derive(Debug, Clone)]
pub struct Output {
    pub(crate) id: OutputId,
    pub(crate) component: ComponentId,
    pub(crate) descriptor: PortDescriptor,
    /// Subscribed inputs, in connection order.
    pub(crate) subscribers: Vec<InputId>,
    pub(crate) value: DataTree,
    pub(crate) persisted: Option<DataTree>,
}

impl Output {
    pub(crate) fn new(id: OutputId, component: ComponentId, descriptor: PortDescriptor) -> Self {
        Self {
            id,
            component,
            descriptor,
            subscribers: Vec::new(),
            value: DataTree::new(),
            persisted: None,
        }
    }

    pub fn id(&self) -> OutputId {
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

    pub fn subscribers(&self) -> &[InputId] {
        &self.subscribers
    }

    /// What subscribers see: the user override when present, else the calculated tree.
    pub fn value(&self) -> &DataTree {
        self.persisted.as_ref().unwrap_or(&self.value)
    }

    /// The calculated tree, ignoring any override.
    pub fn calculated(&self) -> &DataTree {
        &self.value
    }

    pub fn persisted(&self) -> Option<&DataTree> {
        self.persisted.as_ref()
    }

    pub fn has_user_data(&self) -> bool {
        self.persisted.is_some()
    }

    /// Replace the calculated value, releasing the old one first when this
    /// output owns its data.
    pub(crate) fn replace(&mut self, tree: DataTree) {
        self.clear();
        self.value = tree;
    }

    /// Drop the calculated value. The override is left alone.
    pub(crate) fn clear(&mut self) -> usize {
        let released = self.release(Slot::Calculated);
        self.value = DataTree::new();
        released
    }

    /// Install a user override, releasing the one it displaces.
    pub(crate) fn assign_persisted(&mut self, tree: DataTree) {
        self.release(Slot::Persisted);
        self.persisted = Some(tree);
    }

    /// Remove the override, releasing what it held. Returns whether there was one.
    pub(crate) fn take_persisted(&mut self) -> bool {
        self.release(Slot::Persisted);
        self.persisted.take().is_some()
    }

    /// Release everything this output holds, ahead of removal.
    pub(crate) fn destroy(&mut self) -> usize {
        let released = self.release(Slot::Persisted) + self.clear();
        self.persisted = None;
        released
    }

    /// Resources are released only when the output created them.
    fn release(&mut self, slot: Slot) -> usize {
        if !self.descriptor.contains_new_data {
            return 0;
        }
        let tree = match slot {
            Slot::Calculated => &mut self.value,
            Slot::Persisted => match self.persisted.as_mut() {
                Some(tree) => tree,
                None => return 0,
            },
        };
        let released = tree.release_resources();
        if released > 0 {
            tracing::debug!("Output {} released {} resources", self.id, released);
        }
        released
    }

    pub(crate) fn subscribe(&mut self, input: InputId) {
        if !self.subscribers.contains(&input) {
            self.subscribers.push(input);
        }
    }

    pub(crate) fn unsubscribe(&mut self, input: InputId) {
        self.subscribers.retain(|i| *i != input);
    }
}

#[derive(Clone, Copy)]
enum Slot {
    Calculated,
    Persisted,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Resource, ResourceHandle};
    use crate::types::DataType;
    use crate::value::Value;

    #[derive(Debug)]
    struct Blob;

    impl Resource for Blob {
        fn kind(&self) -> &str {
            "blob"
        }

        fn release(&self) {}
    }

    fn holding(handle: &ResourceHandle) -> DataTree {
        DataTree::from_values(vec![Value::Handle(handle.clone())])
    }

    #[test]
    fn test_clear_releases_created_data() {
        let handle = ResourceHandle::new(Blob);
        let mut output = Output::new(
            OutputId(1),
            ComponentId(0),
            PortDescriptor::output("G", DataType::Wild),
        );
        output.replace(holding(&handle));
        assert_eq!(output.clear(), 1);
        assert!(handle.is_released());
        assert!(output.value().is_empty());
    }

    #[test]
    fn test_rearranging_output_keeps_resources() {
        let handle = ResourceHandle::new(Blob);
        let mut output = Output::new(
            OutputId(1),
            ComponentId(0),
            PortDescriptor::output("G", DataType::Wild).rearranging(),
        );
        output.replace(holding(&handle));
        output.replace(DataTree::new());
        assert!(!handle.is_released());
    }

    #[test]
    fn test_override_survives_recalculation() {
        let mut output = Output::new(
            OutputId(1),
            ComponentId(0),
            PortDescriptor::output("N", DataType::Number),
        );
        output.assign_persisted(DataTree::from_values(vec![Value::from(5.0)]));
        output.replace(DataTree::from_values(vec![Value::from(1.0)]));
        output.clear();

        assert!(output.has_user_data());
        assert_eq!(output.value().data_at_path(&[0]), &[Value::from(5.0)]);
        assert!(output.calculated().is_empty());

        assert!(output.take_persisted());
        assert!(output.value().is_empty());
        assert!(!output.take_persisted());
    }

    #[test]
    fn test_replacing_override_releases_old_one() {
        let handle = ResourceHandle::new(Blob);
        let mut output = Output::new(
            OutputId(1),
            ComponentId(0),
            PortDescriptor::output("G", DataType::Wild),
        );
        output.assign_persisted(holding(&handle));
        output.clear();
        assert!(!handle.is_released());

        output.assign_persisted(DataTree::new());
        assert!(handle.is_released());
    }
}
