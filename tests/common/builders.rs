//! Test data builders for trees and graphs

use treeflow::components::{Behavior, ValueOp};
use treeflow::{ComponentId, DataTree, Graph, OutputId, Value};

/// Builder for data trees, one branch at a time
#[derive(Default)]
pub struct TreeBuilder {
    tree: DataTree,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn branch(mut self, path: &[u32], values: Vec<Value>) -> Self {
        self.tree
            .set_data_at_path(values, path)
            .expect("test paths are valid");
        self
    }

    pub fn numbers(self, path: &[u32], values: &[f64]) -> Self {
        self.branch(path, super::nums(values))
    }

    pub fn build(self) -> DataTree {
        self.tree
    }
}

/// A Number component whose output holds `tree` as user data.
pub fn number_source(graph: &mut Graph, tree: DataTree) -> (ComponentId, OutputId) {
    let id = graph.add_component(Behavior::Value(ValueOp::Number));
    let out = graph.output_by_name(id, "N").unwrap();
    graph.assign_output_data(out, tree).unwrap();
    (id, out)
}

/// Connect `from.output` to `to.input` by short names.
pub fn wire(graph: &mut Graph, from: ComponentId, output: &str, to: ComponentId, input: &str) {
    let out = graph.output_by_name(from, output).unwrap();
    let inp = graph.input_by_name(to, input).unwrap();
    graph.connect_additional(out, inp).unwrap();
}

/// Values of a component's output by short name
pub fn output_tree(graph: &Graph, component: ComponentId, output: &str) -> DataTree {
    let out = graph.output_by_name(component, output).unwrap();
    graph.output_value(out).cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_builder() {
        let tree = TreeBuilder::new()
            .numbers(&[0], &[1.0, 2.0])
            .numbers(&[1, 0], &[3.0])
            .build();

        assert_eq!(tree.branch_count(), 2);
        assert_eq!(tree.value_count(), 3);
        assert_eq!(tree.max_path_depth(), 2);
    }
}
