//! Components that restructure whole trees.
//!
//! These never go through the matcher: they receive every input tree as is
//! and return one tree per output.

use crate::error::Result;
use crate::graph::PortDescriptor;
use crate::tree::{DataTree, RemapPattern, TreeError, TreePath};
use crate::types::DataType;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeOp {
    /// One sub-branch per value.
    Graft,
    /// Every value into a single branch, `{0}` unless a path is given.
    Flatten,
    /// Lexical path rewrite such as `{A;B}(i):{B;i}(A)`.
    Remap,
}

impl TreeOp {
    pub fn inputs(&self) -> Vec<PortDescriptor> {
        let tree = PortDescriptor::input("T", DataType::Wild)
            .tree()
            .describe("Tree to restructure");
        match self {
            TreeOp::Graft => vec![tree],
            TreeOp::Flatten => vec![
                tree,
                PortDescriptor::input("P", DataType::Array)
                    .with_default(Value::List(vec![Value::from(0)]))
                    .describe("Path to collect the values into"),
            ],
            TreeOp::Remap => vec![
                tree,
                PortDescriptor::input("M", DataType::String)
                    .describe("Mapping, e.g. {A;B}(i):{B;i}(A)"),
            ],
        }
    }

    pub fn outputs(&self) -> Vec<PortDescriptor> {
        vec![PortDescriptor::output("T", DataType::Wild).tree().rearranging()]
    }

    pub fn transform(&self, inputs: &[DataTree]) -> Result<Vec<DataTree>> {
        let empty = DataTree::new();
        let tree = inputs.first().unwrap_or(&empty);
        let output = match self {
            TreeOp::Graft => tree.graft(),
            TreeOp::Flatten => {
                let path = flatten_path(inputs.get(1).unwrap_or(&empty))?;
                tree.flatten_to(&path)?
            }
            TreeOp::Remap => {
                let mapping = inputs
                    .get(1)
                    .and_then(|m| m.values().find_map(Value::as_str).map(str::to_string))
                    .ok_or_else(|| TreeError::InvalidPattern("no mapping given".to_string()))?;
                tree.remap(&RemapPattern::parse(&mapping)?)?
            }
        };
        Ok(vec![output])
    }
}

/// Read the target path from the `P` input: a list of segments, loose
/// numbers, or a `0;1` string.
fn flatten_path(tree: &DataTree) -> Result<TreePath> {
    let values: Vec<Value> = tree.values().cloned().collect();
    let path = match values.as_slice() {
        [] => TreePath::first(),
        [Value::List(segments)] => TreePath::from_values(segments)?,
        [Value::String(text)] => TreePath::parse(text)?,
        segments => TreePath::from_values(segments)?,
    };
    Ok(path)
}
