//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use treeflow::{DataTree, Value};

/// Numbers as tree values
pub fn nums(values: &[f64]) -> Vec<Value> {
    values.iter().map(|&n| Value::from(n)).collect()
}

/// `(path key, values)` for every branch, in traversal order
pub fn traversal(tree: &DataTree) -> Vec<(String, Vec<Value>)> {
    tree.branches().map(|(p, v)| (p.key(), v.to_vec())).collect()
}

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}
