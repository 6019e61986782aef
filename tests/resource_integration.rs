//! Resource release through output ownership

mod common;

use common::builders::{number_source, wire};
use common::mock_helpers::{geometry, CountedGeometry};
use common::nums;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use treeflow::components::{Behavior, TreeOp, ValueOp};
use treeflow::{ComponentId, DataTree, Graph, OutputId, ResourceHandle, Value};

/// An Add component whose output holds a counted resource as user data.
fn owner_with_resource(graph: &mut Graph) -> (ComponentId, OutputId, Arc<AtomicUsize>) {
    let releases = Arc::new(AtomicUsize::new(0));
    let handle = ResourceHandle::new(CountedGeometry(releases.clone()));
    let add = graph.add_component(Behavior::Value(ValueOp::Add));
    let out = graph.output_by_name(add, "N").unwrap();
    graph
        .assign_output_data(out, DataTree::from_values(vec![Value::from(handle)]))
        .unwrap();
    (add, out, releases)
}

#[test]
fn test_release_is_idempotent() {
    let handle = ResourceHandle::new(geometry(1));
    let mut tree = DataTree::from_values(vec![Value::from(handle.clone()), Value::from(1)]);
    let mut copy = tree.copy();

    assert_eq!(tree.release_resources(), 1);
    assert_eq!(copy.release_resources(), 0);
    assert!(handle.is_released());
    assert!(tree.is_empty());
}

#[test]
fn test_user_data_outlives_recalculation() {
    let mut graph = Graph::default();
    let (add, out, releases) = owner_with_resource(&mut graph);
    let (src, _) = number_source(&mut graph, DataTree::from_values(nums(&[1.0])));

    // Insufficient, then calculated: only the calculated tree is touched
    wire(&mut graph, src, "N", add, "A");
    wire(&mut graph, src, "N", add, "B");
    assert_eq!(releases.load(Ordering::SeqCst), 0);
    assert!(graph.output(out).unwrap().has_user_data());

    graph.clear_output_data(out).unwrap();
    assert_eq!(releases.load(Ordering::SeqCst), 1);
    assert_eq!(graph.output_value(out).unwrap().data_at_path(&[0]), &nums(&[2.0])[..]);

    graph.remove_component(add).unwrap();
    assert_eq!(releases.load(Ordering::SeqCst), 1);
}

#[test]
fn test_removal_releases_user_data() {
    let mut graph = Graph::default();
    let (add, _, releases) = owner_with_resource(&mut graph);
    graph.remove_component(add).unwrap();
    assert_eq!(releases.load(Ordering::SeqCst), 1);
}

#[test]
fn test_rearranging_outputs_do_not_release() {
    let mut graph = Graph::default();
    let (add, out, releases) = owner_with_resource(&mut graph);
    let graft = graph.add_component(Behavior::Tree(TreeOp::Graft));
    wire(&mut graph, add, "N", graft, "T");

    let grafted = graph
        .output_value(graph.output_by_name(graft, "T").unwrap())
        .unwrap()
        .clone();
    assert_eq!(grafted.value_count(), 1);

    let input = graph.input_by_name(graft, "T").unwrap();
    graph.disconnect(out, input).unwrap();
    assert_eq!(releases.load(Ordering::SeqCst), 0);

    graph.remove_component(graft).unwrap();
    assert_eq!(releases.load(Ordering::SeqCst), 0);

    graph.remove_component(add).unwrap();
    assert_eq!(releases.load(Ordering::SeqCst), 1);
}
