//! Project persistence and engine configuration

mod common;

use common::builders::{number_source, output_tree, wire, TreeBuilder};
use serial_test::serial;
use treeflow::components::{Behavior, TreeOp, ValueOp};
use treeflow::config::{default_config_path, StaleResultPolicy, CONFIG_ENV};
use treeflow::graph::Position;
use treeflow::{ComponentRegistry, EngineConfig, Graph, ProjectFile, Sufficiency};

fn sample_graph() -> Graph {
    let mut graph = Graph::default();
    let tree = TreeBuilder::new()
        .numbers(&[0], &[1.0, 2.0])
        .numbers(&[1], &[3.0])
        .build();
    let (src, _) = number_source(&mut graph, tree);
    let add = graph.add_component(Behavior::Value(ValueOp::Add));
    let graft = graph.add_component(Behavior::Tree(TreeOp::Graft));
    wire(&mut graph, src, "N", add, "A");
    wire(&mut graph, src, "N", add, "B");
    wire(&mut graph, add, "N", graft, "T");
    graph
        .set_pretty_name(add, Some("Doubler".to_string()))
        .unwrap();
    graph.set_position(graft, Position::new(120.0, 40.0)).unwrap();
    graph
}

#[test]
fn test_saved_project_reloads_identically() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sample.json");
    let graph = sample_graph();

    let mut project = ProjectFile::new("sample");
    project.capture(&graph);
    project.save(&path).unwrap();

    let loaded = ProjectFile::load(&path).unwrap();
    let reloaded =
        Graph::from_project(&loaded, EngineConfig::default(), ComponentRegistry::default()).unwrap();

    assert_eq!(reloaded.to_records(), graph.to_records());
    for component in graph.components() {
        let twin = reloaded.component(component.id()).unwrap();
        assert_eq!(twin.name(), component.name());
        assert_eq!(twin.position(), component.position());
        assert_eq!(twin.sufficiency(), component.sufficiency());
        for output in component.outputs() {
            assert_eq!(reloaded.output_value(*output), graph.output_value(*output));
        }
    }
}

#[test]
fn test_loaded_ids_are_never_reused() {
    let graph = sample_graph();
    let mut project = ProjectFile::new("ids");
    project.capture(&graph);
    let max = project.max_id().unwrap();

    let mut reloaded =
        Graph::from_project(&project, EngineConfig::default(), ComponentRegistry::default()).unwrap();
    let added = reloaded.add_component(Behavior::Value(ValueOp::Number));
    assert!(added.raw() > max);
    let port = reloaded.output_by_name(added, "N").unwrap();
    assert!(port.raw() > max);
}

#[test]
fn test_dangling_connections_are_skipped() {
    let json = r#"{
        "title": "dangling",
        "components": [
            {"id": 1, "componentType": "graft",
             "inputs": [{"id": 2, "shortName": "T", "connections": [42]}],
             "outputs": [{"id": 3, "shortName": "T"}]}
        ]
    }"#;
    let project: ProjectFile = serde_json::from_str(json).unwrap();
    let graph =
        Graph::from_project(&project, EngineConfig::default(), ComponentRegistry::default()).unwrap();

    let graft = graph.components().next().unwrap();
    assert_eq!(graft.sufficiency(), Sufficiency::False);
    assert!(graph.input(graft.inputs()[0]).unwrap().connections().is_empty());
}

#[test]
fn test_pretty_name_survives_round_trip() {
    let graph = sample_graph();
    let mut project = ProjectFile::new("names");
    project.capture(&graph);
    let json = serde_json::to_string(&project).unwrap();
    assert!(json.contains("\"prettyName\":\"Doubler\""));
    assert!(json.contains("\"componentType\":\"addition\""));

    let reloaded: ProjectFile = serde_json::from_str(&json).unwrap();
    let graph =
        Graph::from_project(&reloaded, EngineConfig::default(), ComponentRegistry::default()).unwrap();
    let add = graph
        .components()
        .find(|c| c.type_name() == "addition")
        .unwrap();
    assert_eq!(add.name(), "Doubler");
    assert_eq!(output_tree(&graph, add.id(), "N").value_count(), 3);
}

#[test]
#[serial]
fn test_config_location_from_env() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("engine.toml");
    std::fs::write(&path, "stale_results = \"apply\"\n\n[script]\nmax_operations = 500\n").unwrap();

    std::env::set_var(CONFIG_ENV, &path);
    let config = EngineConfig::load_or_default();
    let location = default_config_path();
    std::env::remove_var(CONFIG_ENV);

    assert_eq!(location, Some(path));
    assert_eq!(config.stale_results, StaleResultPolicy::Apply);
    assert_eq!(config.script.max_operations, 500);
    assert_eq!(config.script.max_call_levels, 32);
}

#[test]
#[serial]
fn test_broken_config_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("engine.toml");
    std::fs::write(&path, "stale_results = 7").unwrap();

    std::env::set_var(CONFIG_ENV, &path);
    let config = EngineConfig::load_or_default();
    std::env::remove_var(CONFIG_ENV);

    assert_eq!(config, EngineConfig::default());
    assert!(EngineConfig::load(&path).is_err());
}

#[test]
fn test_config_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("engine.toml");
    let config = EngineConfig {
        log_filter: "warn".to_string(),
        ..EngineConfig::default()
    };

    config.save(&path).unwrap();
    assert_eq!(EngineConfig::load(&path).unwrap(), config);
}
