use std::rc::Rc;

use geoflow_core::builtins::core_register;
use geoflow_core::connection::connect;
use geoflow_core::endpoint::Endpoint;
use geoflow_core::persistence::{from_json, to_json};
use geoflow_core::scheduler::run_all;
use geoflow_core::terminal::Output;
use geoflow_core::types::ValueBox;
use geoflow_core::{Graph, NodeRegisterMap};

fn registers() -> Rc<NodeRegisterMap> {
    let mut map = NodeRegisterMap::new();
    map.insert(core_register());
    Rc::new(map)
}

fn new_graph() -> Graph {
    let mut map = NodeRegisterMap::new();
    map.insert(core_register());
    Graph::new(map)
}

// E5 - round-trip a flowchart through JSON and confirm it still runs to the
// same result.
#[test]
fn round_trip_preserves_topology_and_rerun_result() {
    let mut graph = new_graph();
    let a = graph.create_node("core", "Int").unwrap();
    let b = graph.create_node("core", "Int").unwrap();
    let c = graph.create_node("core", "FloatAdd").unwrap();
    graph.node_mut(&a).unwrap().parameter_mut("value").unwrap().set(ValueBox::int(3)).unwrap();
    graph.node_mut(&b).unwrap().parameter_mut("value").unwrap().set(ValueBox::int(4)).unwrap();
    connect(&mut graph, Endpoint::new(a.as_str(), "value"), Endpoint::new(c.as_str(), "in1")).unwrap();
    connect(&mut graph, Endpoint::new(b.as_str(), "value"), Endpoint::new(c.as_str(), "in2")).unwrap();

    let json = to_json(&graph);
    let mut reloaded = from_json(&json, registers(), true).unwrap();
    assert_eq!(reloaded.node_count(), 3);

    run_all(&mut reloaded).unwrap();
    let result = match reloaded.node(&c).unwrap().output("result").unwrap() {
        Output::Single(sfo) => sfo.get(0).and_then(ValueBox::as_float),
        Output::Multi(_) => panic!("expected single-feature output"),
    };
    assert_eq!(result, Some(7.0));

    let reserialized = to_json(&reloaded);
    assert_eq!(json["nodes"].as_object().unwrap().len(), reserialized["nodes"].as_object().unwrap().len());
}

#[test]
fn lenient_mode_tolerates_a_dangling_connection() {
    let mut graph = new_graph();
    let _ = graph.create_node("core", "Int").unwrap();
    let mut json = to_json(&graph);
    let nodes = json.get_mut("nodes").unwrap().as_object_mut().unwrap();
    let node_spec = nodes.values_mut().next().unwrap().as_object_mut().unwrap();
    let mut connections = serde_json::Map::new();
    connections.insert(
        "value".to_string(),
        serde_json::Value::Array(vec![serde_json::Value::Array(vec![serde_json::Value::String("ghost".into()), serde_json::Value::String("in1".into())])]),
    );
    node_spec.insert("connections".into(), serde_json::Value::Object(connections));

    let loaded = from_json(&json, registers(), false);
    assert!(loaded.is_ok());
}

#[test]
fn strict_mode_aborts_on_dangling_connection() {
    let mut graph = new_graph();
    let _ = graph.create_node("core", "Int").unwrap();
    let mut json = to_json(&graph);
    let nodes = json.get_mut("nodes").unwrap().as_object_mut().unwrap();
    let node_spec = nodes.values_mut().next().unwrap().as_object_mut().unwrap();
    let mut connections = serde_json::Map::new();
    connections.insert(
        "value".to_string(),
        serde_json::Value::Array(vec![serde_json::Value::Array(vec![serde_json::Value::String("ghost".into()), serde_json::Value::String("in1".into())])]),
    );
    node_spec.insert("connections".into(), serde_json::Value::Object(connections));

    assert!(from_json(&json, registers(), true).is_err());
}
