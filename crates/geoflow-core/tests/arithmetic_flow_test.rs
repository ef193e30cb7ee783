use geoflow_core::builtins::core_register;
use geoflow_core::connection::{connect, disconnect};
use geoflow_core::endpoint::Endpoint;
use geoflow_core::scheduler::run_all;
use geoflow_core::terminal::{Input, Output};
use geoflow_core::types::ValueBox;
use geoflow_core::{Graph, GeoflowError, NodeRegisterMap, NodeStatus};

fn wired_adder() -> (Graph, String, String, String) {
    let mut registers = NodeRegisterMap::new();
    registers.insert(core_register());
    let mut graph = Graph::new(registers);

    let a = graph.create_node("core", "Int").unwrap();
    let b = graph.create_node("core", "Int").unwrap();
    let c = graph.create_node("core", "FloatAdd").unwrap();

    graph.node_mut(&a).unwrap().parameter_mut("value").unwrap().set(ValueBox::int(3)).unwrap();
    graph.node_mut(&b).unwrap().parameter_mut("value").unwrap().set(ValueBox::int(4)).unwrap();

    (graph, a, b, c)
}

// E1 - add two numbers.
#[test]
fn adds_two_numbers_through_float_add() {
    let (mut graph, a, b, c) = wired_adder();
    connect(&mut graph, Endpoint::new(a.as_str(), "value"), Endpoint::new(c.as_str(), "in1")).unwrap();
    connect(&mut graph, Endpoint::new(b.as_str(), "value"), Endpoint::new(c.as_str(), "in2")).unwrap();

    run_all(&mut graph).unwrap();

    let result = match graph.node(&c).unwrap().output("result").unwrap() {
        Output::Single(sfo) => sfo.get(0).and_then(ValueBox::as_float),
        Output::Multi(_) => panic!("expected single-feature output"),
    };
    assert_eq!(result, Some(7.0));
}

// E2 - a connection that would close a cycle is rejected outright. `C`'s
// own `value_feedback` input is the terminal the scenario exists to give a
// cycle attempt a home on (SPEC_FULL.md §4.K).
#[test]
fn cycle_through_feedback_input_is_rejected() {
    let (mut graph, a, b, c) = wired_adder();
    connect(&mut graph, Endpoint::new(a.as_str(), "value"), Endpoint::new(c.as_str(), "in1")).unwrap();
    connect(&mut graph, Endpoint::new(b.as_str(), "value"), Endpoint::new(c.as_str(), "in2")).unwrap();
    run_all(&mut graph).unwrap();

    let err = connect(&mut graph, Endpoint::new(c.as_str(), "result"), Endpoint::new(c.as_str(), "value_feedback")).unwrap_err();
    assert!(matches!(err, GeoflowError::CycleDetected { .. }));
    match graph.node(&c).unwrap().input("value_feedback").unwrap() {
        Input::Single(sfi) => assert!(sfi.upstream().is_none()),
        Input::Multi(_) => panic!("expected single-feature input"),
    }
}

// E3 - disconnecting clears downstream data and resets status.
#[test]
fn disconnect_clears_downstream_output_and_status() {
    let (mut graph, a, b, c) = wired_adder();
    connect(&mut graph, Endpoint::new(a.as_str(), "value"), Endpoint::new(c.as_str(), "in1")).unwrap();
    connect(&mut graph, Endpoint::new(b.as_str(), "value"), Endpoint::new(c.as_str(), "in2")).unwrap();
    run_all(&mut graph).unwrap();
    assert_eq!(graph.node(&c).unwrap().status(), NodeStatus::Done);

    disconnect(&mut graph, &Endpoint::new(a.as_str(), "value"), &Endpoint::new(c.as_str(), "in1")).unwrap();

    match graph.node(&c).unwrap().output("result").unwrap() {
        Output::Single(sfo) => assert!(!sfo.has_data()),
        Output::Multi(_) => panic!("expected single-feature output"),
    }
    match graph.node(&c).unwrap().input("in1").unwrap() {
        Input::Single(sfi) => assert!(sfi.upstream().is_none()),
        Input::Multi(_) => panic!("expected single-feature input"),
    }
    assert_eq!(graph.node(&c).unwrap().status(), NodeStatus::Waiting);
}

#[test]
fn type_mismatched_connection_is_rejected_without_mutating_the_graph() {
    let mut registers = NodeRegisterMap::new();
    registers.insert(core_register());
    let mut graph = Graph::new(registers);
    let text = graph.create_node("core", "Text").unwrap();
    let adder = graph.create_node("core", "FloatAdd").unwrap();

    let err = connect(&mut graph, Endpoint::new(text.as_str(), "text"), Endpoint::new(adder.as_str(), "in1")).unwrap_err();
    assert!(matches!(err, GeoflowError::TypeMismatch { .. }));
    match graph.node(&adder).unwrap().input("in1").unwrap() {
        Input::Single(sfi) => assert!(sfi.upstream().is_none()),
        Input::Multi(_) => panic!("expected single-feature input"),
    }
}
