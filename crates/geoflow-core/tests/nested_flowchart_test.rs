use geoflow_core::builtins::core_register;
use geoflow_core::error::Result;
use geoflow_core::nest::NestNode;
use geoflow_core::node::{NodeBehavior, NodeDecl, ProcessContext};
use geoflow_core::persistence::{from_json, save_file, to_json};
use geoflow_core::register::NodeRegister;
use geoflow_core::scheduler::run_all;
use geoflow_core::terminal::Output;
use geoflow_core::types::{TypeTag, ValueBox};
use geoflow_core::{Graph, NodeRegisterMap};
use serde_json::{Map as JsonMap, Value as Json};
use std::rc::Rc;

/// A test-only source node standing in for whatever upstream collaborator
/// would ordinarily hand a fanout node its driving vector; none of the
/// built-ins (§4.K) produce more than one value per `process()` call.
#[derive(Debug, Clone, Default)]
struct VectorSourceNode;

impl NodeBehavior for VectorSourceNode {
    fn type_name(&self) -> &'static str {
        "VectorSource"
    }

    fn clone_box(&self) -> Box<dyn NodeBehavior> {
        Box::new(self.clone())
    }

    fn init(&mut self, decl: &mut NodeDecl) {
        decl.add_output("values", TypeTag::Float);
    }

    fn process(&mut self, ctx: &mut ProcessContext) -> Result<()> {
        ctx.clear_output("values")?;
        for v in [1.0, 2.0, 3.0] {
            ctx.push_output("values", ValueBox::float(v))?;
        }
        Ok(())
    }
}

fn registers() -> NodeRegisterMap {
    let mut map = NodeRegisterMap::new();
    map.insert(core_register());

    let mut test_register = NodeRegister::new("test");
    test_register.register_node("VectorSource", || Box::new(VectorSourceNode) as Box<dyn NodeBehavior>);
    map.insert(test_register);

    // `Nest` is part of the engine itself, not a user-facing built-in
    // (SPEC_FULL.md §4.I); registered ad hoc here under its own namespace
    // rather than folded into `core_register()`.
    let mut engine_register = NodeRegister::new("engine");
    engine_register.register_node("Nest", || Box::new(NestNode::default()) as Box<dyn NodeBehavior>);
    map.insert(engine_register);

    map
}

fn child_flowchart_path() -> std::path::PathBuf {
    let mut graph = Graph::new(registers());
    let mul = graph.create_node("core", "FloatMultiply").unwrap();
    graph.node_mut(&mul).unwrap().input_mut("in1").unwrap().set_marked(true);
    graph.node_mut(&mul).unwrap().input_mut("in2").unwrap().set_marked(true);
    graph.node_mut(&mul).unwrap().output_mut("result").unwrap().set_marked(true);

    let path = std::env::temp_dir().join(format!("geoflow_nest_test_{}.json", std::process::id()));
    save_file(&graph, &path).unwrap();
    path
}

// E6 - nested fanout: an outer vector input of length N drives N iterations
// of the child flowchart, collecting one exported output value per index.
#[test]
fn nested_fanout_squares_each_element() {
    let path = child_flowchart_path();

    let mut graph = Graph::new(registers());
    let source = graph.create_node("test", "VectorSource").unwrap();
    let nest = graph.create_node("engine", "Nest").unwrap();
    graph.node_mut(&nest).unwrap().parameter_mut("path").unwrap().set(ValueBox::string(path.to_string_lossy().to_string())).unwrap();

    // `in1`/`in2` only exist on the Nest node once `post_parameter_load`
    // has introspected the child flowchart, so the fan-out connections are
    // expressed in the saved JSON and restored by `from_json`'s pass order
    // (globals -> nodes/params -> post_parameter_load -> marks ->
    // connections) rather than wired up directly here.
    let mut json = to_json(&graph);
    let mut connections = JsonMap::new();
    connections.insert(
        "values".to_string(),
        Json::Array(vec![
            Json::Array(vec![Json::String(nest.clone()), Json::String("in1".to_string())]),
            Json::Array(vec![Json::String(nest.clone()), Json::String("in2".to_string())]),
        ]),
    );
    json["nodes"][&source]["connections"] = Json::Object(connections);

    let mut graph = from_json(&json, Rc::new(registers()), true).unwrap();
    run_all(&mut graph).unwrap();

    let squared: Vec<f64> = match graph.node(&nest).unwrap().output("result").unwrap() {
        Output::Single(sfo) => sfo.data().iter().filter_map(ValueBox::as_float).collect(),
        Output::Multi(_) => panic!("expected single-feature output"),
    };
    assert_eq!(squared, vec![1.0, 4.0, 9.0]);

    let timings_len = match graph.node(&nest).unwrap().output("timings").unwrap() {
        Output::Single(sfo) => sfo.data().len(),
        Output::Multi(_) => panic!("expected single-feature output"),
    };
    assert_eq!(timings_len, 3);

    let _ = std::fs::remove_file(&path);
}
