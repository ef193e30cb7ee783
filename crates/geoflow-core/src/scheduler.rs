//! Topological, readiness-driven scheduling (SPEC_FULL.md §4.F, §4.H): the
//! PROCESSING -> `process()` -> DONE cycle for a single node, and the
//! whole-graph drivers `run`/`run_all` built on top of it.

use crate::endpoint::Endpoint;
use crate::error::Result;
use crate::graph::Graph;
use crate::node::NodeStatus;
use crate::terminal::Output;

/// Runs a node and everything its outputs make ready, starting from
/// `start_name`. Returns the number of nodes that actually ran. Not
/// re-entrant on the same `Graph` (SPEC_FULL.md §5).
pub fn run(graph: &mut Graph, start_name: &str) -> Result<usize> {
    graph.queue.clear();
    graph.with_node_and_graph(start_name, |node, g| {
        node.update_status(g);
    })?;
    if graph.node(start_name)?.status() == NodeStatus::Ready {
        graph.queue.push_back(start_name.to_string());
    }

    let mut ran = 0;
    while let Some(name) = graph.queue.pop_front() {
        if graph.node(&name)?.status() != NodeStatus::Ready {
            continue;
        }
        run_node(graph, &name)?;
        ran += 1;
    }
    Ok(ran)
}

/// Runs every autorun root node in the graph (insertion order), after
/// refreshing every node's parameters from the current globals. Used for a
/// whole-flowchart execution rather than a single triggered sub-run.
///
/// Notifies each root's descendants before running it, so a second
/// `run_all` on an already-`Done` graph re-runs rather than no-ops (mirrors
/// the original `NodeManager::run_all`'s default `notify_children=true`).
/// `notify_children` only resets the *descendants* it walks to, not
/// `start_node` itself (it has no upstream input to clear), so the root is
/// reset to WAITING directly first - otherwise `update_status`'s
/// DONE/PROCESSING guard would keep a once-run root stuck DONE forever.
pub fn run_all(graph: &mut Graph) -> Result<usize> {
    refresh_all_parameters(graph)?;
    let mut total = 0;
    for root in graph.root_node_names() {
        if !graph.node(&root)?.autorun() {
            continue;
        }
        graph.node_mut(&root)?.reset_to_waiting();
        crate::connection::notify_children(graph, &root);
        total += run(graph, &root)?;
    }
    Ok(total)
}

fn refresh_all_parameters(graph: &mut Graph) -> Result<()> {
    let globals = graph.globals().clone();
    for name in graph.node_names() {
        let node = graph.node_mut(&name)?;
        for parameter in node.parameters_mut() {
            parameter.refresh_from_master(&globals);
        }
    }
    Ok(())
}

/// One PROCESSING -> DONE cycle: refreshes this node's parameters, runs
/// `process()` with the node detached from the graph, then either marks it
/// DONE and propagates its outputs, or leaves it READY (not DONE) and
/// propagates the error upward (SPEC_FULL.md §4.H, §5 "Cancellation &
/// timeouts").
fn run_node(graph: &mut Graph, name: &str) -> Result<()> {
    {
        let globals = graph.globals().clone();
        let node = graph.node_mut(name)?;
        for parameter in node.parameters_mut() {
            parameter.refresh_from_master(&globals);
        }
    }

    let outcome = graph.with_node_and_graph(name, |node, g| {
        node.status = NodeStatus::Processing;
        node.run_process(g)
    })?;

    match outcome {
        Ok(()) => {
            graph.node_mut(name)?.status = NodeStatus::Done;
            tracing::debug!(node = name, "node done");
            propagate_outputs(graph, name)
        }
        Err(err) => {
            graph.node_mut(name)?.reset_to_waiting();
            graph.with_node_and_graph(name, |node, g| {
                node.update_status(g);
            })?;
            tracing::error!(node = name, error = %err, "node processing failed");
            Err(err)
        }
    }
}

fn propagate_outputs(graph: &mut Graph, name: &str) -> Result<()> {
    let output_names: Vec<String> = graph.node(name)?.outputs().map(|o| o.name().to_string()).collect();
    for out_name in output_names {
        let (has_data, downstream): (bool, Vec<Endpoint>) = {
            let output = graph.node(name)?.output(&out_name)?;
            let downstream = match output {
                Output::Single(sfo) => sfo.connections().to_vec(),
                Output::Multi(mfo) => mfo.connections().to_vec(),
            };
            (output.has_data() || output.is_touched(), downstream)
        };
        if !has_data {
            continue;
        }
        for in_ep in downstream {
            crate::connection::update_on_receive(graph, &in_ep, true)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::float::FloatNode;
    use crate::builtins::float_add::FloatAddNode;
    use crate::connection::connect;
    use crate::node::NodeBehavior;
    use crate::register::{NodeRegister, NodeRegisterMap};
    use crate::types::ValueBox;

    fn test_graph() -> Graph {
        let mut register = NodeRegister::new("core");
        register.register_node("float", || Box::new(FloatNode::default()) as Box<dyn NodeBehavior>);
        register.register_node("float_add", || Box::new(FloatAddNode::default()) as Box<dyn NodeBehavior>);
        let mut map = NodeRegisterMap::new();
        map.insert(register);
        Graph::new(map)
    }

    #[test]
    fn run_all_propagates_through_float_add() {
        let mut graph = test_graph();
        let a = graph.create_node("core", "float").unwrap();
        let b = graph.create_node("core", "float").unwrap();
        let sum = graph.create_node("core", "float_add").unwrap();
        graph.node_mut(&a).unwrap().parameter_mut("value").unwrap().set(ValueBox::float(2.0)).unwrap();
        graph.node_mut(&b).unwrap().parameter_mut("value").unwrap().set(ValueBox::float(3.0)).unwrap();
        connect(&mut graph, Endpoint::new(a.as_str(), "value"), Endpoint::new(sum.as_str(), "in1")).unwrap();
        connect(&mut graph, Endpoint::new(b.as_str(), "value"), Endpoint::new(sum.as_str(), "in2")).unwrap();

        let ran = run_all(&mut graph).unwrap();
        assert!(ran >= 3);
        assert_eq!(graph.node(&sum).unwrap().status(), NodeStatus::Done);
        let result = graph
            .find_output(&Endpoint::new(sum.as_str(), "result"))
            .and_then(|o| match o {
                Output::Single(sfo) => sfo.get(0),
                Output::Multi(_) => None,
            })
            .and_then(|v| v.as_float());
        assert_eq!(result, Some(5.0));
    }

    #[test]
    fn run_all_reruns_after_a_parameter_change() {
        let mut graph = test_graph();
        let a = graph.create_node("core", "float").unwrap();
        let b = graph.create_node("core", "float").unwrap();
        let sum = graph.create_node("core", "float_add").unwrap();
        graph.node_mut(&a).unwrap().parameter_mut("value").unwrap().set(ValueBox::float(2.0)).unwrap();
        graph.node_mut(&b).unwrap().parameter_mut("value").unwrap().set(ValueBox::float(3.0)).unwrap();
        connect(&mut graph, Endpoint::new(a.as_str(), "value"), Endpoint::new(sum.as_str(), "in1")).unwrap();
        connect(&mut graph, Endpoint::new(b.as_str(), "value"), Endpoint::new(sum.as_str(), "in2")).unwrap();

        run_all(&mut graph).unwrap();
        assert_eq!(graph.node(&sum).unwrap().status(), NodeStatus::Done);

        graph.node_mut(&a).unwrap().parameter_mut("value").unwrap().set(ValueBox::float(10.0)).unwrap();
        let ran = run_all(&mut graph).unwrap();
        assert!(ran >= 3, "a second run_all should re-run the roots and their descendants, not no-op");
        assert_eq!(graph.node(&sum).unwrap().status(), NodeStatus::Done);

        let result = graph
            .find_output(&Endpoint::new(sum.as_str(), "result"))
            .and_then(|o| match o {
                Output::Single(sfo) => sfo.get(0),
                Output::Multi(_) => None,
            })
            .and_then(|v| v.as_float());
        assert_eq!(result, Some(13.0));
    }
}
