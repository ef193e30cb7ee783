//! Connection algebra (SPEC_FULL.md §4.G): establishing, tearing down and
//! propagating across the endpoint-identifier edges that link terminals.
//! Nothing here ever holds an owning reference to a terminal across an
//! edge - every step resolves endpoints back through the `Graph`.

use std::collections::{HashSet, VecDeque};

use crate::endpoint::Endpoint;
use crate::error::{GeoflowError, Result};
use crate::graph::Graph;
use crate::node::NodeStatus;
use crate::terminal::{Family, Input, Output};
use crate::types::compatible;

/// Connects an output terminal to an input terminal, following the
/// five-step algorithm: compatibility check, cycle detection, implicit
/// disconnect of a single-feature input's prior upstream, recording both
/// endpoints (plus the `on_connect_*` hooks), and an immediate propagation
/// if the producer already carries data.
pub fn connect(graph: &mut Graph, out: Endpoint, in_: Endpoint) -> Result<()> {
    let (out_tags, out_family) = {
        let output = graph
            .find_output(&out)
            .ok_or_else(|| GeoflowError::UnknownTerminal { node: out.node.clone(), terminal: out.terminal.clone() })?;
        (output.accepted_tags().to_vec(), output.family())
    };
    let (in_tags, in_family) = {
        let input = graph.node(&in_.node)?.input(&in_.terminal)?;
        (input.accepted_tags().to_vec(), input.family())
    };

    if !compatible(&out_tags, &in_tags) {
        return Err(GeoflowError::TypeMismatch {
            context: format!(
                "cannot connect {} ({:?}) to {} ({:?})",
                out.full_name(),
                out_tags,
                in_.full_name(),
                in_tags
            ),
        });
    }
    if in_family == Family::Single && out_family == Family::Multi {
        return Err(GeoflowError::TypeMismatch {
            context: format!(
                "poly output {} cannot connect to single-feature input {}",
                out.full_name(),
                in_.full_name()
            ),
        });
    }
    if would_create_cycle(graph, &in_.node, &out.node) {
        return Err(GeoflowError::CycleDetected { from: out.node.clone(), to: in_.node.clone() });
    }

    if in_family == Family::Single {
        let prior = match graph.node(&in_.node)?.input(&in_.terminal)? {
            Input::Single(sfi) => sfi.upstream().cloned(),
            Input::Multi(_) => None,
        };
        if let Some(prior_out) = prior {
            disconnect(graph, &prior_out, &in_)?;
        }
    }

    match graph.node_mut(&out.node)?.output_mut(&out.terminal)? {
        Output::Single(sfo) => sfo.connections.push(in_.clone()),
        Output::Multi(mfo) => mfo.connections.push(in_.clone()),
    }
    match graph.node_mut(&in_.node)?.input_mut(&in_.terminal)? {
        Input::Single(sfi) => sfi.upstream = Some(out.clone()),
        Input::Multi(mfi) => mfi.connections.push(out.clone()),
    }

    graph.node_mut(&out.node)?.behavior.on_connect_output(&out.terminal);
    graph.node_mut(&in_.node)?.behavior.on_connect_input(&in_.terminal);

    let producer_has_data = graph.find_output(&out).is_some_and(|o| o.has_data() || o.is_touched());
    if producer_has_data {
        update_on_receive(graph, &in_, false)?;
    }
    tracing::debug!(out = %out.full_name(), r#in = %in_.full_name(), "connected");
    Ok(())
}

/// Removes a single edge, clears the input's derived data, and propagates
/// the clearing to everything downstream of the input's node.
pub fn disconnect(graph: &mut Graph, out: &Endpoint, in_: &Endpoint) -> Result<()> {
    match graph.node_mut(&out.node)?.output_mut(&out.terminal)? {
        Output::Single(sfo) => sfo.connections.retain(|ep| ep != in_),
        Output::Multi(mfo) => mfo.connections.retain(|ep| ep != in_),
    }
    match graph.node_mut(&in_.node)?.input_mut(&in_.terminal)? {
        Input::Single(sfi) => sfi.upstream = None,
        Input::Multi(mfi) => mfi.connections.retain(|ep| ep != out),
    }
    clear_input(graph, in_)?;
    notify_children(graph, &in_.node);
    tracing::debug!(out = %out.full_name(), r#in = %in_.full_name(), "disconnected");
    Ok(())
}

/// Rebuilds an MFI's flattened sub-terminal view (if `in_` is one),
/// re-evaluates the owning node's status, optionally enqueues it for
/// scheduling, and fires the node's `on_receive_*` hook.
pub fn update_on_receive(graph: &mut Graph, in_: &Endpoint, queue: bool) -> Result<()> {
    let multi = matches!(graph.node(&in_.node)?.input(&in_.terminal)?, Input::Multi(_));
    if multi {
        graph.with_node_and_graph(&in_.node, |node, g| {
            if let Ok(Input::Multi(mfi)) = node.input_mut(&in_.terminal) {
                mfi.rebuild(g);
            }
        })?;
    }

    let became_ready = graph.with_node_and_graph(&in_.node, |node, g| {
        let changed = node.update_status(g);
        changed && node.status() == NodeStatus::Ready
    })?;

    if became_ready && queue && graph.node(&in_.node)?.autorun() {
        graph.queue.push_back(in_.node.clone());
    }

    graph.with_node_and_graph(&in_.node, |node, g| node.notify_on_receive(g, &in_.terminal, multi))?;
    Ok(())
}

fn clear_input(graph: &mut Graph, in_: &Endpoint) -> Result<()> {
    graph.with_node_and_graph(&in_.node, |node, g| {
        node.behavior.on_clear(&in_.terminal);
        node.update_status(g);
    })?;
    Ok(())
}

/// BFS forward from every node reachable from `start_node` (inclusive):
/// clears each reachable output and, for every input it feeds, clears that
/// input too and resets the owning node back to WAITING so its readiness is
/// re-derived on the next `update_status`.
pub(crate) fn notify_children(graph: &mut Graph, start_node: &str) {
    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<String> = VecDeque::new();
    visited.insert(start_node.to_string());
    queue.push_back(start_node.to_string());

    while let Some(current) = queue.pop_front() {
        let output_names: Vec<String> = match graph.node(&current) {
            Ok(node) => node.outputs().map(|o| o.name().to_string()).collect(),
            Err(_) => continue,
        };
        for out_name in output_names {
            let downstream: Vec<Endpoint> = match graph.node(&current).and_then(|n| n.output(&out_name)) {
                Ok(Output::Single(sfo)) => sfo.connections().to_vec(),
                Ok(Output::Multi(mfo)) => mfo.connections().to_vec(),
                Err(_) => continue,
            };
            if let Ok(node) = graph.node_mut(&current)
                && let Ok(output) = node.output_mut(&out_name)
            {
                output.clear();
            }
            for ep in downstream {
                if let Ok(node) = graph.node_mut(&ep.node) {
                    node.behavior.on_clear(&ep.terminal);
                    node.reset_to_waiting();
                }
                if visited.insert(ep.node.clone()) {
                    queue.push_back(ep.node.clone());
                }
            }
        }
    }
}

/// Would connecting `out_node -> in_node` close a cycle? True iff `out_node`
/// is already reachable forward (through existing connections) from
/// `in_node`.
fn would_create_cycle(graph: &Graph, in_node: &str, out_node: &str) -> bool {
    if in_node == out_node {
        return true;
    }
    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<String> = VecDeque::new();
    visited.insert(in_node.to_string());
    queue.push_back(in_node.to_string());

    while let Some(current) = queue.pop_front() {
        if current == out_node {
            return true;
        }
        let Ok(node) = graph.node(&current) else { continue };
        for output in node.outputs() {
            let downstream: &[Endpoint] = match output {
                Output::Single(sfo) => sfo.connections(),
                Output::Multi(mfo) => mfo.connections(),
            };
            for ep in downstream {
                if visited.insert(ep.node.clone()) {
                    queue.push_back(ep.node.clone());
                }
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::float::FloatNode;
    use crate::builtins::float_add::FloatAddNode;
    use crate::node::NodeBehavior;
    use crate::register::{NodeRegister, NodeRegisterMap};

    fn test_graph() -> Graph {
        let mut register = NodeRegister::new("core");
        register.register_node("float", || Box::new(FloatNode::default()) as Box<dyn NodeBehavior>);
        register.register_node("float_add", || Box::new(FloatAddNode::default()) as Box<dyn NodeBehavior>);
        let mut map = NodeRegisterMap::new();
        map.insert(register);
        Graph::new(map)
    }

    #[test]
    fn connect_rejects_self_cycle() {
        let mut graph = test_graph();
        let node = graph.create_node("core", "float_add").unwrap();
        let err = connect(&mut graph, Endpoint::new(node.as_str(), "result"), Endpoint::new(node.as_str(), "in1")).unwrap_err();
        assert!(matches!(err, GeoflowError::CycleDetected { .. }));
    }

    #[test]
    fn connect_then_disconnect_resets_downstream_status() {
        let mut graph = test_graph();
        let producer = graph.create_node("core", "float").unwrap();
        let consumer = graph.create_node("core", "float_add").unwrap();
        connect(&mut graph, Endpoint::new(producer.as_str(), "value"), Endpoint::new(consumer.as_str(), "in1")).unwrap();
        disconnect(&mut graph, &Endpoint::new(producer.as_str(), "value"), &Endpoint::new(consumer.as_str(), "in1")).unwrap();
        match graph.node(&consumer).unwrap().input("in1").unwrap() {
            Input::Single(sfi) => assert!(sfi.upstream().is_none()),
            Input::Multi(_) => panic!("expected single-feature input"),
        }
    }
}
