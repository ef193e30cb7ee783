//! Nested sub-flowchart fan-out (SPEC_FULL.md §4.I): `NestNode` loads a
//! child flowchart once (on parameter load), then on each `process()` call
//! re-runs it once per index of its driving inputs, injecting a synthetic
//! `Proxy` root to carry each iteration's slice of data in.

use std::path::PathBuf;
use std::time::Instant;

use crate::builtins::proxy::ProxyNode;
use crate::connection;
use crate::endpoint::Endpoint;
use crate::error::{GeoflowError, Result};
use crate::graph::Graph;
use crate::node::{Node, NodeBehavior, NodeDecl, ProcessContext};
use crate::parameter::Parameter;
use crate::persistence;
use crate::scheduler;
use crate::terminal::{Family, MultiFeatureOutput, Output, SingleFeatureOutput};
use crate::types::{TypeTag, ValueBox};

const PROXY_NAME: &str = "__proxy__";

/// A sub-graph terminal marked *exported*, discovered while introspecting
/// the loaded child flowchart. `outer_name` is the name under which
/// `NestNode` re-exposes it - the bare terminal name, on the assumption
/// that exported terminal names are unique across the sub-flowchart (see
/// DESIGN.md).
#[derive(Debug, Clone)]
struct ExportedTerminal {
    child_node: String,
    child_terminal: String,
    family: Family,
    tags: Vec<TypeTag>,
}

impl ExportedTerminal {
    fn outer_name(&self) -> &str {
        &self.child_terminal
    }
}

#[derive(Debug, Clone, Default)]
pub struct NestNode {
    path: Option<PathBuf>,
    template: Option<Graph>,
    exported_inputs: Vec<ExportedTerminal>,
    exported_outputs: Vec<ExportedTerminal>,
}

impl NodeBehavior for NestNode {
    fn type_name(&self) -> &'static str {
        "Nest"
    }

    fn clone_box(&self) -> Box<dyn NodeBehavior> {
        Box::new(self.clone())
    }

    fn init(&mut self, decl: &mut NodeDecl) {
        decl.add_param(Parameter::new("path", "path to the sub-flowchart JSON", ValueBox::string("")));
        decl.add_poly_input("globals", vec![TypeTag::Bool, TypeTag::Int, TypeTag::Float, TypeTag::String]);
        decl.add_vector_output("timings", TypeTag::Float);
    }

    /// `.globals` is the only input that is never required - everything
    /// else a NestNode declares is added dynamically once its sub-flowchart
    /// is known, and those *are* subject to the default validity rule.
    fn inputs_valid(&self, inputs: &indexmap::IndexMap<String, crate::terminal::Input>, graph: &Graph) -> bool {
        inputs.iter().all(|(name, input)| {
            if name == "globals" {
                true
            } else {
                match input {
                    crate::terminal::Input::Single(sfi) => sfi.optional || sfi.has_data(graph),
                    crate::terminal::Input::Multi(mfi) => mfi.has_data(graph) && mfi.validate_equal_lengths(graph).is_ok(),
                }
            }
        })
    }

    fn post_parameter_load(&mut self, ctx: &mut ProcessContext) -> Result<()> {
        let path_str = ctx.param_str("path")?.to_string();
        if path_str.is_empty() {
            return Ok(());
        }
        let path = PathBuf::from(&path_str);
        let registers = ctx.graph().shared_registers();
        let text = std::fs::read_to_string(&path)?;
        let child = persistence::from_str(&text, registers, false)?;

        let mut exported_inputs = Vec::new();
        let mut exported_outputs = Vec::new();
        for (node_name, node) in child.nodes() {
            for input in node.inputs() {
                if input.marked() {
                    exported_inputs.push(ExportedTerminal {
                        child_node: node_name.clone(),
                        child_terminal: input.name().to_string(),
                        family: input.family(),
                        tags: input.accepted_tags().to_vec(),
                    });
                }
            }
            for output in node.outputs() {
                if output.marked() {
                    exported_outputs.push(ExportedTerminal {
                        child_node: node_name.clone(),
                        child_terminal: output.name().to_string(),
                        family: output.family(),
                        tags: output.accepted_tags().to_vec(),
                    });
                }
            }
        }

        for exp in &exported_inputs {
            if ctx.has_input(exp.outer_name()) {
                continue;
            }
            match exp.family {
                Family::Single => ctx.declare_vector_input(exp.outer_name(), exp.tags.clone(), true),
                Family::Multi => ctx.declare_poly_input(exp.outer_name(), exp.tags.clone()),
            }
        }
        for exp in &exported_outputs {
            if ctx.has_output(exp.outer_name()) {
                continue;
            }
            match exp.family {
                Family::Single => ctx.declare_vector_output(exp.outer_name(), exp.tags.first().cloned().unwrap_or(TypeTag::String)),
                Family::Multi => ctx.declare_poly_output(exp.outer_name(), exp.tags.clone()),
            }
        }

        self.path = Some(path);
        self.template = Some(child);
        self.exported_inputs = exported_inputs;
        self.exported_outputs = exported_outputs;
        Ok(())
    }

    fn process(&mut self, ctx: &mut ProcessContext) -> Result<()> {
        self.process_sequential(ctx)
    }
}

impl NestNode {
    fn iteration_count(&self, ctx: &ProcessContext) -> Result<usize> {
        match self.exported_inputs.first() {
            None => Ok(0),
            Some(exp) => match exp.family {
                Family::Single => Ok(ctx.input_vector(exp.outer_name())?.len()),
                Family::Multi => ctx.poly_input_size(exp.outer_name()),
            },
        }
    }

    /// Parallel fan-out is permanently excluded from this core (threading
    /// model is out of scope); every call dispatches here regardless of
    /// graph size.
    fn process_sequential(&mut self, ctx: &mut ProcessContext) -> Result<()> {
        let template = self
            .template
            .as_ref()
            .ok_or_else(|| GeoflowError::NodeProcessingError { node: ctx.node_name().to_string(), message: "no sub-flowchart loaded".into() })?;

        let n = self.iteration_count(ctx)?;
        for exp in &self.exported_outputs {
            match exp.family {
                Family::Single => ctx.clear_output(exp.outer_name())?,
                Family::Multi => {
                    ctx.poly_output_mut(exp.outer_name())?.clear();
                }
            }
        }
        ctx.clear_output("timings")?;

        let globals_per_sub: Vec<(String, Vec<ValueBox>)> = ctx.poly_input_values("globals")?;

        for i in 0..n {
            let started = Instant::now();
            let mut child = template.deep_clone_reset();
            child.set_globals_from(ctx.graph());
            for (sub_name, values) in &globals_per_sub {
                if let Some(value) = values.get(i) {
                    child.set_global(sub_name.clone(), Parameter::new(sub_name.clone(), "", value.clone()));
                }
            }

            inject_proxy(&mut child, &self.exported_inputs);
            for exp in &self.exported_inputs {
                connection::connect(
                    &mut child,
                    Endpoint::new(PROXY_NAME, exp.child_terminal.as_str()),
                    Endpoint::new(exp.child_node.as_str(), exp.child_terminal.as_str()),
                )?;
            }
            feed_proxy(&mut child, ctx, &self.exported_inputs, i)?;

            scheduler::run_all(&mut child)?;

            for exp in &self.exported_outputs {
                collect_output(ctx, &child, exp, i == 0)?;
            }

            let elapsed = started.elapsed().as_secs_f64();
            ctx.push_output("timings", ValueBox::float(elapsed))?;
        }
        Ok(())
    }
}

fn inject_proxy(child: &mut Graph, exported_inputs: &[ExportedTerminal]) {
    let mut proxy = Node::new(PROXY_NAME, "core", Box::new(ProxyNode) as Box<dyn NodeBehavior>);
    for exp in exported_inputs {
        let output = match exp.family {
            Family::Single => Output::Single(SingleFeatureOutput::new(exp.child_terminal.clone(), exp.tags.clone())),
            Family::Multi => Output::Multi(MultiFeatureOutput::new(exp.child_terminal.clone(), exp.tags.clone())),
        };
        proxy.outputs.insert(exp.child_terminal.clone(), output);
    }
    child.insert_node(PROXY_NAME, proxy);
}

fn feed_proxy(child: &mut Graph, ctx: &ProcessContext, exported_inputs: &[ExportedTerminal], i: usize) -> Result<()> {
    for exp in exported_inputs {
        let proxy = child.node_mut(PROXY_NAME)?;
        match (exp.family, proxy.output_mut(&exp.child_terminal)?) {
            (Family::Single, Output::Single(sfo)) => {
                let values = ctx.input_vector(exp.outer_name())?;
                let value = values.get(i).cloned().unwrap_or_else(|| ValueBox::empty(exp.tags.first().cloned().unwrap_or(TypeTag::String)));
                sfo.set(value)?;
            }
            (Family::Multi, Output::Multi(mfo)) => {
                mfo.clear();
                for (sub_name, values) in ctx.poly_input_values(exp.outer_name())? {
                    let tag = exp.tags.first().cloned().unwrap_or(TypeTag::String);
                    let value = values.get(i).cloned().unwrap_or_else(|| ValueBox::empty(tag.clone()));
                    mfo.add(sub_name, tag)?.push_back(value)?;
                }
            }
            _ => unreachable!("proxy output family must match the exported input's family"),
        }
    }
    Ok(())
}

fn collect_output(ctx: &mut ProcessContext, child: &Graph, exp: &ExportedTerminal, first_iteration: bool) -> Result<()> {
    let ep = Endpoint::new(exp.child_node.as_str(), exp.child_terminal.as_str());
    match exp.family {
        Family::Single => {
            let sfo = child.find_single_output(&ep);
            match sfo {
                Some(sfo) if sfo.has_data() => {
                    for value in sfo.data() {
                        ctx.push_output(exp.outer_name(), value.clone())?;
                    }
                }
                _ => ctx.push_output(exp.outer_name(), ValueBox::empty(exp.tags.first().cloned().unwrap_or(TypeTag::String)))?,
            }
        }
        Family::Multi => {
            let Some(Output::Multi(mfo)) = child.find_output(&ep) else {
                return Ok(());
            };
            let out = ctx.poly_output_mut(exp.outer_name())?;
            for (sub_name, sub_sfo) in mfo.sub_terminals() {
                if first_iteration && out.sub_terminal(sub_name).is_none() {
                    let tag = sub_sfo.accepted_tags.first().cloned().unwrap_or(TypeTag::String);
                    out.add(sub_name.clone(), tag)?;
                }
                if let Some(dest) = out.sub_terminal_mut(sub_name) {
                    for value in sub_sfo.data() {
                        dest.push_back(value.clone())?;
                    }
                }
            }
        }
    }
    Ok(())
}
