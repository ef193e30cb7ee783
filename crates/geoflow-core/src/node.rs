use indexmap::IndexMap;

use crate::error::{GeoflowError, Result};
use crate::graph::Graph;
use crate::parameter::Parameter;
use crate::terminal::{Input, MultiFeatureInput, MultiFeatureOutput, Output, SingleFeatureInput, SingleFeatureOutput};
use crate::types::{TypeTag, ValueBox};

/// `WAITING -> READY -> PROCESSING -> DONE`, driven by `update_status()`
/// (SPEC_FULL.md §4.D).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    Waiting,
    Ready,
    Processing,
    Done,
}

/// The user-supplied behaviour of a node type: `init`/`process` plus the
/// optional event hooks. Split out from `Node` (which owns the terminal and
/// parameter data) so the scheduler can hand a behaviour `&mut` access to
/// its own data while holding only a shared borrow of the rest of the graph
/// (SPEC_FULL.md §9, "Node/behaviour split").
pub trait NodeBehavior: std::fmt::Debug {
    fn type_name(&self) -> &'static str;

    /// Supports deep-cloning a Graph (nested-flowchart fanout clones its
    /// child graph once per outer index). Each concrete behaviour just
    /// returns `Box::new(self.clone())`.
    fn clone_box(&self) -> Box<dyn NodeBehavior>;

    /// Declares terminals and parameters.
    fn init(&mut self, decl: &mut NodeDecl);

    /// Reads inputs, writes outputs.
    fn process(&mut self, ctx: &mut ProcessContext) -> Result<()>;

    fn on_receive_single(&mut self, _ctx: &mut ProcessContext, _terminal: &str) {}
    fn on_receive_multi(&mut self, _ctx: &mut ProcessContext, _terminal: &str) {}
    fn on_clear(&mut self, _terminal: &str) {}
    fn on_connect_input(&mut self, _terminal: &str) {}
    fn on_connect_output(&mut self, _terminal: &str) {}
    fn on_change_parameter(&mut self, _label: &str) {}

    /// Called once after parameters are restored during deserialisation
    /// (and, for freshly-created nodes, right after `init`). `NestNode`
    /// uses this to load its child flowchart.
    fn post_parameter_load(&mut self, _ctx: &mut ProcessContext) -> Result<()> {
        Ok(())
    }

    fn parameters_valid(&self) -> bool {
        true
    }

    /// Default: every non-optional single-feature input has data, and every
    /// multi-feature input has data on all its sub-terminals.
    fn inputs_valid(&self, inputs: &IndexMap<String, Input>, graph: &Graph) -> bool {
        default_inputs_valid(inputs, graph)
    }
}

pub fn default_inputs_valid(inputs: &IndexMap<String, Input>, graph: &Graph) -> bool {
    inputs.values().all(|input| match input {
        Input::Single(sfi) => sfi.optional || sfi.has_data(graph),
        Input::Multi(mfi) => mfi.has_data(graph) && mfi.validate_equal_lengths(graph).is_ok(),
    })
}

/// A vertex in the Graph: owns its terminals (keyed by name), its
/// parameters (keyed by label), a position, an autorun flag, a status, and
/// a boxed behaviour.
impl Clone for Box<dyn NodeBehavior> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) name: String,
    pub(crate) register_name: String,
    pub(crate) type_name: String,
    pub(crate) position: (f32, f32),
    pub(crate) autorun: bool,
    pub(crate) status: NodeStatus,
    pub(crate) inputs: IndexMap<String, Input>,
    pub(crate) outputs: IndexMap<String, Output>,
    pub(crate) parameters: IndexMap<String, Parameter>,
    pub(crate) behavior: Box<dyn NodeBehavior>,
}

impl Node {
    pub(crate) fn new(name: impl Into<String>, register_name: impl Into<String>, mut behavior: Box<dyn NodeBehavior>) -> Self {
        let type_name = behavior.type_name().to_string();
        let mut node = Node {
            name: name.into(),
            register_name: register_name.into(),
            type_name,
            position: (0.0, 0.0),
            autorun: true,
            status: NodeStatus::Waiting,
            inputs: IndexMap::new(),
            outputs: IndexMap::new(),
            parameters: IndexMap::new(),
            behavior: Box::new(NoopBehavior),
        };
        {
            let mut decl = NodeDecl {
                inputs: &mut node.inputs,
                outputs: &mut node.outputs,
                parameters: &mut node.parameters,
            };
            behavior.init(&mut decl);
        }
        node.behavior = behavior;
        node
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn register_name(&self) -> &str {
        &self.register_name
    }

    pub fn status(&self) -> NodeStatus {
        self.status
    }

    pub fn autorun(&self) -> bool {
        self.autorun
    }

    pub fn set_autorun(&mut self, autorun: bool) {
        self.autorun = autorun;
    }

    pub fn position(&self) -> (f32, f32) {
        self.position
    }

    pub fn set_position(&mut self, x: f32, y: f32) {
        self.position = (x, y);
    }

    pub fn is_root(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn is_leaf(&self) -> bool {
        self.outputs.is_empty()
    }

    pub fn input(&self, name: &str) -> Result<&Input> {
        self.inputs.get(name).ok_or_else(|| unknown_terminal(&self.name, name))
    }

    pub fn input_mut(&mut self, name: &str) -> Result<&mut Input> {
        self.inputs.get_mut(name).ok_or_else(|| unknown_terminal(&self.name, name))
    }

    pub fn output(&self, name: &str) -> Result<&Output> {
        self.outputs.get(name).ok_or_else(|| unknown_terminal(&self.name, name))
    }

    pub fn output_mut(&mut self, name: &str) -> Result<&mut Output> {
        self.outputs.get_mut(name).ok_or_else(|| unknown_terminal(&self.name, name))
    }

    pub fn inputs(&self) -> impl Iterator<Item = &Input> {
        self.inputs.values()
    }

    pub fn outputs(&self) -> impl Iterator<Item = &Output> {
        self.outputs.values()
    }

    pub fn parameter(&self, label: &str) -> Result<&Parameter> {
        self.parameters
            .get(label)
            .ok_or_else(|| GeoflowError::UnknownTerminal { node: self.name.clone(), terminal: label.to_string() })
    }

    pub fn parameter_mut(&mut self, label: &str) -> Result<&mut Parameter> {
        self.parameters
            .get_mut(label)
            .ok_or_else(|| GeoflowError::UnknownTerminal { node: self.name.clone(), terminal: label.to_string() })
    }

    pub fn parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.values()
    }

    pub fn parameters_mut(&mut self) -> impl Iterator<Item = &mut Parameter> {
        self.parameters.values_mut()
    }

    pub fn dump_params(&self) -> &IndexMap<String, Parameter> {
        &self.parameters
    }

    /// Sets READY iff `inputs_valid()`, else WAITING. Returns whether the
    /// status changed.
    pub fn update_status(&mut self, graph: &Graph) -> bool {
        if matches!(self.status, NodeStatus::Processing | NodeStatus::Done) {
            return false;
        }
        let valid = self.behavior.inputs_valid(&self.inputs, graph);
        let new_status = if valid { NodeStatus::Ready } else { NodeStatus::Waiting };
        let changed = new_status != self.status;
        self.status = new_status;
        changed
    }

    /// Resets a DONE/PROCESSING node back to a state `update_status` can
    /// re-evaluate (used after `notify_children` clears data downstream).
    pub(crate) fn reset_to_waiting(&mut self) {
        self.status = NodeStatus::Waiting;
    }

    pub(crate) fn run_post_parameter_load(&mut self, graph: &Graph) -> Result<()> {
        let mut ctx = ProcessContext {
            graph,
            inputs: &mut self.inputs,
            outputs: &mut self.outputs,
            parameters: &mut self.parameters,
            node_name: &self.name,
        };
        self.behavior.post_parameter_load(&mut ctx)
    }

    /// Runs `process()` with a shared view of the rest of the graph. The
    /// caller is responsible for having removed `self` from the graph's
    /// node map first (see `scheduler::run_node`).
    pub(crate) fn run_process(&mut self, graph: &Graph) -> Result<()> {
        let mut ctx = ProcessContext {
            graph,
            inputs: &mut self.inputs,
            outputs: &mut self.outputs,
            parameters: &mut self.parameters,
            node_name: &self.name,
        };
        self.behavior.process(&mut ctx)
    }

    pub(crate) fn notify_on_receive(&mut self, graph: &Graph, terminal: &str, multi: bool) {
        let mut ctx = ProcessContext {
            graph,
            inputs: &mut self.inputs,
            outputs: &mut self.outputs,
            parameters: &mut self.parameters,
            node_name: &self.name,
        };
        if multi {
            self.behavior.on_receive_multi(&mut ctx, terminal);
        } else {
            self.behavior.on_receive_single(&mut ctx, terminal);
        }
    }
}

fn unknown_terminal(node: &str, terminal: &str) -> GeoflowError {
    GeoflowError::UnknownTerminal { node: node.to_string(), terminal: terminal.to_string() }
}

/// The declaration surface passed to `NodeBehavior::init` and
/// `post_parameter_load` (for nodes such as `NestNode` that add terminals
/// dynamically after their path parameter is known).
pub struct NodeDecl<'a> {
    inputs: &'a mut IndexMap<String, Input>,
    outputs: &'a mut IndexMap<String, Output>,
    parameters: &'a mut IndexMap<String, Parameter>,
}

impl<'a> NodeDecl<'a> {
    pub fn add_input(&mut self, name: impl Into<String>, tags: Vec<TypeTag>, optional: bool) {
        let name = name.into();
        self.inputs.insert(name.clone(), Input::Single(SingleFeatureInput::new(name, tags, optional)));
    }

    pub fn add_vector_input(&mut self, name: impl Into<String>, tags: Vec<TypeTag>, optional: bool) {
        let name = name.into();
        self.inputs.insert(name.clone(), Input::Single(SingleFeatureInput::vector(name, tags, optional)));
    }

    pub fn add_poly_input(&mut self, name: impl Into<String>, tags: Vec<TypeTag>) {
        let name = name.into();
        self.inputs.insert(name.clone(), Input::Multi(MultiFeatureInput::new(name, tags)));
    }

    pub fn add_output(&mut self, name: impl Into<String>, tag: TypeTag) {
        let name = name.into();
        self.outputs.insert(name.clone(), Output::Single(SingleFeatureOutput::new(name, vec![tag])));
    }

    pub fn add_output_tags(&mut self, name: impl Into<String>, tags: Vec<TypeTag>) {
        let name = name.into();
        self.outputs.insert(name.clone(), Output::Single(SingleFeatureOutput::new(name, tags)));
    }

    /// Alias for `add_output`: an SFO is already vector-capable (it owns a
    /// `Vec<ValueBox>`), so "vector output" is a naming convention rather
    /// than a distinct representation.
    pub fn add_vector_output(&mut self, name: impl Into<String>, tag: TypeTag) {
        self.add_output(name, tag);
    }

    pub fn add_poly_output(&mut self, name: impl Into<String>, tags: Vec<TypeTag>) {
        let name = name.into();
        self.outputs.insert(name.clone(), Output::Multi(MultiFeatureOutput::new(name, tags)));
    }

    pub fn add_param(&mut self, parameter: Parameter) {
        self.parameters.insert(parameter.label().to_string(), parameter);
    }

    pub fn has_input(&self, name: &str) -> bool {
        self.inputs.contains_key(name)
    }

    pub fn has_output(&self, name: &str) -> bool {
        self.outputs.contains_key(name)
    }

    pub fn remove_output(&mut self, name: &str) {
        self.outputs.shift_remove(name);
    }

    pub fn remove_input(&mut self, name: &str) {
        self.inputs.shift_remove(name);
    }
}

/// Access surface available during `process()` and the event hooks: reads
/// resolve through a shared view of the rest of the graph; writes land on
/// this node's own terminal/parameter maps.
pub struct ProcessContext<'a> {
    graph: &'a Graph,
    inputs: &'a mut IndexMap<String, Input>,
    outputs: &'a mut IndexMap<String, Output>,
    parameters: &'a mut IndexMap<String, Parameter>,
    node_name: &'a str,
}

impl<'a> ProcessContext<'a> {
    pub fn graph(&self) -> &Graph {
        self.graph
    }

    pub fn node_name(&self) -> &str {
        self.node_name
    }

    fn single_input(&self, name: &str) -> Result<&SingleFeatureInput> {
        match self.inputs.get(name) {
            Some(Input::Single(sfi)) => Ok(sfi),
            Some(Input::Multi(_)) => Err(GeoflowError::TypeMismatch {
                context: format!("\"{name}\" is a poly input, not a single-feature input"),
            }),
            None => Err(unknown_terminal(self.node_name, name)),
        }
    }

    fn multi_input(&self, name: &str) -> Result<&MultiFeatureInput> {
        match self.inputs.get(name) {
            Some(Input::Multi(mfi)) => Ok(mfi),
            Some(Input::Single(_)) => Err(GeoflowError::TypeMismatch {
                context: format!("\"{name}\" is a single-feature input, not a poly input"),
            }),
            None => Err(unknown_terminal(self.node_name, name)),
        }
    }

    /// The first value on `name`'s upstream output, or an empty box if
    /// there is none.
    pub fn input_value(&self, name: &str) -> Result<ValueBox> {
        let sfi = self.single_input(name)?;
        Ok(sfi.get(self.graph, 0).cloned().unwrap_or_else(|| {
            let tag = sfi.accepted_tags.first().cloned().unwrap_or(TypeTag::String);
            ValueBox::empty(tag)
        }))
    }

    pub fn input_has_data(&self, name: &str) -> Result<bool> {
        Ok(self.single_input(name)?.has_data(self.graph))
    }

    /// The whole data vector of `name`'s upstream output.
    pub fn input_vector(&self, name: &str) -> Result<Vec<ValueBox>> {
        let sfi = self.single_input(name)?;
        let n = sfi.size(self.graph);
        Ok((0..n).filter_map(|i| sfi.get(self.graph, i).cloned()).collect())
    }

    /// Each sub-terminal of a poly input, by name, with its full data
    /// vector.
    pub fn poly_input_values(&self, name: &str) -> Result<Vec<(String, Vec<ValueBox>)>> {
        let mfi = self.multi_input(name)?;
        let mut out = Vec::new();
        for sub in mfi.sub_terminals() {
            if let Some(sfo) = self.graph.find_sub_output(sub) {
                let sub_name = sub.sub_name.clone().unwrap_or_else(|| sfo.name().to_string());
                out.push((sub_name, sfo.data().to_vec()));
            }
        }
        Ok(out)
    }

    pub fn poly_input_size(&self, name: &str) -> Result<usize> {
        Ok(self.multi_input(name)?.size(self.graph))
    }

    fn single_output_mut(&mut self, name: &str) -> Result<&mut SingleFeatureOutput> {
        match self.outputs.get_mut(name) {
            Some(Output::Single(sfo)) => Ok(sfo),
            Some(Output::Multi(_)) => Err(GeoflowError::TypeMismatch {
                context: format!("\"{name}\" is a poly output, not a single-feature output"),
            }),
            None => Err(unknown_terminal(self.node_name, name)),
        }
    }

    pub fn set_output(&mut self, name: &str, value: ValueBox) -> Result<()> {
        self.single_output_mut(name)?.set(value)
    }

    pub fn push_output(&mut self, name: &str, value: ValueBox) -> Result<()> {
        self.single_output_mut(name)?.push_back(value)
    }

    pub fn clear_output(&mut self, name: &str) -> Result<()> {
        match self.outputs.get_mut(name) {
            Some(output) => {
                output.clear();
                Ok(())
            }
            None => Err(unknown_terminal(self.node_name, name)),
        }
    }

    pub fn has_input(&self, name: &str) -> bool {
        self.inputs.contains_key(name)
    }

    pub fn has_output(&self, name: &str) -> bool {
        self.outputs.contains_key(name)
    }

    /// Declares a new vector (single-feature) input after construction -
    /// used by `NestNode::post_parameter_load` once the sub-flowchart's
    /// exported terminals are known (SPEC_FULL.md §4.I).
    pub fn declare_vector_input(&mut self, name: impl Into<String>, tags: Vec<TypeTag>, optional: bool) {
        let name = name.into();
        self.inputs.insert(name.clone(), Input::Single(SingleFeatureInput::vector(name, tags, optional)));
    }

    pub fn declare_poly_input(&mut self, name: impl Into<String>, tags: Vec<TypeTag>) {
        let name = name.into();
        self.inputs.insert(name.clone(), Input::Multi(MultiFeatureInput::new(name, tags)));
    }

    pub fn declare_vector_output(&mut self, name: impl Into<String>, tag: TypeTag) {
        let name = name.into();
        self.outputs.insert(name.clone(), Output::Single(SingleFeatureOutput::new(name, vec![tag])));
    }

    pub fn declare_poly_output(&mut self, name: impl Into<String>, tags: Vec<TypeTag>) {
        let name = name.into();
        self.outputs.insert(name.clone(), Output::Multi(MultiFeatureOutput::new(name, tags)));
    }

    pub fn poly_output_mut(&mut self, name: &str) -> Result<&mut crate::terminal::MultiFeatureOutput> {
        match self.outputs.get_mut(name) {
            Some(Output::Multi(mfo)) => Ok(mfo),
            Some(Output::Single(_)) => Err(GeoflowError::TypeMismatch {
                context: format!("\"{name}\" is a single-feature output, not a poly output"),
            }),
            None => Err(unknown_terminal(self.node_name, name)),
        }
    }

    pub fn param(&self, label: &str) -> Result<&ValueBox> {
        self.parameters
            .get(label)
            .map(Parameter::value)
            .ok_or_else(|| unknown_terminal(self.node_name, label))
    }

    pub fn param_int(&self, label: &str) -> Result<i64> {
        self.param(label)?.as_int().ok_or_else(|| GeoflowError::TypeMismatch {
            context: format!("parameter \"{label}\" is not an int"),
        })
    }

    pub fn param_float(&self, label: &str) -> Result<f64> {
        self.param(label)?.as_float().ok_or_else(|| GeoflowError::TypeMismatch {
            context: format!("parameter \"{label}\" is not a float"),
        })
    }

    pub fn param_bool(&self, label: &str) -> Result<bool> {
        self.param(label)?.as_bool().ok_or_else(|| GeoflowError::TypeMismatch {
            context: format!("parameter \"{label}\" is not a bool"),
        })
    }

    pub fn param_str(&self, label: &str) -> Result<&str> {
        self.param(label)?.as_str().ok_or_else(|| GeoflowError::TypeMismatch {
            context: format!("parameter \"{label}\" is not a string"),
        })
    }

    pub fn set_param(&mut self, label: &str, value: ValueBox) -> Result<()> {
        self.parameters.get_mut(label).ok_or_else(|| unknown_terminal(self.node_name, label))?.set(value)
    }

    /// Replaces `{{NAME}}` placeholders using the owning graph's globals
    /// (SPEC_FULL.md §6.2).
    pub fn substitute(&self, text: &str) -> Result<String> {
        self.graph.substitute_globals(text)
    }
}

#[derive(Debug, Clone)]
struct NoopBehavior;

impl NodeBehavior for NoopBehavior {
    fn type_name(&self) -> &'static str {
        "__noop__"
    }

    fn clone_box(&self) -> Box<dyn NodeBehavior> {
        Box::new(self.clone())
    }

    fn init(&mut self, _decl: &mut NodeDecl) {}

    fn process(&mut self, _ctx: &mut ProcessContext) -> Result<()> {
        Ok(())
    }
}
