use std::collections::VecDeque;
use std::path::PathBuf;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::endpoint::{Endpoint, SubTermRef};
use crate::error::{GeoflowError, Result};
use crate::node::{Node, NodeStatus};
use crate::parameter::Parameter;
use crate::register::NodeRegisterMap;
use crate::terminal::{Output, SingleFeatureOutput};
use crate::types::ValueBox;

/// Owns nodes keyed by unique name, owns globals, an optional coordinate
/// data offset, and a transient schedule queue. Cross-edges between nodes
/// are endpoint identifiers resolved through the methods here, never
/// owning pointers (SPEC_FULL.md §9).
#[derive(Debug, Clone)]
pub struct Graph {
    registers: Rc<NodeRegisterMap>,
    nodes: IndexMap<String, Node>,
    globals: IndexMap<String, Parameter>,
    data_offset: Option<[f64; 3]>,
    process_crs: Option<String>,
    pub(crate) queue: VecDeque<String>,
    pub(crate) flowchart_path: Option<PathBuf>,
}

impl Graph {
    pub fn new(registers: NodeRegisterMap) -> Self {
        Graph::with_shared_registers(Rc::new(registers))
    }

    pub(crate) fn with_shared_registers(registers: Rc<NodeRegisterMap>) -> Self {
        Graph {
            registers,
            nodes: IndexMap::new(),
            globals: IndexMap::new(),
            data_offset: None,
            process_crs: None,
            queue: VecDeque::new(),
            flowchart_path: None,
        }
    }

    pub fn registers(&self) -> &NodeRegisterMap {
        &self.registers
    }

    pub(crate) fn shared_registers(&self) -> Rc<NodeRegisterMap> {
        Rc::clone(&self.registers)
    }

    pub fn flowchart_path(&self) -> Option<&PathBuf> {
        self.flowchart_path.as_ref()
    }

    pub fn set_flowchart_path(&mut self, path: PathBuf) {
        self.flowchart_path = Some(path);
    }

    // -- nodes --------------------------------------------------------

    /// Names the node with a short random suffix for uniqueness (the
    /// original auto-names as `type_name(counter)`; a random suffix avoids
    /// needing a monotonic counter on the Graph).
    fn fresh_name(&self, type_name: &str) -> String {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        loop {
            let suffix: u32 = rng.gen_range(0..0x10000);
            let candidate = format!("{type_name}_{suffix:04x}");
            if !self.nodes.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    pub fn create_node(&mut self, register_name: &str, type_name: &str) -> Result<String> {
        self.create_node_at(register_name, type_name, (0.0, 0.0))
    }

    #[tracing::instrument(skip(self), fields(register = register_name, ty = type_name))]
    pub fn create_node_at(&mut self, register_name: &str, type_name: &str, position: (f32, f32)) -> Result<String> {
        let behavior = self.registers.create(register_name, type_name)?;
        let name = self.fresh_name(type_name);
        let mut node = Node::new(name.clone(), register_name, behavior);
        node.set_position(position.0, position.1);
        tracing::debug!(node = %name, "created node");
        self.nodes.insert(name.clone(), node);
        Ok(name)
    }

    /// Inserts a fully-constructed node under an explicit name, bypassing
    /// the register/factory path. Used by JSON deserialisation (which
    /// already knows the instance name) and by nested-flowchart fanout
    /// (which injects a synthetic Proxy node).
    pub(crate) fn insert_node(&mut self, name: impl Into<String>, node: Node) {
        self.nodes.insert(name.into(), node);
    }

    pub fn rename_node(&mut self, old_name: &str, new_name: &str) -> Result<()> {
        if old_name == new_name {
            return Ok(());
        }
        if self.nodes.contains_key(new_name) {
            return Err(GeoflowError::FlowchartError(format!("node name \"{new_name}\" already in use")));
        }
        let mut node = self.nodes.shift_remove(old_name).ok_or_else(|| GeoflowError::UnknownNode(old_name.to_string()))?;
        node.name = new_name.to_string();
        self.rewrite_endpoints(old_name, new_name);
        self.nodes.insert(new_name.to_string(), node);
        Ok(())
    }

    fn rewrite_endpoints(&mut self, old_name: &str, new_name: &str) {
        for node in self.nodes.values_mut() {
            for input in node.inputs.values_mut() {
                match input {
                    crate::terminal::Input::Single(sfi) => {
                        if let Some(ep) = &mut sfi.upstream
                            && ep.node == old_name
                        {
                            ep.node = new_name.to_string();
                        }
                    }
                    crate::terminal::Input::Multi(mfi) => {
                        for ep in &mut mfi.connections {
                            if ep.node == old_name {
                                ep.node = new_name.to_string();
                            }
                        }
                    }
                }
            }
            for output in node.outputs.values_mut() {
                let connections = match output {
                    Output::Single(sfo) => &mut sfo.connections,
                    Output::Multi(mfo) => &mut mfo.connections,
                };
                for ep in connections.iter_mut() {
                    if ep.node == old_name {
                        ep.node = new_name.to_string();
                    }
                }
            }
        }
    }

    /// Removes the node after notifying all downstream nodes to clear
    /// their derived outputs (transitively).
    pub fn remove_node(&mut self, name: &str) -> Result<()> {
        if !self.nodes.contains_key(name) {
            return Err(GeoflowError::UnknownNode(name.to_string()));
        }
        crate::connection::notify_children(self, name);
        if let Some(node) = self.nodes.get(name) {
            let inputs: Vec<Endpoint> = node
                .inputs
                .values()
                .flat_map(|i| match i {
                    crate::terminal::Input::Single(sfi) => sfi.upstream.clone().into_iter().collect::<Vec<_>>(),
                    crate::terminal::Input::Multi(mfi) => mfi.connections.clone(),
                })
                .collect();
            let outputs: Vec<Endpoint> = node
                .outputs
                .values()
                .flat_map(|o| match o {
                    Output::Single(sfo) => sfo.connections.clone(),
                    Output::Multi(mfo) => mfo.connections.clone(),
                })
                .collect();
            for ep in inputs {
                self.remove_downstream_ref(&ep, name);
            }
            for ep in outputs {
                self.clear_input_endpoint(&ep);
            }
        }
        self.nodes.shift_remove(name);
        Ok(())
    }

    fn remove_downstream_ref(&mut self, upstream: &Endpoint, downstream_node: &str) {
        if let Some(node) = self.nodes.get_mut(&upstream.node)
            && let Some(output) = node.outputs.get_mut(&upstream.terminal)
        {
            let connections = match output {
                Output::Single(sfo) => &mut sfo.connections,
                Output::Multi(mfo) => &mut mfo.connections,
            };
            connections.retain(|ep| ep.node != downstream_node);
        }
    }

    fn clear_input_endpoint(&mut self, ep: &Endpoint) {
        if let Some(node) = self.nodes.get_mut(&ep.node)
            && let Ok(input) = node.input_mut(&ep.terminal)
        {
            match input {
                crate::terminal::Input::Single(sfi) => sfi.upstream = None,
                crate::terminal::Input::Multi(mfi) => mfi.connections.clear(),
            }
        }
    }

    pub fn node(&self, name: &str) -> Result<&Node> {
        self.nodes.get(name).ok_or_else(|| GeoflowError::UnknownNode(name.to_string()))
    }

    pub fn node_mut(&mut self, name: &str) -> Result<&mut Node> {
        self.nodes.get_mut(name).ok_or_else(|| GeoflowError::UnknownNode(name.to_string()))
    }

    pub fn nodes(&self) -> impl Iterator<Item = (&String, &Node)> {
        self.nodes.iter()
    }

    pub fn node_names(&self) -> Vec<String> {
        self.nodes.keys().cloned().collect()
    }

    pub fn root_node_names(&self) -> Vec<String> {
        self.nodes.iter().filter(|(_, n)| n.is_root()).map(|(k, _)| k.clone()).collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Runs `f` with `&mut Node` and a shared view of the rest of the graph,
    /// by temporarily removing the node from the map. This is how the
    /// engine avoids aliasing a `&mut Node` against a `&Graph` that logically
    /// contains it (SPEC_FULL.md §9, "Node/behaviour split").
    pub(crate) fn with_node_and_graph<T>(&mut self, name: &str, f: impl FnOnce(&mut Node, &Graph) -> T) -> Result<T> {
        let mut node = self.nodes.shift_remove(name).ok_or_else(|| GeoflowError::UnknownNode(name.to_string()))?;
        let result = f(&mut node, self);
        self.nodes.insert(name.to_string(), node);
        Ok(result)
    }

    // -- globals --------------------------------------------------------

    pub fn set_global(&mut self, key: impl Into<String>, parameter: Parameter) {
        self.globals.insert(key.into(), parameter);
    }

    pub fn global(&self, key: &str) -> Option<&Parameter> {
        self.globals.get(key)
    }

    pub fn remove_global(&mut self, key: &str) {
        self.globals.shift_remove(key);
    }

    pub fn globals(&self) -> &IndexMap<String, Parameter> {
        &self.globals
    }

    /// Copies another graph's globals in wholesale (used by NestNode to
    /// seed a child graph from its parent before adding per-iteration
    /// globals).
    pub fn set_globals_from(&mut self, other: &Graph) {
        self.globals = other.globals.clone();
    }

    pub fn data_offset(&self) -> Option<[f64; 3]> {
        self.data_offset
    }

    pub fn set_data_offset(&mut self, offset: [f64; 3]) {
        self.data_offset = Some(offset);
        self.sync_process_globals();
    }

    pub fn process_crs(&self) -> Option<&str> {
        self.process_crs.as_deref()
    }

    pub fn set_process_crs(&mut self, crs: impl Into<String>) {
        self.process_crs = Some(crs.into());
        self.sync_process_globals();
    }

    /// Forwards `data_offset`/`process_crs` as globals so that nodes which
    /// need coordinate context (owned by the excluded CRS collaborator) can
    /// read it like any other global (SPEC_FULL.md §6.4).
    fn sync_process_globals(&mut self) {
        if let Some([x, y, z]) = self.data_offset {
            self.set_global("GF_PROCESS_OFFSET_X", Parameter::new("GF_PROCESS_OFFSET_X", "", ValueBox::float(x)));
            self.set_global("GF_PROCESS_OFFSET_Y", Parameter::new("GF_PROCESS_OFFSET_Y", "", ValueBox::float(y)));
            self.set_global("GF_PROCESS_OFFSET_Z", Parameter::new("GF_PROCESS_OFFSET_Z", "", ValueBox::float(z)));
        }
        if let Some(crs) = self.process_crs.clone() {
            self.set_global("GF_PROCESS_CRS", Parameter::new("GF_PROCESS_CRS", "", ValueBox::string(crs)));
        }
    }

    /// `{{NAME}}` substitution using each global's stringified value
    /// (SPEC_FULL.md §6.2). The substitution grammar is intentionally flat
    /// (no conditionals or loops), so it is implemented directly rather
    /// than through a general templating engine - see DESIGN.md.
    pub fn substitute_globals(&self, text: &str) -> Result<String> {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after.find("}}").ok_or_else(|| {
                GeoflowError::FlowchartError(format!("unterminated placeholder in \"{text}\""))
            })?;
            let name = after[..end].trim();
            let global = self.globals.get(name).ok_or_else(|| GeoflowError::GlobalNotFound(name.to_string()))?;
            out.push_str(&global.value().stringify());
            rest = &after[end + 2..];
        }
        out.push_str(rest);
        Ok(out)
    }

    // -- terminal resolution ---------------------------------------------

    pub fn find_output(&self, ep: &Endpoint) -> Option<&Output> {
        self.nodes.get(&ep.node)?.outputs.get(&ep.terminal)
    }

    pub fn find_single_output(&self, ep: &Endpoint) -> Option<&SingleFeatureOutput> {
        match self.find_output(ep)? {
            Output::Single(sfo) => Some(sfo),
            Output::Multi(_) => None,
        }
    }

    pub fn find_sub_output(&self, sub: &SubTermRef) -> Option<&SingleFeatureOutput> {
        match &sub.sub_name {
            None => self.find_single_output(&sub.output),
            Some(name) => match self.find_output(&sub.output)? {
                Output::Multi(mfo) => mfo.sub_terminal(name),
                Output::Single(_) => None,
            },
        }
    }

    /// Deep-copies topology, parameters and globals; resets every node's
    /// transient status to WAITING and clears all terminal data, so child
    /// state never leaks between NestNode fanout iterations (SPEC_FULL.md
    /// §4.I step 1, §5 "Shared resources").
    pub fn deep_clone_reset(&self) -> Graph {
        let mut clone = Graph::with_shared_registers(Rc::clone(&self.registers));
        clone.globals = self.globals.clone();
        clone.data_offset = self.data_offset;
        clone.process_crs = self.process_crs.clone();
        clone.flowchart_path = self.flowchart_path.clone();
        for (name, node) in &self.nodes {
            let mut node = node.clone();
            node.status = NodeStatus::Waiting;
            for output in node.outputs.values_mut() {
                output.clear();
            }
            clone.nodes.insert(name.clone(), node);
        }
        clone
    }
}
