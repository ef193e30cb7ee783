use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{GeoflowError, Result};
use crate::node::NodeBehavior;

type Factory = Rc<dyn Fn() -> Box<dyn NodeBehavior>>;

/// Maps type-name to a node constructor, grouped under a register name (a
/// plugin namespace). `create` invokes the factory; the node's own `init()`
/// is run afterwards by `Graph::create_node`.
#[derive(Clone)]
pub struct NodeRegister {
    name: String,
    node_types: HashMap<String, Factory>,
}

impl std::fmt::Debug for NodeRegister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRegister")
            .field("name", &self.name)
            .field("node_types", &self.node_types.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl NodeRegister {
    pub fn new(name: impl Into<String>) -> Self {
        NodeRegister { name: name.into(), node_types: HashMap::new() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn register_node<F>(&mut self, type_name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn NodeBehavior> + 'static,
    {
        self.node_types.insert(type_name.into(), Rc::new(factory));
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.node_types.keys().map(String::as_str)
    }

    pub fn create(&self, type_name: &str) -> Result<Box<dyn NodeBehavior>> {
        self.node_types
            .get(type_name)
            .map(|f| f())
            .ok_or_else(|| GeoflowError::UnknownType(type_name.to_string()))
    }
}

/// A collection of registers keyed by register name, held by the Graph;
/// flowchart JSON refers to a node type by `(register_name, type_name)`.
#[derive(Clone, Debug, Default)]
pub struct NodeRegisterMap(HashMap<String, Rc<NodeRegister>>);

impl NodeRegisterMap {
    pub fn new() -> Self {
        NodeRegisterMap(HashMap::new())
    }

    pub fn insert(&mut self, register: NodeRegister) {
        self.0.insert(register.name().to_string(), Rc::new(register));
    }

    pub fn get(&self, register_name: &str) -> Option<&Rc<NodeRegister>> {
        self.0.get(register_name)
    }

    pub fn create(&self, register_name: &str, type_name: &str) -> Result<Box<dyn NodeBehavior>> {
        let register = self
            .0
            .get(register_name)
            .ok_or_else(|| GeoflowError::UnknownType(format!("{register_name}/{type_name}")))?;
        register.create(type_name)
    }

    pub fn register_names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::int::IntNode;

    #[test]
    fn create_fails_on_unknown_type() {
        let mut register = NodeRegister::new("core");
        register.register_node("int", || Box::new(IntNode::default()) as Box<dyn NodeBehavior>);
        assert!(register.create("int").is_ok());
        assert!(matches!(register.create("nope"), Err(GeoflowError::UnknownType(_))));
    }

    #[test]
    fn map_create_fails_on_unknown_register() {
        let map = NodeRegisterMap::new();
        assert!(matches!(map.create("core", "int"), Err(GeoflowError::UnknownType(_))));
    }
}
