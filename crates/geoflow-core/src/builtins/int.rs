use crate::error::Result;
use crate::node::{NodeBehavior, NodeDecl, ProcessContext};
use crate::parameter::Parameter;
use crate::types::{TypeTag, ValueBox};

/// Source node: one `value: int` parameter copied onto one `value: int`
/// output on every `process()` (SPEC_FULL.md §4.K).
#[derive(Debug, Clone, Default)]
pub struct IntNode;

impl NodeBehavior for IntNode {
    fn type_name(&self) -> &'static str {
        "Int"
    }

    fn clone_box(&self) -> Box<dyn NodeBehavior> {
        Box::new(self.clone())
    }

    fn init(&mut self, decl: &mut NodeDecl) {
        decl.add_param(Parameter::new("value", "integer value", ValueBox::int(0)));
        decl.add_output("value", TypeTag::Int);
    }

    fn process(&mut self, ctx: &mut ProcessContext) -> Result<()> {
        let value = ctx.param_int("value")?;
        ctx.set_output("value", ValueBox::int(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;

    #[test]
    fn process_copies_parameter_to_output() {
        let mut node = Node::new("n", "core", Box::new(IntNode) as Box<dyn NodeBehavior>);
        node.parameter_mut("value").unwrap().set(ValueBox::int(42)).unwrap();
        let graph = crate::graph::Graph::new(crate::register::NodeRegisterMap::new());
        node.run_process(&graph).unwrap();
        match node.output("value").unwrap() {
            crate::terminal::Output::Single(sfo) => assert_eq!(sfo.get(0).unwrap().as_int(), Some(42)),
            crate::terminal::Output::Multi(_) => panic!("expected single-feature output"),
        }
    }
}
