use crate::error::Result;
use crate::node::{NodeBehavior, NodeDecl, ProcessContext};
use crate::parameter::Parameter;
use crate::types::{TypeTag, ValueBox};

/// One `text: string` parameter, which may contain `{{NAME}}` placeholders,
/// substituted through the owning graph's globals at `process()` time
/// (SPEC_FULL.md §4.K, §6.2).
#[derive(Debug, Clone, Default)]
pub struct TextNode;

impl NodeBehavior for TextNode {
    fn type_name(&self) -> &'static str {
        "Text"
    }

    fn clone_box(&self) -> Box<dyn NodeBehavior> {
        Box::new(self.clone())
    }

    fn init(&mut self, decl: &mut NodeDecl) {
        decl.add_param(Parameter::new("text", "text, may contain {{NAME}} placeholders", ValueBox::string("")));
        decl.add_output("text", TypeTag::String);
    }

    fn process(&mut self, ctx: &mut ProcessContext) -> Result<()> {
        let raw = ctx.param_str("text")?.to_string();
        let substituted = ctx.substitute(&raw)?;
        ctx.set_output("text", ValueBox::string(substituted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;
    use crate::node::Node;
    use crate::parameter::Parameter as Global;
    use crate::register::NodeRegisterMap;

    #[test]
    fn process_substitutes_globals() {
        let mut graph = Graph::new(NodeRegisterMap::new());
        graph.set_global("NAME", Global::new("NAME", "", ValueBox::string("world")));
        let mut node = Node::new("n", "core", Box::new(TextNode) as Box<dyn NodeBehavior>);
        node.parameter_mut("text").unwrap().set(ValueBox::string("hello {{NAME}}")).unwrap();
        node.run_process(&graph).unwrap();
        match node.output("text").unwrap() {
            crate::terminal::Output::Single(sfo) => assert_eq!(sfo.get(0).unwrap().as_str(), Some("hello world")),
            crate::terminal::Output::Multi(_) => panic!("expected single-feature output"),
        }
    }
}
