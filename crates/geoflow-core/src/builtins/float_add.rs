use crate::error::{GeoflowError, Result};
use crate::node::{NodeBehavior, NodeDecl, ProcessContext};
use crate::types::{TypeTag, ValueBox};

/// `result = in1 + in2`. Also exposes an optional, unconnected-by-default
/// `value_feedback` input purely to give the cycle-rejection scenario (§8,
/// E2) a terminal to attempt the illegal connection on.
#[derive(Debug, Clone, Default)]
pub struct FloatAddNode;

impl NodeBehavior for FloatAddNode {
    fn type_name(&self) -> &'static str {
        "FloatAdd"
    }

    fn clone_box(&self) -> Box<dyn NodeBehavior> {
        Box::new(self.clone())
    }

    fn init(&mut self, decl: &mut NodeDecl) {
        decl.add_input("in1", vec![TypeTag::Float], false);
        decl.add_input("in2", vec![TypeTag::Float], false);
        decl.add_input("value_feedback", vec![TypeTag::Float], true);
        decl.add_output("result", TypeTag::Float);
    }

    fn process(&mut self, ctx: &mut ProcessContext) -> Result<()> {
        let in1 = float_of(ctx, "in1")?;
        let in2 = float_of(ctx, "in2")?;
        ctx.set_output("result", ValueBox::float(in1 + in2))
    }
}

fn float_of(ctx: &ProcessContext, name: &str) -> Result<f64> {
    ctx.input_value(name)?.as_float().ok_or_else(|| GeoflowError::TypeMismatch {
        context: format!("input \"{name}\" did not carry a float value"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;

    #[test]
    fn declares_two_required_inputs_and_an_optional_feedback_input() {
        let node = Node::new("n", "core", Box::new(FloatAddNode) as Box<dyn NodeBehavior>);
        assert_eq!(node.type_name(), "FloatAdd");
        match node.input("value_feedback").unwrap() {
            crate::terminal::Input::Single(sfi) => assert!(sfi.optional),
            crate::terminal::Input::Multi(_) => panic!("expected single-feature input"),
        }
    }
}
