use crate::error::{GeoflowError, Result};
use crate::node::{NodeBehavior, NodeDecl, ProcessContext};
use crate::types::{TypeTag, ValueBox};

/// `result = in1 * in2`. Paired with `FloatAdd` so a sub-flowchart can
/// square a single proxy input by feeding it to both factors.
#[derive(Debug, Clone, Default)]
pub struct FloatMultiplyNode;

impl NodeBehavior for FloatMultiplyNode {
    fn type_name(&self) -> &'static str {
        "FloatMultiply"
    }

    fn clone_box(&self) -> Box<dyn NodeBehavior> {
        Box::new(self.clone())
    }

    fn init(&mut self, decl: &mut NodeDecl) {
        decl.add_input("in1", vec![TypeTag::Float], false);
        decl.add_input("in2", vec![TypeTag::Float], false);
        decl.add_output("result", TypeTag::Float);
    }

    fn process(&mut self, ctx: &mut ProcessContext) -> Result<()> {
        let in1 = float_of(ctx, "in1")?;
        let in2 = float_of(ctx, "in2")?;
        ctx.set_output("result", ValueBox::float(in1 * in2))
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
    fn multiplies_its_two_inputs() {
        let node = Node::new("n", "core", Box::new(FloatMultiplyNode) as Box<dyn NodeBehavior>);
        assert_eq!(node.type_name(), "FloatMultiply");
        assert!(node.output("result").is_ok());
    }
}
