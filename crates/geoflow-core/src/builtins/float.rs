use crate::error::Result;
use crate::node::{NodeBehavior, NodeDecl, ProcessContext};
use crate::parameter::Parameter;
use crate::types::{TypeTag, ValueBox};

/// Source node: one `value: float` parameter copied onto one `value: float`
/// output on every `process()` (SPEC_FULL.md §4.K).
#[derive(Debug, Clone, Default)]
pub struct FloatNode;

impl NodeBehavior for FloatNode {
    fn type_name(&self) -> &'static str {
        "Float"
    }

    fn clone_box(&self) -> Box<dyn NodeBehavior> {
        Box::new(self.clone())
    }

    fn init(&mut self, decl: &mut NodeDecl) {
        decl.add_param(Parameter::new("value", "floating-point value", ValueBox::float(0.0)));
        decl.add_output("value", TypeTag::Float);
    }

    fn process(&mut self, ctx: &mut ProcessContext) -> Result<()> {
        let value = ctx.param_float("value")?;
        ctx.set_output("value", ValueBox::float(value))
    }
}
