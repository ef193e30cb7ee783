//! Built-in node types (SPEC_FULL.md §4.K), registered under a `"core"`
//! register - enough to exercise the engine end to end (§8 scenarios) and
//! to give `NestNode` a synthetic root to inject.

pub mod float;
pub mod float_add;
pub mod float_multiply;
pub mod int;
pub mod proxy;
pub mod text;

use crate::node::NodeBehavior;
use crate::register::NodeRegister;

/// Builds the `"core"` register with every built-in type except `Proxy`,
/// which is never user-facing and is constructed directly by nested
/// flowchart fanout.
pub fn core_register() -> NodeRegister {
    let mut register = NodeRegister::new("core");
    register.register_node("Int", || Box::new(int::IntNode::default()) as Box<dyn NodeBehavior>);
    register.register_node("Float", || Box::new(float::FloatNode::default()) as Box<dyn NodeBehavior>);
    register.register_node("FloatAdd", || Box::new(float_add::FloatAddNode::default()) as Box<dyn NodeBehavior>);
    register.register_node("FloatMultiply", || Box::new(float_multiply::FloatMultiplyNode::default()) as Box<dyn NodeBehavior>);
    register.register_node("Text", || Box::new(text::TextNode::default()) as Box<dyn NodeBehavior>);
    register
}
