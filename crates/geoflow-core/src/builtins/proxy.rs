use crate::error::Result;
use crate::node::{NodeBehavior, NodeDecl, ProcessContext};

/// The synthetic root node injected by `NestNode` fan-out (SPEC_FULL.md
/// §4.I step 2). It declares no terminals of its own - the nesting
/// machinery attaches one output per exported sub-graph input directly
/// after construction, then writes that iteration's values onto those
/// outputs before the child graph is scheduled. `process()` does nothing:
/// by the time it could run, its outputs are already populated.
#[derive(Debug, Clone, Default)]
pub struct ProxyNode;

impl NodeBehavior for ProxyNode {
    fn type_name(&self) -> &'static str {
        "Proxy"
    }

    fn clone_box(&self) -> Box<dyn NodeBehavior> {
        Box::new(self.clone())
    }

    fn init(&mut self, _decl: &mut NodeDecl) {}

    fn process(&mut self, _ctx: &mut ProcessContext) -> Result<()> {
        Ok(())
    }
}
