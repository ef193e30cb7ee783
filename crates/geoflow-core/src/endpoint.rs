use serde::{Deserialize, Serialize};

/// Identifies a terminal anywhere in a Graph by owning-node name and
/// terminal name. Connections are stored as pairs of endpoints rather than
/// as owning pointers between terminals, so an edge never makes a node
/// co-own another node's terminal (Design Notes, "Cyclic/graph
/// back-references"); every lookup goes back through the Graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub node: String,
    pub terminal: String,
}

impl Endpoint {
    pub fn new(node: impl Into<String>, terminal: impl Into<String>) -> Self {
        Endpoint { node: node.into(), terminal: terminal.into() }
    }

    pub fn full_name(&self) -> String {
        format!("{}.{}", self.node, self.terminal)
    }
}

/// A sub-terminal reference flattened through a multi-feature input: the
/// SFO it resolves to, plus an optional sub-terminal name when the upstream
/// side is an MFO (SPEC_FULL.md §4.C, MFI).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubTermRef {
    pub output: Endpoint,
    pub sub_name: Option<String>,
}

impl SubTermRef {
    pub fn direct(output: Endpoint) -> Self {
        SubTermRef { output, sub_name: None }
    }

    pub fn sub(output: Endpoint, sub_name: impl Into<String>) -> Self {
        SubTermRef { output, sub_name: Some(sub_name.into()) }
    }
}
