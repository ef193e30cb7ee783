use crate::endpoint::{Endpoint, SubTermRef};
use crate::error::{GeoflowError, Result};
use crate::graph::Graph;
use crate::terminal::Output;
use crate::types::TypeTag;

/// May be connected to many outputs; exposes to its node a flattened,
/// ordered view of sub-terminals, rebuilt whenever an upstream connection
/// changes (`rebuild`, called from `update_on_receive`).
#[derive(Debug, Clone)]
pub struct MultiFeatureInput {
    pub(crate) name: String,
    pub accepted_tags: Vec<TypeTag>,
    pub(crate) marked: bool,
    /// Connected upstream outputs (SFO or MFO), insertion order.
    pub(crate) connections: Vec<Endpoint>,
    /// Flattened sub-terminal view, rebuilt on receive.
    sub_terminals: Vec<SubTermRef>,
}

impl MultiFeatureInput {
    pub fn new(name: impl Into<String>, accepted_tags: Vec<TypeTag>) -> Self {
        MultiFeatureInput {
            name: name.into(),
            accepted_tags,
            marked: false,
            connections: Vec::new(),
            sub_terminals: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn connections(&self) -> &[Endpoint] {
        &self.connections
    }

    pub fn has_connection(&self) -> bool {
        !self.connections.is_empty()
    }

    pub fn sub_terminals(&self) -> &[SubTermRef] {
        &self.sub_terminals
    }

    /// A connected SFO contributes itself; a connected MFO contributes each
    /// of its sub-terminals, in the MFO's own insertion order.
    pub fn rebuild(&mut self, graph: &Graph) {
        self.sub_terminals.clear();
        for ep in &self.connections {
            match graph.find_output(ep) {
                Some(Output::Single(_)) => self.sub_terminals.push(SubTermRef::direct(ep.clone())),
                Some(Output::Multi(mfo)) => {
                    for (name, _) in mfo.sub_terminals() {
                        self.sub_terminals.push(SubTermRef::sub(ep.clone(), name.clone()));
                    }
                }
                None => {}
            }
        }
    }

    /// `size() = size of first connected output`.
    pub fn size(&self, graph: &Graph) -> usize {
        self.sub_terminals
            .first()
            .and_then(|sub| graph.find_sub_output(sub))
            .map(|sfo| sfo.size())
            .unwrap_or(0)
    }

    /// `has_data ⇔ any connection ∧ every connected output has_data`.
    pub fn has_data(&self, graph: &Graph) -> bool {
        self.has_connection()
            && self
                .sub_terminals
                .iter()
                .all(|sub| graph.find_sub_output(sub).is_some_and(|sfo| sfo.has_data()))
    }

    /// Open Questions resolution: an MFI whose sub-terminals have differing
    /// lengths fails fast rather than silently indexing into the first
    /// connection.
    pub fn validate_equal_lengths(&self, graph: &Graph) -> Result<()> {
        let mut expected: Option<usize> = None;
        for sub in &self.sub_terminals {
            let Some(sfo) = graph.find_sub_output(sub) else { continue };
            match expected {
                None => expected = Some(sfo.size()),
                Some(len) if len != sfo.size() => {
                    return Err(GeoflowError::NodeProcessingError {
                        node: sub.output.node.clone(),
                        message: format!(
                            "poly input \"{}\" has sub-terminals of differing length ({} vs {})",
                            self.name,
                            len,
                            sfo.size()
                        ),
                    });
                }
                _ => {}
            }
        }
        Ok(())
    }
}
