use indexmap::IndexMap;

use super::sfo::SingleFeatureOutput;
use crate::endpoint::Endpoint;
use crate::error::{GeoflowError, Result};
use crate::types::TypeTag;

/// Owns a name-keyed map of SFOs (its sub-terminals), added dynamically by
/// the owning node during `process()`.
#[derive(Debug, Clone)]
pub struct MultiFeatureOutput {
    pub(crate) name: String,
    pub accepted_tags: Vec<TypeTag>,
    pub(crate) marked: bool,
    pub(crate) touched: bool,
    sub_terminals: IndexMap<String, SingleFeatureOutput>,
    /// Downstream multi-feature inputs connected to this output.
    pub(crate) connections: Vec<Endpoint>,
}

impl MultiFeatureOutput {
    pub fn new(name: impl Into<String>, accepted_tags: Vec<TypeTag>) -> Self {
        MultiFeatureOutput {
            name: name.into(),
            accepted_tags,
            marked: false,
            touched: false,
            sub_terminals: IndexMap::new(),
            connections: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn connections(&self) -> &[Endpoint] {
        &self.connections
    }

    /// Creates a new sub-terminal; names must be unique within the MFO.
    pub fn add(&mut self, term_name: impl Into<String>, tag: TypeTag) -> Result<&mut SingleFeatureOutput> {
        let term_name = term_name.into();
        if !self.accepted_tags.contains(&tag) {
            return Err(GeoflowError::TypeMismatch {
                context: format!("poly output \"{}\" does not accept tag {}", self.name, tag),
            });
        }
        if self.sub_terminals.contains_key(&term_name) {
            return Err(GeoflowError::FlowchartError(format!(
                "sub-terminal \"{term_name}\" already exists on poly output \"{}\"",
                self.name
            )));
        }
        self.touched = true;
        self.sub_terminals.insert(term_name.clone(), SingleFeatureOutput::new(term_name.clone(), vec![tag]));
        Ok(self.sub_terminals.get_mut(&term_name).expect("just inserted"))
    }

    pub fn sub_terminal(&self, name: &str) -> Option<&SingleFeatureOutput> {
        self.sub_terminals.get(name)
    }

    pub fn sub_terminal_mut(&mut self, name: &str) -> Option<&mut SingleFeatureOutput> {
        self.sub_terminals.get_mut(name)
    }

    pub fn sub_terminals(&self) -> impl Iterator<Item = (&String, &SingleFeatureOutput)> {
        self.sub_terminals.iter()
    }

    pub fn clear(&mut self) {
        self.sub_terminals.clear();
        self.touched = false;
    }

    pub fn has_data(&self) -> bool {
        !self.sub_terminals.is_empty() && self.sub_terminals.values().all(|t| t.has_data())
    }
}
