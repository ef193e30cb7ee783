use crate::endpoint::Endpoint;
use crate::graph::Graph;
use crate::types::{TypeTag, ValueBox};

/// Holds no data of its own; resolves its data through its (at-most-one)
/// upstream output, addressed by endpoint rather than by owning pointer.
#[derive(Debug, Clone)]
pub struct SingleFeatureInput {
    pub(crate) name: String,
    pub accepted_tags: Vec<TypeTag>,
    pub optional: bool,
    pub(crate) marked: bool,
    pub(crate) is_vector: bool,
    pub(crate) upstream: Option<Endpoint>,
}

impl SingleFeatureInput {
    pub fn new(name: impl Into<String>, accepted_tags: Vec<TypeTag>, optional: bool) -> Self {
        SingleFeatureInput {
            name: name.into(),
            accepted_tags,
            optional,
            marked: false,
            is_vector: false,
            upstream: None,
        }
    }

    pub fn vector(name: impl Into<String>, accepted_tags: Vec<TypeTag>, optional: bool) -> Self {
        let mut t = Self::new(name, accepted_tags, optional);
        t.is_vector = true;
        t
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn upstream(&self) -> Option<&Endpoint> {
        self.upstream.as_ref()
    }

    pub fn has_connection(&self) -> bool {
        self.upstream.is_some()
    }

    /// `has_data ⇔ upstream exists ∧ upstream.has_data`.
    pub fn has_data(&self, graph: &Graph) -> bool {
        self.upstream
            .as_ref()
            .and_then(|ep| graph.find_output(ep))
            .is_some_and(|out| out.has_data())
    }

    pub fn size(&self, graph: &Graph) -> usize {
        match self.upstream.as_ref().and_then(|ep| graph.find_single_output(ep)) {
            Some(sfo) => sfo.size(),
            None => 0,
        }
    }

    pub fn get<'g>(&self, graph: &'g Graph, i: usize) -> Option<&'g ValueBox> {
        self.upstream.as_ref().and_then(|ep| graph.find_single_output(ep))?.get(i)
    }

    pub fn get_connected_type(&self, graph: &Graph) -> Option<TypeTag> {
        let sfo = self.upstream.as_ref().and_then(|ep| graph.find_single_output(ep))?;
        sfo.get(0).map(|v| v.tag.clone()).or_else(|| sfo.accepted_tags.first().cloned())
    }
}
