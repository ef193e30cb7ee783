use crate::endpoint::Endpoint;
use crate::error::{GeoflowError, Result};
use crate::types::{TypeTag, ValueBox};

/// Owns an ordered sequence of value-boxes - the "scalar" case is a sequence
/// of length 1. Carries a `touched` flag set at any write, independent of
/// whether the write left data behind (an empty write still touches).
#[derive(Debug, Clone)]
pub struct SingleFeatureOutput {
    pub(crate) name: String,
    pub accepted_tags: Vec<TypeTag>,
    pub(crate) marked: bool,
    pub(crate) touched: bool,
    data: Vec<ValueBox>,
    /// Downstream single-feature inputs connected to this output, in the
    /// order `connect` was called (Open Questions: insertion order chosen
    /// as the one deterministic propagation order).
    pub(crate) connections: Vec<Endpoint>,
}

impl SingleFeatureOutput {
    pub fn new(name: impl Into<String>, accepted_tags: Vec<TypeTag>) -> Self {
        SingleFeatureOutput {
            name: name.into(),
            accepted_tags,
            marked: false,
            touched: false,
            data: Vec::new(),
            connections: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn marked(&self) -> bool {
        self.marked
    }

    pub fn connections(&self) -> &[Endpoint] {
        &self.connections
    }

    pub fn push_back(&mut self, value: ValueBox) -> Result<()> {
        if !value.is_empty() && !self.accepted_tags.contains(&value.tag) {
            return Err(GeoflowError::TypeMismatch {
                context: format!(
                    "output \"{}\" accepts {:?}, got {}",
                    self.name, self.accepted_tags, value.tag
                ),
            });
        }
        self.data.push(value);
        self.touched = true;
        Ok(())
    }

    pub fn set(&mut self, value: ValueBox) -> Result<()> {
        self.data.clear();
        self.push_back(value)
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.touched = false;
    }

    pub fn touch(&mut self) {
        self.touched = true;
    }

    pub fn is_touched(&self) -> bool {
        self.touched
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn get(&self, i: usize) -> Option<&ValueBox> {
        self.data.get(i)
    }

    pub fn data(&self) -> &[ValueBox] {
        &self.data
    }

    pub fn has_data(&self) -> bool {
        !self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_back_rejects_wrong_tag() {
        let mut sfo = SingleFeatureOutput::new("value", vec![TypeTag::Int]);
        assert!(sfo.push_back(ValueBox::float(1.0)).is_err());
        assert!(sfo.push_back(ValueBox::int(1)).is_ok());
        assert_eq!(sfo.size(), 1);
    }

    #[test]
    fn set_replaces_existing_data() {
        let mut sfo = SingleFeatureOutput::new("value", vec![TypeTag::Int]);
        sfo.push_back(ValueBox::int(1)).unwrap();
        sfo.push_back(ValueBox::int(2)).unwrap();
        sfo.set(ValueBox::int(9)).unwrap();
        assert_eq!(sfo.size(), 1);
        assert_eq!(sfo.get(0).unwrap().as_int(), Some(9));
    }

    #[test]
    fn clear_resets_touched_and_data() {
        let mut sfo = SingleFeatureOutput::new("value", vec![TypeTag::Int]);
        sfo.push_back(ValueBox::int(1)).unwrap();
        sfo.clear();
        assert!(!sfo.has_data());
        assert!(!sfo.is_touched());
    }
}
