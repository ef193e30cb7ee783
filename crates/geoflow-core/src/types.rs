use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// A type tag drawn from the closed registry of primitives, or an opaque
/// domain tag registered by a node. Terminals and parameters declare a
/// non-empty set of these; a value box pairs exactly one tag with a payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeTag {
    Bool,
    Int,
    Float,
    String,
    Date,
    Time,
    DateTime,
    /// Opaque domain tag registered by a node; the payload it carries is
    /// never interpreted by the engine itself.
    Custom(String),
}

impl TypeTag {
    pub fn as_str(&self) -> &str {
        match self {
            TypeTag::Bool => "bool",
            TypeTag::Int => "int",
            TypeTag::Float => "float",
            TypeTag::String => "string",
            TypeTag::Date => "date",
            TypeTag::Time => "time",
            TypeTag::DateTime => "datetime",
            TypeTag::Custom(name) => name,
        }
    }
}

impl std::fmt::Display for TypeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `compatible(out_tags, in_tags) = ∀t ∈ out_tags: t ∈ in_tags`.
pub fn compatible(out_tags: &[TypeTag], in_tags: &[TypeTag]) -> bool {
    out_tags.iter().all(|t| in_tags.contains(t))
}

/// Checks a declared set of tags for membership.
pub fn accepts(declared: &[TypeTag], tag: &TypeTag) -> bool {
    declared.contains(tag)
}

/// The payload half of a value box. `Empty` represents a box whose tag is
/// known but whose value is absent - used for nested-flowchart fanout
/// padding (SPEC_FULL.md §4.I step 6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    /// Escape hatch for custom tags: engine-opaque JSON, interpreted only by
    /// the node that declared the tag.
    Opaque(serde_json::Value),
    Empty,
}

/// A runtime-tagged value carried by a terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueBox {
    pub tag: TypeTag,
    pub payload: Payload,
}

impl ValueBox {
    pub fn empty(tag: TypeTag) -> Self {
        ValueBox { tag, payload: Payload::Empty }
    }

    pub fn bool(v: bool) -> Self {
        ValueBox { tag: TypeTag::Bool, payload: Payload::Bool(v) }
    }

    pub fn int(v: i64) -> Self {
        ValueBox { tag: TypeTag::Int, payload: Payload::Int(v) }
    }

    pub fn float(v: f64) -> Self {
        ValueBox { tag: TypeTag::Float, payload: Payload::Float(v) }
    }

    pub fn string(v: impl Into<String>) -> Self {
        ValueBox { tag: TypeTag::String, payload: Payload::String(v.into()) }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.payload, Payload::Empty)
    }

    /// Stringifies the value for `{{NAME}}` substitution (SPEC_FULL.md §6.2):
    /// booleans as `true`/`false`, numbers in canonical decimal form.
    pub fn stringify(&self) -> String {
        match &self.payload {
            Payload::Bool(b) => b.to_string(),
            Payload::Int(i) => i.to_string(),
            Payload::Float(f) => {
                if f.fract() == 0.0 && f.is_finite() {
                    format!("{f:.0}")
                } else {
                    f.to_string()
                }
            }
            Payload::String(s) => s.clone(),
            Payload::Date(d) => d.to_string(),
            Payload::Time(t) => t.to_string(),
            Payload::DateTime(dt) => dt.to_string(),
            Payload::Opaque(v) => v.to_string(),
            Payload::Empty => String::new(),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match &self.payload {
            Payload::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match &self.payload {
            Payload::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match &self.payload {
            Payload::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.payload {
            Payload::String(s) => Some(s),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compatible_requires_subset() {
        let out = vec![TypeTag::Int];
        let in_ok = vec![TypeTag::Int, TypeTag::Float];
        let in_bad = vec![TypeTag::Float];
        assert!(compatible(&out, &in_ok));
        assert!(!compatible(&out, &in_bad));
    }

    #[test]
    fn stringify_matches_canonical_forms() {
        assert_eq!(ValueBox::bool(true).stringify(), "true");
        assert_eq!(ValueBox::int(7).stringify(), "7");
        assert_eq!(ValueBox::float(7.0).stringify(), "7");
        assert_eq!(ValueBox::float(7.5).stringify(), "7.5");
        assert_eq!(ValueBox::string("hi").stringify(), "hi");
    }
}
