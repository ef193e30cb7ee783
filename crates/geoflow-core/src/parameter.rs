use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::error::{GeoflowError, Result};
use crate::types::{Payload, TypeTag, ValueBox};

/// Named, typed, editable value. May be slaved to a Graph-owned Global by
/// label - see `set_master`/`refresh_from_master`. Collapses the original's
/// per-type `ParamFloat`/`ParamInt`/... hierarchy onto one struct
/// parameterised by `TypeTag`, since the tag closure already distinguishes
/// the cases; an optional numeric range reproduces the bounded variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    label: String,
    help: String,
    declared_tag: TypeTag,
    value: ValueBox,
    range: Option<(f64, f64)>,
    /// Weak reference to a Graph global, held by key. Resolved through the
    /// Graph's global map rather than an owning pointer (Design Notes,
    /// "Globals as shared references").
    master: Option<String>,
}

impl Parameter {
    pub fn new(label: impl Into<String>, help: impl Into<String>, value: ValueBox) -> Self {
        let declared_tag = value.tag.clone();
        Parameter {
            label: label.into(),
            help: help.into(),
            declared_tag,
            value,
            range: None,
            master: None,
        }
    }

    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.range = Some((min, max));
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn declared_tag(&self) -> &TypeTag {
        &self.declared_tag
    }

    pub fn value(&self) -> &ValueBox {
        &self.value
    }

    pub fn range(&self) -> Option<(f64, f64)> {
        self.range
    }

    pub fn master(&self) -> Option<&str> {
        self.master.as_deref()
    }

    pub fn has_master(&self) -> bool {
        self.master.is_some()
    }

    pub fn clear_master(&mut self) {
        self.master = None;
    }

    /// Fails with `TypeMismatch` if `value`'s tag doesn't match the declared
    /// tag (SPEC_FULL.md §4.B).
    pub fn set(&mut self, value: ValueBox) -> Result<()> {
        if value.tag != self.declared_tag {
            return Err(GeoflowError::TypeMismatch {
                context: format!(
                    "parameter \"{}\" declared as {} got {}",
                    self.label, self.declared_tag, value.tag
                ),
            });
        }
        self.value = value;
        Ok(())
    }

    /// Type-compatibility is checked here, at set-time, not at refresh-time.
    pub fn set_master(&mut self, global_key: impl Into<String>, global_tag: &TypeTag) -> Result<()> {
        if *global_tag != self.declared_tag {
            return Err(GeoflowError::TypeMismatch {
                context: format!(
                    "parameter \"{}\" declared as {} cannot be mastered by global of type {}",
                    self.label, self.declared_tag, global_tag
                ),
            });
        }
        self.master = Some(global_key.into());
        Ok(())
    }

    /// If the master reference is live, overwrites `value` from the master's
    /// current value. If the global has since been deleted, the parameter
    /// silently keeps its own stored value (Design Notes).
    pub fn refresh_from_master(&mut self, globals: &indexmap::IndexMap<String, Parameter>) {
        if let Some(key) = &self.master
            && let Some(global) = globals.get(key)
        {
            self.value = global.value.clone();
        }
    }

    pub fn as_json(&self) -> Json {
        match &self.value.payload {
            Payload::Bool(b) => Json::from(*b),
            Payload::Int(i) => Json::from(*i),
            Payload::Float(f) => Json::from(*f),
            Payload::String(s) => Json::from(s.clone()),
            Payload::Date(d) => Json::from(d.to_string()),
            Payload::Time(t) => Json::from(t.to_string()),
            Payload::DateTime(dt) => Json::from(dt.to_string()),
            Payload::Opaque(v) => v.clone(),
            Payload::Empty => Json::Null,
        }
    }

    /// Decodes `json` into this parameter's declared tag, preserving it.
    pub fn from_json(&mut self, json: &Json) -> Result<()> {
        let payload = match &self.declared_tag {
            TypeTag::Bool => Payload::Bool(json.as_bool().ok_or_else(|| type_err(&self.label, "bool"))?),
            TypeTag::Int => Payload::Int(json.as_i64().ok_or_else(|| type_err(&self.label, "int"))?),
            TypeTag::Float => Payload::Float(json.as_f64().ok_or_else(|| type_err(&self.label, "float"))?),
            TypeTag::String => {
                Payload::String(json.as_str().ok_or_else(|| type_err(&self.label, "string"))?.to_string())
            }
            TypeTag::Date | TypeTag::Time | TypeTag::DateTime | TypeTag::Custom(_) => Payload::Opaque(json.clone()),
        };
        self.value = ValueBox { tag: self.declared_tag.clone(), payload };
        Ok(())
    }
}

fn type_err(label: &str, expected: &str) -> GeoflowError {
    GeoflowError::TypeMismatch {
        context: format!("parameter \"{label}\" expected a JSON {expected}"),
    }
}
