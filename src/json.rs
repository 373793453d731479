//! Rich JSON serialization hook
//!
//! The serving layer hands arbitrary engine objects to a generic encoder.
//! Only types implementing [`RichJson`], the recognized override hook,
//! are accepted; everything else is rejected at the type level. Records
//! serialize as their schema-restricted dict, querysets and collections as
//! arrays of those, and dates as ISO strings.

use crate::collection::Collection;
use crate::composite::CompositeView;
use crate::query::QuerySet;
use crate::record::{Attrs, Value};

/// Opt-in hook for rich JSON serialization
pub trait RichJson {
    fn to_rich_json(&self) -> serde_json::Value;
}

/// Encode any hook implementor to a JSON string.
pub fn dumps<T: RichJson>(value: &T) -> String {
    value.to_rich_json().to_string()
}

/// Convert one engine value to JSON. Dates become ISO `YYYY-MM-DD` strings.
pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::Number((*i).into()),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Str(s) => serde_json::Value::String(s.clone()),
        Value::Date(d) => serde_json::Value::String(d.format("%Y-%m-%d").to_string()),
        Value::List(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
    }
}

fn attrs_to_json(attrs: &Attrs) -> serde_json::Value {
    serde_json::Value::Object(
        attrs
            .iter()
            .map(|(k, v)| (k.clone(), value_to_json(v)))
            .collect(),
    )
}

impl RichJson for QuerySet {
    fn to_rich_json(&self) -> serde_json::Value {
        serde_json::Value::Array(self.to_dicts().iter().map(attrs_to_json).collect())
    }
}

impl RichJson for Collection {
    fn to_rich_json(&self) -> serde_json::Value {
        self.objects().to_rich_json()
    }
}

impl RichJson for CompositeView {
    fn to_rich_json(&self) -> serde_json::Value {
        self.objects().to_rich_json()
    }
}
