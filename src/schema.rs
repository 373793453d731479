//! Schema definitions for fixdb collections
//!
//! A schema is an ordered map of normalized field names to [`FieldDef`]s.
//! Fields are declared up front through the collection builder or inferred
//! progressively: the first typed value observed for an undeclared field
//! settles its kind, and every later value that does not already match is
//! passed through the field's coercion.

use crate::error::{Error, Result};
use crate::record::Value;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// The closed set of supported value kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Int,
    Float,
    Bool,
    Str,
    Date,
    /// User-defined kind; requires an explicit extractor on the field
    Custom,
}

impl FieldType {
    pub fn name(self) -> &'static str {
        match self {
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::Bool => "bool",
            FieldType::Str => "str",
            FieldType::Date => "date",
            FieldType::Custom => "custom",
        }
    }

    /// The kind a raw value naturally carries. `Null` and lists infer
    /// nothing; inference for such fields is deferred to the first typed
    /// value that shows up.
    pub fn of_value(value: &Value) -> Option<FieldType> {
        match value {
            Value::Int(_) => Some(FieldType::Int),
            Value::Float(_) => Some(FieldType::Float),
            Value::Bool(_) => Some(FieldType::Bool),
            Value::Str(_) => Some(FieldType::Str),
            Value::Date(_) => Some(FieldType::Date),
            Value::Null | Value::List(_) => None,
        }
    }

    /// Whether a value already matches this kind (no coercion needed).
    fn matches(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (FieldType::Int, Value::Int(_))
                | (FieldType::Float, Value::Float(_))
                | (FieldType::Bool, Value::Bool(_))
                | (FieldType::Str, Value::Str(_))
                | (FieldType::Date, Value::Date(_))
        )
    }

    /// Default coercion into this kind. `Null` passes through untouched so
    /// absent data stays absent.
    fn coerce(self, field: &str, value: &Value) -> Result<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }

        let reject = || Error::SchemaCoercion {
            field: field.to_string(),
            expected: self.name().to_string(),
            value: value.to_string(),
        };

        match self {
            FieldType::Int => match value {
                Value::Int(i) => Ok(Value::Int(*i)),
                Value::Float(f) => Ok(Value::Int(*f as i64)),
                Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
                Value::Str(s) => s.trim().parse::<i64>().map(Value::Int).map_err(|_| reject()),
                _ => Err(reject()),
            },
            FieldType::Float => match value {
                Value::Float(f) => Ok(Value::Float(*f)),
                Value::Int(i) => Ok(Value::Float(*i as f64)),
                Value::Str(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(Value::Float)
                    .map_err(|_| reject()),
                _ => Err(reject()),
            },
            FieldType::Bool => match value {
                Value::Bool(b) => Ok(Value::Bool(*b)),
                Value::Int(i) => Ok(Value::Bool(*i != 0)),
                Value::Str(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "yes" | "1" => Ok(Value::Bool(true)),
                    "false" | "no" | "0" => Ok(Value::Bool(false)),
                    _ => Err(reject()),
                },
                _ => Err(reject()),
            },
            FieldType::Str => Ok(Value::Str(value.to_string())),
            FieldType::Date => match value {
                Value::Date(d) => Ok(Value::Date(*d)),
                Value::Str(s) => chrono::NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                    .map(Value::Date)
                    .map_err(|_| reject()),
                _ => Err(reject()),
            },
            // Custom kinds only coerce through their extractor; reaching the
            // default path means the extractor was missing.
            FieldType::Custom => Err(Error::MissingExtractor {
                field: field.to_string(),
            }),
        }
    }
}

/// Coercion function attached to a declared field
pub type Extractor = Arc<dyn Fn(&Value) -> Result<Value> + Send + Sync>;

/// Definition of a single field: a kind plus an optional extractor that
/// overrides the kind's default coercion.
#[derive(Clone)]
pub struct FieldDef {
    pub field_type: FieldType,
    pub extractor: Option<Extractor>,
}

impl FieldDef {
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            extractor: None,
        }
    }

    pub fn with_extractor(
        field_type: FieldType,
        extractor: impl Fn(&Value) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            field_type,
            extractor: Some(Arc::new(extractor)),
        }
    }

    /// Coerce a raw value in light of the settled kind: values already of
    /// the right kind pass through, everything else goes through the
    /// extractor (or the kind's default coercion).
    pub fn coerce(&self, field: &str, value: &Value) -> Result<Value> {
        if self.field_type.matches(value) {
            return Ok(value.clone());
        }
        match &self.extractor {
            Some(extract) => extract(value),
            None => self.field_type.coerce(field, value),
        }
    }
}

impl fmt::Debug for FieldDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDef")
            .field("field_type", &self.field_type)
            .field("extractor", &self.extractor.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Declarative cross-collection reference rule.
///
/// `source_field`/`target_field` default to the convention: a raw field
/// literally named after the descriptor (or `<name>_id` / `<name>_uuid`)
/// pointing at the target's identity field.
#[derive(Debug, Clone)]
pub struct Fk {
    pub target: String,
    pub source_field: Option<String>,
    pub target_field: String,
}

impl Fk {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            source_field: None,
            target_field: "id".to_string(),
        }
    }

    pub fn with_fields(
        target: impl Into<String>,
        source_field: impl Into<String>,
        target_field: impl Into<String>,
    ) -> Self {
        Self {
            target: target.into(),
            source_field: Some(source_field.into()),
            target_field: target_field.into(),
        }
    }
}

/// Ordered schema for one collection
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: IndexMap<String, FieldDef>,
}

impl Schema {
    /// Fresh schema holding only the identity fields every record carries.
    pub fn with_identity() -> Self {
        let mut schema = Self::default();
        schema.fields.insert("id".into(), FieldDef::new(FieldType::Int));
        schema.fields.insert("pk".into(), FieldDef::new(FieldType::Int));
        schema
            .fields
            .insert("uuid".into(), FieldDef::new(FieldType::Str));
        schema
    }

    pub fn declare(&mut self, name: impl Into<String>, def: FieldDef) {
        self.fields.insert(name.into(), def);
    }

    pub fn get(&self, name: &str) -> Option<&FieldDef> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// All field names in declaration/inference order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Field names excluding the identity triple; the composite view unions
    /// these across its sources.
    pub fn base_field_names(&self) -> impl Iterator<Item = &str> {
        self.field_names()
            .filter(|name| !matches!(*name, "id" | "pk" | "uuid"))
    }

    /// Coerce a value for a known field, or settle the field's kind from
    /// this first observed value and register it.
    pub fn coerce_or_infer(&mut self, name: &str, value: Value) -> Result<Value> {
        if let Some(def) = self.fields.get(name) {
            return def.coerce(name, &value);
        }
        if let Some(inferred) = FieldType::of_value(&value) {
            self.fields.insert(name.to_string(), FieldDef::new(inferred));
        }
        Ok(value)
    }

    /// Early validation run once at build time: a custom kind without an
    /// extractor can never coerce anything.
    pub fn validate(&self) -> Result<()> {
        for (name, def) in &self.fields {
            if def.field_type == FieldType::Custom && def.extractor.is_none() {
                return Err(Error::MissingExtractor { field: name.clone() });
            }
        }
        Ok(())
    }
}
