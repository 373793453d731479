//! Record representation
//!
//! A record is an ordered attribute bag plus three identity fields: `id`
//! (monotonic per collection), `pk` (alias of `id`) and `uuid`. Attribute
//! values come from the closed [`Value`] kind set; resolved foreign keys and
//! the composite source back-reference live beside the plain attributes.

use chrono::{Datelike, NaiveDate};
use indexmap::IndexMap;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Attribute values that can be stored on a record
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Date(NaiveDate),
    List(Vec<Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Truthiness, used by the `bool`/`isnull`/`isnotnull` lookups: null,
    /// `false`, zero, the empty string and the empty list are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Date(_) => true,
            Value::List(items) => !items.is_empty(),
        }
    }

    /// Ordered comparison across comparable kinds. Int and Float compare
    /// numerically against each other; mismatched kinds are incomparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Date component extraction for the `year`/`month` lookups.
    pub fn year(&self) -> Option<i64> {
        self.as_date().map(|d| i64::from(d.year()))
    }

    pub fn month(&self) -> Option<i64> {
        self.as_date().map(|d| i64::from(d.month()))
    }

    /// Two-element list used as the argument of the `range` lookup.
    pub fn range(low: impl Into<Value>, high: impl Into<Value>) -> Value {
        Value::List(vec![low.into(), high.into()])
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) => (*a as f64) == *b,
            (Value::Float(a), Value::Int(b)) => *a == (*b as f64),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<u64> for Value {
    fn from(i: u64) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

/// A map of normalized attribute names to values
pub type Attrs = IndexMap<String, Value>;

/// Non-owning back-reference from a composite record to the record it was
/// derived from. A lookup key, never a pointer.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRef {
    pub collection: String,
    pub uuid: String,
}

/// A record in a collection
#[derive(Debug, Clone)]
pub struct Record {
    /// Process-unique positive integer, monotonic per collection
    pub id: u64,

    /// Content-addressed, caller-supplied or random identity string
    pub uuid: String,

    /// Normalized attribute name -> typed value
    pub values: Attrs,

    /// Resolved foreign keys: descriptor name -> target record (None when
    /// resolution found no match under lenient schema enforcement)
    refs: IndexMap<String, Option<Arc<Record>>>,

    /// Set only on composite-view records
    source: Option<SourceRef>,
}

impl Record {
    pub fn new(id: u64, uuid: String, values: Attrs) -> Self {
        Self {
            id,
            uuid,
            values,
            refs: IndexMap::new(),
            source: None,
        }
    }

    /// `pk` is an alias of `id`.
    pub fn pk(&self) -> u64 {
        self.id
    }

    /// Get a stored attribute by its normalized name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Attribute access as the query engine sees it: identity fields first,
    /// then stored attributes, then `Null` for anything unknown.
    pub fn attr(&self, name: &str) -> Value {
        match name {
            "id" | "pk" => Value::Int(self.id as i64),
            "uuid" => Value::Str(self.uuid.clone()),
            _ => self.values.get(name).cloned().unwrap_or(Value::Null),
        }
    }

    /// The record a resolved foreign key points at, if resolution matched.
    pub fn related(&self, name: &str) -> Option<&Arc<Record>> {
        self.refs.get(name).and_then(|r| r.as_ref())
    }

    /// Whether a foreign key of this name was resolved at build time,
    /// regardless of whether it matched.
    pub fn has_ref(&self, name: &str) -> bool {
        self.refs.contains_key(name)
    }

    pub(crate) fn set_ref(&mut self, name: impl Into<String>, target: Option<Arc<Record>>) {
        self.refs.insert(name.into(), target);
    }

    pub fn source(&self) -> Option<&SourceRef> {
        self.source.as_ref()
    }

    pub(crate) fn set_source(&mut self, source: SourceRef) {
        self.source = Some(source);
    }
}
