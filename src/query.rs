//! QuerySet engine
//!
//! A [`QuerySet`] is an immutable, chainable view over a snapshot of a
//! collection's records. Every operation returns a fresh snapshot; nothing
//! ever mutates shared state, so any number of readers can query a finished
//! collection concurrently.
//!
//! Criteria keys are either a bare attribute name (plain equality) or
//! `field__operator` dispatched through [`crate::lookup`]. Both stored and
//! computed attributes participate; a key resolves once per query to a
//! two-variant accessor instead of being re-detected per record.

use crate::error::{Error, Result};
use crate::identity;
use crate::lookup::{self, LookupFn, ParsedKey};
use crate::record::{Attrs, Record, Value};
use crate::schema::{FieldType, Schema};
use indexmap::IndexMap;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;
use std::ops::Add;
use std::sync::Arc;

/// A named computed attribute: a closure evaluated against a record
pub type ComputedFn = Arc<dyn Fn(&Record) -> Value + Send + Sync>;

/// A per-field-name fake value generator override
pub type FakeFn = Arc<dyn Fn() -> Value + Send + Sync>;

/// Shared, immutable context a queryset carries from its collection:
/// everything filtering, ordering and synthesis need without touching the
/// collection again.
pub struct QueryCtx {
    pub collection: String,
    pub schema: Schema,
    pub computed: IndexMap<String, ComputedFn>,
    pub sequence: Arc<identity::Sequence>,
    pub fake_overrides: IndexMap<String, FakeFn>,
}

/// How a filter/order key reads its value from a record: a stored (or
/// identity) attribute, or a registered computed attribute.
#[derive(Clone)]
enum Accessor {
    Stored(String),
    Computed(ComputedFn),
}

impl Accessor {
    fn resolve(ctx: &QueryCtx, name: &str) -> Accessor {
        // identity and schema fields shadow computed attributes of the
        // same name; unknown names read as null
        if matches!(name, "id" | "pk" | "uuid") || ctx.schema.contains(name) {
            return Accessor::Stored(name.to_string());
        }
        match ctx.computed.get(name) {
            Some(f) => Accessor::Computed(f.clone()),
            None => Accessor::Stored(name.to_string()),
        }
    }

    fn value(&self, record: &Record) -> Value {
        match self {
            Accessor::Stored(name) => record.attr(name),
            Accessor::Computed(f) => f(record),
        }
    }
}

/// Immutable, chainable view over a snapshot of records
#[derive(Clone)]
pub struct QuerySet {
    ctx: Arc<QueryCtx>,
    records: Vec<Arc<Record>>,
    ordering: Option<Vec<String>>,
    /// The snapshot this one was derived from. Provenance only; never
    /// consulted for correctness.
    lineage: Option<Box<QuerySet>>,
}

impl QuerySet {
    pub(crate) fn new(ctx: Arc<QueryCtx>, records: Vec<Arc<Record>>) -> Self {
        Self {
            ctx,
            records,
            ordering: None,
            lineage: None,
        }
    }

    fn derive(&self, records: Vec<Arc<Record>>, ordering: Option<Vec<String>>) -> Self {
        Self {
            ctx: self.ctx.clone(),
            records,
            ordering,
            lineage: Some(Box::new(self.clone())),
        }
    }

    /// Identity snapshot of the current records.
    pub fn all(&self) -> QuerySet {
        self.clone()
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arc<Record>> {
        self.records.iter()
    }

    pub fn first(&self) -> Option<&Arc<Record>> {
        self.records.first()
    }

    pub fn ordering(&self) -> Option<&[String]> {
        self.ordering.as_deref()
    }

    pub(crate) fn set_ordering(&mut self, keys: Vec<String>) {
        self.ordering = Some(keys);
    }

    pub fn lineage(&self) -> Option<&QuerySet> {
        self.lineage.as_deref()
    }

    /// Keep only records matching all criteria. Results are de-duplicated
    /// and keep the relative order of the input snapshot.
    pub fn filter<K, V>(&self, criteria: impl IntoIterator<Item = (K, V)>) -> Result<QuerySet>
    where
        K: AsRef<str>,
        V: Into<Value>,
    {
        let criteria: Vec<(String, Value)> = criteria
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_string(), v.into()))
            .collect();

        let mut predicates: Vec<(Accessor, Option<LookupFn>, Value)> =
            Vec::with_capacity(criteria.len());
        for (key, arg) in criteria {
            match lookup::parse_key(&key)? {
                ParsedKey::Field(field) => {
                    predicates.push((Accessor::resolve(&self.ctx, field), None, arg));
                }
                ParsedKey::Lookup { field, apply } => {
                    predicates.push((Accessor::resolve(&self.ctx, field), Some(apply), arg));
                }
            }
        }

        let mut seen = HashSet::new();
        let mut matched = Vec::new();
        for record in &self.records {
            let hit = predicates.iter().all(|(accessor, op, arg)| {
                let actual = accessor.value(record);
                match op {
                    Some(apply) => apply(&actual, arg),
                    None => actual == *arg,
                }
            });
            if hit && seen.insert(record.uuid.clone()) {
                matched.push(record.clone());
            }
        }

        Ok(self.derive(matched, self.ordering.clone()))
    }

    /// Filter down to exactly one record. Zero matches is the collection's
    /// "does not exist"; two or more is its "multiple objects returned".
    pub fn get<K, V>(&self, criteria: impl IntoIterator<Item = (K, V)>) -> Result<Arc<Record>>
    where
        K: AsRef<str>,
        V: Into<Value>,
    {
        let criteria: Vec<(String, Value)> = criteria
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_string(), v.into()))
            .collect();
        let shown = criteria
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(", ");

        let matched = self.filter(criteria)?;
        match matched.count() {
            1 => Ok(matched.records[0].clone()),
            0 => Err(Error::DoesNotExist {
                collection: self.ctx.collection.clone(),
                criteria: shown,
            }),
            count => Err(Error::MultipleObjectsReturned {
                collection: self.ctx.collection.clone(),
                count,
            }),
        }
    }

    /// Stable multi-key sort. Keys are attribute names (stored or
    /// computed), prefixed with `-` for descending order. The single key
    /// `"?"` shuffles instead: non-deterministic, not reproducible.
    pub fn order_by<S: AsRef<str>>(&self, keys: impl IntoIterator<Item = S>) -> QuerySet {
        let keys: Vec<String> = keys.into_iter().map(|k| k.as_ref().to_string()).collect();

        if keys.len() == 1 && keys[0] == "?" {
            let mut shuffled = self.records.clone();
            shuffled.shuffle(&mut rand::thread_rng());
            return self.derive(shuffled, Some(keys));
        }

        let sorted = multi_key_sort(&self.ctx, self.records.clone(), &keys);
        self.derive(sorted, Some(keys))
    }

    /// Partition the current snapshot into consecutive runs of equal key.
    /// Adjacent equal elements only; `order_by` first for a global group.
    pub fn groupby<F>(&self, key: F) -> Vec<(Value, Vec<Arc<Record>>)>
    where
        F: Fn(&Record) -> Value,
    {
        let mut groups: Vec<(Value, Vec<Arc<Record>>)> = Vec::new();
        for record in &self.records {
            let k = key(record);
            match groups.last_mut() {
                Some((current, run)) if *current == k => run.push(record.clone()),
                _ => groups.push((k, vec![record.clone()])),
            }
        }
        groups
    }

    /// Accumulate numeric fields across the snapshot into a field -> total
    /// map. A non-numeric value under any requested field is a caller error.
    pub fn sum<S: AsRef<str>>(&self, fields: impl IntoIterator<Item = S>) -> Result<Attrs> {
        let fields: Vec<String> = fields.into_iter().map(|f| f.as_ref().to_string()).collect();

        let mut totals = Attrs::new();
        for field in &fields {
            totals.insert(field.clone(), Value::Int(0));
        }

        for record in &self.records {
            for field in &fields {
                let value = record.attr(field);
                let total = &totals[field.as_str()];
                let next = match (total, &value) {
                    (Value::Int(a), Value::Int(b)) => Value::Int(a + b),
                    (Value::Int(a), Value::Float(b)) => Value::Float(*a as f64 + b),
                    (Value::Float(a), Value::Int(b)) => Value::Float(a + *b as f64),
                    (Value::Float(a), Value::Float(b)) => Value::Float(a + b),
                    _ => {
                        return Err(Error::NonNumericAggregate {
                            field: field.clone(),
                        });
                    }
                };
                totals.insert(field.clone(), next);
            }
        }

        Ok(totals)
    }

    /// Synthesize `count` records from the collection's schema using
    /// type-keyed random generators. Identity fields are assigned through
    /// the normal sequence, never synthesized. The new records are returned
    /// as their own snapshot; they are not appended anywhere.
    pub fn fake(&self, count: usize) -> Result<QuerySet> {
        let records = synthesize(&self.ctx, count)?;
        Ok(self.derive(records, None))
    }

    /// Serialization view: one map per record, restricted to schema fields
    /// (identity included, internal attributes excluded).
    pub fn to_dicts(&self) -> Vec<Attrs> {
        self.records
            .iter()
            .map(|record| record_dict(&self.ctx.schema, record))
            .collect()
    }
}

impl Add for QuerySet {
    type Output = QuerySet;

    /// Ordered concatenation of two snapshots, no de-duplication.
    fn add(self, other: QuerySet) -> QuerySet {
        let mut records = self.records.clone();
        records.extend(other.records.iter().cloned());
        self.derive(records, None)
    }
}

impl std::ops::Index<usize> for QuerySet {
    type Output = Arc<Record>;

    fn index(&self, index: usize) -> &Arc<Record> {
        &self.records[index]
    }
}

impl<'a> IntoIterator for &'a QuerySet {
    type Item = &'a Arc<Record>;
    type IntoIter = std::slice::Iter<'a, Arc<Record>>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl std::fmt::Debug for QuerySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuerySet")
            .field("collection", &self.ctx.collection)
            .field("count", &self.records.len())
            .field("ordering", &self.ordering)
            .finish()
    }
}

/// One record as a schema-restricted attribute map.
pub(crate) fn record_dict(schema: &Schema, record: &Record) -> Attrs {
    schema
        .field_names()
        .map(|name| (name.to_string(), record.attr(name)))
        .collect()
}

/// Stable multi-key comparison sort shared by `order_by` and collection
/// default ordering. Each key contributes its comparison in turn; a key
/// that never discriminates contributes nothing.
pub(crate) fn multi_key_sort(
    ctx: &QueryCtx,
    records: Vec<Arc<Record>>,
    keys: &[String],
) -> Vec<Arc<Record>> {
    let comparers: Vec<(Accessor, bool)> = keys
        .iter()
        .map(|key| match key.strip_prefix('-') {
            Some(name) => (Accessor::resolve(ctx, name.trim()), true),
            None => (Accessor::resolve(ctx, key.trim()), false),
        })
        .collect();

    // decorate once so computed attributes run once per record per key
    let mut keyed: Vec<(Vec<Value>, Arc<Record>)> = records
        .into_iter()
        .map(|record| {
            let sort_key = comparers
                .iter()
                .map(|(accessor, _)| accessor.value(&record))
                .collect();
            (sort_key, record)
        })
        .collect();

    keyed.sort_by(|(a, _), (b, _)| {
        for (i, (_, descending)) in comparers.iter().enumerate() {
            let ord = a[i]
                .compare(&b[i])
                .unwrap_or(std::cmp::Ordering::Equal);
            let ord = if *descending { ord.reverse() } else { ord };
            if ord != std::cmp::Ordering::Equal {
                return ord;
            }
        }
        std::cmp::Ordering::Equal
    });

    keyed.into_iter().map(|(_, record)| record).collect()
}

// ---------------------------------------------------------------------------
// Fake data synthesis
// ---------------------------------------------------------------------------

const WORDS: &[&str] = &[
    "amber", "basalt", "cedar", "delta", "ember", "fjord", "garnet", "harbor", "indigo",
    "juniper", "krypton", "lagoon", "meadow", "nimbus", "onyx", "prairie", "quartz", "rivet",
    "sable", "tundra", "umber", "vellum", "willow", "yarrow", "zenith",
];

fn random_word(rng: &mut impl Rng) -> &'static str {
    WORDS.choose(rng).copied().unwrap_or("umber")
}

/// Built-in per-field-name generators for a few conventional names; any
/// builder-registered override wins over these.
fn named_generator(field: &str, rng: &mut impl Rng) -> Option<Value> {
    match field {
        "name" => {
            let titlecase = |w: &str| {
                let mut chars = w.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            };
            let first = titlecase(random_word(rng));
            let last = titlecase(random_word(rng));
            Some(Value::Str(format!("{first} {last}")))
        }
        "email" => Some(Value::Str(format!(
            "{}.{}@example.com",
            random_word(rng),
            rng.gen_range(1..10_000)
        ))),
        _ => None,
    }
}

fn fake_value(field: &str, field_type: FieldType, rng: &mut impl Rng) -> Result<Value> {
    Ok(match field_type {
        FieldType::Int => Value::Int(rng.gen_range(0..10_000)),
        FieldType::Float => Value::Float(rng.gen_range(-1_000.0..1_000.0)),
        FieldType::Bool => Value::Bool(rng.gen()),
        FieldType::Str => match named_generator(field, rng) {
            Some(value) => value,
            None => {
                let words: Vec<&str> = (0..3).map(|_| random_word(rng)).collect();
                Value::Str(words.join(" "))
            }
        },
        FieldType::Date => {
            let days = rng.gen_range(0..25 * 365);
            let base = chrono::NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default();
            Value::Date(base + chrono::Duration::days(days))
        }
        FieldType::Custom => {
            return Err(Error::NoFakeGenerator {
                field: field.to_string(),
            });
        }
    })
}

/// Build `count` synthetic records from the schema, ids assigned by the
/// collection's sequence.
pub(crate) fn synthesize(ctx: &QueryCtx, count: usize) -> Result<Vec<Arc<Record>>> {
    let mut rng = rand::thread_rng();
    let mut records = Vec::with_capacity(count);

    for _ in 0..count {
        let mut values = Attrs::new();
        for field in ctx.schema.base_field_names() {
            let value = match ctx.fake_overrides.get(field) {
                Some(generate) => generate(),
                None => {
                    let field_type = ctx
                        .schema
                        .get(field)
                        .map(|def| def.field_type)
                        .unwrap_or(FieldType::Str);
                    fake_value(field, field_type, &mut rng)?
                }
            };
            values.insert(field.to_string(), value);
        }

        let id = ctx.sequence.next_id();
        records.push(Arc::new(Record::new(id, identity::random_uuid(), values)));
    }

    Ok(records)
}
