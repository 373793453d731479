//! Collection - a set of typed records sharing one schema and identity
//! sequence
//!
//! A collection is assembled exactly once through [`CollectionBuilder`]:
//! declared fields, foreign keys and computed attributes are registered
//! explicitly, then `build` runs the whole pipeline: fixture parse, name
//! normalization, identity assignment, field coercion, FK resolution and
//! the default ordering. Any failure aborts the build; a partially built
//! collection is never exposed.
//!
//! After the build the schema, FK descriptors and base record set are
//! fixed. Records grow only through the explicit append APIs (`create`,
//! `precreate_fake`), which are single-writer operations.

use crate::error::{Error, Result};
use crate::fixture::{self, RawRecord};
use crate::identity::{self, Sequence};
use crate::naming::normalize_field_name;
use crate::query::{ComputedFn, FakeFn, QueryCtx, QuerySet};
use crate::record::{Attrs, Record, Value};
use crate::registry::Registry;
use crate::schema::{FieldDef, Fk, Schema};
use indexmap::IndexMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Builder for a [`Collection`]: explicit registration of fields, foreign
/// keys, computed attributes and options before the one-time build.
pub struct CollectionBuilder {
    name: String,
    schema: Schema,
    fkeys: IndexMap<String, Fk>,
    computed: IndexMap<String, ComputedFn>,
    fake_overrides: IndexMap<String, FakeFn>,
    fixture: Option<PathBuf>,
    delimiter: Option<char>,
    enforce_schema: bool,
    ordering: Option<Vec<String>>,
}

impl CollectionBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: Schema::with_identity(),
            fkeys: IndexMap::new(),
            computed: IndexMap::new(),
            fake_overrides: IndexMap::new(),
            fixture: None,
            delimiter: None,
            enforce_schema: false,
            ordering: None,
        }
    }

    /// Declare a field's kind (and optional extractor) up front instead of
    /// letting the first fixture value settle it.
    pub fn field(mut self, name: &str, def: FieldDef) -> Self {
        self.schema.declare(normalize_field_name(name), def);
        self
    }

    /// Declare a foreign key under the given attribute name.
    pub fn fk(mut self, name: &str, fk: Fk) -> Self {
        self.fkeys.insert(normalize_field_name(name), fk);
        self
    }

    /// Register a computed attribute usable in filter and order keys.
    pub fn computed(
        mut self,
        name: &str,
        f: impl Fn(&Record) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.computed
            .insert(normalize_field_name(name), Arc::new(f));
        self
    }

    /// Override the fake generator for one field name.
    pub fn fake_with(mut self, name: &str, f: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.fake_overrides
            .insert(normalize_field_name(name), Arc::new(f));
        self
    }

    /// Fixture file to load at build time.
    pub fn fixture(mut self, path: impl Into<PathBuf>) -> Self {
        self.fixture = Some(path.into());
        self
    }

    /// Delimiter override for tabular fixtures.
    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    /// Strict FK resolution: an unmatched reference aborts the build with
    /// the target collection's "does not exist".
    pub fn enforce_schema(mut self, enforce: bool) -> Self {
        self.enforce_schema = enforce;
        self
    }

    /// Default multi-key ordering, applied once when the collection is
    /// built.
    pub fn ordering<S: AsRef<str>>(mut self, keys: impl IntoIterator<Item = S>) -> Self {
        self.ordering = Some(keys.into_iter().map(|k| k.as_ref().to_string()).collect());
        self
    }

    /// Run the build pipeline. FK targets are looked up in `registry`.
    pub fn build(self, registry: &Registry) -> Result<Collection> {
        self.schema.validate()?;

        let raw_records = match &self.fixture {
            Some(path) => fixture::load_path(path, self.delimiter)?,
            None => Vec::new(),
        };
        tracing::debug!(
            collection = %self.name,
            records = raw_records.len(),
            "fixture parsed"
        );

        let mut collection = Collection {
            name: self.name,
            schema: self.schema,
            fkeys: self.fkeys,
            computed: self.computed,
            fake_overrides: self.fake_overrides,
            enforce_schema: self.enforce_schema,
            ordering: self.ordering,
            sequence: Arc::new(Sequence::new()),
            records: Vec::new(),
            ctx: None,
        };

        for raw in raw_records {
            let record = collection.build_record(raw, registry)?;
            collection.records.push(Arc::new(record));
        }

        collection.refresh_ctx();
        if let Some(keys) = collection.ordering.clone() {
            collection.records =
                crate::query::multi_key_sort(&collection.ctx_arc(), collection.records.clone(), &keys);
        }

        tracing::debug!(
            collection = %collection.name,
            fields = ?collection.schema.field_names().collect::<Vec<_>>(),
            fkeys = collection.fkeys.len(),
            "collection built"
        );
        Ok(collection)
    }
}

/// A built collection: schema, foreign keys, identity sequence and the
/// owned record list.
pub struct Collection {
    name: String,
    schema: Schema,
    fkeys: IndexMap<String, Fk>,
    computed: IndexMap<String, ComputedFn>,
    fake_overrides: IndexMap<String, FakeFn>,
    enforce_schema: bool,
    ordering: Option<Vec<String>>,
    sequence: Arc<Sequence>,
    records: Vec<Arc<Record>>,
    /// Rebuilt whenever the schema grows (ad hoc construction); None only
    /// mid-build.
    ctx: Option<Arc<QueryCtx>>,
}

impl Collection {
    pub fn builder(name: impl Into<String>) -> CollectionBuilder {
        CollectionBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn records(&self) -> &[Arc<Record>] {
        &self.records
    }

    /// Declared base fields (identity excluded); the composite view unions
    /// these across sources.
    pub fn base_fields(&self) -> Vec<String> {
        self.schema
            .base_field_names()
            .map(str::to_string)
            .collect()
    }

    /// The manager: a fresh queryset over the current records.
    pub fn objects(&self) -> QuerySet {
        let mut qs = QuerySet::new(self.ctx_arc(), self.records.clone());
        if let Some(keys) = &self.ordering {
            qs.set_ordering(keys.clone());
        }
        qs
    }

    /// Construct one record ad hoc. An explicit `id` attribute must not run
    /// behind the sequence cursor; a `uuid` attribute is taken as-is, and a
    /// random one is generated otherwise. No FK resolution happens here.
    pub fn create<K, V>(&mut self, attrs: impl IntoIterator<Item = (K, V)>) -> Result<Arc<Record>>
    where
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut explicit_id = None;
        let mut explicit_uuid = None;
        let mut values = Attrs::new();

        for (key, value) in attrs {
            let name = normalize_field_name(key.as_ref());
            let value = value.into();
            match name.as_str() {
                "id" | "pk" => explicit_id = Some(value),
                "uuid" => explicit_uuid = value.as_str().map(str::to_string),
                _ => {
                    let coerced = self.schema.coerce_or_infer(&name, value)?;
                    values.insert(name, coerced);
                }
            }
        }

        let id = match explicit_id {
            Some(value) => self.sequence.claim(positive_id(&value)?)?,
            None => self.sequence.next_id(),
        };
        let uuid = explicit_uuid.unwrap_or_else(identity::random_uuid);

        let record = Arc::new(Record::new(id, uuid, values));
        self.records.push(record.clone());
        self.refresh_ctx();
        Ok(record)
    }

    /// Synthesize `count` fake records and append them to the live record
    /// set. Single-writer only, like `create`.
    pub fn precreate_fake(&mut self, count: usize) -> Result<()> {
        let fresh = crate::query::synthesize(&self.ctx_arc(), count)?;
        self.records.extend(fresh);
        self.refresh_ctx();
        Ok(())
    }

    /// One record as a schema-restricted attribute map (identity fields
    /// included, internal attributes excluded).
    pub fn record_dict(&self, record: &Record) -> Attrs {
        crate::query::record_dict(&self.schema, record)
    }

    /// YAML dump of a record's schema-restricted view.
    pub fn dump_yaml(&self, record: &Record) -> Result<String> {
        let mapping: serde_yaml::Mapping = self
            .record_dict(record)
            .iter()
            .map(|(k, v)| {
                (
                    serde_yaml::Value::String(k.clone()),
                    fixture::value_to_yaml(v),
                )
            })
            .collect();
        Ok(serde_yaml::to_string(&serde_yaml::Value::Mapping(mapping))?)
    }

    fn ctx_arc(&self) -> Arc<QueryCtx> {
        self.ctx
            .clone()
            .unwrap_or_else(|| self.fresh_ctx())
    }

    fn fresh_ctx(&self) -> Arc<QueryCtx> {
        Arc::new(QueryCtx {
            collection: self.name.clone(),
            schema: self.schema.clone(),
            computed: self.computed.clone(),
            sequence: self.sequence.clone(),
            fake_overrides: self.fake_overrides.clone(),
        })
    }

    fn refresh_ctx(&mut self) {
        self.ctx = Some(self.fresh_ctx());
    }

    /// Build one record from raw fixture content: identity first, then
    /// per-field coercion, then FK resolution.
    fn build_record(&mut self, raw: RawRecord, registry: &Registry) -> Result<Record> {
        // normalized view of the raw record; identity keys are split off
        let mut explicit_id = None;
        let mut explicit_uuid = None;
        let mut fields: Vec<(String, Value)> = Vec::with_capacity(raw.len());
        for (key, value) in &raw {
            let name = normalize_field_name(key);
            match name.as_str() {
                "id" => explicit_id = Some(value.clone()),
                "uuid" => explicit_uuid = value.as_str().map(str::to_string),
                _ => fields.push((name, value.clone())),
            }
        }

        let id = match explicit_id {
            Some(value) => self.sequence.claim(positive_id(&value)?)?,
            None => self.sequence.next_id(),
        };
        let uuid = explicit_uuid.unwrap_or_else(|| identity::content_uuid(&raw));

        let mut values = Attrs::new();
        for (name, value) in fields {
            let coerced = self.schema.coerce_or_infer(&name, value)?;
            values.insert(name, coerced);
        }

        let mut record = Record::new(id, uuid, values);
        for (fk_name, fk) in &self.fkeys {
            if let Some((source_field, target_field)) = fk_source(fk_name, fk, &record) {
                let target = self.resolve_fk(fk, &source_field, &target_field, &record, registry)?;
                record.set_ref(fk_name.clone(), target);
            }
        }

        Ok(record)
    }

    /// Look up the single target record a foreign key points at. Resolution
    /// happens once, here; the link is never re-evaluated if the target
    /// collection changes later.
    ///
    /// Zero matches: the target collection's "does not exist" aborts the
    /// build under `enforce_schema`, and resolves to nothing otherwise.
    /// Several matches: the first one wins. Unlike `get()`, resolution
    /// never raises on surplus matches, it only refuses to merge them.
    fn resolve_fk(
        &self,
        fk: &Fk,
        source_field: &str,
        target_field: &str,
        record: &Record,
        registry: &Registry,
    ) -> Result<Option<Arc<Record>>> {
        let raw_value = record.attr(source_field);
        if !raw_value.is_truthy() {
            return Ok(None);
        }

        let target = registry.get(&fk.target)?;
        let matched = target
            .objects()
            .filter([(target_field, raw_value.clone())])?;

        match matched.first() {
            Some(found) => Ok(Some(found.clone())),
            None if self.enforce_schema => Err(Error::DoesNotExist {
                collection: fk.target.clone(),
                criteria: format!("{target_field}={raw_value}"),
            }),
            None => Ok(None),
        }
    }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("records", &self.records.len())
            .field("fkeys", &self.fkeys)
            .finish()
    }
}

/// Resolve which source field feeds a foreign key on this record, and
/// which target field it points at. Explicit declarations win; otherwise
/// the convention is a field named after the descriptor, or carrying an
/// `_id`/`_uuid` identity suffix.
fn fk_source(fk_name: &str, fk: &Fk, record: &Record) -> Option<(String, String)> {
    if let Some(source) = &fk.source_field {
        let source = normalize_field_name(source);
        if record.get(&source).is_some() {
            return Some((source, fk.target_field.clone()));
        }
        return None;
    }

    if record.get(fk_name).is_some() {
        return Some((fk_name.to_string(), fk.target_field.clone()));
    }
    let by_id = format!("{fk_name}_id");
    if record.get(&by_id).is_some() {
        return Some((by_id, "id".to_string()));
    }
    let by_uuid = format!("{fk_name}_uuid");
    if record.get(&by_uuid).is_some() {
        return Some((by_uuid, "uuid".to_string()));
    }
    None
}

fn positive_id(value: &Value) -> Result<u64> {
    let id = match value {
        Value::Int(i) => Some(*i),
        Value::Str(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    match id {
        Some(i) if i > 0 => Ok(i as u64),
        _ => Err(Error::InvalidExplicitId {
            value: value.to_string(),
        }),
    }
}
