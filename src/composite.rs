//! Composite view - a read-only union of several collections
//!
//! The derived record set is the concatenation of all sources' records in
//! source order. Each derived record carries a fresh sequential identity, a
//! uuid deterministically derived from its source record's uuid, and a
//! non-owning back-reference (collection name + uuid) to the record it came
//! from. The derived field set is the union of all sources' base fields;
//! fields a source record lacks are present but null.

use crate::collection::Collection;
use crate::identity::{self, Sequence};
use crate::query::{QueryCtx, QuerySet};
use crate::record::{Attrs, Record, SourceRef, Value};
use crate::schema::Schema;
use indexmap::IndexMap;
use std::sync::Arc;

/// Read-only projection over the union of several collections
pub struct CompositeView {
    name: String,
    base_fields: Vec<String>,
    records: Vec<Arc<Record>>,
    ctx: Arc<QueryCtx>,
}

impl CompositeView {
    /// Build the union over `sources`, in the given order.
    pub fn build(name: impl Into<String>, sources: &[&Collection]) -> Self {
        let name = name.into();

        // union of base fields, first-seen order; each field keeps the
        // descriptor of the first source that declares it
        let mut schema = Schema::with_identity();
        let mut base_fields: Vec<String> = Vec::new();
        for source in sources {
            for field in source.schema().base_field_names() {
                if !schema.contains(field) {
                    if let Some(def) = source.schema().get(field) {
                        schema.declare(field.to_string(), def.clone());
                        base_fields.push(field.to_string());
                    }
                }
            }
        }

        let sequence = Arc::new(Sequence::new());
        let mut records = Vec::new();
        for source in sources {
            for original in source.records() {
                let mut values = Attrs::new();
                for field in &base_fields {
                    let value = original.get(field).cloned().unwrap_or(Value::Null);
                    values.insert(field.clone(), value);
                }

                let mut derived = Record::new(
                    sequence.next_id(),
                    identity::derived_uuid(&original.uuid),
                    values,
                );
                derived.set_source(SourceRef {
                    collection: source.name().to_string(),
                    uuid: original.uuid.clone(),
                });
                records.push(Arc::new(derived));
            }
        }

        let ctx = Arc::new(QueryCtx {
            collection: name.clone(),
            schema,
            computed: IndexMap::new(),
            sequence,
            fake_overrides: IndexMap::new(),
        });

        Self {
            name,
            base_fields,
            records,
            ctx,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_fields(&self) -> &[String] {
        &self.base_fields
    }

    /// The manager over the derived records.
    pub fn objects(&self) -> QuerySet {
        QuerySet::new(self.ctx.clone(), self.records.clone())
    }
}

impl std::fmt::Debug for CompositeView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeView")
            .field("name", &self.name)
            .field("records", &self.records.len())
            .field("base_fields", &self.base_fields)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;

    fn sources() -> (Collection, Collection) {
        let registry = Registry::new();
        let mut cats = Collection::builder("Cat").build(&registry).unwrap();
        cats.create([("name", "Mruczek"), ("toy", "ball")]).unwrap();
        cats.create([("name", "Filemon"), ("toy", "string")])
            .unwrap();

        let mut dogs = Collection::builder("Dog").build(&registry).unwrap();
        dogs.create([("name", "Burek"), ("bone", "large")]).unwrap();

        (cats, dogs)
    }

    #[test]
    fn test_count_is_sum_of_sources() {
        let (cats, dogs) = sources();
        let pets = CompositeView::build("Pet", &[&cats, &dogs]);
        assert_eq!(
            pets.objects().count(),
            cats.objects().count() + dogs.objects().count()
        );
    }

    #[test]
    fn test_fresh_sequential_identity() {
        let (cats, dogs) = sources();
        let pets = CompositeView::build("Pet", &[&cats, &dogs]);
        let ids: Vec<u64> = pets.objects().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_absent_union_fields_are_null() {
        let (cats, dogs) = sources();
        let pets = CompositeView::build("Pet", &[&cats, &dogs]);
        assert_eq!(pets.base_fields(), &["name", "toy", "bone"]);

        let burek = pets.objects().get([("name", "Burek")]).unwrap();
        assert!(burek.attr("toy").is_null());
        assert_eq!(burek.attr("bone"), Value::Str("large".into()));
    }

    #[test]
    fn test_source_backreference_and_derived_uuid() {
        let (cats, dogs) = sources();
        let pets = CompositeView::build("Pet", &[&cats, &dogs]);

        let derived = pets.objects().get([("name", "Mruczek")]).unwrap();
        let source = derived.source().unwrap();
        assert_eq!(source.collection, "Cat");

        let original = cats.objects().get([("name", "Mruczek")]).unwrap();
        assert_eq!(source.uuid, original.uuid);
        assert_eq!(derived.uuid, identity::derived_uuid(&original.uuid));
    }

    #[test]
    fn test_rebuild_is_stable_given_stable_sources() {
        let (cats, dogs) = sources();
        let a = CompositeView::build("Pet", &[&cats, &dogs]);
        let b = CompositeView::build("Pet", &[&cats, &dogs]);
        let ua: Vec<String> = a.objects().iter().map(|r| r.uuid.clone()).collect();
        let ub: Vec<String> = b.objects().iter().map(|r| r.uuid.clone()).collect();
        assert_eq!(ua, ub);
    }
}
