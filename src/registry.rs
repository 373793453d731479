//! Registry of named collections
//!
//! Collections register here after their build so foreign keys and the
//! serving layer can find them by name. Explicit register/lookup/clear
//! operations with a defined initialization order: a collection must be
//! registered before anything that references it is built.

use crate::collection::Collection;
use crate::error::{Error, Result};
use indexmap::IndexMap;
use std::sync::Arc;

/// Process-wide registry of built collections
#[derive(Debug, Default)]
pub struct Registry {
    collections: IndexMap<String, Arc<Collection>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a built collection under its name. Re-registering a name
    /// replaces the previous entry; existing references keep the old one.
    pub fn register(&mut self, collection: Collection) -> Arc<Collection> {
        let shared = Arc::new(collection);
        self.collections
            .insert(shared.name().to_string(), shared.clone());
        shared
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<Collection>> {
        self.collections.get(name).cloned()
    }

    /// Lookup that fails with a typed error, used by FK resolution.
    pub fn get(&self, name: &str) -> Result<Arc<Collection>> {
        self.lookup(name).ok_or_else(|| Error::UnknownCollection {
            name: name.to_string(),
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    pub fn clear(&mut self) {
        self.collections.clear();
    }
}
