//! In-memory document store
//!
//! A process-local [`EntityStore`] backed by `dashmap`. It follows the same
//! contract as the hosted database (single-document atomicity only) and is
//! the adapter used by tests and local tooling.

use crate::adapter::{Collection, Document, EntityStore, Patch, StoreError};
use crate::filter::Filter;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use ulid::Ulid;

/// Thread-safe in-memory document store
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: DashMap<Collection, HashMap<String, Document>>,
    writes: AtomicU64,
}

impl MemoryStore {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful create/update calls so far
    #[inline]
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Number of documents in `collection`
    #[must_use]
    pub fn len(&self, collection: Collection) -> usize {
        self.collections.get(&collection).map_or(0, |docs| docs.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.collections.iter().all(|docs| docs.is_empty())
    }

    /// Overwrite a document without any checks
    ///
    /// Used to seed inconsistent data that the engine itself would never
    /// write. Does not count as a write.
    pub fn put_raw(&self, collection: Collection, id: impl Into<String>, doc: Document) {
        self.collections
            .entry(collection)
            .or_default()
            .insert(id.into(), doc);
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn create(&self, collection: Collection, mut doc: Document) -> Result<String, StoreError> {
        let Some(object) = doc.as_object_mut() else {
            return Err(StoreError::InvalidDocument {
                collection,
                reason: "document must be a JSON object".to_string(),
            });
        };

        let id = match object.get("id") {
            Some(Value::String(id)) => id.clone(),
            Some(_) => {
                return Err(StoreError::InvalidDocument {
                    collection,
                    reason: "`id` must be a string".to_string(),
                })
            }
            None => {
                let id = Ulid::new().to_string();
                object.insert("id".to_string(), Value::String(id.clone()));
                id
            }
        };

        let mut docs = self.collections.entry(collection).or_default();
        if docs.contains_key(&id) {
            return Err(StoreError::AlreadyExists { collection, id });
        }
        docs.insert(id.clone(), doc);
        drop(docs);

        self.record_write();
        tracing::trace!(%collection, %id, "document created");
        Ok(id)
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self
            .collections
            .get(&collection)
            .and_then(|docs| docs.get(id).cloned()))
    }

    async fn query(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Vec<Document>, StoreError> {
        let Some(docs) = self.collections.get(&collection) else {
            return Ok(Vec::new());
        };
        let mut matched: Vec<(&String, &Document)> =
            docs.iter().filter(|(_, doc)| filter.matches(doc)).collect();
        // Stable order regardless of hash iteration
        matched.sort_by(|a, b| a.0.cmp(b.0));
        Ok(matched.into_iter().map(|(_, doc)| doc.clone()).collect())
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        patch: Patch,
    ) -> Result<(), StoreError> {
        let not_found = || StoreError::NotFound {
            collection,
            id: id.to_string(),
        };

        let mut docs = self.collections.get_mut(&collection).ok_or_else(not_found)?;
        let object = docs
            .get_mut(id)
            .and_then(Value::as_object_mut)
            .ok_or_else(not_found)?;
        for (field, value) in patch {
            object.insert(field, value);
        }
        drop(docs);

        self.record_write();
        tracing::trace!(%collection, %id, "document updated");
        Ok(())
    }
}
