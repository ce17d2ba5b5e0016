//! # Document Store
//!
//! Adapter over the hosted document database.
//!
//! Collections are addressed by slash-joined paths ("Organizations",
//! "Organizations/ORG_ID/Items", ...) and hold JSON documents keyed by
//! opaque string ids. Written documents carry their own `id` field so a
//! read always comes back as `{ id, ...fields }`.
//!
//! ## Contract
//! - `get` on a missing id is `Ok(None)`, never an error.
//! - `add` assigns a fresh id and returns it.
//! - `set` is an upsert on a caller-chosen id.
//! - `update` is a shallow partial merge. Fields absent from the patch are
//!   left untouched. Updating a missing document is an error.
//! - `delete` is unconditional. No referential-integrity checks: deleting a
//!   document referenced elsewhere leaves a dangling reference for readers
//!   to resolve as not-found.
use std::{
    collections::BTreeMap,
    sync::Mutex,
};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("document not found")]
    Missing,

    #[error("store call timed out")]
    Timeout,

    #[error("{0}")]
    Backend(String),

    #[error("corrupt document: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError>;

    /// All documents in a collection, ordered by document id.
    async fn list(&self, collection: &str) -> Result<Vec<Value>, StoreError>;

    /// Upsert under a caller-chosen id.
    async fn set(&self, collection: &str, id: &str, doc: Value) -> Result<(), StoreError>;

    /// Insert under a fresh server-assigned id, returned to the caller.
    async fn add(&self, collection: &str, doc: Value) -> Result<String, StoreError>;

    /// Shallow partial merge into an existing document.
    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<(), StoreError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;
}

pub fn new_document_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn stamp_id(doc: &mut Value, id: &str) {
    if let Value::Object(map) = doc {
        map.insert("id".to_string(), Value::String(id.to_string()));
    }
}

/// Top-level fields only. `null` in the patch overwrites; omitted fields
/// are untouched.
pub fn merge_into(doc: &mut Value, patch: &Value) {
    if let (Value::Object(doc_map), Value::Object(patch_map)) = (doc, patch) {
        for (key, value) in patch_map {
            doc_map.insert(key.clone(), value.clone());
        }
    }
}

/// In-memory backend for tests and the seeder's dry runs. Collections are
/// ordered maps so listings are deterministic.
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<BTreeMap<String, BTreeMap<String, Value>>>,
    fail_writes: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write to `collection` fail until cleared. Lets tests
    /// observe the partially-applied states the real store can produce.
    pub fn fail_writes_to(&self, collection: &str) {
        *self.fail_writes.lock().unwrap() = Some(collection.to_string());
    }

    pub fn clear_write_failures(&self) {
        *self.fail_writes.lock().unwrap() = None;
    }

    fn check_write(&self, collection: &str) -> Result<(), StoreError> {
        match self.fail_writes.lock().unwrap().as_deref() {
            Some(poisoned) if poisoned == collection => {
                Err(StoreError::Backend("injected write failure".to_string()))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let collections = self.collections.lock().unwrap();

        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn list(&self, collection: &str) -> Result<Vec<Value>, StoreError> {
        let collections = self.collections.lock().unwrap();

        Ok(collections
            .get(collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn set(&self, collection: &str, id: &str, mut doc: Value) -> Result<(), StoreError> {
        self.check_write(collection)?;
        stamp_id(&mut doc, id);

        let mut collections = self.collections.lock().unwrap();
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), doc);

        Ok(())
    }

    async fn add(&self, collection: &str, mut doc: Value) -> Result<String, StoreError> {
        self.check_write(collection)?;

        let id = new_document_id();
        stamp_id(&mut doc, &id);

        let mut collections = self.collections.lock().unwrap();
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), doc);

        Ok(id)
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<(), StoreError> {
        self.check_write(collection)?;

        let mut collections = self.collections.lock().unwrap();
        let doc = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or(StoreError::Missing)?;

        merge_into(doc, &patch);

        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.check_write(collection)?;

        let mut collections = self.collections.lock().unwrap();
        if let Some(docs) = collections.get_mut(collection) {
            docs.remove(id);
        }

        Ok(())
    }
}
