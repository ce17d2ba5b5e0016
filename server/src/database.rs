//! # Redis
//!
//! RAM database backing the document store.
//!
//! ## Layout
//!
//! One Redis hash per collection path:
//! - Key: the collection path ("Organizations", "Organizations/ORG_ID/Items", ...)
//! - Field: document id
//! - Value: the document as a JSON string (with its `id` field stamped in)
//!
//! Compact pairs and fast lookups; listing a collection is one HGETALL.
//! There is no cross-document transaction, so multi-write operations higher
//! up (organization approval) can land partially. Concurrent writers to the
//! same document race under last-write-wins.
//!
//! ## Timeouts
//!
//! Every operation is wrapped in a caller-visible timeout so a dead store
//! surfaces as an error instead of a hang.
use std::{collections::HashMap, future::Future, time::Duration};

use async_trait::async_trait;
use redis::{
    aio::{ConnectionManager, ConnectionManagerConfig},
    AsyncCommands, Client,
};
use serde_json::Value;
use tokio::time::timeout;

use crate::store::{merge_into, new_document_id, stamp_id, Store, StoreError};

pub async fn init_redis(redis_url: &str) -> ConnectionManager {
    let config = ConnectionManagerConfig::new()
        .set_number_of_retries(1)
        .set_connection_timeout(Duration::from_millis(100));

    let client = Client::open(redis_url).unwrap();
    let connection_manager = client
        .get_connection_manager_with_config(config)
        .await
        .unwrap();

    connection_manager
}

pub struct RedisStore {
    manager: ConnectionManager,
    op_timeout: Duration,
}

impl RedisStore {
    pub fn new(manager: ConnectionManager, op_timeout: Duration) -> Self {
        Self {
            manager,
            op_timeout,
        }
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, redis::RedisError>>,
    {
        timeout(self.op_timeout, call)
            .await
            .map_err(|_| StoreError::Timeout)?
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

fn parse_document(raw: &str) -> Result<Value, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::Corrupt(e.to_string()))
}

#[async_trait]
impl Store for RedisStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let mut conn = self.manager.clone();

        let raw: Option<String> = self.bounded(conn.hget(collection, id)).await?;

        raw.as_deref().map(parse_document).transpose()
    }

    async fn list(&self, collection: &str) -> Result<Vec<Value>, StoreError> {
        let mut conn = self.manager.clone();

        let raw: HashMap<String, String> = self.bounded(conn.hgetall(collection)).await?;

        let mut entries: Vec<(String, String)> = raw.into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        entries
            .iter()
            .map(|(_, value)| parse_document(value))
            .collect()
    }

    async fn set(&self, collection: &str, id: &str, mut doc: Value) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();

        stamp_id(&mut doc, id);
        let raw = doc.to_string();

        self.bounded(conn.hset::<_, _, _, ()>(collection, id, raw))
            .await
    }

    async fn add(&self, collection: &str, doc: Value) -> Result<String, StoreError> {
        let id = new_document_id();
        self.set(collection, &id, doc).await?;

        Ok(id)
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<(), StoreError> {
        // Read-merge-write with no lock. Overlapping field edits from two
        // admins race under last-write-wins; non-overlapping edits survive.
        let mut doc = self
            .get(collection, id)
            .await?
            .ok_or(StoreError::Missing)?;

        merge_into(&mut doc, &patch);

        self.set(collection, id, doc).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();

        self.bounded(conn.hdel::<_, _, ()>(collection, id)).await
    }
}
