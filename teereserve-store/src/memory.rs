use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::{Mutex, RwLock};

use teereserve_core::idempotency::{IdempotencyState, IdempotencyStore};
use teereserve_core::repository::WriteOp;
use teereserve_core::{Document, DocumentStore, Filter, StoreError, StoreResult, WriteBatch};

type Collection = BTreeMap<String, Value>;

/// Document store held in process memory. Used for development and tests.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Value>> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).and_then(|c| c.get(id)).cloned())
    }

    async fn set(&self, collection: &str, id: &str, data: Value) -> StoreResult<()> {
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), data);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        let mut collections = self.collections.write().await;
        if let Some(c) = collections.get_mut(collection) {
            c.remove(id);
        }
        Ok(())
    }

    async fn query(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<Document>> {
        let collections = self.collections.read().await;
        let Some(c) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(c.iter()
            .filter(|(_, data)| filter.matches(data))
            .map(|(id, data)| Document {
                id: id.clone(),
                data: data.clone(),
            })
            .collect())
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        // One write lock for the whole batch keeps it atomic to readers.
        let mut collections = self.collections.write().await;
        for op in batch.ops() {
            if let WriteOp::Expect { collection, id, expected } = op {
                let current = collections.get(collection).and_then(|c| c.get(id));
                if !current.is_some_and(|data| expected.matches(data)) {
                    return Err(StoreError::PreconditionFailed(format!("{}/{}", collection, id)));
                }
            }
        }
        for op in batch.into_ops() {
            match op {
                WriteOp::Set { collection, id, data } => {
                    collections.entry(collection).or_default().insert(id, data);
                }
                WriteOp::Delete { collection, id } => {
                    if let Some(c) = collections.get_mut(&collection) {
                        c.remove(&id);
                    }
                }
                WriteOp::Expect { .. } => {}
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum Slot {
    Pending,
    Done(Value),
}

/// Idempotency keys in process memory, used when Redis is not configured.
#[derive(Default)]
pub struct InMemoryIdempotencyStore {
    keys: Mutex<HashMap<String, (Slot, DateTime<Utc>)>>,
}

impl InMemoryIdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn begin(&self, key: &str, ttl_seconds: u64) -> StoreResult<IdempotencyState> {
        let now = Utc::now();
        let mut keys = self.keys.lock().await;
        keys.retain(|_, (_, expires_at)| *expires_at > now);

        match keys.get(key) {
            Some((Slot::Pending, _)) => Ok(IdempotencyState::InFlight),
            Some((Slot::Done(response), _)) => Ok(IdempotencyState::Completed(response.clone())),
            None => {
                let expires_at = now + Duration::seconds(ttl_seconds as i64);
                keys.insert(key.to_string(), (Slot::Pending, expires_at));
                Ok(IdempotencyState::Started)
            }
        }
    }

    async fn complete(&self, key: &str, response: &Value, ttl_seconds: u64) -> StoreResult<()> {
        let expires_at = Utc::now() + Duration::seconds(ttl_seconds as i64);
        self.keys
            .lock()
            .await
            .insert(key.to_string(), (Slot::Done(response.clone()), expires_at));
        Ok(())
    }

    async fn release(&self, key: &str) -> StoreResult<()> {
        self.keys.lock().await.remove(key);
        Ok(())
    }
}
