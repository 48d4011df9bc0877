use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

/// Upper bound on operations in one atomic batch.
pub const MAX_BATCH_OPS: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Batch exceeds {max} operations")]
    BatchTooLarge { max: usize },

    #[error("Invalid filter field: {0}")]
    InvalidFilter(String),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A stored document: its id within the collection plus the JSON body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

/// Equality filter over top-level document fields.
///
/// Semantics match JSON containment: a document matches when every filter
/// field is present with an equal value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    fields: Map<String, Value>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// The filter as a JSON object, for stores that support `@>` containment.
    pub fn to_json(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    pub fn matches(&self, data: &Value) -> bool {
        self.fields
            .iter()
            .all(|(field, expected)| data.get(field) == Some(expected))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Set {
        collection: String,
        id: String,
        data: Value,
    },
    Delete {
        collection: String,
        id: String,
    },
    /// Writes nothing; the batch fails unless the document exists and matches.
    Expect {
        collection: String,
        id: String,
        expected: Filter,
    },
}

impl WriteOp {
    pub fn collection(&self) -> &str {
        match self {
            WriteOp::Set { collection, .. }
            | WriteOp::Delete { collection, .. }
            | WriteOp::Expect { collection, .. } => collection,
        }
    }
}

/// An ordered group of writes applied atomically by `DocumentStore::commit`.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<T: Serialize>(&mut self, collection: &str, id: &str, value: &T) -> StoreResult<()> {
        let data = serde_json::to_value(value)?;
        self.push(WriteOp::Set {
            collection: collection.to_string(),
            id: id.to_string(),
            data,
        })
    }

    pub fn delete(&mut self, collection: &str, id: &str) -> StoreResult<()> {
        self.push(WriteOp::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
        })
    }

    /// Guard the batch on the current state of a document, e.g. a tee time
    /// still being available when the booking lands.
    pub fn expect(&mut self, collection: &str, id: &str, expected: Filter) -> StoreResult<()> {
        self.push(WriteOp::Expect {
            collection: collection.to_string(),
            id: id.to_string(),
            expected,
        })
    }

    fn push(&mut self, op: WriteOp) -> StoreResult<()> {
        if self.ops.len() >= MAX_BATCH_OPS {
            return Err(StoreError::BatchTooLarge { max: MAX_BATCH_OPS });
        }
        self.ops.push(op);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn remaining(&self) -> usize {
        MAX_BATCH_OPS - self.ops.len()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

/// Document store seam: a managed store of JSON documents grouped in collections.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Value>>;

    /// Insert or replace a document.
    async fn set(&self, collection: &str, id: &str, data: Value) -> StoreResult<()>;

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()>;

    /// Documents matching the filter, ordered by id. An empty filter lists the collection.
    async fn query(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<Document>>;

    async fn count(&self, collection: &str, filter: &Filter) -> StoreResult<usize> {
        Ok(self.query(collection, filter).await?.len())
    }

    /// Apply every op in the batch or none of them. A failed `Expect` aborts
    /// the batch with `StoreError::PreconditionFailed`.
    async fn commit(&self, batch: WriteBatch) -> StoreResult<()>;
}

pub async fn fetch<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: &str,
    id: &str,
) -> StoreResult<Option<T>> {
    match store.get(collection, id).await? {
        Some(data) => Ok(Some(serde_json::from_value(data)?)),
        None => Ok(None),
    }
}

pub async fn fetch_all<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: &str,
    filter: &Filter,
) -> StoreResult<Vec<T>> {
    store
        .query(collection, filter)
        .await?
        .into_iter()
        .map(|doc| serde_json::from_value(doc.data).map_err(StoreError::from))
        .collect()
}

pub async fn put<T: Serialize>(
    store: &dyn DocumentStore,
    collection: &str,
    id: &str,
    value: &T,
) -> StoreResult<()> {
    let data = serde_json::to_value(value)?;
    store.set(collection, id, data).await
}
