use async_trait::async_trait;
use serde_json::Value;

use crate::repository::StoreResult;

/// Outcome of claiming an idempotency key.
#[derive(Debug, Clone, PartialEq)]
pub enum IdempotencyState {
    /// The key was free and now belongs to this request.
    Started,
    /// Another request holds the key and has not finished.
    InFlight,
    /// A previous request finished; its response is replayed.
    Completed(Value),
}

#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Claim `key`, or report who already holds it.
    async fn begin(&self, key: &str, ttl_seconds: u64) -> StoreResult<IdempotencyState>;

    /// Record the final response for a claimed key.
    async fn complete(&self, key: &str, response: &Value, ttl_seconds: u64) -> StoreResult<()>;

    /// Drop a claim after a failure so the client can retry with the same key.
    async fn release(&self, key: &str) -> StoreResult<()>;
}
