use async_trait::async_trait;
use redis::{AsyncCommands, RedisResult};
use serde_json::Value;
use tracing::debug;

use teereserve_core::idempotency::{IdempotencyState, IdempotencyStore};
use teereserve_core::{StoreError, StoreResult};

const PENDING: &str = "__pending__";

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    fn idempotency_key(key: &str) -> String {
        format!("idem:{}", key)
    }

    /// Claim a key only if nobody holds it.
    pub async fn set_if_absent(&self, key: &str, value: &str, ttl_seconds: u64) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        // SET NX: Only set if key does not exist
        let result: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await?;

        Ok(result.is_some())
    }

    pub async fn check_rate_limit(&self, key: &str, limit: i64, window_seconds: i64) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let (count,): (i64,) = redis::pipe()
            .atomic()
            .incr(key, 1)
            .expire(key, window_seconds)
            .ignore()
            .query_async(&mut conn)
            .await?;

        Ok(count <= limit)
    }
}

fn backend(e: redis::RedisError) -> StoreError {
    StoreError::Backend(e.to_string())
}

#[async_trait]
impl IdempotencyStore for RedisClient {
    async fn begin(&self, key: &str, ttl_seconds: u64) -> StoreResult<IdempotencyState> {
        let redis_key = Self::idempotency_key(key);
        if self
            .set_if_absent(&redis_key, PENDING, ttl_seconds)
            .await
            .map_err(backend)?
        {
            debug!("Idempotency key claimed: {}", key);
            return Ok(IdempotencyState::Started);
        }

        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(backend)?;
        let stored: Option<String> = conn.get(&redis_key).await.map_err(backend)?;

        match stored.as_deref() {
            // expired between SET and GET; the caller may retry
            None | Some(PENDING) => Ok(IdempotencyState::InFlight),
            Some(raw) => Ok(IdempotencyState::Completed(serde_json::from_str(raw)?)),
        }
    }

    async fn complete(&self, key: &str, response: &Value, ttl_seconds: u64) -> StoreResult<()> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(backend)?;
        conn.set_ex::<_, _, ()>(Self::idempotency_key(key), response.to_string(), ttl_seconds)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn release(&self, key: &str) -> StoreResult<()> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(backend)?;
        conn.del::<_, ()>(Self::idempotency_key(key))
            .await
            .map_err(backend)?;
        Ok(())
    }
}
