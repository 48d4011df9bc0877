use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres, Row};
use std::time::Duration;
use tracing::{debug, info};

use teereserve_core::repository::WriteOp;
use teereserve_core::{Document, DocumentStore, Filter, StoreError, StoreResult, WriteBatch};

/// Postgres-backed document store: one JSONB row per document.
#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(connection_string: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        info!("Migrations completed successfully.");
        Ok(())
    }
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

#[async_trait]
impl DocumentStore for DbClient {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Value>> {
        let row = sqlx::query("SELECT data FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        row.map(|r| r.try_get::<Value, _>("data").map_err(backend))
            .transpose()
    }

    async fn set(&self, collection: &str, id: &str, data: Value) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, data, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (collection, id) DO UPDATE SET data = EXCLUDED.data, updated_at = NOW()
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn query(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<Document>> {
        let rows = sqlx::query(
            "SELECT id, data FROM documents WHERE collection = $1 AND data @> $2 ORDER BY id",
        )
        .bind(collection)
        .bind(filter.to_json())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter()
            .map(|row| {
                Ok(Document {
                    id: row.try_get("id").map_err(backend)?,
                    data: row.try_get("data").map_err(backend)?,
                })
            })
            .collect()
    }

    async fn count(&self, collection: &str, filter: &Filter) -> StoreResult<usize> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM documents WHERE collection = $1 AND data @> $2",
        )
        .bind(collection)
        .bind(filter.to_json())
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;
        Ok(count as usize)
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        let ops = batch.into_ops();
        debug!("Committing batch of {} ops", ops.len());

        let mut tx = self.pool.begin().await.map_err(backend)?;
        for op in ops {
            match op {
                WriteOp::Set { collection, id, data } => {
                    sqlx::query(
                        r#"
                        INSERT INTO documents (collection, id, data, updated_at)
                        VALUES ($1, $2, $3, NOW())
                        ON CONFLICT (collection, id) DO UPDATE SET data = EXCLUDED.data, updated_at = NOW()
                        "#,
                    )
                    .bind(collection)
                    .bind(id)
                    .bind(data)
                    .execute(&mut *tx)
                    .await
                    .map_err(backend)?;
                }
                WriteOp::Delete { collection, id } => {
                    sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
                        .bind(collection)
                        .bind(id)
                        .execute(&mut *tx)
                        .await
                        .map_err(backend)?;
                }
                WriteOp::Expect { collection, id, expected } => {
                    // FOR UPDATE: a concurrent batch waits, then re-checks against the new row.
                    let found: Option<i32> = sqlx::query_scalar(
                        "SELECT 1 FROM documents WHERE collection = $1 AND id = $2 AND data @> $3 FOR UPDATE",
                    )
                    .bind(&collection)
                    .bind(&id)
                    .bind(expected.to_json())
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(backend)?;
                    if found.is_none() {
                        debug!("Precondition on {}/{} failed, rolling back", collection, id);
                        return Err(StoreError::PreconditionFailed(format!("{}/{}", collection, id)));
                    }
                }
            }
        }
        tx.commit().await.map_err(backend)?;
        Ok(())
    }
}
