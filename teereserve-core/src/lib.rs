pub mod collections;
pub mod course;
pub mod idempotency;
pub mod payment;
pub mod repository;
pub mod search;
pub mod user;
pub mod webhook;

pub use repository::{Document, DocumentStore, Filter, StoreError, StoreResult, WriteBatch, MAX_BATCH_OPS};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
