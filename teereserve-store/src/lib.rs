pub mod app_config;
pub mod backup;
pub mod catalog_repo;
pub mod database;
pub mod memory;
pub mod pricing_repo;
pub mod redis_repo;

pub use backup::BackupService;
pub use catalog_repo::CatalogRepository;
pub use database::DbClient;
pub use memory::{InMemoryDocumentStore, InMemoryIdempotencyStore};
pub use pricing_repo::{PricingKind, PricingRepository};
pub use redis_repo::RedisClient;

use teereserve_core::{CoreError, StoreError};
use teereserve_pricing::PricingError;

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Validation(#[from] CoreError),
    #[error(transparent)]
    Pricing(#[from] PricingError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type RepoResult<T> = Result<T, RepoError>;
