use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use teereserve_core::collections::{BACKUPS, BACKUP_ELIGIBLE, BACKUP_SNAPSHOTS};
use teereserve_core::repository::{fetch, fetch_all, put};
use teereserve_core::{CoreError, Document, DocumentStore, Filter, StoreResult, WriteBatch, MAX_BATCH_OPS};

use crate::{RepoError, RepoResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackupStatus {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupJob {
    pub id: String,
    pub collections: Vec<String>,
    pub status: BackupStatus,
    /// Documents copied per collection.
    #[serde(default)]
    pub document_counts: BTreeMap<String, usize>,
    pub requested_by: String,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// The copied contents of one collection within a backup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupSnapshot {
    pub backup_id: String,
    pub collection: String,
    pub documents: Vec<Document>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RestoreReport {
    pub backup_id: String,
    pub restored: BTreeMap<String, usize>,
    pub batches: usize,
}

#[derive(Clone)]
pub struct BackupService {
    store: Arc<dyn DocumentStore>,
}

impl BackupService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Snapshot the named collections (all eligible ones when empty).
    pub async fn create_backup(&self, collections: Vec<String>, requested_by: &str) -> RepoResult<BackupJob> {
        let collections = if collections.is_empty() {
            BACKUP_ELIGIBLE.iter().map(|c| c.to_string()).collect()
        } else {
            collections
        };
        if let Some(bad) = collections.iter().find(|c| !BACKUP_ELIGIBLE.contains(&c.as_str())) {
            return Err(CoreError::ValidationError(format!(
                "Collection {} cannot be backed up",
                bad
            ))
            .into());
        }

        let mut job = BackupJob {
            id: Uuid::new_v4().to_string(),
            collections,
            status: BackupStatus::Running,
            document_counts: BTreeMap::new(),
            requested_by: requested_by.to_string(),
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        };
        put(self.store.as_ref(), BACKUPS, &job.id, &job).await?;
        info!("Backup {} started for {:?}", job.id, job.collections);

        match self.copy_collections(&job).await {
            Ok(counts) => {
                job.status = BackupStatus::Completed;
                job.document_counts = counts;
            }
            Err(e) => {
                error!("Backup {} failed: {}", job.id, e);
                job.status = BackupStatus::Failed;
                job.error = Some(e.to_string());
            }
        }
        job.completed_at = Some(Utc::now());
        put(self.store.as_ref(), BACKUPS, &job.id, &job).await?;
        Ok(job)
    }

    async fn copy_collections(&self, job: &BackupJob) -> StoreResult<BTreeMap<String, usize>> {
        let mut counts = BTreeMap::new();
        for collection in &job.collections {
            let documents = self.store.query(collection, &Filter::new()).await?;
            counts.insert(collection.clone(), documents.len());
            let snapshot = BackupSnapshot {
                backup_id: job.id.clone(),
                collection: collection.clone(),
                documents,
                created_at: Utc::now(),
            };
            put(
                self.store.as_ref(),
                BACKUP_SNAPSHOTS,
                &snapshot_id(&job.id, collection),
                &snapshot,
            )
            .await?;
        }
        Ok(counts)
    }

    pub async fn list_backups(&self) -> RepoResult<Vec<BackupJob>> {
        let mut jobs: Vec<BackupJob> = fetch_all(self.store.as_ref(), BACKUPS, &Filter::new()).await?;
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    pub async fn get_backup(&self, id: &str) -> RepoResult<BackupJob> {
        fetch(self.store.as_ref(), BACKUPS, id)
            .await?
            .ok_or_else(|| RepoError::NotFound(format!("Backup {}", id)))
    }

    /// Writes every snapshotted document back. Documents created after the
    /// backup are left in place.
    pub async fn restore_backup(&self, id: &str) -> RepoResult<RestoreReport> {
        let job = self.get_backup(id).await?;
        if job.status != BackupStatus::Completed {
            return Err(RepoError::Conflict(format!(
                "Backup {} is {:?} and cannot be restored",
                id, job.status
            )));
        }

        let mut report = RestoreReport {
            backup_id: job.id.clone(),
            restored: BTreeMap::new(),
            batches: 0,
        };

        for collection in &job.collections {
            let snapshot: BackupSnapshot =
                fetch(self.store.as_ref(), BACKUP_SNAPSHOTS, &snapshot_id(&job.id, collection))
                    .await?
                    .ok_or_else(|| RepoError::NotFound(format!("Snapshot of {}", collection)))?;

            for chunk in snapshot.documents.chunks(MAX_BATCH_OPS) {
                let mut batch = WriteBatch::new();
                for doc in chunk {
                    batch.set(collection, &doc.id, &doc.data)?;
                }
                self.store.commit(batch).await?;
                report.batches += 1;
            }
            report
                .restored
                .insert(collection.clone(), snapshot.documents.len());
        }

        info!("Backup {} restored in {} batches", job.id, report.batches);
        Ok(report)
    }
}

fn snapshot_id(backup_id: &str, collection: &str) -> String {
    format!("{}:{}", backup_id, collection.replace('/', "_"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryDocumentStore;
    use serde_json::json;
    use teereserve_core::collections::{COURSES, USERS};

    #[tokio::test]
    async fn test_backup_and_restore_in_batches() {
        let store = Arc::new(InMemoryDocumentStore::new());
        for i in 0..1_201 {
            store
                .set(COURSES, &format!("c{:04}", i), json!({"name": format!("Course {}", i)}))
                .await
                .unwrap();
        }
        let service = BackupService::new(store.clone());

        let job = service
            .create_backup(vec![COURSES.to_string()], "admin-1")
            .await
            .unwrap();
        assert_eq!(job.status, BackupStatus::Completed);
        assert_eq!(job.document_counts[COURSES], 1_201);

        store.delete(COURSES, "c0007").await.unwrap();
        store.set(COURSES, "c0008", json!({"name": "Changed"})).await.unwrap();

        let report = service.restore_backup(&job.id).await.unwrap();
        assert_eq!(report.batches, 3);
        assert_eq!(report.restored[COURSES], 1_201);
        assert_eq!(
            store.get(COURSES, "c0008").await.unwrap(),
            Some(json!({"name": "Course 8"}))
        );
        assert!(store.get(COURSES, "c0007").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_rejects_ineligible_collection() {
        let service = BackupService::new(Arc::new(InMemoryDocumentStore::new()));
        let result = service
            .create_backup(vec!["email_logs".to_string()], "admin-1")
            .await;
        assert!(matches!(result, Err(RepoError::Validation(_))));

        let all = service.create_backup(vec![], "admin-1").await.unwrap();
        assert!(all.collections.contains(&USERS.to_string()));
    }
}
