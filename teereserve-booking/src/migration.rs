use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use teereserve_core::collections::{BOOKINGS, GUEST_DRAFTS, MIGRATION_AUDIT, USERS};
use teereserve_core::repository::{fetch, put};
use teereserve_core::user::{Tier, UserProfile};
use teereserve_core::{Document, DocumentStore, Filter, StoreResult, WriteBatch, MAX_BATCH_OPS};
use teereserve_shared::models::events::GuestUpgradedEvent;

use crate::models::{Booking, GuestBookingDraft};
use crate::notify::{EmailTemplate, Notifier};
use crate::{BookingError, BookingResult};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MigrationFailure {
    pub booking_id: String,
    pub reason: String,
}

/// Outcome of moving a guest's bookings to their new account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub old_uid: String,
    pub new_uid: String,
    /// Bookings found under the anonymous uid.
    pub total: usize,
    pub migrated: usize,
    pub drafts_migrated: usize,
    pub failed: Vec<MigrationFailure>,
    /// Bookings still referencing the anonymous uid afterwards.
    pub remaining_old: usize,
    /// Bookings under the new uid that carry `migratedFrom == old_uid`.
    pub migrated_new: usize,
    pub validated: bool,
    pub audit_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MigrationAudit {
    id: String,
    #[serde(flatten)]
    report: MigrationReport,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
}

/// Moves an anonymous user's data onto a permanent account.
pub struct GuestMigrator {
    store: Arc<dyn DocumentStore>,
    notifier: Notifier,
}

impl GuestMigrator {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            notifier: Notifier::new(store.clone()),
            store,
        }
    }

    pub async fn migrate(
        &self,
        old_uid: &str,
        new_uid: &str,
        email: &str,
        display_name: Option<String>,
    ) -> BookingResult<MigrationReport> {
        if old_uid == new_uid {
            return Err(BookingError::Validation("Account is already upgraded".into()));
        }
        // Guest tokens outlive the upgrade; each anonymous uid migrates once.
        let prior = self
            .store
            .count(MIGRATION_AUDIT, &Filter::new().eq("oldUid", old_uid))
            .await?;
        if prior > 0 {
            return Err(BookingError::Conflict(format!(
                "Guest account {} was already upgraded",
                old_uid
            )));
        }
        let started_at = Utc::now();
        let audit_id = Uuid::new_v4().to_string();

        let docs = self
            .store
            .query(BOOKINGS, &Filter::new().eq("userId", old_uid))
            .await?;
        let total = docs.len();
        let (migrated, mut failed) = self.migrate_bookings(docs, old_uid, new_uid).await;

        let drafts = self
            .store
            .query(GUEST_DRAFTS, &Filter::new().eq("userId", old_uid))
            .await?;
        let (drafts_migrated, draft_failures) = self.migrate_drafts(drafts, new_uid).await;
        failed.extend(draft_failures);

        let still_old = Filter::new().eq("userId", old_uid);
        let moved = Filter::new().eq("userId", new_uid).eq("migratedFrom", old_uid);
        let (remaining_old, migrated_new) = tokio::try_join!(
            self.store.count(BOOKINGS, &still_old),
            self.store.count(BOOKINGS, &moved),
        )?;
        let validated = remaining_old == 0 && migrated_new == migrated;
        if !validated {
            warn!(
                "Migration {} -> {} incomplete: {} remaining, {} of {} moved",
                old_uid, new_uid, remaining_old, migrated_new, total
            );
        }

        self.upgrade_profile(old_uid, new_uid, email, display_name).await?;

        let report = MigrationReport {
            old_uid: old_uid.to_string(),
            new_uid: new_uid.to_string(),
            total,
            migrated,
            drafts_migrated,
            failed,
            remaining_old,
            migrated_new,
            validated,
            audit_id: audit_id.clone(),
        };
        let audit = MigrationAudit {
            id: audit_id.clone(),
            report: report.clone(),
            started_at,
            finished_at: Utc::now(),
        };
        put(self.store.as_ref(), MIGRATION_AUDIT, &audit_id, &audit).await?;

        let event = GuestUpgradedEvent {
            old_uid: old_uid.to_string(),
            new_uid: new_uid.to_string(),
            migrated_bookings: migrated,
            failed_bookings: report.failed.len(),
            timestamp: Utc::now().timestamp(),
        };
        self.notifier
            .send(EmailTemplate::AccountUpgraded, email, &event)
            .await?;

        info!(
            "Migrated {}/{} bookings and {} drafts from {} to {}",
            migrated, total, drafts_migrated, old_uid, new_uid
        );
        Ok(report)
    }

    /// Rewrites ownership batch by batch. A failing batch is reported, not fatal.
    async fn migrate_bookings(
        &self,
        docs: Vec<Document>,
        old_uid: &str,
        new_uid: &str,
    ) -> (usize, Vec<MigrationFailure>) {
        let mut failed = Vec::new();
        let mut bookings = Vec::with_capacity(docs.len());
        for doc in docs {
            match serde_json::from_value::<Booking>(doc.data) {
                Ok(mut booking) => {
                    booking.user_id = new_uid.to_string();
                    booking.is_guest = false;
                    booking.migrated_from = Some(old_uid.to_string());
                    booking.updated_at = Utc::now();
                    bookings.push(booking);
                }
                Err(e) => failed.push(MigrationFailure {
                    booking_id: doc.id,
                    reason: format!("Unreadable booking: {}", e),
                }),
            }
        }

        let mut migrated = 0;
        for chunk in bookings.chunks(MAX_BATCH_OPS) {
            match self.commit_bookings(chunk).await {
                Ok(()) => migrated += chunk.len(),
                Err(e) => {
                    error!("Migration batch of {} bookings failed: {}", chunk.len(), e);
                    failed.extend(chunk.iter().map(|b| MigrationFailure {
                        booking_id: b.id.clone(),
                        reason: e.to_string(),
                    }));
                }
            }
        }
        (migrated, failed)
    }

    async fn commit_bookings(&self, bookings: &[Booking]) -> StoreResult<()> {
        let mut batch = WriteBatch::new();
        for booking in bookings {
            batch.set(BOOKINGS, &booking.id, booking)?;
        }
        self.store.commit(batch).await
    }

    async fn migrate_drafts(&self, docs: Vec<Document>, new_uid: &str) -> (usize, Vec<MigrationFailure>) {
        let mut failed = Vec::new();
        let mut migrated = 0;
        for doc in docs {
            let result = match serde_json::from_value::<GuestBookingDraft>(doc.data) {
                Ok(mut draft) => {
                    draft.user_id = new_uid.to_string();
                    put(self.store.as_ref(), GUEST_DRAFTS, &draft.id, &draft).await
                }
                Err(e) => Err(e.into()),
            };
            match result {
                Ok(()) => migrated += 1,
                Err(e) => failed.push(MigrationFailure {
                    booking_id: doc.id,
                    reason: e.to_string(),
                }),
            }
        }
        (migrated, failed)
    }

    /// Create the permanent profile, folding in any points earned as a guest.
    async fn upgrade_profile(
        &self,
        old_uid: &str,
        new_uid: &str,
        email: &str,
        display_name: Option<String>,
    ) -> BookingResult<()> {
        let anonymous: Option<UserProfile> = fetch(self.store.as_ref(), USERS, old_uid).await?;
        let existing: Option<UserProfile> = fetch(self.store.as_ref(), USERS, new_uid).await?;

        let mut profile = existing.unwrap_or_else(|| UserProfile {
            uid: new_uid.to_string(),
            email: Some(email.to_string()),
            display_name: display_name.clone(),
            is_anonymous: false,
            points: 0,
            tier: Tier::Bogey,
            rounds_played: 0,
            reviews_written: 0,
            upgraded_from: None,
            created_at: Utc::now(),
        });
        profile.is_anonymous = false;
        profile.upgraded_from = Some(old_uid.to_string());
        if profile.display_name.is_none() {
            profile.display_name = display_name;
        }
        if let Some(guest) = &anonymous {
            profile.rounds_played += guest.rounds_played;
            profile.reviews_written += guest.reviews_written;
            profile.award(guest.points);
        }

        let mut batch = WriteBatch::new();
        batch.set(USERS, new_uid, &profile)?;
        if anonymous.is_some() {
            batch.delete(USERS, old_uid)?;
        }
        self.store.commit(batch).await?;
        Ok(())
    }
}
