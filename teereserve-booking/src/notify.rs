use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use teereserve_core::collections::EMAIL_LOGS;
use teereserve_core::repository::put;
use teereserve_core::{DocumentStore, StoreResult, WriteBatch};
use teereserve_shared::pii::redact_email;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmailTemplate {
    BookingConfirmed,
    BookingCancelled,
    AccountUpgraded,
    PaymentMethodSaved,
}

/// A queued transactional email. Rendering and delivery happen downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailLog {
    pub id: String,
    pub template: EmailTemplate,
    pub to: String,
    pub payload: Value,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl EmailLog {
    fn queued(template: EmailTemplate, to: &str, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            template,
            to: to.to_string(),
            payload,
            status: "QUEUED".to_string(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Clone)]
pub struct Notifier {
    store: Arc<dyn DocumentStore>,
}

impl Notifier {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Add the email to a batch so it is only queued if the batch commits.
    pub fn queue<T: Serialize>(
        &self,
        batch: &mut WriteBatch,
        template: EmailTemplate,
        to: &str,
        payload: &T,
    ) -> StoreResult<()> {
        let log = EmailLog::queued(template, to, serde_json::to_value(payload)?);
        batch.set(EMAIL_LOGS, &log.id, &log)?;
        info!("Email {:?} queued for {}", template, redact_email(to));
        Ok(())
    }

    pub async fn send<T: Serialize>(&self, template: EmailTemplate, to: &str, payload: &T) -> StoreResult<()> {
        let log = EmailLog::queued(template, to, serde_json::to_value(payload)?);
        put(self.store.as_ref(), EMAIL_LOGS, &log.id, &log).await?;
        info!("Email {:?} queued for {}", template, redact_email(to));
        Ok(())
    }
}
