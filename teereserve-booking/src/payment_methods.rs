use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use teereserve_core::collections::PAYMENT_METHODS;
use teereserve_core::idempotency::{IdempotencyState, IdempotencyStore};
use teereserve_core::payment::PaymentProvider;
use teereserve_core::repository::{fetch, fetch_all, put};
use teereserve_core::{DocumentStore, Filter, StoreError};
use teereserve_shared::models::events::PaymentMethodSavedEvent;

use crate::notify::{EmailTemplate, Notifier};
use crate::orchestrator::PaymentOrchestrator;
use crate::{Actor, BookingError, BookingResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavePaymentMethodRequest {
    pub provider: PaymentProvider,
    /// Provider token for the card, e.g. `pm_card_visa`.
    pub payment_method_id: String,
}

/// A verified card saved for reuse. Keyed by the provider's payment method id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethodRecord {
    pub id: String,
    pub user_id: String,
    pub provider: PaymentProvider,
    pub brand: String,
    pub last4: String,
    pub exp_month: u32,
    pub exp_year: u32,
    pub verified_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

pub struct PaymentMethodService {
    store: Arc<dyn DocumentStore>,
    idempotency: Arc<dyn IdempotencyStore>,
    payments: Arc<PaymentOrchestrator>,
    notifier: Notifier,
    verification_amount_cents: i64,
    currency: String,
    idempotency_ttl_seconds: u64,
}

impl PaymentMethodService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        idempotency: Arc<dyn IdempotencyStore>,
        payments: Arc<PaymentOrchestrator>,
        verification_amount_cents: i64,
        currency: impl Into<String>,
        idempotency_ttl_seconds: u64,
    ) -> Self {
        Self {
            notifier: Notifier::new(store.clone()),
            store,
            idempotency,
            payments,
            verification_amount_cents,
            currency: currency.into(),
            idempotency_ttl_seconds,
        }
    }

    /// Authorize a small amount, refund it at once, then attach the card.
    ///
    /// Retries with the same `idempotency_key` replay the first result and
    /// never charge the card twice.
    pub async fn verify_and_save_card(
        &self,
        actor: &Actor,
        request: SavePaymentMethodRequest,
        idempotency_key: &str,
    ) -> BookingResult<PaymentMethodRecord> {
        if actor.is_anonymous {
            return Err(BookingError::Forbidden(
                "Guests cannot save payment methods".into(),
            ));
        }
        if idempotency_key.trim().is_empty() {
            return Err(BookingError::Validation("Idempotency key is required".into()));
        }
        if request.payment_method_id.trim().is_empty() {
            return Err(BookingError::Validation("Payment method id is required".into()));
        }

        let key = format!("pm:{}:{}", actor.uid, idempotency_key);
        match self.idempotency.begin(&key, self.idempotency_ttl_seconds).await? {
            IdempotencyState::Completed(response) => {
                info!("Replaying saved payment method for key {}", key);
                return Ok(serde_json::from_value(response).map_err(StoreError::from)?);
            }
            IdempotencyState::InFlight => {
                return Err(BookingError::Conflict(format!(
                    "Request {} is already in progress",
                    idempotency_key
                )));
            }
            IdempotencyState::Started => {}
        }

        match self.verify(actor, &request, &key).await {
            Ok(record) => {
                // Card is saved; provider idempotency keys make a retry safe.
                let completed = match serde_json::to_value(&record) {
                    Ok(response) => self
                        .idempotency
                        .complete(&key, &response, self.idempotency_ttl_seconds)
                        .await,
                    Err(e) => Err(StoreError::from(e)),
                };
                if let Err(e) = completed {
                    warn!("Failed to record result for idempotency key {}: {}", key, e);
                    if let Err(release_err) = self.idempotency.release(&key).await {
                        warn!("Failed to release idempotency key {}: {}", key, release_err);
                    }
                }
                Ok(record)
            }
            Err(e) => {
                if let Err(release_err) = self.idempotency.release(&key).await {
                    warn!("Failed to release idempotency key {}: {}", key, release_err);
                }
                Err(e)
            }
        }
    }

    async fn verify(
        &self,
        actor: &Actor,
        request: &SavePaymentMethodRequest,
        key: &str,
    ) -> BookingResult<PaymentMethodRecord> {
        let existing: Option<PaymentMethodRecord> =
            fetch(self.store.as_ref(), PAYMENT_METHODS, &request.payment_method_id).await?;
        if existing.as_ref().is_some_and(|r| r.user_id != actor.uid) {
            return Err(BookingError::Conflict(format!(
                "Payment method {} belongs to another account",
                request.payment_method_id
            )));
        }

        let adapter = self.payments.adapter(request.provider)?;
        let auth = adapter
            .authorize(
                &actor.uid,
                &request.payment_method_id,
                self.verification_amount_cents,
                &self.currency,
                &format!("{}:auth", key),
            )
            .await?;
        adapter
            .refund(&auth.charge_id, auth.amount_cents, &format!("{}:refund", key))
            .await?;
        let attached = adapter
            .attach_payment_method(&actor.uid, &request.payment_method_id, &format!("{}:attach", key))
            .await?;

        let now = Utc::now();
        let record = PaymentMethodRecord {
            id: attached.id.clone(),
            user_id: actor.uid.clone(),
            provider: request.provider,
            brand: attached.brand.clone(),
            last4: attached.last4.clone(),
            exp_month: attached.exp_month,
            exp_year: attached.exp_year,
            verified_at: now,
            created_at: existing.map(|r| r.created_at).unwrap_or(now),
        };
        put(self.store.as_ref(), PAYMENT_METHODS, &record.id, &record).await?;
        info!("Payment method {} verified for {}", record.id, actor.uid);

        if let Some(email) = &actor.email {
            let event = PaymentMethodSavedEvent {
                user_id: actor.uid.clone(),
                payment_method_id: record.id.clone(),
                brand: record.brand.clone(),
                last4: record.last4.clone(),
                timestamp: now.timestamp(),
            };
            self.notifier
                .send(EmailTemplate::PaymentMethodSaved, email, &event)
                .await?;
        }
        Ok(record)
    }

    pub async fn list_payment_methods(&self, uid: &str) -> BookingResult<Vec<PaymentMethodRecord>> {
        let mut methods: Vec<PaymentMethodRecord> =
            fetch_all(self.store.as_ref(), PAYMENT_METHODS, &Filter::new().eq("userId", uid)).await?;
        methods.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(methods)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::MockPaymentAdapter;
    use crate::test_support::{guest, member};
    use teereserve_core::collections::EMAIL_LOGS;
    use serde_json::Value;
    use teereserve_core::payment::PaymentAdapter;
    use teereserve_core::StoreResult;
    use teereserve_store::{InMemoryDocumentStore, InMemoryIdempotencyStore};

    /// Idempotency store whose `complete` always fails, as when Redis drops
    /// between claiming a key and recording the result.
    #[derive(Default)]
    struct LossyIdempotencyStore {
        inner: InMemoryIdempotencyStore,
    }

    #[async_trait::async_trait]
    impl IdempotencyStore for LossyIdempotencyStore {
        async fn begin(&self, key: &str, ttl_seconds: u64) -> StoreResult<IdempotencyState> {
            self.inner.begin(key, ttl_seconds).await
        }

        async fn complete(&self, _key: &str, _response: &Value, _ttl_seconds: u64) -> StoreResult<()> {
            Err(StoreError::Backend("connection reset".into()))
        }

        async fn release(&self, key: &str) -> StoreResult<()> {
            self.inner.release(key).await
        }
    }

    struct Fixture {
        store: Arc<dyn DocumentStore>,
        stripe: Arc<MockPaymentAdapter>,
        service: PaymentMethodService,
    }

    fn fixture() -> Fixture {
        fixture_with(Arc::new(InMemoryIdempotencyStore::new()))
    }

    fn fixture_with(idempotency: Arc<dyn IdempotencyStore>) -> Fixture {
        let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());
        let stripe = Arc::new(MockPaymentAdapter::new(PaymentProvider::Stripe, false));
        let payments = Arc::new(PaymentOrchestrator::new(vec![
            stripe.clone() as Arc<dyn PaymentAdapter>
        ]));
        let service = PaymentMethodService::new(
            store.clone(),
            idempotency,
            payments,
            100,
            "USD",
            3600,
        );
        Fixture { store, stripe, service }
    }

    fn request(pm: &str) -> SavePaymentMethodRequest {
        SavePaymentMethodRequest {
            provider: PaymentProvider::Stripe,
            payment_method_id: pm.to_string(),
        }
    }

    #[tokio::test]
    async fn test_same_key_attaches_once() {
        let f = fixture();
        let actor = member("user-1");

        let first = f
            .service
            .verify_and_save_card(&actor, request("pm_card_visa"), "key-1")
            .await
            .unwrap();
        let second = f
            .service
            .verify_and_save_card(&actor, request("pm_card_visa"), "key-1")
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(first.brand, "visa");
        assert_eq!(f.stripe.attached_count(), 1);
        assert_eq!(f.stripe.authorization_count(), 1);
        // The verification charge is refunded in full
        assert_eq!(f.stripe.refunded_cents(), 100);
        assert_eq!(f.service.list_payment_methods("user-1").await.unwrap().len(), 1);
        assert_eq!(f.store.count(EMAIL_LOGS, &Filter::new()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_declined_card_releases_key() {
        let f = fixture();
        let actor = member("user-1");

        let result = f
            .service
            .verify_and_save_card(&actor, request("pm_card_declined"), "key-1")
            .await;
        assert!(matches!(
            result,
            Err(BookingError::Payment(teereserve_core::payment::PaymentError::Declined(_)))
        ));

        // Same key may be retried with a working card
        let record = f
            .service
            .verify_and_save_card(&actor, request("pm_card_amex"), "key-1")
            .await
            .unwrap();
        assert_eq!(record.brand, "amex");
        assert_eq!(f.stripe.attached_count(), 1);
    }

    #[tokio::test]
    async fn test_guest_cannot_save_card() {
        let f = fixture();
        let result = f
            .service
            .verify_and_save_card(&guest("anon-1"), request("pm_card_visa"), "key-1")
            .await;
        assert!(matches!(result, Err(BookingError::Forbidden(_))));
        assert_eq!(f.stripe.authorization_count(), 0);
    }

    #[tokio::test]
    async fn test_card_owned_by_another_user() {
        let f = fixture();
        f.service
            .verify_and_save_card(&member("user-1"), request("pm_card_visa"), "key-1")
            .await
            .unwrap();

        let result = f
            .service
            .verify_and_save_card(&member("user-2"), request("pm_card_visa"), "key-1")
            .await;
        assert!(matches!(result, Err(BookingError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_unrecorded_result_does_not_block_retry() {
        let f = fixture_with(Arc::new(LossyIdempotencyStore::default()));
        let actor = member("user-1");

        let first = f
            .service
            .verify_and_save_card(&actor, request("pm_card_visa"), "key-1")
            .await
            .unwrap();

        // The key was released rather than left in flight
        let retry = f
            .service
            .verify_and_save_card(&actor, request("pm_card_visa"), "key-1")
            .await
            .unwrap();
        assert_eq!(retry.id, first.id);
        assert_eq!(f.stripe.authorization_count(), 1);
        assert_eq!(f.stripe.attached_count(), 1);
        assert_eq!(f.stripe.refunded_cents(), 100);
        assert_eq!(f.service.list_payment_methods("user-1").await.unwrap().len(), 1);
    }
}
