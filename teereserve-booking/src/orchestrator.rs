use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use uuid::Uuid;

use teereserve_core::payment::{
    AttachedPaymentMethod, Authorization, PaymentAdapter, PaymentError, PaymentIntent,
    PaymentProvider, PaymentResult, PaymentStatus, Refund,
};

/// Routes payment calls to the adapter for each provider.
pub struct PaymentOrchestrator {
    adapters: HashMap<PaymentProvider, Arc<dyn PaymentAdapter>>,
}

impl PaymentOrchestrator {
    pub fn new(adapters: Vec<Arc<dyn PaymentAdapter>>) -> Self {
        Self {
            adapters: adapters.into_iter().map(|a| (a.provider(), a)).collect(),
        }
    }

    pub fn adapter(&self, provider: PaymentProvider) -> PaymentResult<&Arc<dyn PaymentAdapter>> {
        self.adapters
            .get(&provider)
            .ok_or(PaymentError::UnsupportedProvider(provider))
    }

    /// Create the intent paying for a draft or booking. Retries reuse the intent.
    pub async fn initialize_payment(
        &self,
        provider: PaymentProvider,
        reference: &str,
        amount_cents: i64,
        currency: &str,
    ) -> PaymentResult<PaymentIntent> {
        let key = format!("intent:{}", reference);
        let intent = self
            .adapter(provider)?
            .create_intent(reference, amount_cents, currency, &key)
            .await?;
        info!("Payment intent {} created for {} via {}", intent.id, reference, provider);
        Ok(intent)
    }

    /// Re-read an intent from the provider after a client or webhook update.
    pub async fn process_status_update(
        &self,
        provider: PaymentProvider,
        intent_id: &str,
    ) -> PaymentResult<PaymentIntent> {
        self.adapter(provider)?.get_intent(intent_id).await
    }

    pub async fn cancel_payment(&self, provider: PaymentProvider, intent_id: &str) -> PaymentResult<PaymentIntent> {
        self.adapter(provider)?.cancel_intent(intent_id).await
    }

    pub async fn refund(
        &self,
        provider: PaymentProvider,
        charge_id: &str,
        amount_cents: i64,
        idempotency_key: &str,
    ) -> PaymentResult<Refund> {
        let refund = self
            .adapter(provider)?
            .refund(charge_id, amount_cents, idempotency_key)
            .await?;
        info!("Refunded {} cents on charge {}", amount_cents, charge_id);
        Ok(refund)
    }

    /// Refund whatever the intent captured. Used when a paid checkout cannot be honoured.
    pub async fn refund_intent(&self, intent: &PaymentIntent) -> PaymentResult<Option<Refund>> {
        match &intent.charge_id {
            Some(charge_id) => {
                let key = format!("refund:{}", intent.id);
                self.refund(intent.provider, charge_id, intent.amount_cents, &key)
                    .await
                    .map(Some)
            }
            None => {
                warn!("Intent {} has no charge to refund", intent.id);
                Ok(None)
            }
        }
    }
}

#[derive(Default)]
struct MockState {
    intents: HashMap<String, PaymentIntent>,
    /// Idempotency key → object id, per operation.
    intent_keys: HashMap<String, String>,
    authorizations: HashMap<String, Authorization>,
    refunds: HashMap<String, Refund>,
    attachments: HashMap<String, AttachedPaymentMethod>,
    refunds_down: bool,
}

/// In-process provider for development and tests.
///
/// Payment methods whose id contains `declined` fail authorization. With
/// `auto_succeed`, new intents are created already paid.
pub struct MockPaymentAdapter {
    provider: PaymentProvider,
    auto_succeed: bool,
    state: Mutex<MockState>,
}

impl MockPaymentAdapter {
    pub fn new(provider: PaymentProvider, auto_succeed: bool) -> Self {
        Self {
            provider,
            auto_succeed,
            state: Mutex::new(MockState::default()),
        }
    }

    fn state(&self) -> PaymentResult<std::sync::MutexGuard<'_, MockState>> {
        self.state
            .lock()
            .map_err(|_| PaymentError::Provider("mock state poisoned".into()))
    }

    fn prefix(&self) -> &'static str {
        match self.provider {
            PaymentProvider::Stripe => "pi",
            PaymentProvider::Paypal => "PAYID",
        }
    }

    /// Simulate the customer completing payment.
    pub fn succeed(&self, intent_id: &str) -> PaymentResult<PaymentIntent> {
        let mut state = self.state()?;
        let intent = state
            .intents
            .get_mut(intent_id)
            .ok_or_else(|| PaymentError::NotFound(intent_id.to_string()))?;
        intent.status = PaymentStatus::Succeeded;
        intent.charge_id = Some(format!("ch_{}", Uuid::new_v4().simple()));
        Ok(intent.clone())
    }

    pub fn fail(&self, intent_id: &str) -> PaymentResult<PaymentIntent> {
        let mut state = self.state()?;
        let intent = state
            .intents
            .get_mut(intent_id)
            .ok_or_else(|| PaymentError::NotFound(intent_id.to_string()))?;
        intent.status = PaymentStatus::Failed;
        Ok(intent.clone())
    }

    /// Simulate a provider outage for refunds.
    pub fn set_refunds_down(&self, down: bool) -> PaymentResult<()> {
        self.state()?.refunds_down = down;
        Ok(())
    }

    pub fn attached_count(&self) -> usize {
        self.state.lock().map(|s| s.attachments.len()).unwrap_or(0)
    }

    pub fn authorization_count(&self) -> usize {
        self.state.lock().map(|s| s.authorizations.len()).unwrap_or(0)
    }

    pub fn refunded_cents(&self) -> i64 {
        self.state
            .lock()
            .map(|s| s.refunds.values().map(|r| r.amount_cents).sum())
            .unwrap_or(0)
    }
}

#[async_trait]
impl PaymentAdapter for MockPaymentAdapter {
    fn provider(&self) -> PaymentProvider {
        self.provider
    }

    async fn create_intent(
        &self,
        reference: &str,
        amount_cents: i64,
        currency: &str,
        idempotency_key: &str,
    ) -> PaymentResult<PaymentIntent> {
        let mut state = self.state()?;
        if let Some(id) = state.intent_keys.get(idempotency_key) {
            if let Some(existing) = state.intents.get(id) {
                return Ok(existing.clone());
            }
        }

        let id = format!("{}_{}", self.prefix(), Uuid::new_v4().simple());
        let (status, charge_id) = if self.auto_succeed {
            (PaymentStatus::Succeeded, Some(format!("ch_{}", Uuid::new_v4().simple())))
        } else {
            (PaymentStatus::RequiresPaymentMethod, None)
        };
        let intent = PaymentIntent {
            id: id.clone(),
            provider: self.provider,
            reference: reference.to_string(),
            amount_cents,
            currency: currency.to_string(),
            status,
            client_secret: Some(format!("{}_secret_mock", id)),
            charge_id,
            created_at: Utc::now(),
        };
        state.intent_keys.insert(idempotency_key.to_string(), id.clone());
        state.intents.insert(id, intent.clone());
        Ok(intent)
    }

    async fn get_intent(&self, intent_id: &str) -> PaymentResult<PaymentIntent> {
        self.state()?
            .intents
            .get(intent_id)
            .cloned()
            .ok_or_else(|| PaymentError::NotFound(intent_id.to_string()))
    }

    async fn cancel_intent(&self, intent_id: &str) -> PaymentResult<PaymentIntent> {
        let mut state = self.state()?;
        let intent = state
            .intents
            .get_mut(intent_id)
            .ok_or_else(|| PaymentError::NotFound(intent_id.to_string()))?;
        if intent.status == PaymentStatus::Succeeded {
            return Err(PaymentError::Provider(format!(
                "Intent {} already succeeded and must be refunded",
                intent_id
            )));
        }
        intent.status = PaymentStatus::Canceled;
        Ok(intent.clone())
    }

    async fn authorize(
        &self,
        _customer_id: &str,
        payment_method_id: &str,
        amount_cents: i64,
        currency: &str,
        idempotency_key: &str,
    ) -> PaymentResult<Authorization> {
        let mut state = self.state()?;
        if let Some(existing) = state.authorizations.get(idempotency_key) {
            return Ok(existing.clone());
        }
        if payment_method_id.contains("declined") {
            return Err(PaymentError::Declined(format!(
                "Payment method {} was declined",
                payment_method_id
            )));
        }
        let auth = Authorization {
            id: format!("auth_{}", Uuid::new_v4().simple()),
            charge_id: format!("ch_{}", Uuid::new_v4().simple()),
            amount_cents,
            currency: currency.to_string(),
            status: PaymentStatus::Succeeded,
        };
        state
            .authorizations
            .insert(idempotency_key.to_string(), auth.clone());
        Ok(auth)
    }

    async fn refund(
        &self,
        charge_id: &str,
        amount_cents: i64,
        idempotency_key: &str,
    ) -> PaymentResult<Refund> {
        let mut state = self.state()?;
        if let Some(existing) = state.refunds.get(idempotency_key) {
            return Ok(existing.clone());
        }
        if state.refunds_down {
            return Err(PaymentError::Provider(format!("Refund of {} failed", charge_id)));
        }
        let refund = Refund {
            id: format!("re_{}", Uuid::new_v4().simple()),
            charge_id: charge_id.to_string(),
            amount_cents,
        };
        state.refunds.insert(idempotency_key.to_string(), refund.clone());
        Ok(refund)
    }

    async fn attach_payment_method(
        &self,
        customer_id: &str,
        payment_method_id: &str,
        idempotency_key: &str,
    ) -> PaymentResult<AttachedPaymentMethod> {
        let mut state = self.state()?;
        if let Some(existing) = state.attachments.get(idempotency_key) {
            return Ok(existing.clone());
        }
        // pm_card_visa → visa
        let brand = payment_method_id
            .rsplit('_')
            .next()
            .filter(|b| !b.is_empty())
            .unwrap_or("card")
            .to_string();
        let attached = AttachedPaymentMethod {
            id: payment_method_id.to_string(),
            customer_id: customer_id.to_string(),
            brand,
            last4: "4242".to_string(),
            exp_month: 12,
            exp_year: 2030,
        };
        state
            .attachments
            .insert(idempotency_key.to_string(), attached.clone());
        Ok(attached)
    }
}
