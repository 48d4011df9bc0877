use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentProvider {
    Stripe,
    Paypal,
}

impl std::fmt::Display for PaymentProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentProvider::Stripe => write!(f, "stripe"),
            PaymentProvider::Paypal => write!(f, "paypal"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    RequiresPaymentMethod,
    RequiresAction,
    Processing,
    Succeeded,
    Canceled,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub id: String, // provider id, e.g. pi_123
    pub provider: PaymentProvider,
    /// Our reference: the draft or booking id this intent pays for.
    pub reference: String,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub client_secret: Option<String>,
    /// Charge to refund once the intent succeeded.
    pub charge_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authorization {
    pub id: String,
    pub charge_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Refund {
    pub id: String,
    pub charge_id: String,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttachedPaymentMethod {
    pub id: String,
    pub customer_id: String,
    pub brand: String,
    pub last4: String,
    pub exp_month: u32,
    pub exp_year: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Card declined: {0}")]
    Declined(String),

    #[error("Payment object not found: {0}")]
    NotFound(String),

    #[error("No adapter configured for provider {0}")]
    UnsupportedProvider(PaymentProvider),

    #[error("Payment provider error: {0}")]
    Provider(String),
}

pub type PaymentResult<T> = Result<T, PaymentError>;

/// Seam over a payment provider SDK.
///
/// Every mutating call takes an idempotency key; a provider must return the
/// original result when the same key is replayed.
#[async_trait]
pub trait PaymentAdapter: Send + Sync {
    fn provider(&self) -> PaymentProvider;

    async fn create_intent(
        &self,
        reference: &str,
        amount_cents: i64,
        currency: &str,
        idempotency_key: &str,
    ) -> PaymentResult<PaymentIntent>;

    async fn get_intent(&self, intent_id: &str) -> PaymentResult<PaymentIntent>;

    async fn cancel_intent(&self, intent_id: &str) -> PaymentResult<PaymentIntent>;

    /// Authorize without capturing; used for card verification.
    async fn authorize(
        &self,
        customer_id: &str,
        payment_method_id: &str,
        amount_cents: i64,
        currency: &str,
        idempotency_key: &str,
    ) -> PaymentResult<Authorization>;

    async fn refund(
        &self,
        charge_id: &str,
        amount_cents: i64,
        idempotency_key: &str,
    ) -> PaymentResult<Refund>;

    async fn attach_payment_method(
        &self,
        customer_id: &str,
        payment_method_id: &str,
        idempotency_key: &str,
    ) -> PaymentResult<AttachedPaymentMethod>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_wire_names() {
        assert_eq!(serde_json::to_string(&PaymentProvider::Paypal).unwrap(), "\"PAYPAL\"");
        let status: PaymentStatus = serde_json::from_str("\"REQUIRES_PAYMENT_METHOD\"").unwrap();
        assert_eq!(status, PaymentStatus::RequiresPaymentMethod);
    }
}
