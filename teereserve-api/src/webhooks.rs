use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Router,
};
use chrono::Utc;
use serde::Deserialize;

use teereserve_booking::BookingError;
use teereserve_core::payment::PaymentProvider;
use teereserve_core::webhook::{verify_paypal_signature, verify_stripe_signature, WebhookError};

use crate::error::AppError;
use crate::state::AppState;

pub const STRIPE_SIGNATURE_HEADER: &str = "Stripe-Signature";
pub const PAYPAL_TRANSMISSION_ID: &str = "paypal-transmission-id";
pub const PAYPAL_TRANSMISSION_TIME: &str = "paypal-transmission-time";
pub const PAYPAL_TRANSMISSION_SIG: &str = "paypal-transmission-sig";

#[derive(Debug, Deserialize)]
pub struct StripeWebhook {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub data: StripeData,
}

#[derive(Debug, Deserialize)]
pub struct StripeData {
    pub object: StripeObject,
}

#[derive(Debug, Deserialize)]
pub struct StripeObject {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct PaypalWebhook {
    pub id: String,
    pub event_type: String,
    pub resource: PaypalResource,
}

#[derive(Debug, Deserialize)]
pub struct PaypalResource {
    pub id: String,
    #[serde(default)]
    pub supplementary_data: Option<PaypalSupplementary>,
}

#[derive(Debug, Deserialize)]
pub struct PaypalSupplementary {
    pub related_ids: Option<PaypalRelatedIds>,
}

#[derive(Debug, Deserialize)]
pub struct PaypalRelatedIds {
    pub order_id: Option<String>,
}

impl PaypalResource {
    /// Captures point back at the order we created as the payment intent.
    fn intent_id(&self) -> &str {
        self.supplementary_data
            .as_ref()
            .and_then(|s| s.related_ids.as_ref())
            .and_then(|r| r.order_id.as_deref())
            .unwrap_or(&self.id)
    }
}

enum PaymentEvent {
    Succeeded,
    Failed,
    Ignored,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/webhooks/stripe", post(handle_stripe_webhook))
        .route("/v1/webhooks/paypal", post(handle_paypal_webhook))
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, WebhookError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::MissingHeader)
}

/// POST /v1/webhooks/stripe
async fn handle_stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let signature = header(&headers, STRIPE_SIGNATURE_HEADER)?;
    verify_stripe_signature(
        &state.payments.stripe_webhook_secret,
        &body,
        signature,
        state.payments.webhook_tolerance_seconds,
        Utc::now().timestamp(),
    )?;

    let event: StripeWebhook = serde_json::from_slice(&body)
        .map_err(|e| AppError::ValidationError(format!("Malformed webhook payload: {}", e)))?;
    tracing::info!("Received Stripe event {} ({}) for intent {}", event.id, event.type_, event.data.object.id);

    let kind = match event.type_.as_str() {
        "payment_intent.succeeded" => PaymentEvent::Succeeded,
        "payment_intent.payment_failed" | "payment_intent.canceled" => PaymentEvent::Failed,
        _ => PaymentEvent::Ignored,
    };
    dispatch(&state, PaymentProvider::Stripe, &event.data.object.id, kind).await
}

/// POST /v1/webhooks/paypal
async fn handle_paypal_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    verify_paypal_signature(
        &state.payments.paypal_webhook_secret,
        header(&headers, PAYPAL_TRANSMISSION_ID)?,
        header(&headers, PAYPAL_TRANSMISSION_TIME)?,
        header(&headers, PAYPAL_TRANSMISSION_SIG)?,
        &body,
    )?;

    let event: PaypalWebhook = serde_json::from_slice(&body)
        .map_err(|e| AppError::ValidationError(format!("Malformed webhook payload: {}", e)))?;
    let intent_id = event.resource.intent_id().to_string();
    tracing::info!("Received PayPal event {} ({}) for order {}", event.id, event.event_type, intent_id);

    let kind = match event.event_type.as_str() {
        "PAYMENT.CAPTURE.COMPLETED" => PaymentEvent::Succeeded,
        "PAYMENT.CAPTURE.DENIED" | "PAYMENT.CAPTURE.DECLINED" => PaymentEvent::Failed,
        _ => PaymentEvent::Ignored,
    };
    dispatch(&state, PaymentProvider::Paypal, &intent_id, kind).await
}

/// Outcomes the provider must not retry are acknowledged with 200.
async fn dispatch(
    state: &AppState,
    provider: PaymentProvider,
    intent_id: &str,
    kind: PaymentEvent,
) -> Result<StatusCode, AppError> {
    let result = match kind {
        PaymentEvent::Succeeded => state
            .bookings
            .confirm_payment(provider, intent_id)
            .await
            .map(|booking| tracing::info!("Booking {} confirmed via {} webhook", booking.id, provider)),
        PaymentEvent::Failed => state.bookings.payment_failed(provider, intent_id).await,
        PaymentEvent::Ignored => Ok(()),
    };

    match result {
        Ok(()) => Ok(StatusCode::OK),
        Err(
            e @ (BookingError::Expired(_)
            | BookingError::Conflict(_)
            | BookingError::NotFound(_)
            | BookingError::PaymentRequired(_)),
        ) => {
            tracing::warn!("Webhook for {} intent {} not applied: {}", provider, intent_id, e);
            Ok(StatusCode::OK)
        }
        Err(e) => Err(e.into()),
    }
}
