use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;

use teereserve_booking::{Booking, BookingIntent, BookingIntentRequest};
use teereserve_core::payment::PaymentProvider;

use crate::error::AppError;
use crate::middleware::Claims;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmRequest {
    pub provider: PaymentProvider,
    pub payment_intent_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", get(list_bookings))
        .route("/v1/bookings/intents", post(create_intent))
        .route("/v1/bookings/confirm", post(confirm_booking))
        .route("/v1/bookings/{id}", get(get_booking))
        .route("/v1/bookings/{id}/cancel", post(cancel_booking))
}

/// POST /v1/bookings/intents
/// Quote a tee time and open a payment intent. Guests get a draft that expires.
async fn create_intent(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<BookingIntentRequest>,
) -> Result<Json<BookingIntent>, AppError> {
    let intent = state.bookings.create_intent(&claims.actor(), req).await?;
    Ok(Json(intent))
}

/// POST /v1/bookings/confirm
/// Client-side confirmation after the payment sheet closes. Webhooks reach the same path.
async fn confirm_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ConfirmRequest>,
) -> Result<Json<Booking>, AppError> {
    let booking = state
        .bookings
        .confirm_payment(req.provider, &req.payment_intent_id)
        .await?;
    if !claims.actor().can_access(&booking.user_id) {
        return Err(AppError::AuthorizationError(format!("Booking {}", booking.id)));
    }
    Ok(Json(booking))
}

async fn list_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(state.bookings.list_bookings(&claims.sub).await?))
}

async fn get_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.get_booking(&claims.actor(), &id).await?))
}

/// POST /v1/bookings/{id}/cancel
async fn cancel_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(req): Json<CancelRequest>,
) -> Result<Json<Booking>, AppError> {
    let booking = state
        .bookings
        .cancel_booking(&claims.actor(), &id, req.reason)
        .await?;
    Ok(Json(booking))
}
