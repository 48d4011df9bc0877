use axum::{
    extract::State,
    http::HeaderMap,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Serialize;

use teereserve_booking::{Booking, PaymentMethodRecord, Review, ReviewRequest, SavePaymentMethodRequest};
use teereserve_core::collections::USERS;
use teereserve_core::repository::fetch;
use teereserve_core::user::UserProfile;

use crate::error::AppError;
use crate::middleware::Claims;
use crate::state::AppState;

pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MeResponse {
    profile: UserProfile,
    bookings: Vec<Booking>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/me", get(me))
        .route(
            "/v1/payment-methods",
            post(save_payment_method).get(list_payment_methods),
        )
        .route("/v1/reviews", post(submit_review))
}

/// GET /v1/me
async fn me(State(state): State<AppState>, Extension(claims): Extension<Claims>) -> Result<Json<MeResponse>, AppError> {
    let profile: UserProfile = fetch(state.store.as_ref(), USERS, &claims.sub)
        .await?
        .ok_or_else(|| AppError::NotFoundError(format!("Profile {} not found", claims.sub)))?;
    let bookings = state.bookings.list_bookings(&claims.sub).await?;
    Ok(Json(MeResponse { profile, bookings }))
}

/// POST /v1/payment-methods
/// Verify a card with a refunded authorization and save it. Requires `Idempotency-Key`.
async fn save_payment_method(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    headers: HeaderMap,
    Json(req): Json<SavePaymentMethodRequest>,
) -> Result<Json<PaymentMethodRecord>, AppError> {
    let key = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::ValidationError(format!("{} header is required", IDEMPOTENCY_KEY_HEADER)))?;

    let record = state
        .payment_methods
        .verify_and_save_card(&claims.actor(), req, key)
        .await?;
    Ok(Json(record))
}

async fn list_payment_methods(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<PaymentMethodRecord>>, AppError> {
    Ok(Json(state.payment_methods.list_payment_methods(&claims.sub).await?))
}

/// POST /v1/reviews
async fn submit_review(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ReviewRequest>,
) -> Result<Json<Review>, AppError> {
    Ok(Json(state.reviews.submit(&claims.actor(), req).await?))
}
