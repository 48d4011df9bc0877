use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use teereserve_booking::BookingError;
use teereserve_core::payment::PaymentError;
use teereserve_core::webhook::WebhookError;
use teereserve_core::{CoreError, StoreError};
use teereserve_pricing::PricingError;
use teereserve_store::RepoError;

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    AuthorizationError(String),
    ValidationError(String),
    NotFoundError(String),
    ConflictError(String),
    GoneError(String),
    PaymentRequiredError(String),
    BadGatewayError(String),
    InternalServerError(String),
    Anyhow(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::GoneError(msg) => (StatusCode::GONE, msg),
            AppError::PaymentRequiredError(msg) => (StatusCode::PAYMENT_REQUIRED, msg),
            AppError::BadGatewayError(msg) => {
                tracing::warn!("Payment provider failure: {}", msg);
                (StatusCode::BAD_GATEWAY, "Payment provider unavailable".to_string())
            }
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Anyhow(err)
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ValidationError(msg) => AppError::ValidationError(msg),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => AppError::NotFoundError(msg),
            StoreError::PreconditionFailed(msg) => AppError::ConflictError(format!("Concurrent update of {}", msg)),
            other => AppError::InternalServerError(other.to_string()),
        }
    }
}

impl From<PricingError> for AppError {
    fn from(err: PricingError) -> Self {
        match err {
            PricingError::Overflow => AppError::InternalServerError(err.to_string()),
            other => AppError::ValidationError(other.to_string()),
        }
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Declined(_) => AppError::PaymentRequiredError(err.to_string()),
            PaymentError::NotFound(_) => AppError::NotFoundError(err.to_string()),
            PaymentError::UnsupportedProvider(_) => AppError::ValidationError(err.to_string()),
            PaymentError::Provider(msg) => AppError::BadGatewayError(msg),
        }
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound(what) => AppError::NotFoundError(format!("{} not found", what)),
            RepoError::Conflict(msg) => AppError::ConflictError(msg),
            RepoError::InvalidInput(msg) => AppError::ValidationError(msg),
            RepoError::Validation(e) => e.into(),
            RepoError::Pricing(e) => e.into(),
            RepoError::Store(e) => e.into(),
            RepoError::Serialization(e) => AppError::InternalServerError(e.to_string()),
        }
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::NotFound(what) => AppError::NotFoundError(format!("{} not found", what)),
            BookingError::Forbidden(msg) => AppError::AuthorizationError(msg),
            BookingError::Validation(msg) => AppError::ValidationError(msg),
            BookingError::Conflict(msg) => AppError::ConflictError(msg),
            BookingError::Expired(msg) => AppError::GoneError(format!("{} has expired", msg)),
            BookingError::PaymentRequired(msg) => AppError::PaymentRequiredError(msg),
            BookingError::InvalidTransition { .. } => AppError::ConflictError(err.to_string()),
            BookingError::Payment(e) => e.into(),
            BookingError::Pricing(e) => e.into(),
            BookingError::Repo(e) => e.into(),
            BookingError::Store(e) => e.into(),
        }
    }
}

impl From<WebhookError> for AppError {
    fn from(err: WebhookError) -> Self {
        match err {
            WebhookError::MissingHeader | WebhookError::MalformedHeader => {
                AppError::ValidationError(err.to_string())
            }
            WebhookError::TimestampOutOfTolerance | WebhookError::InvalidSignature => {
                AppError::AuthenticationError(err.to_string())
            }
        }
    }
}
