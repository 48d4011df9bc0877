pub mod manager;
pub mod migration;
pub mod models;
pub mod notify;
pub mod orchestrator;
pub mod payment_methods;
pub mod reviews;
pub mod service;

#[cfg(test)]
pub(crate) mod test_support;

pub use manager::BookingManager;
pub use migration::{GuestMigrator, MigrationFailure, MigrationReport};
pub use models::{
    Booking, BookingIntent, BookingIntentRequest, BookingStatus, BookingSummary, Contact, GuestBookingDraft,
};
pub use notify::Notifier;
pub use orchestrator::{MockPaymentAdapter, PaymentOrchestrator};
pub use payment_methods::{PaymentMethodRecord, PaymentMethodService, SavePaymentMethodRequest};
pub use reviews::{Review, ReviewRequest, ReviewService};
pub use service::{BookingService, BookingSettings, TeeTimeOffer};

use teereserve_core::payment::PaymentError;
use teereserve_core::{CoreError, StoreError};
use teereserve_pricing::PricingError;
use teereserve_store::RepoError;

/// The caller a booking operation acts for.
#[derive(Debug, Clone)]
pub struct Actor {
    pub uid: String,
    pub email: Option<String>,
    pub is_anonymous: bool,
    pub is_admin: bool,
}

impl Actor {
    pub fn can_access(&self, owner_uid: &str) -> bool {
        self.is_admin || self.uid == owner_uid
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Expired: {0}")]
    Expired(String),

    #[error("Payment not completed: {0}")]
    PaymentRequired(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<CoreError> for BookingError {
    fn from(e: CoreError) -> Self {
        BookingError::Repo(RepoError::Validation(e))
    }
}

pub type BookingResult<T> = Result<T, BookingError>;
