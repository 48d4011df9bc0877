use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use teereserve_core::payment::PaymentProvider;
use teereserve_pricing::Quote;
use teereserve_shared::Masked;

/// Booking status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

/// Who the confirmation and cancellation emails go to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub name: String,
    pub email: Masked<String>,
    #[serde(default)]
    pub phone: Option<Masked<String>>,
}

impl Contact {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Contact name is required".into());
        }
        let email = self.email.expose();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
            _ => Err("Contact email is invalid".into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    pub course_id: String,
    pub tee_time_id: String,
    pub tee_date: NaiveDate,
    pub tee_time: NaiveTime,
    pub user_id: String,
    pub is_guest: bool,
    pub contact: Option<Contact>,
    pub players: u32,
    pub quote: Quote,
    pub status: BookingStatus,
    pub payment_provider: PaymentProvider,
    pub payment_intent_id: String,
    pub charge_id: Option<String>,
    /// Anonymous uid the booking was moved from on account upgrade.
    #[serde(default)]
    pub migrated_from: Option<String>,
    #[serde(default)]
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn update_status(&mut self, status: BookingStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    pub fn total_cents(&self) -> i64 {
        self.quote.total_cents
    }
}

/// A guest checkout awaiting payment; promoted to a booking with the same id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestBookingDraft {
    pub id: String,
    pub user_id: String,
    pub course_id: String,
    pub tee_time_id: String,
    pub tee_date: NaiveDate,
    pub tee_time: NaiveTime,
    pub players: u32,
    pub contact: Contact,
    pub quote: Quote,
    pub payment_provider: PaymentProvider,
    pub payment_intent_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl GuestBookingDraft {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn into_booking(self, charge_id: Option<String>) -> Booking {
        let now = Utc::now();
        Booking {
            id: self.id,
            course_id: self.course_id,
            tee_time_id: self.tee_time_id,
            tee_date: self.tee_date,
            tee_time: self.tee_time,
            user_id: self.user_id,
            is_guest: true,
            contact: Some(self.contact),
            players: self.players,
            quote: self.quote,
            status: BookingStatus::Confirmed,
            payment_provider: self.payment_provider,
            payment_intent_id: self.payment_intent_id,
            charge_id,
            migrated_from: None,
            cancellation_reason: None,
            created_at: self.created_at,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingIntentRequest {
    pub tee_time_id: String,
    pub players: u32,
    pub provider: PaymentProvider,
    #[serde(default)]
    pub promo_code: Option<String>,
    /// Required for guest checkout.
    #[serde(default)]
    pub contact: Option<Contact>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingIntent {
    pub booking_id: String,
    pub is_guest: bool,
    pub provider: PaymentProvider,
    pub payment_intent_id: String,
    pub client_secret: Option<String>,
    pub quote: Quote,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookingSummary {
    pub pending: usize,
    pub confirmed: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub open_drafts: usize,
    /// Confirmed and completed bookings.
    pub revenue_cents: i64,
}
