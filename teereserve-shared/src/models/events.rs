use chrono::{NaiveDate, NaiveTime};

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BookingConfirmedEvent {
    pub booking_id: String,
    pub course_id: String,
    pub tee_time_id: String,
    pub tee_date: NaiveDate,
    pub tee_time: NaiveTime,
    pub user_id: String,
    pub is_guest: bool,
    pub players: u32,
    pub total_cents: i64,
    pub currency: String,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BookingCancelledEvent {
    pub booking_id: String,
    pub user_id: String,
    pub refunded_cents: i64,
    pub reason: Option<String>,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GuestUpgradedEvent {
    pub old_uid: String,
    pub new_uid: String,
    pub migrated_bookings: usize,
    pub failed_bookings: usize,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethodSavedEvent {
    pub user_id: String,
    pub payment_method_id: String,
    pub brand: String,
    pub last4: String,
    pub timestamp: i64,
}
