use crate::models::{Booking, BookingStatus};
use crate::BookingError;

/// Booking lifecycle transitions.
///
/// Pending → Confirmed → Completed, with Pending or Confirmed → Cancelled.
pub struct BookingManager;

impl BookingManager {
    /// Transition: Pending → Confirmed (payment captured)
    pub fn confirm(booking: &mut Booking) -> Result<(), BookingError> {
        Self::transition(booking, BookingStatus::Confirmed)
    }

    /// Transition: Confirmed → Completed (round played)
    pub fn complete(booking: &mut Booking) -> Result<(), BookingError> {
        Self::transition(booking, BookingStatus::Completed)
    }

    /// Transition: Pending | Confirmed → Cancelled
    pub fn cancel(booking: &mut Booking, reason: Option<String>) -> Result<(), BookingError> {
        Self::transition(booking, BookingStatus::Cancelled)?;
        booking.cancellation_reason = reason;
        Ok(())
    }

    pub fn can_transition(from: BookingStatus, to: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (from, to),
            (Pending, Confirmed) | (Confirmed, Completed) | (Pending, Cancelled) | (Confirmed, Cancelled)
        )
    }

    fn transition(booking: &mut Booking, to: BookingStatus) -> Result<(), BookingError> {
        if !Self::can_transition(booking.status, to) {
            return Err(BookingError::InvalidTransition {
                from: format!("{:?}", booking.status).to_uppercase(),
                to: format!("{:?}", to).to_uppercase(),
            });
        }
        booking.update_status(to);
        Ok(())
    }
}
