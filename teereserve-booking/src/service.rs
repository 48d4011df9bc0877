use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use teereserve_core::collections::{BOOKINGS, GUEST_DRAFTS, TEE_TIMES, USERS};
use teereserve_core::course::{TeeTime, TeeTimeStatus};
use teereserve_core::payment::{PaymentIntent, PaymentProvider, PaymentStatus};
use teereserve_core::repository::{fetch, fetch_all, put};
use teereserve_core::user::{UserProfile, POINTS_ROUND_COMPLETED};
use teereserve_core::{DocumentStore, Filter, StoreError, WriteBatch, MAX_BATCH_OPS};
use teereserve_pricing::{PricingConfig, PricingEngine, Quote, QuoteContext};
use teereserve_shared::models::events::{BookingCancelledEvent, BookingConfirmedEvent};
use teereserve_shared::Masked;
use teereserve_store::{CatalogRepository, PricingRepository};

use crate::manager::BookingManager;
use crate::models::{
    Booking, BookingIntent, BookingIntentRequest, BookingStatus, BookingSummary, Contact,
    GuestBookingDraft,
};
use crate::notify::{EmailTemplate, Notifier};
use crate::orchestrator::PaymentOrchestrator;
use crate::{Actor, BookingError, BookingResult};

#[derive(Debug, Clone)]
pub struct BookingSettings {
    /// Lifetime of an unpaid guest draft.
    pub draft_ttl_seconds: u64,
    pub pricing: PricingConfig,
}

impl Default for BookingSettings {
    fn default() -> Self {
        Self {
            draft_ttl_seconds: 1800,
            pricing: PricingConfig::default(),
        }
    }
}

/// A tee time with its live price, for tee sheet listings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeeTimeOffer {
    pub tee_time: TeeTime,
    /// `None` when the slot cannot be booked for the requested party.
    pub quote: Option<Quote>,
}

pub struct BookingService {
    store: Arc<dyn DocumentStore>,
    catalog: CatalogRepository,
    pricing: PricingRepository,
    engine: PricingEngine,
    payments: Arc<PaymentOrchestrator>,
    notifier: Notifier,
    settings: BookingSettings,
}

impl BookingService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        payments: Arc<PaymentOrchestrator>,
        settings: BookingSettings,
    ) -> Self {
        Self {
            catalog: CatalogRepository::new(store.clone()),
            pricing: PricingRepository::new(store.clone()),
            engine: PricingEngine::new(settings.pricing.clone()),
            notifier: Notifier::new(store.clone()),
            store,
            payments,
            settings,
        }
    }

    pub async fn quote_tee_time(
        &self,
        tee_time_id: &str,
        players: u32,
        promo_code: Option<String>,
    ) -> BookingResult<(TeeTime, Quote)> {
        let tee_time = self.catalog.get_tee_time(tee_time_id).await?;
        self.check_bookable(&tee_time, players).await?;

        let (book, occupancy) = tokio::try_join!(
            self.pricing.load_book(),
            self.catalog.day_occupancy(&tee_time.course_id, tee_time.date),
        )?;

        let quote = self.engine.quote(
            &book,
            &QuoteContext {
                course_id: tee_time.course_id.clone(),
                date: tee_time.date,
                time: tee_time.time,
                base_price_cents: tee_time.base_price_cents,
                players,
                occupancy_pct: occupancy.percent(),
                promo_code,
                now: Utc::now(),
            },
        )?;
        Ok((tee_time, quote))
    }

    /// The course's tee sheet for a day, priced for `players`.
    pub async fn tee_sheet(&self, course_id: &str, date: NaiveDate, players: u32) -> BookingResult<Vec<TeeTimeOffer>> {
        if players == 0 {
            return Err(BookingError::Validation("At least one player is required".into()));
        }
        let course = self.catalog.get_course(course_id).await?;
        if !course.active {
            return Err(BookingError::NotFound(format!("Course {}", course_id)));
        }

        let (book, occupancy, tee_times) = tokio::try_join!(
            self.pricing.load_book(),
            self.catalog.day_occupancy(course_id, date),
            self.catalog.list_tee_times(course_id, date),
        )?;

        let now = Utc::now();
        let mut offers = Vec::with_capacity(tee_times.len());
        for tee_time in tee_times {
            let bookable = tee_time.is_available()
                && players <= tee_time.max_players
                && tee_time.starts_at() > now;
            let quote = if bookable {
                Some(self.engine.quote(
                    &book,
                    &QuoteContext {
                        course_id: course_id.to_string(),
                        date: tee_time.date,
                        time: tee_time.time,
                        base_price_cents: tee_time.base_price_cents,
                        players,
                        occupancy_pct: occupancy.percent(),
                        promo_code: None,
                        now,
                    },
                )?)
            } else {
                None
            };
            offers.push(TeeTimeOffer { tee_time, quote });
        }
        Ok(offers)
    }

    async fn check_bookable(&self, tee_time: &TeeTime, players: u32) -> BookingResult<()> {
        if players == 0 || players > tee_time.max_players {
            return Err(BookingError::Validation(format!(
                "Tee time {} takes between 1 and {} players",
                tee_time.id, tee_time.max_players
            )));
        }
        if !tee_time.is_available() {
            return Err(BookingError::Conflict(format!(
                "Tee time {} is no longer available",
                tee_time.id
            )));
        }
        if tee_time.starts_at() <= Utc::now() {
            return Err(BookingError::Validation(format!(
                "Tee time {} has already started",
                tee_time.id
            )));
        }
        let course = self.catalog.get_course(&tee_time.course_id).await?;
        if !course.active {
            return Err(BookingError::Validation(format!(
                "Course {} is not accepting bookings",
                course.name
            )));
        }
        Ok(())
    }

    /// Quote the tee time and open a payment intent for it.
    ///
    /// Guests get a draft that expires; signed-in customers get a pending booking.
    pub async fn create_intent(&self, actor: &Actor, request: BookingIntentRequest) -> BookingResult<BookingIntent> {
        let (tee_time, quote) = self
            .quote_tee_time(&request.tee_time_id, request.players, request.promo_code.clone())
            .await?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        if actor.is_anonymous {
            let contact = request.contact.ok_or_else(|| {
                BookingError::Validation("Guest checkout requires contact details".into())
            })?;
            contact.validate().map_err(BookingError::Validation)?;

            let intent = self
                .payments
                .initialize_payment(request.provider, &id, quote.total_cents, &quote.currency)
                .await?;

            let draft = GuestBookingDraft {
                id: id.clone(),
                user_id: actor.uid.clone(),
                course_id: tee_time.course_id.clone(),
                tee_time_id: tee_time.id.clone(),
                tee_date: tee_time.date,
                tee_time: tee_time.time,
                players: request.players,
                contact,
                quote: quote.clone(),
                payment_provider: request.provider,
                payment_intent_id: intent.id.clone(),
                created_at: now,
                expires_at: now + Duration::seconds(self.settings.draft_ttl_seconds as i64),
            };
            put(self.store.as_ref(), GUEST_DRAFTS, &id, &draft).await?;
            info!("Guest draft {} created for tee time {}", id, tee_time.id);

            return Ok(BookingIntent {
                booking_id: id,
                is_guest: true,
                provider: request.provider,
                payment_intent_id: intent.id,
                client_secret: intent.client_secret,
                quote,
                expires_at: Some(draft.expires_at),
            });
        }

        let contact = match request.contact {
            Some(contact) => {
                contact.validate().map_err(BookingError::Validation)?;
                Some(contact)
            }
            None => self.member_contact(actor).await?,
        };

        let intent = self
            .payments
            .initialize_payment(request.provider, &id, quote.total_cents, &quote.currency)
            .await?;

        let booking = Booking {
            id: id.clone(),
            course_id: tee_time.course_id.clone(),
            tee_time_id: tee_time.id.clone(),
            tee_date: tee_time.date,
            tee_time: tee_time.time,
            user_id: actor.uid.clone(),
            is_guest: false,
            contact,
            players: request.players,
            quote: quote.clone(),
            status: BookingStatus::Pending,
            payment_provider: request.provider,
            payment_intent_id: intent.id.clone(),
            charge_id: None,
            migrated_from: None,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        };
        put(self.store.as_ref(), BOOKINGS, &id, &booking).await?;
        info!("Pending booking {} created for {}", id, actor.uid);

        Ok(BookingIntent {
            booking_id: id,
            is_guest: false,
            provider: request.provider,
            payment_intent_id: intent.id,
            client_secret: intent.client_secret,
            quote,
            expires_at: None,
        })
    }

    async fn member_contact(&self, actor: &Actor) -> BookingResult<Option<Contact>> {
        let profile: Option<UserProfile> = fetch(self.store.as_ref(), USERS, &actor.uid).await?;
        let email = profile
            .as_ref()
            .and_then(|p| p.email.clone())
            .or_else(|| actor.email.clone());
        Ok(email.map(|email| Contact {
            name: profile
                .and_then(|p| p.display_name)
                .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string()),
            email: Masked::new(email),
            phone: None,
        }))
    }

    /// Promote a paid checkout. Safe to call repeatedly for the same intent.
    pub async fn confirm_payment(&self, provider: PaymentProvider, intent_id: &str) -> BookingResult<Booking> {
        let intent = self.payments.process_status_update(provider, intent_id).await?;
        if intent.status != PaymentStatus::Succeeded {
            return Err(BookingError::PaymentRequired(format!(
                "Payment {} is {:?}",
                intent.id, intent.status
            )));
        }

        let existing: Option<Booking> = fetch(self.store.as_ref(), BOOKINGS, &intent.reference).await?;
        if let Some(booking) = existing.filter(|b| b.payment_intent_id == intent.id) {
            if booking.status != BookingStatus::Pending {
                return Ok(booking);
            }
            return self.confirm_member_booking(booking, &intent).await;
        }

        let draft: Option<GuestBookingDraft> =
            fetch(self.store.as_ref(), GUEST_DRAFTS, &intent.reference).await?;
        match draft.filter(|d| d.payment_intent_id == intent.id) {
            Some(draft) => self.promote_draft(draft, &intent).await,
            None => Err(BookingError::NotFound(format!("Booking for payment {}", intent.id))),
        }
    }

    async fn promote_draft(&self, draft: GuestBookingDraft, intent: &PaymentIntent) -> BookingResult<Booking> {
        let draft_id = draft.id.clone();

        if draft.is_expired(Utc::now()) {
            self.payments.refund_intent(intent).await?;
            self.store.delete(GUEST_DRAFTS, &draft_id).await?;
            warn!("Draft {} paid after expiry; payment refunded", draft_id);
            return Err(BookingError::Expired(format!("Booking draft {}", draft_id)));
        }

        let mut tee_time = self.catalog.get_tee_time(&draft.tee_time_id).await?;
        if !tee_time.is_available() {
            self.payments.refund_intent(intent).await?;
            self.store.delete(GUEST_DRAFTS, &draft_id).await?;
            warn!("Tee time {} taken before draft {} was paid; refunded", tee_time.id, draft_id);
            return Err(BookingError::Conflict(format!(
                "Tee time {} is no longer available",
                tee_time.id
            )));
        }

        let booking = draft.into_booking(intent.charge_id.clone());
        tee_time.status = TeeTimeStatus::Booked;
        tee_time.booking_id = Some(booking.id.clone());

        let mut batch = WriteBatch::new();
        batch.expect(TEE_TIMES, &tee_time.id, still_available())?;
        batch.expect(
            GUEST_DRAFTS,
            &draft_id,
            Filter::new().eq("paymentIntentId", intent.id.as_str()),
        )?;
        batch.set(BOOKINGS, &booking.id, &booking)?;
        batch.set(TEE_TIMES, &tee_time.id, &tee_time)?;
        batch.delete(GUEST_DRAFTS, &draft_id)?;
        self.queue_confirmation(&mut batch, &booking)?;

        if let Err(e) = self.store.commit(batch).await {
            if !matches!(e, StoreError::PreconditionFailed(_)) {
                return Err(e.into());
            }
            if let Some(winner) = self.confirmed_elsewhere(&booking.id, intent).await? {
                return Ok(winner);
            }
            self.payments.refund_intent(intent).await?;
            self.store.delete(GUEST_DRAFTS, &draft_id).await?;
            warn!("Tee time {} booked concurrently with draft {}; refunded", tee_time.id, draft_id);
            return Err(BookingError::Conflict(format!(
                "Tee time {} is no longer available",
                tee_time.id
            )));
        }

        info!("Guest draft {} promoted to confirmed booking", booking.id);
        Ok(booking)
    }

    async fn confirm_member_booking(&self, mut booking: Booking, intent: &PaymentIntent) -> BookingResult<Booking> {
        let mut tee_time = self.catalog.get_tee_time(&booking.tee_time_id).await?;
        if !tee_time.is_available() {
            self.payments.refund_intent(intent).await?;
            BookingManager::cancel(&mut booking, Some("Tee time no longer available".into()))?;
            put(self.store.as_ref(), BOOKINGS, &booking.id, &booking).await?;
            return Err(BookingError::Conflict(format!(
                "Tee time {} is no longer available",
                tee_time.id
            )));
        }

        BookingManager::confirm(&mut booking)?;
        booking.charge_id = intent.charge_id.clone();
        tee_time.status = TeeTimeStatus::Booked;
        tee_time.booking_id = Some(booking.id.clone());

        let mut batch = WriteBatch::new();
        batch.expect(TEE_TIMES, &tee_time.id, still_available())?;
        batch.expect(BOOKINGS, &booking.id, Filter::new().eq("status", "PENDING"))?;
        batch.set(BOOKINGS, &booking.id, &booking)?;
        batch.set(TEE_TIMES, &tee_time.id, &tee_time)?;
        self.queue_confirmation(&mut batch, &booking)?;

        if let Err(e) = self.store.commit(batch).await {
            if !matches!(e, StoreError::PreconditionFailed(_)) {
                return Err(e.into());
            }
            if let Some(winner) = self.confirmed_elsewhere(&booking.id, intent).await? {
                return Ok(winner);
            }
            self.payments.refund_intent(intent).await?;
            let stored: Option<Booking> = fetch(self.store.as_ref(), BOOKINGS, &booking.id).await?;
            if let Some(mut stored) = stored.filter(|b| b.status == BookingStatus::Pending) {
                BookingManager::cancel(&mut stored, Some("Tee time no longer available".into()))?;
                put(self.store.as_ref(), BOOKINGS, &stored.id, &stored).await?;
            }
            warn!("Tee time {} booked concurrently with booking {}; refunded", tee_time.id, booking.id);
            return Err(BookingError::Conflict(format!(
                "Tee time {} is no longer available",
                tee_time.id
            )));
        }

        info!("Booking {} confirmed", booking.id);
        Ok(booking)
    }

    /// The booking a concurrent confirmation of the same payment already committed.
    async fn confirmed_elsewhere(&self, booking_id: &str, intent: &PaymentIntent) -> BookingResult<Option<Booking>> {
        let booking: Option<Booking> = fetch(self.store.as_ref(), BOOKINGS, booking_id).await?;
        Ok(booking.filter(|b| {
            b.payment_intent_id == intent.id
                && matches!(b.status, BookingStatus::Confirmed | BookingStatus::Completed)
        }))
    }

    fn queue_confirmation(&self, batch: &mut WriteBatch, booking: &Booking) -> BookingResult<()> {
        let Some(contact) = &booking.contact else {
            return Ok(());
        };
        let event = BookingConfirmedEvent {
            booking_id: booking.id.clone(),
            course_id: booking.course_id.clone(),
            tee_time_id: booking.tee_time_id.clone(),
            tee_date: booking.tee_date,
            tee_time: booking.tee_time,
            user_id: booking.user_id.clone(),
            is_guest: booking.is_guest,
            players: booking.players,
            total_cents: booking.total_cents(),
            currency: booking.quote.currency.clone(),
            timestamp: Utc::now().timestamp(),
        };
        self.notifier
            .queue(batch, EmailTemplate::BookingConfirmed, contact.email.expose(), &event)?;
        Ok(())
    }

    /// A failed or abandoned payment: drop the draft or cancel the pending booking.
    pub async fn payment_failed(&self, provider: PaymentProvider, intent_id: &str) -> BookingResult<()> {
        let intent = self.payments.process_status_update(provider, intent_id).await?;

        let draft: Option<GuestBookingDraft> =
            fetch(self.store.as_ref(), GUEST_DRAFTS, &intent.reference).await?;
        if draft.is_some_and(|d| d.payment_intent_id == intent.id) {
            self.store.delete(GUEST_DRAFTS, &intent.reference).await?;
            info!("Draft {} removed after failed payment", intent.reference);
            return Ok(());
        }

        let booking: Option<Booking> = fetch(self.store.as_ref(), BOOKINGS, &intent.reference).await?;
        if let Some(mut booking) = booking.filter(|b| b.payment_intent_id == intent.id) {
            if booking.status == BookingStatus::Pending {
                BookingManager::cancel(&mut booking, Some("Payment failed".into()))?;
                put(self.store.as_ref(), BOOKINGS, &booking.id, &booking).await?;
                info!("Pending booking {} cancelled after failed payment", booking.id);
            }
        }
        Ok(())
    }

    pub async fn get_booking(&self, actor: &Actor, id: &str) -> BookingResult<Booking> {
        let booking: Booking = fetch(self.store.as_ref(), BOOKINGS, id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("Booking {}", id)))?;
        if !actor.can_access(&booking.user_id) {
            return Err(BookingError::Forbidden(format!("Booking {}", id)));
        }
        Ok(booking)
    }

    pub async fn list_bookings(&self, uid: &str) -> BookingResult<Vec<Booking>> {
        let mut bookings: Vec<Booking> =
            fetch_all(self.store.as_ref(), BOOKINGS, &Filter::new().eq("userId", uid)).await?;
        bookings.sort_by(|a, b| (b.tee_date, b.tee_time).cmp(&(a.tee_date, a.tee_time)));
        Ok(bookings)
    }

    /// Cancel a booking. A confirmed booking is refunded in full and its tee time reopened.
    pub async fn cancel_booking(&self, actor: &Actor, id: &str, reason: Option<String>) -> BookingResult<Booking> {
        let mut booking = self.get_booking(actor, id).await?;
        let was_confirmed = booking.status == BookingStatus::Confirmed;

        if was_confirmed && !actor.is_admin {
            let starts_at = booking.tee_date.and_time(booking.tee_time).and_utc();
            if starts_at <= Utc::now() {
                return Err(BookingError::Validation(format!(
                    "Booking {} has already teed off",
                    id
                )));
            }
        }
        BookingManager::cancel(&mut booking, reason.clone())?;

        let mut batch = WriteBatch::new();
        let mut refunded_cents = 0;
        if was_confirmed {
            if let Some(charge_id) = &booking.charge_id {
                let refund = self
                    .payments
                    .refund(
                        booking.payment_provider,
                        charge_id,
                        booking.total_cents(),
                        &format!("cancel:{}", booking.id),
                    )
                    .await?;
                refunded_cents = refund.amount_cents;
            }
            let mut tee_time = self.catalog.get_tee_time(&booking.tee_time_id).await?;
            if tee_time.booking_id.as_deref() == Some(booking.id.as_str()) {
                tee_time.status = TeeTimeStatus::Available;
                tee_time.booking_id = None;
                batch.set(TEE_TIMES, &tee_time.id, &tee_time)?;
            }
        } else if let Err(e) = self
            .payments
            .cancel_payment(booking.payment_provider, &booking.payment_intent_id)
            .await
        {
            warn!("Could not cancel intent {}: {}", booking.payment_intent_id, e);
        }

        batch.set(BOOKINGS, &booking.id, &booking)?;
        if let Some(contact) = &booking.contact {
            let event = BookingCancelledEvent {
                booking_id: booking.id.clone(),
                user_id: booking.user_id.clone(),
                refunded_cents,
                reason,
                timestamp: Utc::now().timestamp(),
            };
            self.notifier
                .queue(&mut batch, EmailTemplate::BookingCancelled, contact.email.expose(), &event)?;
        }
        self.store.commit(batch).await?;

        info!("Booking {} cancelled, refunded {} cents", booking.id, refunded_cents);
        Ok(booking)
    }

    /// Mark a round as played and award the player's points.
    pub async fn complete_booking(&self, id: &str) -> BookingResult<Booking> {
        let mut booking: Booking = fetch(self.store.as_ref(), BOOKINGS, id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("Booking {}", id)))?;
        BookingManager::complete(&mut booking)?;

        let mut batch = WriteBatch::new();
        batch.set(BOOKINGS, &booking.id, &booking)?;
        let profile: Option<UserProfile> = fetch(self.store.as_ref(), USERS, &booking.user_id).await?;
        if let Some(mut profile) = profile {
            profile.rounds_played += 1;
            profile.award(POINTS_ROUND_COMPLETED);
            batch.set(USERS, &profile.uid, &profile)?;
        }
        self.store.commit(batch).await?;
        Ok(booking)
    }

    /// Remove drafts past their expiry, releasing their payment intents.
    pub async fn expire_drafts(&self, now: DateTime<Utc>) -> BookingResult<usize> {
        let drafts: Vec<GuestBookingDraft> =
            fetch_all(self.store.as_ref(), GUEST_DRAFTS, &Filter::new()).await?;
        let expired: Vec<GuestBookingDraft> = drafts.into_iter().filter(|d| d.is_expired(now)).collect();

        // Drafts whose payment could not be released stay for the next sweep.
        let mut released = Vec::with_capacity(expired.len());
        for draft in expired {
            let outcome = match self
                .payments
                .process_status_update(draft.payment_provider, &draft.payment_intent_id)
                .await
            {
                Ok(intent) if intent.status == PaymentStatus::Succeeded => {
                    self.payments.refund_intent(&intent).await.map(|_| ())
                }
                Ok(intent) if intent.status == PaymentStatus::Canceled => Ok(()),
                Ok(intent) => self.payments.cancel_payment(intent.provider, &intent.id).await.map(|_| ()),
                Err(e) => Err(e),
            };
            match outcome {
                Ok(()) => released.push(draft),
                Err(e) => warn!(
                    "Could not release payment {} of draft {}, retrying next sweep: {}",
                    draft.payment_intent_id, draft.id, e
                ),
            }
        }

        for chunk in released.chunks(MAX_BATCH_OPS) {
            let mut batch = WriteBatch::new();
            for draft in chunk {
                batch.delete(GUEST_DRAFTS, &draft.id)?;
            }
            self.store.commit(batch).await?;
        }

        if !released.is_empty() {
            info!("Expired {} guest drafts", released.len());
        }
        Ok(released.len())
    }

    /// Complete confirmed bookings whose tee date is before `today`.
    pub async fn complete_past_bookings(&self, today: NaiveDate) -> BookingResult<usize> {
        let confirmed: Vec<Booking> = fetch_all(
            self.store.as_ref(),
            BOOKINGS,
            &Filter::new().eq("status", "CONFIRMED"),
        )
        .await?;

        let mut completed = 0;
        for booking in confirmed.into_iter().filter(|b| b.tee_date < today) {
            match self.complete_booking(&booking.id).await {
                Ok(_) => completed += 1,
                Err(e) => warn!("Could not complete booking {}: {}", booking.id, e),
            }
        }
        Ok(completed)
    }

    pub async fn summary(&self) -> BookingResult<BookingSummary> {
        let all = Filter::new();
        let (bookings, open_drafts) = tokio::try_join!(
            fetch_all::<Booking>(self.store.as_ref(), BOOKINGS, &all),
            self.store.count(GUEST_DRAFTS, &all),
        )?;

        let mut summary = BookingSummary {
            open_drafts,
            ..Default::default()
        };
        for booking in bookings {
            match booking.status {
                BookingStatus::Pending => summary.pending += 1,
                BookingStatus::Confirmed => {
                    summary.confirmed += 1;
                    summary.revenue_cents += booking.total_cents();
                }
                BookingStatus::Completed => {
                    summary.completed += 1;
                    summary.revenue_cents += booking.total_cents();
                }
                BookingStatus::Cancelled => summary.cancelled += 1,
            }
        }
        Ok(summary)
    }
}

fn still_available() -> Filter {
    Filter::new().eq("status", "available")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{guest, member, Harness, InterleavingStore};
    use teereserve_core::collections::EMAIL_LOGS;

    #[tokio::test]
    async fn test_guest_checkout_promotes_draft() {
        let h = Harness::new().await;
        let actor = guest("anon-1");

        let intent = h.service.create_intent(&actor, h.intent_request(2)).await.unwrap();
        assert!(intent.is_guest);
        assert_eq!(intent.quote.total_cents, 19_000);
        assert!(h.store.get(GUEST_DRAFTS, &intent.booking_id).await.unwrap().is_some());

        // Not yet paid
        let unpaid = h
            .service
            .confirm_payment(PaymentProvider::Stripe, &intent.payment_intent_id)
            .await;
        assert!(matches!(unpaid, Err(BookingError::PaymentRequired(_))));

        h.stripe.succeed(&intent.payment_intent_id).unwrap();
        let booking = h
            .service
            .confirm_payment(PaymentProvider::Stripe, &intent.payment_intent_id)
            .await
            .unwrap();
        assert_eq!(booking.id, intent.booking_id);
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert!(booking.is_guest);
        assert!(h.store.get(GUEST_DRAFTS, &intent.booking_id).await.unwrap().is_none());

        let tee_time = h.service.catalog.get_tee_time(&h.tee_time_id).await.unwrap();
        assert_eq!(tee_time.status, TeeTimeStatus::Booked);
        assert_eq!(tee_time.booking_id.as_deref(), Some(booking.id.as_str()));
        assert_eq!(h.store.count(EMAIL_LOGS, &Filter::new()).await.unwrap(), 1);

        // Replayed webhook returns the same booking without writing again
        let again = h
            .service
            .confirm_payment(PaymentProvider::Stripe, &intent.payment_intent_id)
            .await
            .unwrap();
        assert_eq!(again.id, booking.id);
        assert_eq!(h.store.count(EMAIL_LOGS, &Filter::new()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_guest_requires_contact() {
        let h = Harness::new().await;
        let mut request = h.intent_request(1);
        request.contact = None;
        let result = h.service.create_intent(&guest("anon-1"), request).await;
        assert!(matches!(result, Err(BookingError::Validation(_))));
    }

    #[tokio::test]
    async fn test_expired_draft_is_refunded() {
        let h = Harness::with_settings(BookingSettings {
            draft_ttl_seconds: 0,
            ..Default::default()
        })
        .await;
        let intent = h
            .service
            .create_intent(&guest("anon-1"), h.intent_request(1))
            .await
            .unwrap();
        h.stripe.succeed(&intent.payment_intent_id).unwrap();

        let result = h
            .service
            .confirm_payment(PaymentProvider::Stripe, &intent.payment_intent_id)
            .await;
        assert!(matches!(result, Err(BookingError::Expired(_))));
        assert_eq!(h.stripe.refunded_cents(), 9_500);
        assert!(h.store.get(GUEST_DRAFTS, &intent.booking_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_tee_time_taken_before_payment() {
        let h = Harness::new().await;
        let first = h
            .service
            .create_intent(&guest("anon-1"), h.intent_request(1))
            .await
            .unwrap();
        let second = h
            .service
            .create_intent(&guest("anon-2"), h.intent_request(1))
            .await
            .unwrap();

        h.stripe.succeed(&first.payment_intent_id).unwrap();
        h.stripe.succeed(&second.payment_intent_id).unwrap();
        h.service
            .confirm_payment(PaymentProvider::Stripe, &first.payment_intent_id)
            .await
            .unwrap();

        let result = h
            .service
            .confirm_payment(PaymentProvider::Stripe, &second.payment_intent_id)
            .await;
        assert!(matches!(result, Err(BookingError::Conflict(_))));
        assert_eq!(h.stripe.refunded_cents(), 9_500);
    }

    #[tokio::test]
    async fn test_member_booking_cancel_refunds_and_frees_slot() {
        let h = Harness::new().await;
        let actor = member("user-1");
        let intent = h.service.create_intent(&actor, h.intent_request(1)).await.unwrap();
        assert!(!intent.is_guest);

        h.stripe.succeed(&intent.payment_intent_id).unwrap();
        h.service
            .confirm_payment(PaymentProvider::Stripe, &intent.payment_intent_id)
            .await
            .unwrap();

        let other = member("user-2");
        let denied = h.service.cancel_booking(&other, &intent.booking_id, None).await;
        assert!(matches!(denied, Err(BookingError::Forbidden(_))));

        let cancelled = h
            .service
            .cancel_booking(&actor, &intent.booking_id, Some("Injury".into()))
            .await
            .unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert_eq!(h.stripe.refunded_cents(), 9_500);

        let tee_time = h.service.catalog.get_tee_time(&h.tee_time_id).await.unwrap();
        assert!(tee_time.is_available());

        let again = h.service.cancel_booking(&actor, &intent.booking_id, None).await;
        assert!(matches!(again, Err(BookingError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn test_failed_payment_drops_draft() {
        let h = Harness::new().await;
        let intent = h
            .service
            .create_intent(&guest("anon-1"), h.intent_request(1))
            .await
            .unwrap();
        h.stripe.fail(&intent.payment_intent_id).unwrap();

        h.service
            .payment_failed(PaymentProvider::Stripe, &intent.payment_intent_id)
            .await
            .unwrap();
        assert!(h.store.get(GUEST_DRAFTS, &intent.booking_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expire_drafts_sweep() {
        let h = Harness::new().await;
        h.service
            .create_intent(&guest("anon-1"), h.intent_request(1))
            .await
            .unwrap();

        assert_eq!(h.service.expire_drafts(Utc::now()).await.unwrap(), 0);
        let later = Utc::now() + Duration::hours(1);
        assert_eq!(h.service.expire_drafts(later).await.unwrap(), 1);
        assert_eq!(h.store.count(GUEST_DRAFTS, &Filter::new()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_expire_drafts_keeps_draft_when_refund_fails() {
        let h = Harness::new().await;
        let intent = h
            .service
            .create_intent(&guest("anon-1"), h.intent_request(1))
            .await
            .unwrap();
        h.stripe.succeed(&intent.payment_intent_id).unwrap();
        h.stripe.set_refunds_down(true).unwrap();

        let later = Utc::now() + Duration::hours(1);
        assert_eq!(h.service.expire_drafts(later).await.unwrap(), 0);
        assert!(h.store.get(GUEST_DRAFTS, &intent.booking_id).await.unwrap().is_some());
        assert_eq!(h.stripe.refunded_cents(), 0);

        h.stripe.set_refunds_down(false).unwrap();
        assert_eq!(h.service.expire_drafts(later).await.unwrap(), 1);
        assert!(h.store.get(GUEST_DRAFTS, &intent.booking_id).await.unwrap().is_none());
        assert_eq!(h.stripe.refunded_cents(), 9_500);
    }

    #[tokio::test]
    async fn test_slot_booked_during_confirmation_is_refunded() {
        let store = Arc::new(InterleavingStore::default());
        let h = Harness::with_store(store.clone(), BookingSettings::default()).await;
        let intent = h
            .service
            .create_intent(&guest("anon-1"), h.intent_request(1))
            .await
            .unwrap();
        h.stripe.succeed(&intent.payment_intent_id).unwrap();

        // Another checkout takes the slot after our availability check
        let mut tee_time = h.service.catalog.get_tee_time(&h.tee_time_id).await.unwrap();
        tee_time.status = TeeTimeStatus::Booked;
        tee_time.booking_id = Some("other-booking".to_string());
        let mut competing = WriteBatch::new();
        competing.set(TEE_TIMES, &tee_time.id, &tee_time).unwrap();
        store.before_next_guarded_commit(competing);

        let result = h
            .service
            .confirm_payment(PaymentProvider::Stripe, &intent.payment_intent_id)
            .await;
        assert!(matches!(result, Err(BookingError::Conflict(_))));
        assert_eq!(h.stripe.refunded_cents(), 9_500);
        assert!(h.store.get(BOOKINGS, &intent.booking_id).await.unwrap().is_none());
        assert!(h.store.get(GUEST_DRAFTS, &intent.booking_id).await.unwrap().is_none());

        let tee_time = h.service.catalog.get_tee_time(&h.tee_time_id).await.unwrap();
        assert_eq!(tee_time.booking_id.as_deref(), Some("other-booking"));
    }

    #[tokio::test]
    async fn test_concurrent_confirm_of_same_payment_books_once() {
        let store = Arc::new(InterleavingStore::default());
        let h = Harness::with_store(store.clone(), BookingSettings::default()).await;
        let intent = h
            .service
            .create_intent(&guest("anon-1"), h.intent_request(1))
            .await
            .unwrap();
        h.stripe.succeed(&intent.payment_intent_id).unwrap();

        // A redelivered webhook promotes the same draft first
        let draft: GuestBookingDraft = fetch(h.store.as_ref(), GUEST_DRAFTS, &intent.booking_id)
            .await
            .unwrap()
            .unwrap();
        let winner = draft.into_booking(Some("ch_winner".to_string()));
        let mut tee_time = h.service.catalog.get_tee_time(&h.tee_time_id).await.unwrap();
        tee_time.status = TeeTimeStatus::Booked;
        tee_time.booking_id = Some(winner.id.clone());
        let mut competing = WriteBatch::new();
        competing.set(BOOKINGS, &winner.id, &winner).unwrap();
        competing.set(TEE_TIMES, &tee_time.id, &tee_time).unwrap();
        competing.delete(GUEST_DRAFTS, &winner.id).unwrap();
        store.before_next_guarded_commit(competing);

        let booking = h
            .service
            .confirm_payment(PaymentProvider::Stripe, &intent.payment_intent_id)
            .await
            .unwrap();
        assert_eq!(booking.id, intent.booking_id);
        assert_eq!(booking.charge_id.as_deref(), Some("ch_winner"));
        assert_eq!(h.stripe.refunded_cents(), 0);
        assert_eq!(h.store.count(BOOKINGS, &Filter::new()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_member_confirm_loses_race_for_slot() {
        let store = Arc::new(InterleavingStore::default());
        let h = Harness::with_store(store.clone(), BookingSettings::default()).await;
        let intent = h
            .service
            .create_intent(&member("user-1"), h.intent_request(1))
            .await
            .unwrap();
        h.stripe.succeed(&intent.payment_intent_id).unwrap();

        let mut tee_time = h.service.catalog.get_tee_time(&h.tee_time_id).await.unwrap();
        tee_time.status = TeeTimeStatus::Booked;
        tee_time.booking_id = Some("other-booking".to_string());
        let mut competing = WriteBatch::new();
        competing.set(TEE_TIMES, &tee_time.id, &tee_time).unwrap();
        store.before_next_guarded_commit(competing);

        let result = h
            .service
            .confirm_payment(PaymentProvider::Stripe, &intent.payment_intent_id)
            .await;
        assert!(matches!(result, Err(BookingError::Conflict(_))));
        assert_eq!(h.stripe.refunded_cents(), 9_500);

        let stored: Booking = fetch(h.store.as_ref(), BOOKINGS, &intent.booking_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, BookingStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_complete_awards_points() {
        let h = Harness::new().await;
        let actor = member("user-1");
        h.seed_profile("user-1").await;
        let intent = h.service.create_intent(&actor, h.intent_request(1)).await.unwrap();
        h.stripe.succeed(&intent.payment_intent_id).unwrap();
        h.service
            .confirm_payment(PaymentProvider::Stripe, &intent.payment_intent_id)
            .await
            .unwrap();

        let booking = h.service.complete_booking(&intent.booking_id).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Completed);

        let profile: UserProfile = fetch(h.store.as_ref(), USERS, "user-1").await.unwrap().unwrap();
        assert_eq!(profile.points, POINTS_ROUND_COMPLETED);
        assert_eq!(profile.rounds_played, 1);

        let summary = h.service.summary().await.unwrap();
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.revenue_cents, 9_500);
    }
}
