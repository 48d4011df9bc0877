use async_trait::async_trait;
use chrono::{Duration, NaiveTime, Utc};
use serde_json::Value;
use std::sync::{Arc, Mutex};

use teereserve_core::collections::USERS;
use teereserve_core::course::TeeSheetRequest;
use teereserve_core::payment::{PaymentAdapter, PaymentProvider};
use teereserve_core::repository::{put, WriteOp};
use teereserve_core::user::UserProfile;
use teereserve_core::{Document, DocumentStore, Filter, StoreResult, WriteBatch};
use teereserve_pricing::Quote;
use teereserve_shared::Masked;
use teereserve_store::catalog_repo::CourseInput;
use teereserve_store::{CatalogRepository, InMemoryDocumentStore};

use crate::models::{Booking, BookingIntentRequest, BookingStatus, Contact};
use crate::orchestrator::{MockPaymentAdapter, PaymentOrchestrator};
use crate::service::{BookingService, BookingSettings};
use crate::Actor;

pub fn quote(total_cents: i64) -> Quote {
    Quote {
        base_price_cents: total_cents,
        unit_price_cents: total_cents,
        players: 1,
        subtotal_cents: total_cents,
        discount_cents: 0,
        tax_cents: 0,
        total_cents,
        currency: "USD".to_string(),
        season_id: None,
        time_band_id: None,
        override_id: None,
        promo_code: None,
        applied_rules: Vec::new(),
    }
}

pub fn contact(email: &str) -> Contact {
    Contact {
        name: "Pat Golfer".to_string(),
        email: Masked::new(email.to_string()),
        phone: None,
    }
}

pub fn booking(id: &str, user_id: &str, status: BookingStatus) -> Booking {
    let now = Utc::now();
    Booking {
        id: id.to_string(),
        course_id: "course-1".to_string(),
        tee_time_id: "course-1_20300101_0800".to_string(),
        tee_date: (now + Duration::days(7)).date_naive(),
        tee_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
        user_id: user_id.to_string(),
        is_guest: user_id.starts_with("anon-"),
        contact: Some(contact("pat@example.com")),
        players: 1,
        quote: quote(9_500),
        status,
        payment_provider: PaymentProvider::Stripe,
        payment_intent_id: format!("pi_{}", id),
        charge_id: Some(format!("ch_{}", id)),
        migrated_from: None,
        cancellation_reason: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn guest(uid: &str) -> Actor {
    Actor {
        uid: uid.to_string(),
        email: None,
        is_anonymous: true,
        is_admin: false,
    }
}

pub fn member(uid: &str) -> Actor {
    Actor {
        uid: uid.to_string(),
        email: Some(format!("{}@example.com", uid)),
        is_anonymous: false,
        is_admin: false,
    }
}

/// An in-memory store seeded with one course and a morning of tee times a week out.
pub struct Harness {
    pub store: Arc<dyn DocumentStore>,
    pub stripe: Arc<MockPaymentAdapter>,
    pub service: BookingService,
    pub course_id: String,
    pub tee_time_id: String,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_settings(BookingSettings::default()).await
    }

    pub async fn with_settings(settings: BookingSettings) -> Self {
        Self::with_store(Arc::new(InMemoryDocumentStore::new()), settings).await
    }

    pub async fn with_store(store: Arc<dyn DocumentStore>, settings: BookingSettings) -> Self {
        let stripe = Arc::new(MockPaymentAdapter::new(PaymentProvider::Stripe, false));
        let payments = Arc::new(PaymentOrchestrator::new(vec![
            stripe.clone() as Arc<dyn PaymentAdapter>
        ]));

        let catalog = CatalogRepository::new(store.clone());
        let course = catalog
            .create_course(CourseInput {
                name: "Pebble Creek".to_string(),
                city: "Austin".to_string(),
                region: "TX".to_string(),
                holes: 18,
                description: String::new(),
                amenities: vec!["range".to_string()],
                active: true,
            })
            .await
            .unwrap();
        let tee_times = catalog
            .generate_tee_times(
                &course.id,
                &TeeSheetRequest {
                    date: (Utc::now() + Duration::days(7)).date_naive(),
                    first_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
                    last_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                    interval_minutes: 10,
                    base_price_cents: 9_500,
                    max_players: 4,
                },
            )
            .await
            .unwrap();

        Self {
            service: BookingService::new(store.clone(), payments, settings),
            tee_time_id: tee_times[0].id.clone(),
            course_id: course.id,
            store,
            stripe,
        }
    }

    pub fn intent_request(&self, players: u32) -> BookingIntentRequest {
        BookingIntentRequest {
            tee_time_id: self.tee_time_id.clone(),
            players,
            provider: PaymentProvider::Stripe,
            promo_code: None,
            contact: Some(contact("pat@example.com")),
        }
    }

    pub async fn seed_profile(&self, uid: &str) -> UserProfile {
        let mut profile = UserProfile::anonymous(uid);
        profile.is_anonymous = !uid.starts_with("user-");
        if !profile.is_anonymous {
            profile.email = Some(format!("{}@example.com", uid));
        }
        put(self.store.as_ref(), USERS, uid, &profile).await.unwrap();
        profile
    }

    /// Book and pay for the harness tee time as `actor`.
    pub async fn confirmed_booking(&self, actor: &Actor) -> Booking {
        let intent = self
            .service
            .create_intent(actor, self.intent_request(1))
            .await
            .unwrap();
        self.stripe.succeed(&intent.payment_intent_id).unwrap();
        self.service
            .confirm_payment(PaymentProvider::Stripe, &intent.payment_intent_id)
            .await
            .unwrap()
    }
}

/// In-memory store that lands a competing batch just before the next guarded
/// commit, as a concurrent request would between our read and our write.
#[derive(Default)]
pub struct InterleavingStore {
    inner: InMemoryDocumentStore,
    competing: Mutex<Option<WriteBatch>>,
}

impl InterleavingStore {
    pub fn before_next_guarded_commit(&self, batch: WriteBatch) {
        *self.competing.lock().unwrap() = Some(batch);
    }
}

#[async_trait]
impl DocumentStore for InterleavingStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Value>> {
        self.inner.get(collection, id).await
    }

    async fn set(&self, collection: &str, id: &str, data: Value) -> StoreResult<()> {
        self.inner.set(collection, id, data).await
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        self.inner.delete(collection, id).await
    }

    async fn query(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<Document>> {
        self.inner.query(collection, filter).await
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        let guarded = batch.ops().iter().any(|op| matches!(op, WriteOp::Expect { .. }));
        let competing = if guarded {
            self.competing.lock().unwrap().take()
        } else {
            None
        };
        if let Some(competing) = competing {
            self.inner.commit(competing).await?;
        }
        self.inner.commit(batch).await
    }
}
