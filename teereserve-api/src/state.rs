use std::sync::Arc;
use std::time::Duration;

use teereserve_booking::{
    BookingService, BookingSettings, GuestMigrator, PaymentMethodService, PaymentOrchestrator,
    ReviewService,
};
use teereserve_core::idempotency::IdempotencyStore;
use teereserve_core::DocumentStore;
use teereserve_pricing::PricingConfig;
use teereserve_store::app_config::{BusinessRules, PaymentsConfig};
use teereserve_store::{BackupService, CatalogRepository, PricingRepository, RedisClient};

use crate::middleware::resiliency::CircuitBreaker;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

pub struct ResiliencyState {
    pub payment_cb: CircuitBreaker,
}

impl Default for ResiliencyState {
    fn default() -> Self {
        Self {
            payment_cb: CircuitBreaker::new("payments", 5, Duration::from_secs(30)),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    /// Rate limiting is skipped without Redis.
    pub redis: Option<Arc<RedisClient>>,
    pub catalog: CatalogRepository,
    pub pricing: PricingRepository,
    pub backups: BackupService,
    pub bookings: Arc<BookingService>,
    pub payment_methods: Arc<PaymentMethodService>,
    pub reviews: Arc<ReviewService>,
    pub migrator: Arc<GuestMigrator>,
    pub resiliency: Arc<ResiliencyState>,
    pub auth: AuthConfig,
    pub payments: PaymentsConfig,
    pub business_rules: BusinessRules,
}

impl AppState {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        idempotency: Arc<dyn IdempotencyStore>,
        redis: Option<Arc<RedisClient>>,
        orchestrator: Arc<PaymentOrchestrator>,
        auth: AuthConfig,
        payments: PaymentsConfig,
        business_rules: BusinessRules,
    ) -> Self {
        let settings = BookingSettings {
            draft_ttl_seconds: business_rules.draft_ttl_seconds,
            pricing: PricingConfig {
                tax_rate_bps: business_rules.tax_rate_bps,
                currency: business_rules.currency.clone(),
            },
        };

        Self {
            catalog: CatalogRepository::new(store.clone()),
            pricing: PricingRepository::new(store.clone()),
            backups: BackupService::new(store.clone()),
            bookings: Arc::new(BookingService::new(store.clone(), orchestrator.clone(), settings)),
            payment_methods: Arc::new(PaymentMethodService::new(
                store.clone(),
                idempotency,
                orchestrator,
                business_rules.verification_amount_cents,
                business_rules.currency.clone(),
                business_rules.idempotency_ttl_seconds,
            )),
            reviews: Arc::new(ReviewService::new(store.clone())),
            migrator: Arc::new(GuestMigrator::new(store.clone())),
            resiliency: Arc::new(ResiliencyState::default()),
            store,
            redis,
            auth,
            payments,
            business_rules,
        }
    }
}
