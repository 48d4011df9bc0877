use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use teereserve_api::{app, worker, AppState, AuthConfig};
use teereserve_booking::{MockPaymentAdapter, PaymentOrchestrator};
use teereserve_core::idempotency::IdempotencyStore;
use teereserve_core::payment::{PaymentAdapter, PaymentProvider};
use teereserve_core::DocumentStore;
use teereserve_store::app_config::{Config, StorageBackend};
use teereserve_store::{DbClient, InMemoryDocumentStore, InMemoryIdempotencyStore, RedisClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "teereserve_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting TeeReserve API on port {}", config.server.port);

    // Document store
    let store: Arc<dyn DocumentStore> = match config.storage.backend {
        StorageBackend::Postgres => {
            let db = DbClient::new(&config.database.url)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;
            Arc::new(db)
        }
        StorageBackend::Memory => {
            tracing::warn!("Using the in-memory document store; data is lost on restart");
            Arc::new(InMemoryDocumentStore::new())
        }
    };

    // Redis backs idempotency keys and rate limiting when configured
    let redis = match &config.redis {
        Some(redis) => Some(Arc::new(
            RedisClient::new(&redis.url)
                .await
                .context("Failed to connect to Redis")?,
        )),
        None => None,
    };
    let idempotency: Arc<dyn IdempotencyStore> = match &redis {
        Some(client) => client.clone() as Arc<dyn IdempotencyStore>,
        None => Arc::new(InMemoryIdempotencyStore::new()),
    };

    // Intents settle through provider webhooks unless auto-succeed is on
    let auto_succeed = config.payments.mock_auto_succeed;
    if auto_succeed {
        tracing::warn!("Payment adapters auto-succeed every intent; do not use with real traffic");
    }
    let adapters: Vec<Arc<dyn PaymentAdapter>> = vec![
        Arc::new(MockPaymentAdapter::new(PaymentProvider::Stripe, auto_succeed)),
        Arc::new(MockPaymentAdapter::new(PaymentProvider::Paypal, auto_succeed)),
    ];
    let orchestrator = Arc::new(PaymentOrchestrator::new(adapters));

    let state = AppState::new(
        store,
        idempotency,
        redis,
        orchestrator,
        AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
        config.payments.clone(),
        config.business_rules.clone(),
    );

    tokio::spawn(worker::start_maintenance_worker(
        state.bookings.clone(),
        Duration::from_secs(config.business_rules.sweep_interval_seconds.max(1)),
    ));

    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
