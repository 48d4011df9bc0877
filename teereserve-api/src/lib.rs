use axum::{
    http::{HeaderName, Method},
    middleware::from_fn_with_state,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod account;
pub mod admin;
pub mod auth;
pub mod bookings;
pub mod courses;
pub mod error;
pub mod middleware;
pub mod state;
pub mod webhooks;
pub mod worker;

pub use state::{AppState, AuthConfig};

use middleware::{
    admin_auth_middleware, auth_middleware, circuit_breaker_middleware, rate_limit_middleware,
};

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            HeaderName::from_static("idempotency-key"),
        ]);

    // Guest and customer routes
    let authed = Router::new()
        .merge(auth::routes())
        .merge(bookings::routes())
        .merge(account::routes())
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    let admin = admin::routes().route_layer(from_fn_with_state(state.clone(), admin_auth_middleware));

    Router::new()
        .route("/health", get(health))
        .merge(auth::public_routes())
        .merge(courses::routes())
        .merge(webhooks::routes())
        .merge(authed)
        .merge(admin)
        .layer(from_fn_with_state(state.clone(), circuit_breaker_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(from_fn_with_state(state.clone(), rate_limit_middleware))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
