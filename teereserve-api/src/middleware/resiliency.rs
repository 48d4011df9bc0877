use axum::{
    extract::{Request, State},
    http::{Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CircuitState {
    Closed,   // Normal operation
    Open,     // Failure detected, failing fast
    HalfOpen, // Testing if the provider is back
}

pub struct CircuitBreaker {
    pub name: String,
    pub state: RwLock<CircuitState>,
    pub failure_count: AtomicUsize,
    pub failure_threshold: usize,
    pub reset_timeout: Duration,
    pub last_failure: RwLock<Option<Instant>>,
}

impl CircuitBreaker {
    pub fn new(name: &str, threshold: usize, timeout: Duration) -> Self {
        Self {
            name: name.to_string(),
            state: RwLock::new(CircuitState::Closed),
            failure_count: AtomicUsize::new(0),
            failure_threshold: threshold,
            reset_timeout: timeout,
            last_failure: RwLock::new(None),
        }
    }

    pub async fn check(&self) -> bool {
        let state = *self.state.read().await;
        match state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let last_fail = *self.last_failure.read().await;
                match last_fail {
                    Some(instant) if instant.elapsed() > self.reset_timeout => {
                        *self.state.write().await = CircuitState::HalfOpen;
                        tracing::info!("Circuit Breaker [{}] moving to Half-Open", self.name);
                        true
                    }
                    _ => false,
                }
            }
        }
    }

    pub async fn record_success(&self) {
        let mut state = self.state.write().await;
        if *state == CircuitState::HalfOpen {
            *state = CircuitState::Closed;
            tracing::info!("Circuit Breaker [{}] recovered to Closed", self.name);
        }
        self.failure_count.store(0, Ordering::SeqCst);
    }

    pub async fn record_failure(&self) {
        let count = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
        let mut state = self.state.write().await;

        if count >= self.failure_threshold || *state == CircuitState::HalfOpen {
            *state = CircuitState::Open;
            *self.last_failure.write().await = Some(Instant::now());
            tracing::error!("Circuit Breaker [{}] TRIPPED to Open. Failures: {}", self.name, count);
        }
    }
}

/// Requests that call a payment provider.
fn is_payment_call(method: &Method, path: &str) -> bool {
    method == Method::POST
        && (path.starts_with("/v1/bookings") || path.starts_with("/v1/payment-methods"))
}

pub async fn circuit_breaker_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if !is_payment_call(req.method(), req.uri().path()) {
        return next.run(req).await;
    }

    let cb = &state.resiliency.payment_cb;
    if !cb.check().await {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": format!("Circuit Breaker [{}] is OPEN", cb.name) })),
        )
            .into_response();
    }

    let response = next.run(req).await;
    // 502 means the provider failed; other errors are the caller's
    if response.status() == StatusCode::BAD_GATEWAY {
        cb.record_failure().await;
    } else {
        cb.record_success().await;
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_breaker_trips_and_recovers() {
        let cb = CircuitBreaker::new("payments", 2, Duration::from_millis(10));
        assert!(cb.check().await);

        cb.record_failure().await;
        assert!(cb.check().await);
        cb.record_failure().await;
        assert!(!cb.check().await);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cb.check().await);
        assert_eq!(*cb.state.read().await, CircuitState::HalfOpen);

        cb.record_success().await;
        assert_eq!(*cb.state.read().await, CircuitState::Closed);
    }

    #[test]
    fn test_payment_paths() {
        assert!(is_payment_call(&Method::POST, "/v1/bookings/intents"));
        assert!(is_payment_call(&Method::POST, "/v1/payment-methods"));
        assert!(!is_payment_call(&Method::GET, "/v1/bookings"));
        assert!(!is_payment_call(&Method::POST, "/v1/quotes"));
    }
}
