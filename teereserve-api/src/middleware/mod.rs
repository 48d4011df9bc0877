pub mod auth;
pub mod rate_limit;
pub mod resiliency;

pub use auth::{admin_auth_middleware, auth_middleware, Claims};
pub use rate_limit::rate_limit_middleware;
pub use resiliency::circuit_breaker_middleware;
