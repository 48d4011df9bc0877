use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    /// Optional: without Redis, idempotency keys live in memory and rate limiting is off.
    pub redis: Option<RedisConfig>,
    pub auth: AuthConfig,
    pub business_rules: BusinessRules,
    pub payments: PaymentsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    #[serde(default = "default_draft_ttl")]
    pub draft_ttl_seconds: u64,
    pub tax_rate_bps: u32,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_verification_amount")]
    pub verification_amount_cents: i64,
    #[serde(default = "default_idempotency_ttl")]
    pub idempotency_ttl_seconds: u64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: i64,
}

fn default_draft_ttl() -> u64 { 1800 }
fn default_currency() -> String { "USD".into() }
fn default_verification_amount() -> i64 { 100 }
fn default_idempotency_ttl() -> u64 { 86_400 }
fn default_sweep_interval() -> u64 { 60 }
fn default_rate_limit() -> i64 { 120 }

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            draft_ttl_seconds: default_draft_ttl(),
            tax_rate_bps: 0,
            currency: default_currency(),
            verification_amount_cents: default_verification_amount(),
            idempotency_ttl_seconds: default_idempotency_ttl(),
            sweep_interval_seconds: default_sweep_interval(),
            rate_limit_per_minute: default_rate_limit(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentsConfig {
    pub stripe_webhook_secret: String,
    pub paypal_webhook_secret: String,
    #[serde(default = "default_webhook_tolerance")]
    pub webhook_tolerance_seconds: i64,
    /// In-process provider adapters settle new intents immediately. Set for
    /// local runs where no provider webhook will ever arrive.
    #[serde(default)]
    pub mock_auto_succeed: bool,
}

fn default_webhook_tolerance() -> i64 { 300 }

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    #[default]
    Memory,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // optional per-environment overrides
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. TEERESERVE__AUTH__JWT_SECRET
            .add_source(config::Environment::with_prefix("TEERESERVE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_rule_defaults() {
        let source = r#"
            [server]
            port = 3000
            [database]
            url = "postgres://localhost/teereserve"
            [auth]
            jwt_secret = "secret"
            jwt_expiration_seconds = 3600
            [business_rules]
            tax_rate_bps = 825
            [payments]
            stripe_webhook_secret = "whsec"
            paypal_webhook_secret = "pp"
        "#;
        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert!(config.redis.is_none());
        assert_eq!(config.business_rules.draft_ttl_seconds, 1800);
        assert_eq!(config.business_rules.verification_amount_cents, 100);
        assert_eq!(config.payments.webhook_tolerance_seconds, 300);
        assert!(!config.payments.mock_auto_succeed);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
    }

    #[test]
    fn test_mock_auto_succeed_opt_in() {
        let source = r#"
            [server]
            port = 3000
            [database]
            url = "postgres://localhost/teereserve"
            [auth]
            jwt_secret = "secret"
            jwt_expiration_seconds = 3600
            [business_rules]
            tax_rate_bps = 0
            [payments]
            stripe_webhook_secret = "whsec"
            paypal_webhook_secret = "pp"
            mock_auto_succeed = true
        "#;
        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert!(config.payments.mock_auto_succeed);
    }
}
