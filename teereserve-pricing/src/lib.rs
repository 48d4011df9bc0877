pub mod inventory;
pub mod models;
pub mod pricing;
pub mod rules;

pub use inventory::DayOccupancy;
pub use models::{Promotion, Season, SpecialOverride, TimeBand};
pub use pricing::{apply_bps, AppliedRule, PricingBook, PricingConfig, PricingEngine, Quote, QuoteContext};
pub use rules::{Adjustment, PriceRule, RuleCondition};

#[derive(Debug, thiserror::Error)]
pub enum PricingError {
    #[error("Invalid quote request: {0}")]
    InvalidContext(String),
    #[error("Invalid pricing configuration: {0}")]
    InvalidConfig(String),
    #[error("Promotion rejected: {0}")]
    InvalidPromotion(String),
    #[error("Price arithmetic overflowed")]
    Overflow,
}

pub type PricingResult<T> = Result<T, PricingError>;
