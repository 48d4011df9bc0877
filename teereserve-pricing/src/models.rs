use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{PricingError, PricingResult};

/// A date window with its own pricing identity, e.g. "Summer".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Season {
    pub id: String,
    pub name: String,
    /// `None` applies to every course.
    pub course_id: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub priority: i32,
    pub active: bool,
}

impl Season {
    pub fn validate(&self) -> PricingResult<()> {
        require_name(&self.name)?;
        if self.end_date < self.start_date {
            return Err(PricingError::InvalidConfig(format!(
                "Season '{}' ends before it starts",
                self.name
            )));
        }
        Ok(())
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

/// A daily time window, e.g. "Twilight" from 16:00.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimeBand {
    pub id: String,
    pub name: String,
    pub course_id: Option<String>,
    pub start_time: NaiveTime,
    /// Exclusive.
    pub end_time: NaiveTime,
    /// ISO weekdays, 1 = Monday. Empty means every day.
    #[serde(default)]
    pub days_of_week: Vec<u32>,
    #[serde(default)]
    pub priority: i32,
    pub active: bool,
}

impl TimeBand {
    pub fn validate(&self) -> PricingResult<()> {
        require_name(&self.name)?;
        if self.end_time <= self.start_time {
            return Err(PricingError::InvalidConfig(format!(
                "Time band '{}' must end after it starts",
                self.name
            )));
        }
        validate_days(&self.days_of_week)
    }

    pub fn contains(&self, date: NaiveDate, time: NaiveTime) -> bool {
        self.start_time <= time && time < self.end_time && day_matches(&self.days_of_week, date)
    }
}

/// Fixed price for one date, bypassing seasons, bands and rules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpecialOverride {
    pub id: String,
    pub course_id: Option<String>,
    pub date: NaiveDate,
    pub price_cents: i64,
    #[serde(default)]
    pub reason: String,
    pub active: bool,
}

impl SpecialOverride {
    pub fn validate(&self) -> PricingResult<()> {
        if self.price_cents < 0 {
            return Err(PricingError::InvalidConfig(
                "Override price cannot be negative".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Promotion {
    pub id: String,
    /// Matched case-insensitively.
    pub code: String,
    pub course_id: Option<String>,
    pub percent_bps: Option<u32>,
    pub amount_cents: Option<i64>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    pub active: bool,
}

impl Promotion {
    pub fn validate(&self) -> PricingResult<()> {
        if self.code.trim().is_empty() {
            return Err(PricingError::InvalidConfig("Promotion code is required".into()));
        }
        match (self.percent_bps, self.amount_cents) {
            (Some(bps), None) if bps > 0 && bps <= 10_000 => {}
            (None, Some(amount)) if amount > 0 => {}
            (Some(_), None) => {
                return Err(PricingError::InvalidConfig(
                    "Percentage must be between 1 and 10000 bps".into(),
                ))
            }
            (None, Some(_)) => {
                return Err(PricingError::InvalidConfig(
                    "Discount amount must be positive".into(),
                ))
            }
            _ => {
                return Err(PricingError::InvalidConfig(
                    "Promotion needs exactly one of percentBps or amountCents".into(),
                ))
            }
        }
        if let (Some(from), Some(to)) = (self.valid_from, self.valid_to) {
            if to < from {
                return Err(PricingError::InvalidConfig(
                    "Promotion validity window is reversed".into(),
                ));
            }
        }
        Ok(())
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.active
            && self.valid_from.map_or(true, |from| now >= from)
            && self.valid_to.map_or(true, |to| now <= to)
    }
}

pub(crate) fn require_name(name: &str) -> PricingResult<()> {
    if name.trim().is_empty() {
        return Err(PricingError::InvalidConfig("Name is required".into()));
    }
    Ok(())
}

pub(crate) fn validate_days(days: &[u32]) -> PricingResult<()> {
    if let Some(day) = days.iter().find(|d| !(1..=7).contains(*d)) {
        return Err(PricingError::InvalidConfig(format!(
            "Day of week {} is outside 1..=7",
            day
        )));
    }
    Ok(())
}

pub(crate) fn day_matches(days: &[u32], date: NaiveDate) -> bool {
    days.is_empty() || days.contains(&date.weekday().number_from_monday())
}

/// Scope check shared by every configuration kind.
pub(crate) fn in_scope(scope: &Option<String>, course_id: &str) -> bool {
    scope.as_deref().map_or(true, |id| id == course_id)
}
