use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GolfCourse {
    pub id: String,
    pub name: String,
    pub city: String,
    pub region: String,
    pub holes: u32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub amenities: Vec<String>,
    pub active: bool,
    /// Sum of all review ratings; the average is derived.
    #[serde(default)]
    pub rating_sum: u64,
    #[serde(default)]
    pub rating_count: u64,
    pub created_at: DateTime<Utc>,
}

impl GolfCourse {
    pub fn average_rating(&self) -> Option<f64> {
        if self.rating_count == 0 {
            None
        } else {
            Some(self.rating_sum as f64 / self.rating_count as f64)
        }
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.name.trim().is_empty() {
            return Err(CoreError::ValidationError("Course name is required".into()));
        }
        if self.city.trim().is_empty() {
            return Err(CoreError::ValidationError("Course city is required".into()));
        }
        if !matches!(self.holes, 9 | 18 | 27 | 36) {
            return Err(CoreError::ValidationError(format!(
                "Unsupported hole count {}",
                self.holes
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TeeTimeStatus {
    Available,
    Booked,
    Blocked,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TeeTime {
    pub id: String,
    pub course_id: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub base_price_cents: i64,
    pub max_players: u32,
    pub status: TeeTimeStatus,
    pub booking_id: Option<String>,
}

impl TeeTime {
    /// Deterministic id so regenerating a day never duplicates slots.
    pub fn slot_id(course_id: &str, date: NaiveDate, time: NaiveTime) -> String {
        format!("{}_{}_{}", course_id, date.format("%Y%m%d"), time.format("%H%M"))
    }

    pub fn is_available(&self) -> bool {
        self.status == TeeTimeStatus::Available
    }

    /// Tee date and time, read as UTC.
    pub fn starts_at(&self) -> DateTime<Utc> {
        self.date.and_time(self.time).and_utc()
    }
}

/// Request to lay out the slots of one day.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeeSheetRequest {
    pub date: NaiveDate,
    pub first_time: NaiveTime,
    pub last_time: NaiveTime,
    pub interval_minutes: u32,
    pub base_price_cents: i64,
    #[serde(default = "default_max_players")]
    pub max_players: u32,
}

fn default_max_players() -> u32 {
    4
}

impl TeeSheetRequest {
    pub fn validate(&self) -> CoreResult<()> {
        if self.interval_minutes == 0 {
            return Err(CoreError::ValidationError("Interval must be positive".into()));
        }
        if self.last_time < self.first_time {
            return Err(CoreError::ValidationError(
                "Last tee time precedes the first".into(),
            ));
        }
        if self.base_price_cents < 0 {
            return Err(CoreError::ValidationError("Base price cannot be negative".into()));
        }
        if self.max_players == 0 || self.max_players > 4 {
            return Err(CoreError::ValidationError(
                "A tee time holds between 1 and 4 players".into(),
            ));
        }
        Ok(())
    }

    pub fn slots(&self, course_id: &str) -> CoreResult<Vec<TeeTime>> {
        self.validate()?;

        let step = chrono::Duration::minutes(self.interval_minutes as i64);
        let mut slots = Vec::new();
        let mut time = self.first_time;
        loop {
            slots.push(TeeTime {
                id: TeeTime::slot_id(course_id, self.date, time),
                course_id: course_id.to_string(),
                date: self.date,
                time,
                base_price_cents: self.base_price_cents,
                max_players: self.max_players,
                status: TeeTimeStatus::Available,
                booking_id: None,
            });
            let (next, wrapped) = time.overflowing_add_signed(step);
            if wrapped != 0 || next > self.last_time {
                break;
            }
            time = next;
        }
        Ok(slots)
    }
}
