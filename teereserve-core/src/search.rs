use chrono::NaiveDate;
use serde::Deserialize;

use crate::course::GolfCourse;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseSearchQuery {
    pub city: Option<String>,
    pub region: Option<String>,
    pub holes: Option<u32>,
    pub min_rating: Option<f64>,
    /// Case-insensitive substring of the course name.
    pub q: Option<String>,
}

impl CourseSearchQuery {
    pub fn matches(&self, course: &GolfCourse) -> bool {
        if !course.active {
            return false;
        }
        if let Some(city) = &self.city {
            if !course.city.eq_ignore_ascii_case(city) {
                return false;
            }
        }
        if let Some(region) = &self.region {
            if !course.region.eq_ignore_ascii_case(region) {
                return false;
            }
        }
        if let Some(holes) = self.holes {
            if course.holes != holes {
                return false;
            }
        }
        if let Some(min) = self.min_rating {
            if course.average_rating().unwrap_or(0.0) < min {
                return false;
            }
        }
        if let Some(q) = &self.q {
            let needle = q.trim().to_lowercase();
            if !needle.is_empty() && !course.name.to_lowercase().contains(&needle) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeeTimeQuery {
    pub date: NaiveDate,
    #[serde(default = "default_players")]
    pub players: u32,
}

fn default_players() -> u32 {
    1
}
