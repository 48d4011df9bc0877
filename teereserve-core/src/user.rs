use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const POINTS_ROUND_COMPLETED: u64 = 100;
pub const POINTS_REVIEW: u64 = 50;
pub const POINTS_FIRST_REVIEW_BONUS: u64 = 25;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    Bogey,
    Par,
    Birdie,
    Eagle,
}

impl Tier {
    pub fn for_points(points: u64) -> Tier {
        match points {
            p if p >= 2500 => Tier::Eagle,
            p if p >= 1000 => Tier::Birdie,
            p if p >= 250 => Tier::Par,
            _ => Tier::Bogey,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub is_anonymous: bool,
    #[serde(default)]
    pub points: u64,
    pub tier: Tier,
    #[serde(default)]
    pub rounds_played: u64,
    #[serde(default)]
    pub reviews_written: u64,
    /// Anonymous uid this account was upgraded from.
    pub upgraded_from: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn anonymous(uid: &str) -> Self {
        Self {
            uid: uid.to_string(),
            email: None,
            display_name: None,
            is_anonymous: true,
            points: 0,
            tier: Tier::Bogey,
            rounds_played: 0,
            reviews_written: 0,
            upgraded_from: None,
            created_at: Utc::now(),
        }
    }

    pub fn award(&mut self, points: u64) {
        self.points += points;
        self.tier = Tier::for_points(self.points);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_thresholds() {
        assert_eq!(Tier::for_points(0), Tier::Bogey);
        assert_eq!(Tier::for_points(249), Tier::Bogey);
        assert_eq!(Tier::for_points(250), Tier::Par);
        assert_eq!(Tier::for_points(1000), Tier::Birdie);
        assert_eq!(Tier::for_points(2499), Tier::Birdie);
        assert_eq!(Tier::for_points(2500), Tier::Eagle);
    }

    #[test]
    fn test_award_promotes_tier() {
        let mut profile = UserProfile::anonymous("u1");
        profile.award(POINTS_ROUND_COMPLETED * 2);
        assert_eq!(profile.tier, Tier::Bogey);
        profile.award(POINTS_REVIEW + POINTS_FIRST_REVIEW_BONUS);
        assert_eq!(profile.points, 275);
        assert_eq!(profile.tier, Tier::Par);
    }
}
