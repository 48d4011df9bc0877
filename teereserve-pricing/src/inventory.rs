use serde::{Deserialize, Serialize};

/// Tee sheet utilisation for one course on one day.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DayOccupancy {
    pub total_slots: u32,
    pub booked_slots: u32,
    pub blocked_slots: u32,
}

impl DayOccupancy {
    pub fn record(&mut self, booked: bool, blocked: bool) {
        self.total_slots += 1;
        if booked {
            self.booked_slots += 1;
        } else if blocked {
            self.blocked_slots += 1;
        }
    }

    /// Booked share of the sellable slots, as a whole percent (0..=100).
    /// Blocked slots are not sellable and do not count.
    pub fn percent(&self) -> u32 {
        let sellable = self.total_slots.saturating_sub(self.blocked_slots);
        if sellable == 0 {
            return 0;
        }
        let pct = (self.booked_slots as u64 * 100) / sellable as u64;
        pct.min(100) as u32
    }

    pub fn available_slots(&self) -> u32 {
        self.total_slots
            .saturating_sub(self.booked_slots)
            .saturating_sub(self.blocked_slots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_ignores_blocked_slots() {
        let mut day = DayOccupancy::default();
        for _ in 0..3 {
            day.record(true, false);
        }
        day.record(false, true);
        for _ in 0..6 {
            day.record(false, false);
        }

        assert_eq!(day.total_slots, 10);
        assert_eq!(day.percent(), 33);
        assert_eq!(day.available_slots(), 6);
    }

    #[test]
    fn test_empty_day_is_zero() {
        assert_eq!(DayOccupancy::default().percent(), 0);
    }
}
