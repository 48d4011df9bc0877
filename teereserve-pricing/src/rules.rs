use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{day_matches, in_scope, require_name, validate_days};
use crate::{PricingError, PricingResult};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PriceRule {
    pub id: String,
    pub name: String,
    pub course_id: Option<String>,
    /// All must hold for the rule to apply.
    #[serde(default)]
    pub conditions: Vec<RuleCondition>,
    pub adjustment: Adjustment,
    /// Higher runs first.
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub stop_processing: bool,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RuleCondition {
    #[serde(rename_all = "camelCase")]
    Season { season_id: String },
    #[serde(rename_all = "camelCase")]
    TimeBand { time_band_id: String },
    DaysOfWeek { days: Vec<u32> },
    LeadTimeHours { min: Option<i64>, max: Option<i64> },
    #[serde(rename_all = "camelCase")]
    Occupancy { min_pct: Option<u32>, max_pct: Option<u32> },
    MinPlayers { players: u32 },
    DateRange { from: NaiveDate, to: NaiveDate },
}

/// How a matching rule changes the running unit price.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Adjustment {
    /// Replace the price.
    #[serde(rename_all = "camelCase")]
    Fixed { price_cents: i64 },
    /// Add (or subtract) an amount.
    #[serde(rename_all = "camelCase")]
    Delta { amount_cents: i64 },
    /// Scale by a factor in basis points.
    #[serde(rename_all = "camelCase")]
    Multiplier { factor_bps: u32 },
}

/// Facts a rule is evaluated against.
#[derive(Debug, Clone)]
pub struct RuleFacts<'a> {
    pub course_id: &'a str,
    pub date: NaiveDate,
    pub season_id: Option<&'a str>,
    pub time_band_id: Option<&'a str>,
    pub lead_time_hours: i64,
    pub occupancy_pct: u32,
    pub players: u32,
}

impl PriceRule {
    pub fn validate(&self) -> PricingResult<()> {
        require_name(&self.name)?;
        match self.adjustment {
            Adjustment::Fixed { price_cents } if price_cents < 0 => {
                return Err(PricingError::InvalidConfig(
                    "Fixed price cannot be negative".into(),
                ))
            }
            Adjustment::Multiplier { factor_bps: 0 } => {
                return Err(PricingError::InvalidConfig(
                    "Multiplier factor must be positive".into(),
                ))
            }
            _ => {}
        }
        for condition in &self.conditions {
            condition.validate()?;
        }
        Ok(())
    }

    pub fn matches(&self, facts: &RuleFacts<'_>) -> bool {
        self.active
            && in_scope(&self.course_id, facts.course_id)
            && self.conditions.iter().all(|c| c.holds(facts))
    }
}

impl RuleCondition {
    fn validate(&self) -> PricingResult<()> {
        match self {
            RuleCondition::DaysOfWeek { days } => validate_days(days),
            RuleCondition::LeadTimeHours { min: Some(min), max: Some(max) } if max < min => {
                Err(PricingError::InvalidConfig("Lead time range is reversed".into()))
            }
            RuleCondition::Occupancy { min_pct, max_pct } => {
                if min_pct.unwrap_or(0) > 100 || max_pct.unwrap_or(0) > 100 {
                    return Err(PricingError::InvalidConfig(
                        "Occupancy is a percentage up to 100".into(),
                    ));
                }
                if let (Some(min), Some(max)) = (min_pct, max_pct) {
                    if max < min {
                        return Err(PricingError::InvalidConfig(
                            "Occupancy range is reversed".into(),
                        ));
                    }
                }
                Ok(())
            }
            RuleCondition::DateRange { from, to } if to < from => {
                Err(PricingError::InvalidConfig("Date range is reversed".into()))
            }
            _ => Ok(()),
        }
    }

    fn holds(&self, facts: &RuleFacts<'_>) -> bool {
        match self {
            RuleCondition::Season { season_id } => facts.season_id == Some(season_id.as_str()),
            RuleCondition::TimeBand { time_band_id } => {
                facts.time_band_id == Some(time_band_id.as_str())
            }
            RuleCondition::DaysOfWeek { days } => day_matches(days, facts.date),
            RuleCondition::LeadTimeHours { min, max } => {
                min.map_or(true, |m| facts.lead_time_hours >= m)
                    && max.map_or(true, |m| facts.lead_time_hours <= m)
            }
            RuleCondition::Occupancy { min_pct, max_pct } => {
                min_pct.map_or(true, |m| facts.occupancy_pct >= m)
                    && max_pct.map_or(true, |m| facts.occupancy_pct <= m)
            }
            RuleCondition::MinPlayers { players } => facts.players >= *players,
            RuleCondition::DateRange { from, to } => *from <= facts.date && facts.date <= *to,
        }
    }
}

/// Evaluation order: priority descending, then name, then id.
pub fn sort_rules(rules: &mut [&PriceRule]) {
    rules.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts(date: NaiveDate) -> RuleFacts<'static> {
        RuleFacts {
            course_id: "links",
            date,
            season_id: Some("summer"),
            time_band_id: None,
            lead_time_hours: 30,
            occupancy_pct: 80,
            players: 4,
        }
    }

    fn rule(name: &str, priority: i32, conditions: Vec<RuleCondition>) -> PriceRule {
        PriceRule {
            id: name.to_lowercase(),
            name: name.into(),
            course_id: None,
            conditions,
            adjustment: Adjustment::Delta { amount_cents: 100 },
            priority,
            stop_processing: false,
            active: true,
        }
    }

    #[test]
    fn test_conditions_must_all_hold() {
        let date = NaiveDate::from_ymd_opt(2026, 7, 4).unwrap();
        let busy = rule(
            "Busy summer",
            1,
            vec![
                RuleCondition::Season { season_id: "summer".into() },
                RuleCondition::Occupancy { min_pct: Some(75), max_pct: None },
            ],
        );
        assert!(busy.matches(&facts(date)));

        let last_minute = rule(
            "Last minute",
            1,
            vec![
                RuleCondition::Season { season_id: "summer".into() },
                RuleCondition::LeadTimeHours { min: None, max: Some(24) },
            ],
        );
        assert!(!last_minute.matches(&facts(date)));
    }

    #[test]
    fn test_sort_by_priority_then_name() {
        let a = rule("Beta", 5, vec![]);
        let b = rule("Alpha", 5, vec![]);
        let c = rule("Gamma", 10, vec![]);
        let mut rules = vec![&a, &b, &c];
        sort_rules(&mut rules);
        let names: Vec<_> = rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Gamma", "Alpha", "Beta"]);
    }

    #[test]
    fn test_condition_wire_format() {
        let json = r#"{"type":"occupancy","minPct":50,"maxPct":null}"#;
        let condition: RuleCondition = serde_json::from_str(json).unwrap();
        assert_eq!(condition, RuleCondition::Occupancy { min_pct: Some(50), max_pct: None });
    }

    #[test]
    fn test_validate_rejects_zero_multiplier() {
        let mut r = rule("Half", 0, vec![]);
        r.adjustment = Adjustment::Multiplier { factor_bps: 0 };
        assert!(r.validate().is_err());
    }
}
