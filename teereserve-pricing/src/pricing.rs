use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{in_scope, Promotion, Season, SpecialOverride, TimeBand};
use crate::rules::{sort_rules, Adjustment, PriceRule, RuleFacts};
use crate::{PricingError, PricingResult};

pub const BPS_SCALE: i128 = 10_000;

/// Everything configured for pricing, loaded once per quote.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingBook {
    pub seasons: Vec<Season>,
    pub time_bands: Vec<TimeBand>,
    pub rules: Vec<PriceRule>,
    pub overrides: Vec<SpecialOverride>,
    pub promotions: Vec<Promotion>,
}

#[derive(Debug, Clone)]
pub struct QuoteContext {
    pub course_id: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub base_price_cents: i64,
    pub players: u32,
    /// Share of the course's tee times already booked that day.
    pub occupancy_pct: u32,
    pub promo_code: Option<String>,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppliedRule {
    pub rule_id: String,
    pub name: String,
    pub before_cents: i64,
    pub after_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub base_price_cents: i64,
    pub unit_price_cents: i64,
    pub players: u32,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub currency: String,
    pub season_id: Option<String>,
    pub time_band_id: Option<String>,
    pub override_id: Option<String>,
    pub promo_code: Option<String>,
    #[serde(default)]
    pub applied_rules: Vec<AppliedRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Flat tax rate in basis points.
    pub tax_rate_bps: u32,
    pub currency: String,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            tax_rate_bps: 0,
            currency: "USD".to_string(),
        }
    }
}

/// Rule-based tee time pricing
pub struct PricingEngine {
    config: PricingConfig,
}

impl PricingEngine {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    pub fn quote(&self, book: &PricingBook, ctx: &QuoteContext) -> PricingResult<Quote> {
        validate_context(ctx)?;

        let mut season_id = None;
        let mut time_band_id = None;
        let mut applied_rules = Vec::new();

        let (unit, override_id) = match select_override(&book.overrides, &ctx.course_id, ctx.date) {
            Some(special) => (special.price_cents, Some(special.id.clone())),
            None => {
                let season = select_scoped(
                    book.seasons
                        .iter()
                        .filter(|s| s.active && s.contains(ctx.date))
                        .map(|s| (s, s.priority, &s.course_id, &s.id)),
                    &ctx.course_id,
                );
                let band = select_scoped(
                    book.time_bands
                        .iter()
                        .filter(|b| b.active && b.contains(ctx.date, ctx.time))
                        .map(|b| (b, b.priority, &b.course_id, &b.id)),
                    &ctx.course_id,
                );
                season_id = season.map(|s| s.id.clone());
                time_band_id = band.map(|b| b.id.clone());

                let tee_at = ctx.date.and_time(ctx.time).and_utc();
                let facts = RuleFacts {
                    course_id: &ctx.course_id,
                    date: ctx.date,
                    season_id: season_id.as_deref(),
                    time_band_id: time_band_id.as_deref(),
                    lead_time_hours: (tee_at - ctx.now).num_hours(),
                    occupancy_pct: ctx.occupancy_pct,
                    players: ctx.players,
                };

                let mut matching: Vec<&PriceRule> =
                    book.rules.iter().filter(|r| r.matches(&facts)).collect();
                sort_rules(&mut matching);

                let mut price = ctx.base_price_cents;
                for rule in matching {
                    let before = price;
                    price = apply_adjustment(price, &rule.adjustment)?;
                    applied_rules.push(AppliedRule {
                        rule_id: rule.id.clone(),
                        name: rule.name.clone(),
                        before_cents: before,
                        after_cents: price,
                    });
                    if rule.stop_processing {
                        break;
                    }
                }
                (price, None)
            }
        };

        let subtotal = unit
            .checked_mul(ctx.players as i64)
            .ok_or(PricingError::Overflow)?;

        let (discount, promo_code) = match ctx.promo_code.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => {
                let promo = find_promotion(&book.promotions, code, &ctx.course_id, ctx.now)?;
                (promotion_discount(promo, subtotal)?, Some(promo.code.clone()))
            }
            _ => (0, None),
        };

        let taxable = subtotal - discount;
        let tax = apply_bps(taxable, self.config.tax_rate_bps as i64)?;
        let total = taxable.checked_add(tax).ok_or(PricingError::Overflow)?;

        Ok(Quote {
            base_price_cents: ctx.base_price_cents,
            unit_price_cents: unit,
            players: ctx.players,
            subtotal_cents: subtotal,
            discount_cents: discount,
            tax_cents: tax,
            total_cents: total,
            currency: self.config.currency.clone(),
            season_id,
            time_band_id,
            override_id,
            promo_code,
            applied_rules,
        })
    }
}

fn validate_context(ctx: &QuoteContext) -> PricingResult<()> {
    if ctx.players == 0 {
        return Err(PricingError::InvalidContext("At least one player is required".into()));
    }
    if ctx.occupancy_pct > 100 {
        return Err(PricingError::InvalidContext(format!(
            "Occupancy {}% exceeds 100%",
            ctx.occupancy_pct
        )));
    }
    if ctx.base_price_cents < 0 {
        return Err(PricingError::InvalidContext("Base price cannot be negative".into()));
    }
    Ok(())
}

/// `amount × bps / 10000`, rounded half away from zero.
pub fn apply_bps(amount_cents: i64, bps: i64) -> PricingResult<i64> {
    let product = amount_cents as i128 * bps as i128;
    let half = BPS_SCALE / 2;
    let rounded = if product >= 0 {
        (product + half) / BPS_SCALE
    } else {
        (product - half) / BPS_SCALE
    };
    i64::try_from(rounded).map_err(|_| PricingError::Overflow)
}

fn apply_adjustment(price: i64, adjustment: &Adjustment) -> PricingResult<i64> {
    let next = match adjustment {
        Adjustment::Fixed { price_cents } => *price_cents,
        Adjustment::Delta { amount_cents } => price
            .checked_add(*amount_cents)
            .ok_or(PricingError::Overflow)?,
        Adjustment::Multiplier { factor_bps } => apply_bps(price, *factor_bps as i64)?,
    };
    Ok(next.max(0))
}

fn select_override<'a>(
    overrides: &'a [SpecialOverride],
    course_id: &str,
    date: NaiveDate,
) -> Option<&'a SpecialOverride> {
    let mut candidates = overrides
        .iter()
        .filter(|o| o.active && o.date == date && in_scope(&o.course_id, course_id));
    let first = candidates.next()?;
    Some(candidates.fold(first, |best, o| {
        let better = match (best.course_id.is_some(), o.course_id.is_some()) {
            (false, true) => true,
            (true, false) => false,
            _ => o.id < best.id,
        };
        if better {
            o
        } else {
            best
        }
    }))
}

/// Highest priority wins; a course-scoped entry beats a global one at equal
/// priority; the lowest id breaks remaining ties.
fn select_scoped<'a, T>(
    candidates: impl Iterator<Item = (&'a T, i32, &'a Option<String>, &'a String)>,
    course_id: &str,
) -> Option<&'a T> {
    candidates
        .filter(|(_, _, scope, _)| in_scope(scope, course_id))
        .max_by(|a, b| {
            a.1.cmp(&b.1)
                .then_with(|| a.2.is_some().cmp(&b.2.is_some()))
                .then_with(|| b.3.cmp(a.3))
        })
        .map(|(item, _, _, _)| item)
}

fn find_promotion<'a>(
    promotions: &'a [Promotion],
    code: &str,
    course_id: &str,
    now: DateTime<Utc>,
) -> PricingResult<&'a Promotion> {
    let candidates: Vec<&Promotion> = promotions
        .iter()
        .filter(|p| p.code.eq_ignore_ascii_case(code))
        .collect();
    if candidates.is_empty() {
        return Err(PricingError::InvalidPromotion(format!("Unknown code {}", code)));
    }

    // A code may be reused across courses and periods; any live match wins.
    let live: Vec<&Promotion> = candidates.into_iter().filter(|p| p.is_valid_at(now)).collect();
    if live.is_empty() {
        return Err(PricingError::InvalidPromotion(format!(
            "Code {} is not currently valid",
            code
        )));
    }
    live.into_iter()
        .find(|p| in_scope(&p.course_id, course_id))
        .ok_or_else(|| {
            PricingError::InvalidPromotion(format!("Code {} does not apply to this course", code))
        })
}

fn promotion_discount(promo: &Promotion, subtotal: i64) -> PricingResult<i64> {
    let discount = match (promo.percent_bps, promo.amount_cents) {
        (Some(bps), _) => apply_bps(subtotal, bps as i64)?,
        (None, Some(amount)) => amount,
        (None, None) => 0,
    };
    Ok(discount.clamp(0, subtotal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleCondition;
    use chrono::TimeZone;

    fn engine(tax_rate_bps: u32) -> PricingEngine {
        PricingEngine::new(PricingConfig {
            tax_rate_bps,
            currency: "USD".into(),
        })
    }

    fn ctx(base: i64, players: u32) -> QuoteContext {
        QuoteContext {
            course_id: "links".into(),
            date: NaiveDate::from_ymd_opt(2026, 7, 4).unwrap(),
            time: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            base_price_cents: base,
            players,
            occupancy_pct: 40,
            promo_code: None,
            now: Utc.with_ymd_and_hms(2026, 7, 1, 12, 0, 0).unwrap(),
        }
    }

    fn rule(id: &str, priority: i32, adjustment: Adjustment) -> PriceRule {
        PriceRule {
            id: id.into(),
            name: id.into(),
            course_id: None,
            conditions: vec![],
            adjustment,
            priority,
            stop_processing: false,
            active: true,
        }
    }

    #[test]
    fn test_no_rules_total_is_base_plus_tax() {
        let quote = engine(825).quote(&PricingBook::default(), &ctx(10_000, 1)).unwrap();
        assert_eq!(quote.subtotal_cents, 10_000);
        assert_eq!(quote.tax_cents, 825);
        assert_eq!(quote.total_cents, 10_825);
        assert!(quote.applied_rules.is_empty());
    }

    #[test]
    fn test_fixed_rule_ignores_base() {
        let book = PricingBook {
            rules: vec![rule("flat", 1, Adjustment::Fixed { price_cents: 4_500 })],
            ..Default::default()
        };
        for base in [1_000, 9_999, 25_000] {
            let quote = engine(0).quote(&book, &ctx(base, 1)).unwrap();
            assert_eq!(quote.unit_price_cents, 4_500);
        }
    }

    #[test]
    fn test_rules_apply_in_priority_order() {
        // 10000 * 1.5 = 15000, then -1000 = 14000. The reverse order would give 13500.
        let book = PricingBook {
            rules: vec![
                rule("delta", 1, Adjustment::Delta { amount_cents: -1_000 }),
                rule("peak", 10, Adjustment::Multiplier { factor_bps: 15_000 }),
            ],
            ..Default::default()
        };
        let quote = engine(0).quote(&book, &ctx(10_000, 2)).unwrap();
        assert_eq!(quote.unit_price_cents, 14_000);
        assert_eq!(quote.subtotal_cents, 28_000);
        assert_eq!(quote.applied_rules[0].rule_id, "peak");
    }

    #[test]
    fn test_stop_processing_halts_evaluation() {
        let mut first = rule("first", 10, Adjustment::Delta { amount_cents: 500 });
        first.stop_processing = true;
        let book = PricingBook {
            rules: vec![first, rule("second", 1, Adjustment::Delta { amount_cents: 500 })],
            ..Default::default()
        };
        let quote = engine(0).quote(&book, &ctx(1_000, 1)).unwrap();
        assert_eq!(quote.unit_price_cents, 1_500);
        assert_eq!(quote.applied_rules.len(), 1);
    }

    #[test]
    fn test_price_never_negative() {
        let book = PricingBook {
            rules: vec![rule("big", 1, Adjustment::Delta { amount_cents: -50_000 })],
            ..Default::default()
        };
        let quote = engine(800).quote(&book, &ctx(10_000, 1)).unwrap();
        assert_eq!(quote.unit_price_cents, 0);
        assert_eq!(quote.total_cents, 0);
    }

    #[test]
    fn test_override_short_circuits_rules() {
        let book = PricingBook {
            rules: vec![rule("flat", 100, Adjustment::Fixed { price_cents: 1 })],
            overrides: vec![
                SpecialOverride {
                    id: "global".into(),
                    course_id: None,
                    date: NaiveDate::from_ymd_opt(2026, 7, 4).unwrap(),
                    price_cents: 20_000,
                    reason: "Holiday".into(),
                    active: true,
                },
                SpecialOverride {
                    id: "course".into(),
                    course_id: Some("links".into()),
                    date: NaiveDate::from_ymd_opt(2026, 7, 4).unwrap(),
                    price_cents: 17_500,
                    reason: "Club day".into(),
                    active: true,
                },
            ],
            ..Default::default()
        };
        let quote = engine(0).quote(&book, &ctx(10_000, 1)).unwrap();
        assert_eq!(quote.unit_price_cents, 17_500);
        assert_eq!(quote.override_id.as_deref(), Some("course"));
        assert!(quote.applied_rules.is_empty());
    }

    #[test]
    fn test_season_selection_prefers_course_scope() {
        let season = |id: &str, course: Option<&str>, priority| Season {
            id: id.into(),
            name: id.into(),
            course_id: course.map(String::from),
            start_date: NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 8, 31).unwrap(),
            priority,
            active: true,
        };
        let mut seasonal = rule("summer-uplift", 1, Adjustment::Delta { amount_cents: 2_000 });
        seasonal.conditions = vec![RuleCondition::Season { season_id: "links-summer".into() }];

        let book = PricingBook {
            seasons: vec![
                season("global-summer", None, 5),
                season("links-summer", Some("links"), 5),
                season("other-summer", Some("parkland"), 9),
            ],
            rules: vec![seasonal],
            ..Default::default()
        };
        let quote = engine(0).quote(&book, &ctx(10_000, 1)).unwrap();
        assert_eq!(quote.season_id.as_deref(), Some("links-summer"));
        assert_eq!(quote.unit_price_cents, 12_000);
    }

    #[test]
    fn test_promotion_discount_before_tax() {
        let book = PricingBook {
            promotions: vec![Promotion {
                id: "p1".into(),
                code: "SPRING10".into(),
                course_id: None,
                percent_bps: Some(1_000),
                amount_cents: None,
                valid_from: None,
                valid_to: None,
                active: true,
            }],
            ..Default::default()
        };
        let mut context = ctx(10_000, 2);
        context.promo_code = Some("spring10".into());

        let quote = engine(1_000).quote(&book, &context).unwrap();
        assert_eq!(quote.discount_cents, 2_000);
        assert_eq!(quote.tax_cents, 1_800);
        assert_eq!(quote.total_cents, 19_800);
        assert_eq!(quote.promo_code.as_deref(), Some("SPRING10"));
    }

    #[test]
    fn test_retired_code_does_not_shadow_live_one() {
        let promo = |id: &str, bps: u32, active: bool| Promotion {
            id: id.into(),
            code: "SUMMER".into(),
            course_id: None,
            percent_bps: Some(bps),
            amount_cents: None,
            valid_from: None,
            valid_to: None,
            active,
        };
        let mut context = ctx(10_000, 1);
        context.promo_code = Some("SUMMER".into());

        let book = PricingBook {
            promotions: vec![promo("old", 5_000, false), promo("new", 1_000, true)],
            ..Default::default()
        };
        let quote = engine(0).quote(&book, &context).unwrap();
        assert_eq!(quote.discount_cents, 1_000);

        let book = PricingBook {
            promotions: vec![promo("old", 5_000, false)],
            ..Default::default()
        };
        let result = engine(0).quote(&book, &context);
        assert!(matches!(result, Err(PricingError::InvalidPromotion(_))));
    }

    #[test]
    fn test_unknown_promotion_rejected() {
        let mut context = ctx(10_000, 1);
        context.promo_code = Some("NOPE".into());
        let result = engine(0).quote(&PricingBook::default(), &context);
        assert!(matches!(result, Err(PricingError::InvalidPromotion(_))));
    }

    #[test]
    fn test_apply_bps_rounds_half_away_from_zero() {
        assert_eq!(apply_bps(1, 5_000).unwrap(), 1);
        assert_eq!(apply_bps(-1, 5_000).unwrap(), -1);
        assert_eq!(apply_bps(3, 3_333).unwrap(), 1);
        assert_eq!(apply_bps(12_345, 825).unwrap(), 1_018);
    }

    #[test]
    fn test_invalid_context() {
        assert!(matches!(
            engine(0).quote(&PricingBook::default(), &ctx(10_000, 0)),
            Err(PricingError::InvalidContext(_))
        ));
        let mut full = ctx(10_000, 1);
        full.occupancy_pct = 101;
        assert!(engine(0).quote(&PricingBook::default(), &full).is_err());
    }
}
