//! # Time-of-Use Tariff Schedules
//!
//! A tariff schedule is an ordered list of calendar rules evaluated first
//! match wins. The final rule is an unconditional fallback, so every
//! timestamp maps to exactly one price. Evaluation is pure and stateless.

use chrono::{Datelike, NaiveDateTime, Timelike};
use once_cell::sync::Lazy;
use serde::Serialize;

use crate::error::ScheduleError;

/// Name of the built-in residential time-of-use schedule.
pub const TOU_D_RESIDENTIAL: &str = "tou-d-residential";

/// One calendar predicate and its price.
///
/// Predicates left unset always pass, so a rule with no month window, no
/// hour window, and no weekday gate matches every timestamp.
#[derive(Debug, Clone, Serialize)]
pub struct TariffRule {
    label: String,
    months: Option<Vec<u32>>,
    /// Half-open local hour window `[start, end)`.
    hours: Option<(u32, u32)>,
    weekdays_only: bool,
    price_usd_per_kwh: f64,
}

impl TariffRule {
    pub fn new(label: &str, price_usd_per_kwh: f64) -> Self {
        Self {
            label: label.to_string(),
            months: None,
            hours: None,
            weekdays_only: false,
            price_usd_per_kwh,
        }
    }

    pub fn with_months(mut self, months: &[u32]) -> Self {
        self.months = Some(months.to_vec());
        self
    }

    pub fn with_hours(mut self, start: u32, end: u32) -> Self {
        self.hours = Some((start, end));
        self
    }

    pub fn weekdays(mut self) -> Self {
        self.weekdays_only = true;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn price_usd_per_kwh(&self) -> f64 {
        self.price_usd_per_kwh
    }

    /// Whether this rule matches every timestamp.
    pub fn is_fallback(&self) -> bool {
        self.months.is_none() && self.hours.is_none() && !self.weekdays_only
    }

    pub fn matches(&self, timestamp: NaiveDateTime) -> bool {
        if let Some(months) = &self.months {
            if !months.contains(&timestamp.month()) {
                return false;
            }
        }
        if let Some((start, end)) = self.hours {
            let hour = timestamp.hour();
            if hour < start || hour >= end {
                return false;
            }
        }
        if self.weekdays_only && timestamp.weekday().num_days_from_monday() >= 5 {
            return false;
        }
        true
    }
}

/// A named, validated, ordered rule list.
#[derive(Debug, Clone, Serialize)]
pub struct TariffSchedule {
    name: String,
    rules: Vec<TariffRule>,
}

impl TariffSchedule {
    /// Validate and build a schedule.
    ///
    /// The rule list must be non-empty, end with an unconditional fallback,
    /// and contain no earlier unconditional rule that would shadow the rest.
    pub fn new(name: &str, rules: Vec<TariffRule>) -> Result<Self, ScheduleError> {
        if rules.is_empty() {
            return Err(ScheduleError::Empty(name.to_string()));
        }
        let last = &rules[rules.len() - 1];
        if !last.is_fallback() {
            return Err(ScheduleError::MissingFallback(name.to_string()));
        }
        if let Some(shadow) = rules[..rules.len() - 1].iter().find(|r| r.is_fallback()) {
            return Err(ScheduleError::ShadowedRules(
                name.to_string(),
                shadow.label.clone(),
            ));
        }
        Ok(Self {
            name: name.to_string(),
            rules,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// First rule matching the timestamp. Total because the last rule is
    /// always an unconditional fallback.
    pub fn rule_for(&self, timestamp: NaiveDateTime) -> &TariffRule {
        self.rules
            .iter()
            .find(|rule| rule.matches(timestamp))
            .unwrap_or_else(|| &self.rules[self.rules.len() - 1])
    }

    pub fn price_at(&self, timestamp: NaiveDateTime) -> f64 {
        self.rule_for(timestamp).price_usd_per_kwh
    }
}

/// SCE-style residential TOU-D schedule.
///
/// Weekends waive the evening peak rate only. Midday and off-peak rates
/// apply regardless of the day of week.
fn tou_d_residential() -> TariffSchedule {
    let summer = [6, 7, 8, 9];
    let rules = vec![
        TariffRule::new("summer-peak", 0.52)
            .with_months(&summer)
            .with_hours(16, 21)
            .weekdays(),
        TariffRule::new("summer-midday", 0.33)
            .with_months(&summer)
            .with_hours(8, 16),
        TariffRule::new("summer-off-peak", 0.27).with_months(&summer),
        TariffRule::new("winter-peak", 0.40).with_hours(16, 21).weekdays(),
        TariffRule::new("winter-super-off-peak", 0.19).with_hours(8, 16),
        TariffRule::new("winter-off-peak", 0.30),
    ];
    TariffSchedule::new(TOU_D_RESIDENTIAL, rules).expect("built-in schedule is valid")
}

static BUILTIN_SCHEDULES: Lazy<Vec<TariffSchedule>> = Lazy::new(|| vec![tou_d_residential()]);

/// Look up a built-in schedule by name.
pub fn builtin(name: &str) -> Option<&'static TariffSchedule> {
    BUILTIN_SCHEDULES.iter().find(|s| s.name == name)
}
