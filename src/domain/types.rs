use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use validator::Validate;

use crate::error::PipelineError;

// ============================================================================
// Date Range
// ============================================================================

/// Inclusive calendar date range covered by a feature build.
///
/// Construction rejects inverted ranges, so every value of this type is
/// guaranteed to satisfy `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Create a range spanning `start..=end`, failing fast when inverted.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, PipelineError> {
        if end < start {
            return Err(PipelineError::InvertedRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of calendar days covered, counting both endpoints.
    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Iterate every calendar day in the range.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }

    /// Every hour from midnight on the first day through 23:00 on the last.
    pub fn hourly_index(&self) -> Vec<NaiveDateTime> {
        self.days()
            .flat_map(|day| (0..24).map(move |h| day.and_hms_opt(h, 0, 0).unwrap()))
            .collect()
    }

    /// Every quarter hour across the range, the native cadence of the
    /// charging-demand models this pipeline feeds.
    pub fn fifteen_minute_index(&self) -> Vec<NaiveDateTime> {
        self.days()
            .flat_map(|day| {
                (0..24).flat_map(move |h| {
                    [0, 15, 30, 45]
                        .into_iter()
                        .map(move |m| day.and_hms_opt(h, m, 0).unwrap())
                })
            })
            .collect()
    }

    /// Calendar years touched by the range.
    pub fn years(&self) -> RangeInclusive<i32> {
        self.start.year()..=self.end.year()
    }

    /// Restrict the range to a single calendar year.
    ///
    /// Returns `None` when the year does not overlap the range at all.
    pub fn clamp_to_year(&self, year: i32) -> Option<DateRange> {
        let year_start = NaiveDate::from_ymd_opt(year, 1, 1)?;
        let year_end = NaiveDate::from_ymd_opt(year, 12, 31)?;
        let start = self.start.max(year_start);
        let end = self.end.min(year_end);
        if end < start {
            return None;
        }
        Some(DateRange { start, end })
    }

    /// Whether a timestamp falls on one of the range's calendar days.
    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        let date = ts.date();
        self.start <= date && date <= self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

// ============================================================================
// Site Coordinates
// ============================================================================

/// WGS84 location of a charging site.
///
/// Validation bounds the coordinates to the globe; the ordered range
/// checks also fail on NaN.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
pub struct SiteCoordinates {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
}

impl SiteCoordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl fmt::Display for SiteCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.4}, {:.4})", self.latitude, self.longitude)
    }
}

// ============================================================================
// Signal Classification
// ============================================================================

/// The exogenous signals the pipeline assembles for each site.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display,
)]
#[strum(serialize_all = "snake_case")]
pub enum SignalKind {
    Weather,
    Solar,
    GridMix,
    Carbon,
}

/// Where a series of records ultimately came from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display,
)]
#[strum(serialize_all = "snake_case")]
pub enum SourceTag {
    /// Fetched from a ranked upstream provider.
    Station,
    /// Generated locally by the statistical models.
    Synthetic,
}
