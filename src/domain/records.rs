use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::types::SourceTag;

/// Floor for the total renewables share, percent of generation.
pub const TOTAL_RENEWABLES_MIN_PCT: f64 = 20.0;
/// Ceiling for the total renewables share, percent of generation.
pub const TOTAL_RENEWABLES_MAX_PCT: f64 = 75.0;

/// One day of surface weather at a site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub date: NaiveDate,
    pub temperature_c: f64,
    pub precipitation_mm: f64,
    pub wind_speed_ms: f64,
    pub source: SourceTag,
}

/// One hour of solar irradiance at a site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolarRecord {
    pub timestamp: NaiveDateTime,
    pub ghi_wm2: f64,
    pub dni_wm2: f64,
    pub dhi_wm2: f64,
    pub temperature_c: f64,
    pub wind_speed_ms: f64,
    pub source: SourceTag,
}

/// Hourly renewables share of grid generation, by technology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridMixRecord {
    pub timestamp: NaiveDateTime,
    pub solar_pct: f64,
    pub wind_pct: f64,
    pub hydro_pct: f64,
    pub other_pct: f64,
    pub total_renewables_pct: f64,
}

impl GridMixRecord {
    /// Assemble a record from per-technology shares.
    ///
    /// The total is always the clamped sum of the stored components, so the
    /// invariant holds no matter what the caller passes in.
    pub fn from_components(
        timestamp: NaiveDateTime,
        solar_pct: f64,
        wind_pct: f64,
        hydro_pct: f64,
        other_pct: f64,
    ) -> Self {
        let total = (solar_pct + wind_pct + hydro_pct + other_pct)
            .clamp(TOTAL_RENEWABLES_MIN_PCT, TOTAL_RENEWABLES_MAX_PCT);
        Self {
            timestamp,
            solar_pct,
            wind_pct,
            hydro_pct,
            other_pct,
            total_renewables_pct: total,
        }
    }
}

/// Hourly carbon intensity of grid generation, kgCO2 per MWh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarbonRecord {
    pub timestamp: NaiveDateTime,
    pub carbon_intensity_kg_per_mwh: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_total_renewables_is_clamped_sum() {
        let mid = GridMixRecord::from_components(ts(), 20.0, 15.0, 10.0, 8.0);
        assert!((mid.total_renewables_pct - 53.0).abs() < 1e-9);

        let low = GridMixRecord::from_components(ts(), 0.0, 2.0, 8.0, 5.0);
        assert!((low.total_renewables_pct - TOTAL_RENEWABLES_MIN_PCT).abs() < 1e-9);

        let high = GridMixRecord::from_components(ts(), 35.0, 45.0, 30.0, 9.0);
        assert!((high.total_renewables_pct - TOTAL_RENEWABLES_MAX_PCT).abs() < 1e-9);
    }
}
