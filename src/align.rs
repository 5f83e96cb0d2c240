//! # Temporal Alignment
//!
//! Merges series of different native frequencies onto one caller-supplied
//! timestamp index. Daily weather broadcasts across every intraday
//! timestamp of its calendar day; hourly series attach by nearest timestamp
//! within a one-hour tolerance. Gaps left after attachment are closed by a
//! forward fill then a backward fill, so no field of an emitted row is ever
//! unset. Tariff prices and composite features are computed per row.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use itertools::Itertools;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::domain::{
    price_carbon_ratio, renewable_discount, solar_efficiency, AlignedFeatureRow, CarbonRecord,
    GridMixRecord, SolarRecord, WeatherRecord,
};
use crate::error::PipelineError;
use crate::tariff::TariffSchedule;

/// Matches must lie strictly closer than this to the target timestamp.
const MATCH_TOLERANCE: Duration = Duration::hours(1);

/// Substitutes applied when a signal has no records at all. An empty signal
/// is an anomaly worth a warning, not a crash.
const NEUTRAL_TEMPERATURE_C: f64 = 20.0;
const NEUTRAL_PRECIPITATION_MM: f64 = 0.0;
const NEUTRAL_WIND_SPEED_MS: f64 = 2.5;
const NEUTRAL_IRRADIANCE_WM2: f64 = 0.0;
/// Midpoint of the documented renewables-share bounds.
const NEUTRAL_RENEWABLES_PCT: f64 = 47.5;
const NEUTRAL_CARBON_KG_PER_MWH: f64 = 450.0;

/// Join every signal onto the target index and derive composite features.
///
/// The index must be sorted ascending. Rows come back fully populated for
/// any combination of source coverage, including sources that are empty or
/// lie entirely outside the index.
pub fn align(
    target_index: &[NaiveDateTime],
    weather: &[WeatherRecord],
    solar: &[SolarRecord],
    grid_mix: &[GridMixRecord],
    carbon: &[CarbonRecord],
    schedule: &TariffSchedule,
) -> Result<Vec<AlignedFeatureRow>, PipelineError> {
    ensure_sorted(target_index)?;
    if target_index.is_empty() {
        return Ok(Vec::new());
    }

    let weather_by_day: HashMap<NaiveDate, &WeatherRecord> =
        weather.iter().map(|r| (r.date, r)).collect();
    let attach_daily = |value: fn(&WeatherRecord) -> f64| -> Vec<Option<f64>> {
        target_index
            .iter()
            .map(|ts| weather_by_day.get(&ts.date()).map(|r| value(r)))
            .collect()
    };

    // Daily records double as midnight-keyed points for the fallback path.
    let day_points = |value: fn(&WeatherRecord) -> f64| -> SeriesColumn {
        SeriesColumn::from_points(
            weather
                .iter()
                .map(|r| (r.date.and_time(NaiveTime::MIN), value(r)))
                .collect(),
        )
    };

    let temperature_c = resolve_column(
        "temperature_c",
        attach_daily(|r| r.temperature_c),
        &day_points(|r| r.temperature_c),
        target_index,
        NEUTRAL_TEMPERATURE_C,
    );
    let precipitation_mm = resolve_column(
        "precipitation_mm",
        attach_daily(|r| r.precipitation_mm),
        &day_points(|r| r.precipitation_mm),
        target_index,
        NEUTRAL_PRECIPITATION_MM,
    );
    let wind_speed_ms = resolve_column(
        "wind_speed_ms",
        attach_daily(|r| r.wind_speed_ms),
        &day_points(|r| r.wind_speed_ms),
        target_index,
        NEUTRAL_WIND_SPEED_MS,
    );

    let hourly = |column: &SeriesColumn, field: &'static str, neutral: f64| -> Vec<f64> {
        let attached = target_index
            .iter()
            .map(|ts| column.nearest_within(*ts, MATCH_TOLERANCE))
            .collect();
        resolve_column(field, attached, column, target_index, neutral)
    };

    let ghi_col = SeriesColumn::from_points(solar.iter().map(|r| (r.timestamp, r.ghi_wm2)).collect());
    let dni_col = SeriesColumn::from_points(solar.iter().map(|r| (r.timestamp, r.dni_wm2)).collect());
    let dhi_col = SeriesColumn::from_points(solar.iter().map(|r| (r.timestamp, r.dhi_wm2)).collect());
    let renewables_col = SeriesColumn::from_points(
        grid_mix
            .iter()
            .map(|r| (r.timestamp, r.total_renewables_pct))
            .collect(),
    );
    let carbon_col = SeriesColumn::from_points(
        carbon
            .iter()
            .map(|r| (r.timestamp, r.carbon_intensity_kg_per_mwh))
            .collect(),
    );

    let ghi_wm2 = hourly(&ghi_col, "ghi_wm2", NEUTRAL_IRRADIANCE_WM2);
    let dni_wm2 = hourly(&dni_col, "dni_wm2", NEUTRAL_IRRADIANCE_WM2);
    let dhi_wm2 = hourly(&dhi_col, "dhi_wm2", NEUTRAL_IRRADIANCE_WM2);
    let total_renewables_pct = hourly(
        &renewables_col,
        "total_renewables_pct",
        NEUTRAL_RENEWABLES_PCT,
    );
    let carbon_intensity = hourly(
        &carbon_col,
        "carbon_intensity_kg_per_mwh",
        NEUTRAL_CARBON_KG_PER_MWH,
    );

    let rows = target_index
        .iter()
        .enumerate()
        .map(|(i, ts)| {
            let price = schedule.price_at(*ts);
            AlignedFeatureRow {
                timestamp: *ts,
                temperature_c: temperature_c[i],
                precipitation_mm: precipitation_mm[i],
                wind_speed_ms: wind_speed_ms[i],
                ghi_wm2: ghi_wm2[i],
                dni_wm2: dni_wm2[i],
                dhi_wm2: dhi_wm2[i],
                total_renewables_pct: total_renewables_pct[i],
                carbon_intensity_kg_per_mwh: carbon_intensity[i],
                price_usd_per_kwh: price,
                price_carbon_ratio: price_carbon_ratio(price, carbon_intensity[i]),
                solar_efficiency: solar_efficiency(ghi_wm2[i], temperature_c[i]),
                renewable_discount: renewable_discount(total_renewables_pct[i]),
            }
        })
        .collect();
    Ok(rows)
}

fn ensure_sorted(target_index: &[NaiveDateTime]) -> Result<(), PipelineError> {
    if let Some(position) = target_index
        .iter()
        .tuple_windows()
        .position(|(a, b)| b < a)
    {
        return Err(PipelineError::UnsortedIndex(position + 1));
    }
    Ok(())
}

/// Timestamped values for one field, sorted by timestamp.
struct SeriesColumn {
    points: Vec<(NaiveDateTime, f64)>,
}

impl SeriesColumn {
    fn from_points(mut points: Vec<(NaiveDateTime, f64)>) -> Self {
        points.sort_by_key(|(ts, _)| *ts);
        Self { points }
    }

    fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Neighbouring points around `target`: the latest at-or-before one and
    /// the earliest after one.
    fn neighbours(
        &self,
        target: NaiveDateTime,
    ) -> (Option<(NaiveDateTime, f64)>, Option<(NaiveDateTime, f64)>) {
        let idx = self.points.partition_point(|(ts, _)| *ts <= target);
        let before = idx.checked_sub(1).map(|i| self.points[i]);
        let after = self.points.get(idx).copied();
        (before, after)
    }

    /// Value of the nearest point strictly within `tolerance` of the
    /// target. Ties go to the earlier point.
    fn nearest_within(&self, target: NaiveDateTime, tolerance: Duration) -> Option<f64> {
        let (before, after) = self.neighbours(target);
        let before = before.map(|(ts, v)| (target - ts, v));
        let after = after.map(|(ts, v)| (ts - target, v));
        let (delta, value) = match (before, after) {
            (Some(b), Some(a)) => {
                if a.0 < b.0 {
                    a
                } else {
                    b
                }
            }
            (Some(b), None) => b,
            (None, Some(a)) => a,
            (None, None) => return None,
        };
        (delta < tolerance).then_some(value)
    }

    /// Nearest point with no tolerance bound, for indexes that lie entirely
    /// outside the source span.
    fn nearest_unbounded(&self, target: NaiveDateTime) -> Option<f64> {
        let (before, after) = self.neighbours(target);
        match (before, after) {
            (Some((bt, bv)), Some((at, av))) => {
                Some(if at - target < target - bt { av } else { bv })
            }
            (Some((_, v)), None) | (None, Some((_, v))) => Some(v),
            (None, None) => None,
        }
    }
}

/// Forward-fill then backward-fill. Returns how many gaps were closed.
fn fill_gaps(values: &mut [Option<f64>]) -> usize {
    let mut filled = 0;
    let mut last = None;
    for value in values.iter_mut() {
        match value {
            Some(v) => last = Some(*v),
            None => {
                if let Some(v) = last {
                    *value = Some(v);
                    filled += 1;
                }
            }
        }
    }
    let mut next = None;
    for value in values.iter_mut().rev() {
        match value {
            Some(v) => next = Some(*v),
            None => {
                if let Some(v) = next {
                    *value = Some(v);
                    filled += 1;
                }
            }
        }
    }
    filled
}

/// Close gaps in an attached column, then handle the two all-unset cases:
/// a source with records but none reachable attaches its nearest records, a
/// source with no records at all substitutes a neutral constant.
fn resolve_column(
    field: &'static str,
    mut values: Vec<Option<f64>>,
    column: &SeriesColumn,
    target_index: &[NaiveDateTime],
    neutral: f64,
) -> Vec<f64> {
    let filled = fill_gaps(&mut values);
    if filled > 0 {
        debug!(field, filled, "closed alignment gaps");
    }
    if values.iter().all(Option::is_none) {
        if column.is_empty() {
            warn!(field, substitute = neutral, "signal has no records, substituting neutral value");
            return vec![neutral; target_index.len()];
        }
        debug!(field, "index outside source span, attaching nearest records");
        return target_index
            .iter()
            .map(|ts| column.nearest_unbounded(*ts).unwrap_or(neutral))
            .collect();
    }
    values.into_iter().map(|v| v.unwrap_or(neutral)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SourceTag;
    use crate::tariff::{builtin, TOU_D_RESIDENTIAL};

    fn ts(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2018, 7, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn weather(d: u32, temperature_c: f64) -> WeatherRecord {
        WeatherRecord {
            date: NaiveDate::from_ymd_opt(2018, 7, d).unwrap(),
            temperature_c,
            precipitation_mm: 0.5,
            wind_speed_ms: 3.0,
            source: SourceTag::Station,
        }
    }

    fn solar(d: u32, h: u32, ghi_wm2: f64) -> SolarRecord {
        SolarRecord {
            timestamp: ts(d, h),
            ghi_wm2,
            dni_wm2: ghi_wm2 * 0.8,
            dhi_wm2: ghi_wm2 * 0.2,
            temperature_c: 25.0,
            wind_speed_ms: 2.0,
            source: SourceTag::Station,
        }
    }

    fn grid(d: u32, h: u32, solar_pct: f64) -> GridMixRecord {
        GridMixRecord::from_components(ts(d, h), solar_pct, 20.0, 10.0, 8.0)
    }

    fn carbon(d: u32, h: u32, intensity: f64) -> CarbonRecord {
        CarbonRecord {
            timestamp: ts(d, h),
            carbon_intensity_kg_per_mwh: intensity,
        }
    }

    fn schedule() -> &'static TariffSchedule {
        builtin(TOU_D_RESIDENTIAL).unwrap()
    }

    #[test]
    fn test_contained_index_leaves_nothing_unresolved() {
        let target: Vec<NaiveDateTime> = (0..24).map(|h| ts(16, h)).collect();
        let weather = vec![weather(16, 28.0)];
        let solar: Vec<SolarRecord> = (0..24).map(|h| solar(16, h, f64::from(h) * 10.0)).collect();
        let grid: Vec<GridMixRecord> = (0..24).map(|h| grid(16, h, 15.0)).collect();
        let carbon: Vec<CarbonRecord> = (0..24).map(|h| carbon(16, h, 400.0)).collect();

        let rows = align(&target, &weather, &solar, &grid, &carbon, schedule()).unwrap();
        assert_eq!(rows.len(), 24);
        for (h, row) in rows.iter().enumerate() {
            assert_eq!(row.temperature_c, 28.0);
            assert!((row.ghi_wm2 - h as f64 * 10.0).abs() < 1e-9);
            assert_eq!(row.carbon_intensity_kg_per_mwh, 400.0);
            assert!(row.price_usd_per_kwh > 0.0);
            assert!(row.price_carbon_ratio.is_finite());
            assert!(row.solar_efficiency.is_finite());
        }
    }

    #[test]
    fn test_daily_weather_broadcasts_across_the_day() {
        let target = vec![ts(16, 0), ts(16, 8), ts(16, 23), ts(17, 4)];
        let weather = vec![weather(16, 30.0), weather(17, 20.0)];
        let rows = align(&target, &weather, &[], &[], &[], schedule()).unwrap();
        assert_eq!(rows[0].temperature_c, 30.0);
        assert_eq!(rows[1].temperature_c, 30.0);
        assert_eq!(rows[2].temperature_c, 30.0);
        assert_eq!(rows[3].temperature_c, 20.0);
    }

    #[test]
    fn test_nearest_record_wins_within_tolerance() {
        let target = vec![NaiveDate::from_ymd_opt(2018, 7, 16)
            .unwrap()
            .and_hms_opt(11, 0, 0)
            .unwrap()];
        let solar = vec![
            SolarRecord {
                timestamp: NaiveDate::from_ymd_opt(2018, 7, 16)
                    .unwrap()
                    .and_hms_opt(10, 30, 0)
                    .unwrap(),
                ..solar(16, 10, 600.0)
            },
            SolarRecord {
                timestamp: NaiveDate::from_ymd_opt(2018, 7, 16)
                    .unwrap()
                    .and_hms_opt(11, 45, 0)
                    .unwrap(),
                ..solar(16, 11, 300.0)
            },
        ];
        let rows = align(&target, &[], &solar, &[], &[], schedule()).unwrap();
        assert_eq!(rows[0].ghi_wm2, 600.0);
    }

    #[test]
    fn test_out_of_tolerance_gap_is_forward_filled() {
        let target = vec![ts(16, 10), ts(16, 13)];
        let solar = vec![solar(16, 10, 500.0)];
        let rows = align(&target, &[], &solar, &[], &[], schedule()).unwrap();
        // 13:00 is three hours from the only record, so it takes the
        // forward-filled value instead of a direct match.
        assert_eq!(rows[0].ghi_wm2, 500.0);
        assert_eq!(rows[1].ghi_wm2, 500.0);
    }

    #[test]
    fn test_leading_gap_is_backward_filled() {
        let target = vec![ts(16, 2), ts(16, 12)];
        let solar = vec![solar(16, 12, 750.0)];
        let rows = align(&target, &[], &solar, &[], &[], schedule()).unwrap();
        assert_eq!(rows[0].ghi_wm2, 750.0);
        assert_eq!(rows[1].ghi_wm2, 750.0);
    }

    #[test]
    fn test_index_entirely_outside_sources_repeats_one_value() {
        let target: Vec<NaiveDateTime> = (0..24).map(|h| ts(25, h)).collect();
        let weather = vec![weather(1, 22.0), weather(2, 24.0)];
        let solar = vec![solar(1, 12, 800.0), solar(2, 12, 640.0)];
        let grid = vec![grid(1, 12, 30.0)];
        let carbon = vec![carbon(1, 12, 380.0), carbon(2, 12, 360.0)];

        let rows = align(&target, &weather, &solar, &grid, &carbon, schedule()).unwrap();
        for row in &rows {
            assert_eq!(row.temperature_c, rows[0].temperature_c);
            assert_eq!(row.ghi_wm2, rows[0].ghi_wm2);
            assert_eq!(row.total_renewables_pct, rows[0].total_renewables_pct);
            assert_eq!(row.carbon_intensity_kg_per_mwh, rows[0].carbon_intensity_kg_per_mwh);
        }
        // The nearest records are the latest ones, the index lying after
        // the whole source span.
        assert_eq!(rows[0].temperature_c, 24.0);
        assert_eq!(rows[0].ghi_wm2, 640.0);
        assert_eq!(rows[0].carbon_intensity_kg_per_mwh, 360.0);
    }

    #[test]
    fn test_empty_signals_substitute_neutral_values() {
        let target = vec![ts(16, 10), ts(16, 11)];
        let rows = align(&target, &[], &[], &[], &[], schedule()).unwrap();
        for row in &rows {
            assert_eq!(row.temperature_c, NEUTRAL_TEMPERATURE_C);
            assert_eq!(row.precipitation_mm, NEUTRAL_PRECIPITATION_MM);
            assert_eq!(row.wind_speed_ms, NEUTRAL_WIND_SPEED_MS);
            assert_eq!(row.ghi_wm2, NEUTRAL_IRRADIANCE_WM2);
            assert_eq!(row.total_renewables_pct, NEUTRAL_RENEWABLES_PCT);
            assert_eq!(row.carbon_intensity_kg_per_mwh, NEUTRAL_CARBON_KG_PER_MWH);
            assert!(!row.renewable_discount);
            assert!(row.price_carbon_ratio.is_finite());
        }
    }

    #[test]
    fn test_prices_follow_the_calendar_not_interpolation() {
        // 2018-07-15 is a Sunday, 2018-07-16 a Monday.
        let target = vec![ts(15, 17), ts(16, 17), ts(16, 10), ts(16, 23)];
        let rows = align(&target, &[], &[], &[], &[], schedule()).unwrap();
        assert!((rows[0].price_usd_per_kwh - 0.27).abs() < 1e-12);
        assert!((rows[1].price_usd_per_kwh - 0.52).abs() < 1e-12);
        assert!((rows[2].price_usd_per_kwh - 0.33).abs() < 1e-12);
        assert!((rows[3].price_usd_per_kwh - 0.27).abs() < 1e-12);
    }

    #[test]
    fn test_derived_features_recompute_from_columns() {
        let target = vec![ts(16, 17)];
        let weather = vec![weather(16, 26.85)];
        let solar = vec![solar(16, 17, 600.0)];
        let grid = vec![grid(16, 17, 30.0)];
        let carbon = vec![carbon(16, 17, 400.0)];
        let rows = align(&target, &weather, &solar, &grid, &carbon, schedule()).unwrap();

        let row = &rows[0];
        // Monday evening peak in July.
        assert!((row.price_usd_per_kwh - 0.52).abs() < 1e-12);
        assert!((row.price_carbon_ratio - 0.52 / 4.0).abs() < 1e-9);
        assert!((row.solar_efficiency - 600.0 / 300.0).abs() < 1e-9);
        // Components 30 + 20 + 10 + 8 = 68, above the discount threshold.
        assert!(row.renewable_discount);
    }

    #[test]
    fn test_unsorted_index_fails_fast() {
        let target = vec![ts(16, 10), ts(16, 9)];
        let err = align(&target, &[], &[], &[], &[], schedule()).unwrap_err();
        assert!(matches!(err, PipelineError::UnsortedIndex(1)));
    }

    #[test]
    fn test_empty_index_yields_no_rows() {
        let rows = align(&[], &[], &[], &[], &[], schedule()).unwrap();
        assert!(rows.is_empty());
    }
}
