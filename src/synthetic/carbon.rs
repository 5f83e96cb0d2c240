//! # Synthetic Grid Carbon Intensity
//!
//! Carbon intensity derived from the simultaneous renewables share: a fossil
//! baseline reduced in proportion to renewables penetration, shifted by a
//! demand offset during the evening peak and overnight trough.

use chrono::Timelike;
use rand_distr::{Distribution, Normal};

use super::seeded_rng;
use crate::domain::{CarbonRecord, DateRange, GridMixRecord};

const BASELINE_KG_PER_MWH: f64 = 450.0;
/// Intensity shed per percentage point of renewables share.
const RENEWABLES_SLOPE_KG_PER_PCT: f64 = 3.2;
const EVENING_PEAK_OFFSET_KG: f64 = 50.0;
const OVERNIGHT_OFFSET_KG: f64 = -30.0;
const NOISE_STD_KG: f64 = 20.0;
const MIN_INTENSITY_KG_PER_MWH: f64 = 200.0;
const MAX_INTENSITY_KG_PER_MWH: f64 = 700.0;

fn demand_offset(hour: u32) -> f64 {
    match hour {
        17..=20 => EVENING_PEAK_OFFSET_KG,
        0..=5 => OVERNIGHT_OFFSET_KG,
        _ => 0.0,
    }
}

/// Expected intensity before noise and clamping. Strictly decreasing in the
/// renewables share for any fixed hour.
fn expected_intensity(hour: u32, total_renewables_pct: f64) -> f64 {
    BASELINE_KG_PER_MWH - total_renewables_pct * RENEWABLES_SLOPE_KG_PER_PCT + demand_offset(hour)
}

/// Generate one carbon record per grid-mix record inside the range.
pub fn generate_carbon(
    range: DateRange,
    grid_mix: &[GridMixRecord],
    seed: Option<u64>,
) -> Vec<CarbonRecord> {
    let mut rng = seeded_rng(seed);
    let noise = Normal::new(0.0, NOISE_STD_KG).unwrap();

    grid_mix
        .iter()
        .filter(|record| range.contains(record.timestamp))
        .map(|record| {
            let value = expected_intensity(record.timestamp.hour(), record.total_renewables_pct)
                + noise.sample(&mut rng);
            CarbonRecord {
                timestamp: record.timestamp,
                carbon_intensity_kg_per_mwh: value
                    .clamp(MIN_INTENSITY_KG_PER_MWH, MAX_INTENSITY_KG_PER_MWH),
            }
        })
        .collect()
}
