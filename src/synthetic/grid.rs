//! # Synthetic Grid Renewables Mix
//!
//! Hourly per-technology shares for a single regional grid: solar follows
//! the diurnal sun arc, wind and hydro follow offset seasonal sinusoids,
//! and a small baseload "other" share covers geothermal and biomass.

use chrono::{Datelike, Timelike};
use rand_distr::{Distribution, Normal};
use std::f64::consts::PI;

use super::solar::solar_elevation_factor;
use super::{annual_cycle, seeded_rng};
use crate::domain::{DateRange, GridMixRecord};

/// Hours when utility solar contributes at all, inclusive.
const SOLAR_SHARE_START_HOUR: u32 = 6;
const SOLAR_SHARE_END_HOUR: u32 = 18;
const SOLAR_SHARE_PEAK_PCT: f64 = 35.0;
const SOLAR_SHARE_NOISE_STD: f64 = 2.0;
const WIND_SHARE_BASE_PCT: f64 = 18.0;
const WIND_SHARE_SWING_PCT: f64 = 8.0;
const WIND_SHARE_NOISE_STD: f64 = 5.0;
const WIND_SHARE_MAX_PCT: f64 = 45.0;
const HYDRO_SHARE_BASE_PCT: f64 = 15.0;
const HYDRO_SHARE_SWING_PCT: f64 = 10.0;
const HYDRO_SHARE_NOISE_STD: f64 = 2.0;
const HYDRO_SHARE_MIN_PCT: f64 = 8.0;
const HYDRO_SHARE_MAX_PCT: f64 = 30.0;
const OTHER_SHARE_BASE_PCT: f64 = 8.0;
const OTHER_SHARE_NOISE_STD: f64 = 1.0;
const OTHER_SHARE_MIN_PCT: f64 = 5.0;

/// Generate one grid-mix record per hour in the range.
pub fn generate_grid_mix(range: DateRange, seed: Option<u64>) -> Vec<GridMixRecord> {
    let mut rng = seeded_rng(seed);
    let solar_noise = Normal::new(0.0, SOLAR_SHARE_NOISE_STD).unwrap();
    let wind_noise = Normal::new(0.0, WIND_SHARE_NOISE_STD).unwrap();
    let hydro_noise = Normal::new(0.0, HYDRO_SHARE_NOISE_STD).unwrap();
    let other_noise = Normal::new(0.0, OTHER_SHARE_NOISE_STD).unwrap();

    range
        .hourly_index()
        .into_iter()
        .map(|timestamp| {
            let hour = timestamp.hour();
            let month = timestamp.month() as f64;
            let day_of_year = timestamp.ordinal() as f64;

            let solar_pct = if (SOLAR_SHARE_START_HOUR..=SOLAR_SHARE_END_HOUR).contains(&hour) {
                let seasonal = 0.8 + 0.4 * annual_cycle(day_of_year);
                (SOLAR_SHARE_PEAK_PCT * solar_elevation_factor(hour) * seasonal
                    + solar_noise.sample(&mut rng))
                .max(0.0)
            } else {
                0.0
            };

            let wind_pct = (WIND_SHARE_BASE_PCT
                + WIND_SHARE_SWING_PCT * (2.0 * PI * (month - 3.0) / 12.0).sin()
                + wind_noise.sample(&mut rng))
            .clamp(0.0, WIND_SHARE_MAX_PCT);

            let hydro_pct = (HYDRO_SHARE_BASE_PCT
                + HYDRO_SHARE_SWING_PCT * (2.0 * PI * (month - 5.0) / 12.0).sin()
                + hydro_noise.sample(&mut rng))
            .clamp(HYDRO_SHARE_MIN_PCT, HYDRO_SHARE_MAX_PCT);

            let other_pct =
                (OTHER_SHARE_BASE_PCT + other_noise.sample(&mut rng)).max(OTHER_SHARE_MIN_PCT);

            GridMixRecord::from_components(timestamp, solar_pct, wind_pct, hydro_pct, other_pct)
        })
        .collect()
}
