//! # Synthetic Solar Irradiance
//!
//! Hourly irradiance built from a cosine diurnal arc scaled by season and a
//! stochastic cloud factor. Direct and diffuse components are noisy fixed
//! fractions of the global value. Night hours are exact zeros.

use chrono::{Datelike, Timelike};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use std::f64::consts::PI;

use super::{climate_month, seasonal_cycle, seeded_rng};
use crate::domain::{DateRange, SiteCoordinates, SolarRecord, SourceTag};

/// Hours with any possible direct sun, inclusive on both ends.
const DAYLIGHT_START_HOUR: u32 = 5;
const DAYLIGHT_END_HOUR: u32 = 19;
/// Clear-sky irradiance at full elevation and peak season.
const PEAK_IRRADIANCE_WM2: f64 = 1000.0;
/// Below this global value the direct component is treated as fully diffuse.
const DNI_THRESHOLD_WM2: f64 = 100.0;
const SUMMER_CLEAR_PROBABILITY: f64 = 0.8;
const WINTER_CLEAR_PROBABILITY: f64 = 0.6;
const BASE_TEMPERATURE_C: f64 = 15.0;
const SEASONAL_SWING_C: f64 = 10.0;
const DIURNAL_SWING_C: f64 = 5.0;
const NIGHT_COOLING_C: f64 = -2.0;
const TEMPERATURE_NOISE_STD_C: f64 = 2.0;
const WIND_MEAN_MS: f64 = 3.5;
const WIND_STD_MS: f64 = 1.5;

/// Cosine elevation proxy, 1.0 at solar noon and 0.0 once the sun is down.
pub(crate) fn solar_elevation_factor(hour: u32) -> f64 {
    (PI * (hour as f64 - 12.0).abs() / 12.0).cos().max(0.0)
}

fn diurnal_temperature(hour: u32) -> f64 {
    if (6..=18).contains(&hour) {
        DIURNAL_SWING_C * (PI * (hour as f64 - 6.0) / 12.0).sin()
    } else {
        NIGHT_COOLING_C
    }
}

/// Generate one solar record per hour in the range.
pub fn generate_solar(
    range: DateRange,
    site: SiteCoordinates,
    seed: Option<u64>,
) -> Vec<SolarRecord> {
    let mut rng = seeded_rng(seed);
    let temp_noise = Normal::new(0.0, TEMPERATURE_NOISE_STD_C).unwrap();
    let wind = Normal::new(WIND_MEAN_MS, WIND_STD_MS).unwrap();

    range
        .hourly_index()
        .into_iter()
        .map(|timestamp| {
            let hour = timestamp.hour();
            let seasonal = seasonal_cycle(timestamp.date(), site.latitude);

            let (ghi_wm2, dni_wm2, dhi_wm2) =
                if (DAYLIGHT_START_HOUR..=DAYLIGHT_END_HOUR).contains(&hour) {
                    let elevation = solar_elevation_factor(hour);
                    let season_factor = 0.7 + 0.3 * seasonal;
                    let clear_probability =
                        if (5..=9).contains(&climate_month(timestamp.month(), site.latitude)) {
                            SUMMER_CLEAR_PROBABILITY
                        } else {
                            WINTER_CLEAR_PROBABILITY
                        };
                    let cloud_factor = if rng.gen_bool(clear_probability) {
                        1.0
                    } else {
                        rng.gen_range(0.2..0.8)
                    };

                    let ghi = PEAK_IRRADIANCE_WM2 * elevation * season_factor * cloud_factor;
                    let dni = if ghi > DNI_THRESHOLD_WM2 {
                        ghi * rng.gen_range(0.7..0.9)
                    } else {
                        0.0
                    };
                    let dhi = ghi * rng.gen_range(0.1..0.3);
                    (ghi.max(0.0), dni.max(0.0), dhi.max(0.0))
                } else {
                    (0.0, 0.0, 0.0)
                };

            let temperature_c = BASE_TEMPERATURE_C
                + SEASONAL_SWING_C * seasonal
                + diurnal_temperature(hour)
                + temp_noise.sample(&mut rng);
            let wind_speed_ms = wind.sample(&mut rng).max(0.0);

            SolarRecord {
                timestamp,
                ghi_wm2,
                dni_wm2,
                dhi_wm2,
                temperature_c,
                wind_speed_ms,
                source: SourceTag::Synthetic,
            }
        })
        .collect()
}
