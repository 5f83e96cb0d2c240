//! # Synthetic Signal Generation
//!
//! Statistical stand-ins for the upstream providers, used whenever source
//! resolution is exhausted. Each generator is a pure function of its inputs
//! and an optional seed: a fixed seed reproduces the series exactly, no seed
//! draws from entropy. The shapes are tuned for plausibility, not for
//! agreement with any particular climate dataset.

pub mod carbon;
pub mod grid;
pub mod solar;
pub mod weather;

pub use carbon::generate_carbon;
pub use grid::generate_grid_mix;
pub use solar::generate_solar;
pub use weather::generate_weather;

use chrono::{Datelike, NaiveDate};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::f64::consts::PI;

/// Day of year where the annual sinusoid crosses zero on the way up, close
/// to the March equinox.
pub(crate) const SEASONAL_PHASE_DAY: f64 = 80.0;
pub(crate) const DAYS_PER_YEAR: f64 = 365.0;

pub(crate) fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Annual sinusoid in [-1, 1], peaking in northern midsummer.
pub(crate) fn annual_cycle(day_of_year: f64) -> f64 {
    (2.0 * PI * (day_of_year - SEASONAL_PHASE_DAY) / DAYS_PER_YEAR).sin()
}

/// Annual cycle for a site, shifted half a year below the equator.
pub(crate) fn seasonal_cycle(date: NaiveDate, latitude: f64) -> f64 {
    let mut day_of_year = date.ordinal() as f64;
    if latitude < 0.0 {
        day_of_year = (day_of_year + DAYS_PER_YEAR / 2.0) % DAYS_PER_YEAR;
    }
    annual_cycle(day_of_year)
}

/// Calendar month mapped onto the equivalent northern climate month, so
/// month-gated regimes (rain seasons, clear-sky odds) stay seasonal below
/// the equator.
pub(crate) fn climate_month(month: u32, latitude: f64) -> u32 {
    if latitude < 0.0 {
        (month + 5) % 12 + 1
    } else {
        month
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_annual_cycle_peaks_in_summer() {
        let midsummer = date(2023, 7, 1).ordinal() as f64;
        let midwinter = date(2023, 1, 15).ordinal() as f64;
        assert!(annual_cycle(midsummer) > 0.8);
        assert!(annual_cycle(midwinter) < -0.8);
    }

    #[test]
    fn test_seasonal_cycle_flips_below_equator() {
        let july = date(2023, 7, 15);
        let january = date(2023, 1, 15);
        assert!(seasonal_cycle(july, 34.05) > 0.0);
        assert!(seasonal_cycle(july, -33.87) < 0.0);
        assert!(seasonal_cycle(january, 34.05) < 0.0);
        assert!(seasonal_cycle(january, -33.87) > 0.0);
    }

    #[test]
    fn test_climate_month_shift() {
        assert_eq!(climate_month(1, 34.05), 1);
        assert_eq!(climate_month(1, -33.87), 7);
        assert_eq!(climate_month(7, -33.87), 1);
        assert_eq!(climate_month(12, -33.87), 6);
    }
}
