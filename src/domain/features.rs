use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Renewables share above which the discount flag is raised, percent.
pub const RENEWABLES_DISCOUNT_THRESHOLD_PCT: f64 = 50.0;

/// One fully populated row of the aligned feature table.
///
/// Every field is defined for every target timestamp. Gaps that survive
/// alignment are closed by filling before a row is ever emitted, so
/// downstream models never see a hole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedFeatureRow {
    pub timestamp: NaiveDateTime,
    pub temperature_c: f64,
    pub precipitation_mm: f64,
    pub wind_speed_ms: f64,
    pub ghi_wm2: f64,
    pub dni_wm2: f64,
    pub dhi_wm2: f64,
    pub total_renewables_pct: f64,
    pub carbon_intensity_kg_per_mwh: f64,
    pub price_usd_per_kwh: f64,
    pub price_carbon_ratio: f64,
    pub solar_efficiency: f64,
    pub renewable_discount: bool,
}

/// Electricity price per unit of carbon intensity, the cost of a dirty kWh.
///
/// Carbon intensity is rescaled to hundreds of kg/MWh before dividing and
/// the denominator is floored to keep the ratio finite.
pub fn price_carbon_ratio(price_usd_per_kwh: f64, carbon_intensity_kg_per_mwh: f64) -> f64 {
    price_usd_per_kwh / (carbon_intensity_kg_per_mwh / 100.0).max(1e-6)
}

/// Irradiance per kelvin of ambient temperature, a rough panel-yield proxy.
pub fn solar_efficiency(ghi_wm2: f64, temperature_c: f64) -> f64 {
    ghi_wm2 / (temperature_c + 273.15).max(1e-6)
}

/// Whether the renewables share is high enough to flag a discount window.
pub fn renewable_discount(total_renewables_pct: f64) -> bool {
    total_renewables_pct > RENEWABLES_DISCOUNT_THRESHOLD_PCT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_carbon_ratio_rescales_intensity() {
        // 0.40 USD/kWh at 400 kg/MWh -> 0.40 / 4.0
        assert!((price_carbon_ratio(0.40, 400.0) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_price_carbon_ratio_survives_zero_intensity() {
        assert!(price_carbon_ratio(0.30, 0.0).is_finite());
    }

    #[test]
    fn test_solar_efficiency_uses_kelvin() {
        let eff = solar_efficiency(600.0, 26.85);
        assert!((eff - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_solar_efficiency_survives_absolute_zero() {
        assert!(solar_efficiency(100.0, -273.15).is_finite());
    }

    #[test]
    fn test_discount_threshold_is_exclusive() {
        assert!(!renewable_discount(RENEWABLES_DISCOUNT_THRESHOLD_PCT));
        assert!(renewable_discount(RENEWABLES_DISCOUNT_THRESHOLD_PCT + 0.1));
    }
}
