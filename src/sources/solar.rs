//! PSM3 irradiance source (NSRDB CSV download)
//!
//! The provider serves one calendar year per request, so a multi-year range
//! becomes one ranked candidate per year. Payloads are CSV with two
//! provider-metadata lines above the header; rows that fail to parse are
//! skipped and optional fields get nominal defaults.

use chrono::NaiveDate;
use std::time::Duration;
use tracing::debug;

use crate::config::SolarSourceConfig;
use crate::domain::{DateRange, SiteCoordinates, SolarRecord, SourceTag};
use crate::error::FetchError;
use crate::sources::fetch::FetchRequest;
use crate::sources::resolver::SourceCandidate;

/// Provider-metadata lines preceding the CSV header.
const CSV_METADATA_LINES: usize = 2;
/// A real yearly download is thousands of lines; anything this short is a
/// truncated or error payload.
const MIN_PAYLOAD_LINES: usize = 10;
const DEFAULT_AIR_TEMPERATURE_C: f64 = 20.0;
const DEFAULT_WIND_SPEED_MS: f64 = 0.0;

/// One calendar year of irradiance at a site.
pub struct IrradianceCandidate {
    base_url: String,
    api_key: String,
    email: String,
    interval_minutes: u32,
    timeout: Duration,
    site: SiteCoordinates,
    year: i32,
    range: DateRange,
}

impl IrradianceCandidate {
    /// `range` must already be clamped to `year`.
    pub fn new(
        config: &SolarSourceConfig,
        site: SiteCoordinates,
        year: i32,
        range: DateRange,
    ) -> Self {
        Self {
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            email: config.email.clone(),
            interval_minutes: config.interval_minutes,
            timeout: Duration::from_secs(config.request_timeout_secs),
            site,
            year,
            range,
        }
    }
}

impl SourceCandidate for IrradianceCandidate {
    type Record = SolarRecord;

    fn id(&self) -> String {
        format!("psm3-{}", self.year)
    }

    fn request(&self) -> FetchRequest {
        let url = format!(
            "{}?api_key={}&email={}&wkt=POINT({}%20{})&names={}&interval={}&attributes=ghi,dni,dhi,air_temperature,wind_speed&utc=false",
            self.base_url.trim_end_matches('/'),
            self.api_key,
            self.email,
            self.site.longitude,
            self.site.latitude,
            self.year,
            self.interval_minutes,
        );
        FetchRequest {
            url,
            timeout: self.timeout,
        }
    }

    fn parse(&self, payload: &str) -> Result<Vec<SolarRecord>, FetchError> {
        if payload.lines().count() <= MIN_PAYLOAD_LINES {
            return Err(FetchError::Malformed(
                "payload too short for a yearly download".to_string(),
            ));
        }
        let data = payload
            .splitn(CSV_METADATA_LINES + 1, '\n')
            .nth(CSV_METADATA_LINES)
            .unwrap_or("");

        let mut reader = csv::ReaderBuilder::new().from_reader(data.as_bytes());
        let headers = reader
            .headers()
            .map_err(|e| FetchError::Malformed(e.to_string()))?
            .clone();
        let column = |name: &str| headers.iter().position(|h| h.trim() == name);
        let required = |name: &str| {
            column(name)
                .ok_or_else(|| FetchError::Malformed(format!("missing column '{name}'")))
        };

        let year_idx = required("Year")?;
        let month_idx = required("Month")?;
        let day_idx = required("Day")?;
        let hour_idx = required("Hour")?;
        let minute_idx = required("Minute")?;
        let ghi_idx = required("GHI")?;
        let dni_idx = column("DNI");
        let dhi_idx = column("DHI");
        let temperature_idx = column("Temperature");
        let wind_idx = column("Wind Speed");

        let mut records = Vec::new();
        let mut skipped = 0usize;
        for row in reader.records() {
            let row = match row {
                Ok(row) => row,
                Err(_) => {
                    skipped += 1;
                    continue;
                }
            };
            let timestamp = match row_timestamp(
                &row,
                year_idx,
                month_idx,
                day_idx,
                hour_idx,
                minute_idx,
            ) {
                Some(ts) => ts,
                None => {
                    skipped += 1;
                    continue;
                }
            };
            let ghi_wm2 = match numeric(&row, Some(ghi_idx)) {
                Some(value) => value,
                None => {
                    skipped += 1;
                    continue;
                }
            };
            if !self.range.contains(timestamp) {
                continue;
            }
            records.push(SolarRecord {
                timestamp,
                ghi_wm2,
                dni_wm2: numeric(&row, dni_idx).unwrap_or(0.0),
                dhi_wm2: numeric(&row, dhi_idx).unwrap_or(0.0),
                temperature_c: numeric(&row, temperature_idx)
                    .unwrap_or(DEFAULT_AIR_TEMPERATURE_C),
                wind_speed_ms: numeric(&row, wind_idx).unwrap_or(DEFAULT_WIND_SPEED_MS),
                source: SourceTag::Station,
            });
        }
        if skipped > 0 {
            debug!(source_id = %self.id(), skipped, "dropped malformed rows");
        }
        Ok(records)
    }
}

fn row_timestamp(
    row: &csv::StringRecord,
    year_idx: usize,
    month_idx: usize,
    day_idx: usize,
    hour_idx: usize,
    minute_idx: usize,
) -> Option<chrono::NaiveDateTime> {
    let year: i32 = parse_field(row, year_idx)?;
    let month: u32 = parse_field(row, month_idx)?;
    let day: u32 = parse_field(row, day_idx)?;
    let hour: u32 = parse_field(row, hour_idx)?;
    let minute: u32 = parse_field(row, minute_idx)?;
    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, 0)
}

fn parse_field<T: std::str::FromStr>(row: &csv::StringRecord, idx: usize) -> Option<T> {
    row.get(idx)?.trim().parse().ok()
}

fn numeric(row: &csv::StringRecord, idx: Option<usize>) -> Option<f64> {
    idx.and_then(|i| row.get(i)).and_then(|s| s.trim().parse().ok())
}
