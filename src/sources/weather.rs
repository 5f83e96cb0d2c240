//! Daily-summaries weather source (NCEI station archive)
//!
//! Each configured station is one ranked candidate. Records come back as
//! JSON rows of string-typed fields; missing fields are substituted per
//! record (mean of max/min for a missing average, zero rainfall, a nominal
//! wind speed) and rows without a usable date are skipped, never fatal.

use chrono::{NaiveDate, NaiveDateTime};
use itertools::Itertools;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::WeatherSourceConfig;
use crate::domain::{DateRange, SiteCoordinates, SourceTag, WeatherRecord};
use crate::error::FetchError;
use crate::sources::fetch::{FetchRequest, PayloadFetcher};
use crate::sources::resolver::SourceCandidate;

/// Substituted when neither the average nor the max/min pair is usable.
pub const DEFAULT_TEMPERATURE_C: f64 = 20.0;
/// The daily-summaries dataset carries no wind field at these stations.
pub const DEFAULT_WIND_SPEED_MS: f64 = 2.5;

/// One station in the ranked candidate list.
pub struct StationCandidate {
    station_id: String,
    base_url: String,
    dataset: String,
    token: String,
    timeout: Duration,
    range: DateRange,
}

impl StationCandidate {
    pub fn new(config: &WeatherSourceConfig, station_id: String, range: DateRange) -> Self {
        Self {
            station_id,
            base_url: config.base_url.clone(),
            dataset: config.dataset.clone(),
            token: config.token.clone(),
            timeout: Duration::from_secs(config.request_timeout_secs),
            range,
        }
    }

    /// Build candidates for a station list, preserving its rank order.
    pub fn for_stations(
        config: &WeatherSourceConfig,
        station_ids: &[String],
        range: DateRange,
    ) -> Vec<Self> {
        station_ids
            .iter()
            .map(|id| Self::new(config, id.clone(), range))
            .collect()
    }
}

impl SourceCandidate for StationCandidate {
    type Record = WeatherRecord;

    fn id(&self) -> String {
        self.station_id.clone()
    }

    fn request(&self) -> FetchRequest {
        let url = format!(
            "{}?dataset={}&dataTypes=TAVG,TMAX,TMIN,PRCP&stations={}&startDate={}&endDate={}&format=json&units=metric&token={}",
            self.base_url.trim_end_matches('/'),
            self.dataset,
            self.station_id,
            self.range.start(),
            self.range.end(),
            self.token,
        );
        FetchRequest {
            url,
            timeout: self.timeout,
        }
    }

    fn parse(&self, payload: &str) -> Result<Vec<WeatherRecord>, FetchError> {
        let raw: Vec<RawDailySummary> =
            serde_json::from_str(payload).map_err(|e| FetchError::Malformed(e.to_string()))?;
        let total = raw.len();
        let records: Vec<WeatherRecord> = raw.into_iter().filter_map(|r| r.into_record()).collect();
        let skipped = total - records.len();
        if skipped > 0 {
            debug!(station_id = %self.station_id, skipped, "dropped rows without a usable date");
        }
        Ok(records)
    }
}

/// Bounding-box station lookup around a site.
///
/// Discovery is best effort: one request, no retries. Callers fall back to
/// their configured station list when it fails or finds nothing.
pub struct StationSearch {
    search_url: String,
    dataset: String,
    token: String,
    timeout: Duration,
    radius_deg: f64,
    limit: usize,
}

impl StationSearch {
    pub fn from_config(config: &WeatherSourceConfig) -> Self {
        Self {
            search_url: config.search_url.clone(),
            dataset: config.search_dataset.clone(),
            token: config.token.clone(),
            timeout: Duration::from_secs(config.search_timeout_secs),
            radius_deg: config.search_radius_deg,
            limit: config.max_discovered,
        }
    }

    fn request(&self, site: SiteCoordinates) -> FetchRequest {
        let extent = format!(
            "{},{},{},{}",
            site.latitude - self.radius_deg,
            site.longitude - self.radius_deg,
            site.latitude + self.radius_deg,
            site.longitude + self.radius_deg,
        );
        let url = format!(
            "{}?dataset={}&extent={}&limit={}&includemetadata=false&token={}",
            self.search_url.trim_end_matches('/'),
            self.dataset,
            extent,
            self.limit,
            self.token,
        );
        FetchRequest {
            url,
            timeout: self.timeout,
        }
    }

    fn parse(&self, payload: &str) -> Result<Vec<String>, FetchError> {
        let response: SearchResponse =
            serde_json::from_str(payload).map_err(|e| FetchError::Malformed(e.to_string()))?;
        Ok(response
            .results
            .into_iter()
            .flat_map(|r| r.stations)
            .unique()
            .take(self.limit)
            .collect())
    }

    /// Find station ids near the site, nearest results first.
    pub async fn discover(
        &self,
        fetcher: &dyn PayloadFetcher,
        site: SiteCoordinates,
    ) -> Result<Vec<String>, FetchError> {
        let payload = fetcher.fetch(&self.request(site)).await?;
        self.parse(&payload)
    }
}

// NCEI response structures

#[derive(Debug, Deserialize)]
struct RawDailySummary {
    #[serde(rename = "DATE")]
    date: Option<String>,
    #[serde(rename = "TAVG")]
    tavg: Option<String>,
    #[serde(rename = "TMAX")]
    tmax: Option<String>,
    #[serde(rename = "TMIN")]
    tmin: Option<String>,
    #[serde(rename = "PRCP")]
    prcp: Option<String>,
}

impl RawDailySummary {
    fn into_record(self) -> Option<WeatherRecord> {
        let date = parse_date(self.date.as_deref()?)?;

        let temperature_c = parse_value(self.tavg.as_deref())
            .or_else(|| {
                let tmax = parse_value(self.tmax.as_deref())?;
                let tmin = parse_value(self.tmin.as_deref())?;
                Some((tmax + tmin) / 2.0)
            })
            .unwrap_or(DEFAULT_TEMPERATURE_C);

        let precipitation_mm = parse_value(self.prcp.as_deref()).unwrap_or(0.0);

        Some(WeatherRecord {
            date,
            temperature_c,
            precipitation_mm,
            wind_speed_ms: DEFAULT_WIND_SPEED_MS,
            source: SourceTag::Station,
        })
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
}

fn parse_value(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse().ok())
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    stations: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> WeatherSourceConfig {
        WeatherSourceConfig {
            token: "test-token".to_string(),
            ..WeatherSourceConfig::default()
        }
    }

    fn range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2018, 7, 1).unwrap(),
            NaiveDate::from_ymd_opt(2018, 7, 2).unwrap(),
        )
        .unwrap()
    }

    fn candidate() -> StationCandidate {
        StationCandidate::new(&config(), "USC00042294".to_string(), range())
    }

    #[test]
    fn test_request_carries_station_range_and_token() {
        let request = candidate().request();
        assert!(request.url.contains("stations=USC00042294"));
        assert!(request.url.contains("startDate=2018-07-01"));
        assert!(request.url.contains("endDate=2018-07-02"));
        assert!(request.url.contains("dataTypes=TAVG,TMAX,TMIN,PRCP"));
        assert!(request.url.contains("units=metric"));
        assert!(request.url.contains("token=test-token"));
        assert_eq!(request.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_parse_reads_average_temperature() {
        let payload = r#"[{"DATE":"2018-07-01","TAVG":"24.5","PRCP":"1.2"}]"#;
        let records = candidate().parse(payload).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2018, 7, 1).unwrap());
        assert!((records[0].temperature_c - 24.5).abs() < 1e-9);
        assert!((records[0].precipitation_mm - 1.2).abs() < 1e-9);
        assert!((records[0].wind_speed_ms - DEFAULT_WIND_SPEED_MS).abs() < 1e-9);
        assert_eq!(records[0].source, SourceTag::Station);
    }

    #[test]
    fn test_parse_derives_average_from_max_and_min() {
        let payload = r#"[{"DATE":"2018-07-01","TMAX":"30.0","TMIN":"20.0"}]"#;
        let records = candidate().parse(payload).unwrap();
        assert!((records[0].temperature_c - 25.0).abs() < 1e-9);
        assert_eq!(records[0].precipitation_mm, 0.0);
    }

    #[test]
    fn test_parse_falls_back_to_default_temperature() {
        let payload = r#"[{"DATE":"2018-07-01","TMAX":"30.0"}]"#;
        let records = candidate().parse(payload).unwrap();
        assert!((records[0].temperature_c - DEFAULT_TEMPERATURE_C).abs() < 1e-9);
    }

    #[test]
    fn test_parse_ignores_unparseable_values() {
        let payload = r#"[{"DATE":"2018-07-01","TAVG":"","PRCP":"T"}]"#;
        let records = candidate().parse(payload).unwrap();
        assert!((records[0].temperature_c - DEFAULT_TEMPERATURE_C).abs() < 1e-9);
        assert_eq!(records[0].precipitation_mm, 0.0);
    }

    #[test]
    fn test_parse_accepts_timestamped_dates_and_skips_dateless_rows() {
        let payload = r#"[
            {"DATE":"2018-07-01T00:00:00","TAVG":"22.0"},
            {"TAVG":"23.0"},
            {"DATE":"not a date","TAVG":"24.0"}
        ]"#;
        let records = candidate().parse(payload).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2018, 7, 1).unwrap());
    }

    #[test]
    fn test_parse_rejects_non_json_payload() {
        let err = candidate().parse("<html>rate limited</html>").unwrap_err();
        assert!(matches!(err, FetchError::Malformed(_)));
    }

    #[test]
    fn test_for_stations_preserves_rank_order() {
        let cfg = config();
        let candidates = StationCandidate::for_stations(&cfg, &cfg.stations, range());
        assert_eq!(candidates.len(), 5);
        assert_eq!(candidates[0].id(), "USC00042294");
        assert_eq!(candidates[4].id(), "USC00047740");
    }

    #[test]
    fn test_search_request_builds_bounding_box() {
        let search = StationSearch::from_config(&config());
        let request = search.request(SiteCoordinates::new(34.0, -118.0));
        assert!(request.url.contains("extent=33.5,-118.5,34.5,-117.5"));
        assert!(request.url.contains("limit=5"));
        assert!(request.url.contains("includemetadata=false"));
        assert_eq!(request.timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_search_parse_flattens_and_dedups_stations() {
        let search = StationSearch::from_config(&config());
        let payload = r#"{"results":[
            {"stations":["USC00042294","USC00045114"]},
            {"stations":["USC00045114","USC00046719"]}
        ]}"#;
        let ids = search.parse(payload).unwrap();
        assert_eq!(ids, vec!["USC00042294", "USC00045114", "USC00046719"]);
    }

    #[test]
    fn test_search_parse_handles_empty_results() {
        let search = StationSearch::from_config(&config());
        assert!(search.parse(r#"{"results":[]}"#).unwrap().is_empty());
        assert!(search.parse(r#"{}"#).unwrap().is_empty());
    }
}
