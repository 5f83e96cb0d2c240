//! # Feature Pipeline
//!
//! Orchestrates the per-site flow: resolve station weather and per-year
//! irradiance through the ranked-source resolver, substitute synthetic
//! series where a signal exhausts, synthesize the grid mix and carbon
//! intensity, then align everything onto the caller's target index with
//! tariff prices attached. Each run executes inside a span tagged with a
//! fresh run id and the site, so concurrent sites stay distinguishable in
//! the logs.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;
use validator::Validate;

use crate::align::align;
use crate::config::Config;
use crate::domain::{
    AlignedFeatureRow, DateRange, SignalKind, SiteCoordinates, SolarRecord, WeatherRecord,
};
use crate::error::PipelineError;
use crate::sources::{
    HttpFetcher, IrradianceCandidate, PayloadFetcher, ResolveOutcome, ResolverStats, RetryPolicy,
    SourceResolver, StationCandidate, StationSearch,
};
use crate::synthetic::{generate_carbon, generate_grid_mix, generate_solar, generate_weather};
use crate::tariff;

/// Per-signal seed offsets keep co-generated series decorrelated while one
/// base seed reproduces the whole run.
const WEATHER_SEED_OFFSET: u64 = 0;
const SOLAR_SEED_OFFSET: u64 = 1;
const GRID_SEED_OFFSET: u64 = 2;
const CARBON_SEED_OFFSET: u64 = 3;

/// A labelled site to build features for.
#[derive(Debug, Clone)]
pub struct SiteRequest {
    pub label: String,
    pub site: SiteCoordinates,
}

/// Builds aligned feature tables for sites over a date range.
#[derive(Clone)]
pub struct FeaturePipeline {
    config: Arc<Config>,
    fetcher: Arc<dyn PayloadFetcher>,
    resolver: Arc<SourceResolver>,
}

impl FeaturePipeline {
    pub fn new(config: Config) -> Self {
        Self::with_fetcher(config, Arc::new(HttpFetcher::new()))
    }

    /// Build against a caller-supplied transport.
    pub fn with_fetcher(config: Config, fetcher: Arc<dyn PayloadFetcher>) -> Self {
        let policy = RetryPolicy::from_config(&config.resolver);
        let resolver = Arc::new(SourceResolver::new(Arc::clone(&fetcher), policy));
        Self {
            config: Arc::new(config),
            fetcher,
            resolver,
        }
    }

    pub fn resolver_stats(&self) -> Arc<ResolverStats> {
        self.resolver.stats()
    }

    /// Produce one fully populated row per target timestamp.
    ///
    /// The index is the caller's grid; any frequency works as long as it is
    /// sorted ascending. Source exhaustion falls back to synthesis, so the
    /// only failures are invalid inputs.
    pub async fn build_feature_table(
        &self,
        site: SiteCoordinates,
        range: DateRange,
        target_index: &[NaiveDateTime],
        schedule_name: &str,
    ) -> Result<Vec<AlignedFeatureRow>, PipelineError> {
        site.validate()
            .map_err(|_| PipelineError::InvalidCoordinates(site.to_string()))?;
        let schedule = tariff::builtin(schedule_name)
            .ok_or_else(|| PipelineError::UnknownSchedule(schedule_name.to_string()))?;

        let run_id = Uuid::new_v4();
        let span = info_span!("feature_pipeline", %run_id, %site, %range);
        async {
            let weather = self.weather_series(site, range).await;
            let solar = self.solar_series(site, range).await;

            let grid_mix = generate_grid_mix(range, self.seed_for(GRID_SEED_OFFSET));
            let carbon = generate_carbon(range, &grid_mix, self.seed_for(CARBON_SEED_OFFSET));
            debug!(
                records = grid_mix.len(),
                mean_renewables_pct = mean(grid_mix.iter().map(|r| r.total_renewables_pct)),
                "grid mix synthesized"
            );
            debug!(
                records = carbon.len(),
                mean_carbon_kg_per_mwh =
                    mean(carbon.iter().map(|r| r.carbon_intensity_kg_per_mwh)),
                "carbon intensity synthesized"
            );

            let rows = align(target_index, &weather, &solar, &grid_mix, &carbon, schedule)?;
            info!(
                rows = rows.len(),
                weather = weather.len(),
                solar = solar.len(),
                "feature table built"
            );
            Ok(rows)
        }
        .instrument(span)
        .await
    }

    /// Run one pipeline task per labelled site, at most
    /// `pipeline.max_parallel_sites` in flight, and collect `(label, result)`
    /// pairs in request order.
    pub async fn build_feature_tables(
        &self,
        requests: &[SiteRequest],
        range: DateRange,
        target_index: &[NaiveDateTime],
        schedule_name: &str,
    ) -> Vec<(String, Result<Vec<AlignedFeatureRow>, PipelineError>)> {
        let batch_size = self.config.pipeline.max_parallel_sites.max(1);
        let target_index: Arc<[NaiveDateTime]> = Arc::from(target_index);
        let schedule_name: Arc<str> = Arc::from(schedule_name);

        let mut results = Vec::with_capacity(requests.len());
        // Batches keep the number of concurrent upstream fetches bounded.
        for chunk in requests.chunks(batch_size) {
            let mut tasks = JoinSet::new();
            for (position, request) in chunk.iter().enumerate() {
                let pipeline = self.clone();
                let request = request.clone();
                let target_index = Arc::clone(&target_index);
                let schedule_name = Arc::clone(&schedule_name);
                tasks.spawn(async move {
                    let result = pipeline
                        .build_feature_table(request.site, range, &target_index, &schedule_name)
                        .await;
                    (position, request.label, result)
                });
            }

            let mut batch = Vec::with_capacity(chunk.len());
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(entry) => batch.push(entry),
                    Err(error) => warn!(%error, "site task aborted"),
                }
            }
            batch.sort_by_key(|(position, _, _)| *position);
            results.extend(batch.into_iter().map(|(_, label, result)| (label, result)));
        }
        results
    }

    /// Daily weather from ranked stations, synthetic when every station
    /// exhausts.
    async fn weather_series(&self, site: SiteCoordinates, range: DateRange) -> Vec<WeatherRecord> {
        let stations = self.station_ranking(site).await;
        let candidates = StationCandidate::for_stations(&self.config.weather, &stations, range);
        let resolved = self
            .resolver
            .resolve(SignalKind::Weather, &candidates, self.deadline())
            .await;
        match resolved.outcome {
            ResolveOutcome::Fetched { .. } => resolved.records,
            ResolveOutcome::Exhausted => {
                info!(signal = %SignalKind::Weather, "falling back to synthetic series");
                generate_weather(range, site, self.seed_for(WEATHER_SEED_OFFSET))
            }
        }
    }

    /// Station ids to try in rank order. Discovery is best effort: any
    /// failure or empty result leaves the configured list in place.
    async fn station_ranking(&self, site: SiteCoordinates) -> Vec<String> {
        let configured = &self.config.weather.stations;
        if !self.config.weather.discover_stations {
            return configured.clone();
        }
        let search = StationSearch::from_config(&self.config.weather);
        match search.discover(self.fetcher.as_ref(), site).await {
            Ok(found) if !found.is_empty() => {
                debug!(stations = found.len(), "using discovered stations");
                found
            }
            Ok(_) => {
                warn!("station discovery returned nothing, using configured stations");
                configured.clone()
            }
            Err(error) => {
                warn!(%error, "station discovery failed, using configured stations");
                configured.clone()
            }
        }
    }

    /// Hourly irradiance spliced from one resolve per calendar year, each
    /// year falling back to synthesis on its own.
    async fn solar_series(&self, site: SiteCoordinates, range: DateRange) -> Vec<SolarRecord> {
        let mut records = Vec::new();
        for year in range.years() {
            let Some(year_range) = range.clamp_to_year(year) else {
                continue;
            };
            let candidate = IrradianceCandidate::new(&self.config.solar, site, year, year_range);
            let resolved = self
                .resolver
                .resolve(
                    SignalKind::Solar,
                    std::slice::from_ref(&candidate),
                    self.deadline(),
                )
                .await;
            match resolved.outcome {
                ResolveOutcome::Fetched { .. } => records.extend(resolved.records),
                ResolveOutcome::Exhausted => {
                    info!(signal = %SignalKind::Solar, year, "falling back to synthetic series");
                    records.extend(generate_solar(
                        year_range,
                        site,
                        self.seed_for(SOLAR_SEED_OFFSET),
                    ));
                }
            }
        }
        records.sort_by_key(|record| record.timestamp);
        records
    }

    fn seed_for(&self, offset: u64) -> Option<u64> {
        self.config
            .synthesis
            .random_seed
            .map(|seed| seed.wrapping_add(offset))
    }

    /// One wall-clock budget covering a whole resolve call.
    fn deadline(&self) -> Option<Instant> {
        self.config
            .resolver
            .resolve_deadline_secs
            .map(|secs| Instant::now() + Duration::from_secs(secs))
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (count, sum) = values.fold((0usize, 0.0), |(count, sum), v| (count + 1, sum + v));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
