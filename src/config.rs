use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub weather: WeatherSourceConfig,
    pub solar: SolarSourceConfig,
    pub resolver: ResolverConfig,
    pub tariff: TariffConfig,
    pub synthesis: SynthesisConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherSourceConfig {
    pub base_url: String,
    pub search_url: String,
    pub dataset: String,
    pub search_dataset: String,
    /// Station identifiers in preference order, best candidate first.
    pub stations: Vec<String>,
    pub token: String,
    pub request_timeout_secs: u64,
    pub search_timeout_secs: u64,
    /// Look up nearby stations by bounding box before falling back to the
    /// configured list.
    pub discover_stations: bool,
    pub search_radius_deg: f64,
    pub max_discovered: usize,
}

impl Default for WeatherSourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.ncei.noaa.gov/access/services/data/v1".to_string(),
            search_url: "https://www.ncei.noaa.gov/access/services/search/v1/data".to_string(),
            dataset: "daily-summaries".to_string(),
            search_dataset: "global-summary-of-the-day".to_string(),
            stations: vec![
                "USC00042294".to_string(),
                "USC00045114".to_string(),
                "USC00046719".to_string(),
                "USC00042319".to_string(),
                "USC00047740".to_string(),
            ],
            token: String::new(),
            request_timeout_secs: 30,
            search_timeout_secs: 15,
            discover_stations: false,
            search_radius_deg: 0.5,
            max_discovered: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolarSourceConfig {
    pub base_url: String,
    pub api_key: String,
    pub email: String,
    pub interval_minutes: u32,
    pub request_timeout_secs: u64,
}

impl Default for SolarSourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://developer.nrel.gov/api/nsrdb/v2/solar/psm3-download.csv"
                .to_string(),
            api_key: String::new(),
            email: String::new(),
            interval_minutes: 60,
            request_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    pub max_attempts: u32,
    pub backoff_base_secs: u64,
    pub backoff_cap_secs: u64,
    /// Wall-clock budget for resolving one signal. `None` means unbounded.
    pub resolve_deadline_secs: Option<u64>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_secs: 1,
            backoff_cap_secs: 30,
            resolve_deadline_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TariffConfig {
    pub default_schedule: String,
}

impl Default for TariffConfig {
    fn default() -> Self {
        Self {
            default_schedule: "tou-d-residential".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// Seed for the statistical generators. `None` draws from entropy.
    pub random_seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub max_parallel_sites: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_parallel_sites: 4,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("exogen.toml"))
            .merge(Env::prefixed("EXOGEN__").split("__"));
        Ok(figment.extract()?)
    }
}
