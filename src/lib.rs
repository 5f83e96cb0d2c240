//! Exogenous feature pipeline for energy models.
//!
//! Builds aligned environmental and electricity-market feature tables:
//! - Ranked-source resolution of station weather and solar irradiance with
//!   bounded retries, backoff, and an optional deadline
//! - Deterministic-shape synthetic fallbacks for weather, solar, grid
//!   renewable mix, and carbon intensity
//! - Calendar-rule time-of-use tariff pricing
//! - Temporal alignment of mixed-frequency series onto a caller-supplied
//!   timestamp index, with derived composite features

pub mod align;
pub mod config;
pub mod domain;
pub mod error;
pub mod pipeline;
pub mod sources;
pub mod synthetic;
pub mod tariff;
pub mod telemetry;

pub use align::align;
pub use config::Config;
pub use domain::{AlignedFeatureRow, DateRange, SignalKind, SiteCoordinates, SourceTag};
pub use error::{FetchError, PipelineError, ScheduleError};
pub use pipeline::{FeaturePipeline, SiteRequest};
pub use sources::{PayloadFetcher, ResolveOutcome, SourceResolver};
pub use tariff::{TariffSchedule, TOU_D_RESIDENTIAL};
