use chrono::NaiveDate;
use std::time::Duration;
use thiserror::Error;

/// Errors produced while fetching a payload from an upstream provider.
///
/// Every variant except [`FetchError::Malformed`] is transient: the request
/// may succeed if retried against the same candidate. A malformed payload is
/// a property of the response body, so retrying the same request would only
/// replay the same bytes.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Upstream returned HTTP status {0}")]
    Status(u16),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed payload: {0}")]
    Malformed(String),
}

impl FetchError {
    /// Whether retrying the same request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        !matches!(self, FetchError::Malformed(_))
    }
}

/// Structural problems with a tariff schedule definition.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("Tariff schedule '{0}' has no rules")]
    Empty(String),

    #[error("Tariff schedule '{0}' does not end with an unconditional fallback rule")]
    MissingFallback(String),

    #[error("Tariff schedule '{0}' has rules shadowed by the unconditional rule '{1}'")]
    ShadowedRules(String, String),
}

/// Errors surfaced by the feature pipeline itself.
///
/// Provider outages never appear here. Exhausting every ranked source is an
/// expected outcome that the pipeline absorbs by synthesizing the signal, so
/// only caller mistakes and structural problems abort a build.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Date range ends on {end} before it starts on {start}")]
    InvertedRange { start: NaiveDate, end: NaiveDate },

    #[error("Invalid site coordinates: {0}")]
    InvalidCoordinates(String),

    #[error("Unknown tariff schedule '{0}'")]
    UnknownSchedule(String),

    #[error("Target index is not sorted ascending at position {0}")]
    UnsortedIndex(usize),

    #[error(transparent)]
    InvalidSchedule(#[from] ScheduleError),
}
