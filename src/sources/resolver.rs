//! # Ranked Source Resolution
//!
//! Tries a ranked list of candidate sources for one signal, retrying each
//! candidate a bounded number of times with exponential backoff before
//! moving to the next. Exhausting every candidate is a normal outcome that
//! the orchestrator answers with synthesis; the resolver itself never
//! generates data.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::ResolverConfig;
use crate::domain::SignalKind;
use crate::error::FetchError;
use crate::sources::fetch::{FetchRequest, PayloadFetcher};

/// A ranked upstream endpoint for one signal.
///
/// Candidates build their own request and parse their own payload. Retry
/// scheduling, backoff, and the overall deadline belong to the resolver.
pub trait SourceCandidate: Send + Sync {
    type Record: Send;

    /// Stable identifier reported in the resolution outcome.
    fn id(&self) -> String;

    fn request(&self) -> FetchRequest;

    /// Parse and validate a payload. Per-record field substitution happens
    /// here; a payload with no usable records is a malformed error.
    fn parse(&self, payload: &str) -> Result<Vec<Self::Record>, FetchError>;
}

/// How a resolution ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// A candidate produced usable records.
    Fetched { source_id: String },
    /// Every candidate failed, or the deadline passed first.
    Exhausted,
}

/// Records together with the outcome that produced them.
#[derive(Debug)]
pub struct ResolvedSeries<R> {
    pub records: Vec<R>,
    pub outcome: ResolveOutcome,
}

impl<R> ResolvedSeries<R> {
    fn exhausted() -> Self {
        Self {
            records: Vec::new(),
            outcome: ResolveOutcome::Exhausted,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.outcome == ResolveOutcome::Exhausted
    }
}

/// Retry bounds applied to every candidate.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_secs(1),
            backoff_cap: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &ResolverConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff_base: Duration::from_secs(config.backoff_base_secs),
            backoff_cap: Duration::from_secs(config.backoff_cap_secs),
        }
    }

    /// Delay before the retry following zero-based `attempt`, doubling from
    /// the base and capped.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        self.backoff_base
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.backoff_cap)
    }
}

/// Operational counters, shared across every resolution of one pipeline.
#[derive(Debug, Default)]
pub struct ResolverStats {
    attempts: AtomicU64,
    successes: AtomicU64,
    exhaustions: AtomicU64,
}

impl ResolverStats {
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    pub fn exhaustions(&self) -> u64 {
        self.exhaustions.load(Ordering::Relaxed)
    }
}

pub struct SourceResolver {
    fetcher: Arc<dyn PayloadFetcher>,
    policy: RetryPolicy,
    stats: Arc<ResolverStats>,
}

impl SourceResolver {
    pub fn new(fetcher: Arc<dyn PayloadFetcher>, policy: RetryPolicy) -> Self {
        Self {
            fetcher,
            policy,
            stats: Arc::new(ResolverStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<ResolverStats> {
        Arc::clone(&self.stats)
    }

    /// Try every candidate in rank order, returning the first usable series.
    ///
    /// `deadline` bounds the whole call. Once it passes, remaining
    /// candidates are abandoned and the outcome is exhaustion, never an
    /// error.
    pub async fn resolve<C: SourceCandidate>(
        &self,
        signal: SignalKind,
        candidates: &[C],
        deadline: Option<Instant>,
    ) -> ResolvedSeries<C::Record> {
        for candidate in candidates {
            if deadline_passed(deadline) {
                warn!(%signal, "resolve deadline passed, abandoning remaining candidates");
                break;
            }
            if let Some(records) = self.try_candidate(signal, candidate, deadline).await {
                self.stats.successes.fetch_add(1, Ordering::Relaxed);
                let source_id = candidate.id();
                info!(%signal, %source_id, records = records.len(), "signal resolved");
                return ResolvedSeries {
                    records,
                    outcome: ResolveOutcome::Fetched { source_id },
                };
            }
        }
        self.stats.exhaustions.fetch_add(1, Ordering::Relaxed);
        info!(%signal, "every candidate exhausted");
        ResolvedSeries::exhausted()
    }

    /// Run one candidate's retry loop. `None` means the candidate is spent,
    /// either by retry budget, a malformed payload, or the deadline.
    async fn try_candidate<C: SourceCandidate>(
        &self,
        signal: SignalKind,
        candidate: &C,
        deadline: Option<Instant>,
    ) -> Option<Vec<C::Record>> {
        let source_id = candidate.id();
        let request = candidate.request();

        for attempt in 0..self.policy.max_attempts {
            if deadline_passed(deadline) {
                warn!(%signal, %source_id, "resolve deadline passed mid-candidate");
                return None;
            }
            self.stats.attempts.fetch_add(1, Ordering::Relaxed);
            debug!(%signal, %source_id, attempt, url = %request.url, "attempting fetch");

            let error = match self.attempt(&request, deadline).await {
                Ok(payload) => match candidate.parse(&payload) {
                    Ok(records) if !records.is_empty() => return Some(records),
                    Ok(_) => FetchError::Malformed("no usable records in payload".to_string()),
                    Err(err) => err,
                },
                Err(err) => err,
            };

            if !error.is_transient() {
                warn!(%signal, %source_id, error = %error, "unusable response, moving on");
                return None;
            }
            debug!(%signal, %source_id, attempt, error = %error, "transient failure");

            if attempt + 1 < self.policy.max_attempts {
                let delay = self.policy.backoff_delay(attempt);
                if delay_outlasts_deadline(deadline, delay) {
                    warn!(%signal, %source_id, "backoff would outlast the deadline");
                    return None;
                }
                tokio::time::sleep(delay).await;
            }
        }
        debug!(%signal, %source_id, "retry budget spent");
        None
    }

    async fn attempt(
        &self,
        request: &FetchRequest,
        deadline: Option<Instant>,
    ) -> Result<String, FetchError> {
        let budget = match deadline {
            Some(deadline) => deadline
                .saturating_duration_since(Instant::now())
                .min(request.timeout),
            None => request.timeout,
        };
        match tokio::time::timeout(budget, self.fetcher.fetch(request)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(budget)),
        }
    }
}

fn deadline_passed(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}

fn delay_outlasts_deadline(deadline: Option<Instant>, delay: Duration) -> bool {
    deadline.is_some_and(|d| Instant::now() + delay >= d)
}
