pub mod fetch;
pub mod resolver;
pub mod solar;
pub mod weather;

pub use fetch::{FetchRequest, HttpFetcher, PayloadFetcher};
pub use resolver::{
    ResolveOutcome, ResolvedSeries, ResolverStats, RetryPolicy, SourceCandidate, SourceResolver,
};
pub use solar::IrradianceCandidate;
pub use weather::{StationCandidate, StationSearch};
