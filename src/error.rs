use thiserror::Error;

/// Errors surfaced before any pipeline work starts. Degenerate input
/// (a chromosome or group with no segments) is not an error and flows
/// through as empty results.
#[derive(Debug, Error)]
pub enum ConvaqError {
    #[error("unknown model: {0:?} (expected \"statistical\" or \"query\")")]
    InvalidModel(String),

    #[error("unknown variation type: {0:?} (expected gain, loss, loh or normal)")]
    InvalidVariationType(String),

    #[error("unknown comparison: {0:?} (expected <, >, <= or >=)")]
    InvalidComparison(String),

    #[error("malformed predicate: {0:?}")]
    InvalidPredicate(String),

    #[error("statistical cutoff must lie in [0, 1], got {0}")]
    InvalidCutoff(f64),

    #[error("q-value computation requires at least one repetition")]
    NoRepetitions,

    #[error("worker count must be nonzero; 0 is resolved by the caller")]
    NoWorkers,
}
