use thiserror::Error;

/// Errors raised when engine configuration invariants are violated.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("lane count must be at least 1")]
    NoLanes,
    #[error("level count must be at least 1")]
    NoLevels,
    #[error("{field} must be positive (got {value:.3})")]
    NotPositive { field: &'static str, value: f64 },
    #[error("{field} must not be negative (got {value:.3})")]
    Negative { field: &'static str, value: f64 },
    #[error("{field} is too large to represent as a duration (got {value})")]
    OutOfRange { field: &'static str, value: f64 },
    #[error("{field} must be a finite number (got {value})")]
    NotFinite { field: &'static str, value: f64 },
    #[error("judgment line {line:.1} lies outside the field height {height:.1}")]
    LineOutsideField { line: f64, height: f64 },
    #[error("{keys} lane keys configured for {lanes} lanes")]
    KeyCountMismatch { keys: usize, lanes: usize },
}

/// Faults raised by the engine when a caller breaks an orchestration contract.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("level index {index} out of range for a program of {count} levels")]
    LevelOutOfRange { index: usize, count: usize },
    #[error("{field} rating must be between 1 and 5 (got {value})")]
    RatingOutOfRange { field: &'static str, value: u8 },
    #[error("no level is waiting for feedback")]
    NotAwaitingFeedback,
}

/// Persistence failures. Never fatal: the caller is told about each failed
/// record and the collector keeps it queued for retry.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink io failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv write failure: {0}")]
    Csv(#[from] csv::Error),
    #[error("sqlite failure: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("could not encode record: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("sink unavailable: {0}")]
    Unavailable(String),
}
