// Error Types
// Configuration, epoch parsing and engine lifecycle failures

use thiserror::Error;

/// An environment override could not be parsed into its config field.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },

    #[error("{key} must be positive, got {value}")]
    NonPositive { key: &'static str, value: f64 },

    #[error("min_time_scale ({min}) exceeds max_time_scale ({max})")]
    TimeScaleRange { min: f64, max: f64 },
}

/// Timestamp string that none of the accepted formats could read.
#[derive(Debug, Error, PartialEq)]
#[error("unparseable impact epoch {input:?}")]
pub struct EpochParseError {
    pub input: String,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to spawn simulation loop: {0}")]
    Spawn(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
