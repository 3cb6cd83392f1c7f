/*!
 * Error Types
 * Configuration errors with thiserror, miette, and serde support
 *
 * Lock and unlock never fail; the only fallible surfaces are building a
 * registry from configuration and starting its sweep thread.
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Registry configuration errors
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ConfigError {
    #[error("Shard count must be a non-zero power of two, got {0}")]
    #[diagnostic(
        code(config::invalid_shard_count),
        help("Use 8, 16, 32 or 64 shards. The shard index is computed with a bit mask.")
    )]
    InvalidShardCount(usize),

    #[error("Low-water mark {low} must be below high-water mark {high}")]
    #[diagnostic(
        code(config::invalid_water_marks),
        help("Leave a gap between the marks so the registry does not flip modes on every call.")
    )]
    InvalidWaterMarks { low: i64, high: i64 },

    #[error("Cleanup interval must be greater than zero")]
    #[diagnostic(
        code(config::zero_interval),
        help("The sweep thread waits this long between cycles.")
    )]
    ZeroCleanupInterval,

    #[error("Cleanup interval of {secs}s exceeds the maximum of {max_secs}s")]
    #[diagnostic(
        code(config::interval_too_long),
        help("Idle entries are only reclaimed when a sweep runs. Use at most 30 days.")
    )]
    CleanupIntervalTooLong { secs: u64, max_secs: u64 },

    #[error("Invalid value {value:?} for {key}")]
    #[diagnostic(
        code(config::invalid_env),
        help("Environment overrides must be unsigned integers.")
    )]
    InvalidEnv { key: String, value: String },

    #[error("Failed to parse configuration: {0}")]
    #[diagnostic(code(config::parse_failed))]
    Parse(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Lock manager startup errors
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum StartError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to spawn sweep thread: {0}")]
    #[diagnostic(
        code(manager::spawn_failed),
        help("The process may have hit its thread limit.")
    )]
    Spawn(String),
}

impl From<std::io::Error> for StartError {
    fn from(err: std::io::Error) -> Self {
        StartError::Spawn(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConfigError::InvalidWaterMarks { low: 600, high: 500 };
        assert_eq!(
            err.to_string(),
            "Low-water mark 600 must be below high-water mark 500"
        );
    }

    #[test]
    fn test_start_error_wraps_config() {
        let err: StartError = ConfigError::ZeroCleanupInterval.into();
        assert_eq!(err.to_string(), "Cleanup interval must be greater than zero");
    }

    #[test]
    fn test_error_serializes_tagged() {
        let json = serde_json::to_string(&ConfigError::InvalidShardCount(12)).unwrap();
        assert_eq!(
            json,
            r#"{"error_type":"invalid_shard_count","details":12}"#
        );
    }
}
