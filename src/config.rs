/*!
 * Registry Configuration
 *
 * Cleanup schedule, reclamation thresholds and adaptive storage settings.
 * Loadable from JSON or overridden from the environment.
 */

use crate::errors::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// Default period between cleanup sweeps
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(180);
/// Longest accepted period between cleanup sweeps
pub const MAX_CLEANUP_INTERVAL: Duration = Duration::from_secs(30 * 24 * 60 * 60);
/// Default idle time before an entry may be reclaimed
pub const DEFAULT_IDLE_THRESHOLD: Duration = Duration::from_secs(30 * 60);
/// Default minimum entry lifetime before it may be reclaimed
pub const DEFAULT_MIN_LIFETIME: Duration = Duration::from_secs(60 * 60);
/// Outstanding lock calls above which the registry shards its storage
pub const DEFAULT_HIGH_WATER: i64 = 1000;
/// Default shard count in sharded mode
pub const DEFAULT_SHARDS: usize = 32;
/// Minimum time spent sharded before reverting to a single map
pub const DEFAULT_MIN_SHARD_DWELL: Duration = Duration::from_secs(5);

/// Named lock registry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct LockConfig {
    /// Period between sweeps (default: 180s)
    #[serde(with = "secs")]
    pub cleanup_interval: Duration,

    /// Entries unused for longer than this are reclaimable (default: 30m)
    #[serde(with = "secs")]
    pub idle_threshold: Duration,

    /// Entries younger than this are never reclaimed (default: 60m)
    #[serde(with = "secs")]
    pub min_lifetime: Duration,

    /// Switch to sharded storage above this many outstanding lock calls
    pub high_water: i64,

    /// Switch back to flat storage below this many outstanding lock calls
    pub low_water: i64,

    /// Number of shards used in sharded mode (power of two)
    pub shard_count: usize,

    /// Minimum time in sharded mode before switching back
    #[serde(with = "secs")]
    pub min_shard_dwell: Duration,

    /// Disable to pin the registry to a single flat map
    pub adaptive: bool,
}

impl LockConfig {
    /// Create default configuration
    pub fn new() -> Self {
        Self {
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            idle_threshold: DEFAULT_IDLE_THRESHOLD,
            min_lifetime: DEFAULT_MIN_LIFETIME,
            high_water: DEFAULT_HIGH_WATER,
            low_water: DEFAULT_HIGH_WATER / 2,
            shard_count: DEFAULT_SHARDS,
            min_shard_dwell: DEFAULT_MIN_SHARD_DWELL,
            adaptive: true,
        }
    }

    /// Short cycles and low thresholds for tests and local development
    pub fn aggressive() -> Self {
        Self {
            cleanup_interval: Duration::from_millis(50),
            idle_threshold: Duration::from_millis(100),
            min_lifetime: Duration::from_millis(100),
            high_water: 64,
            low_water: 32,
            shard_count: 8,
            min_shard_dwell: Duration::from_millis(10),
            adaptive: true,
        }
    }

    /// Single flat map, never switches storage
    pub fn fixed_flat() -> Self {
        Self {
            adaptive: false,
            ..Self::new()
        }
    }

    /// Set the shard count from the CPU count (4x cores, clamped to 8..=512)
    pub fn with_auto_shards(mut self) -> Self {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or_else(|_| {
                warn!("Failed to detect CPU count, defaulting to 8");
                8
            });
        self.shard_count = (cores * 4).next_power_of_two().clamp(8, 512);
        self
    }

    /// Set the high-water mark, moving the low-water mark to half of it
    pub fn with_high_water(mut self, high_water: i64) -> Self {
        self.high_water = high_water;
        self.low_water = high_water / 2;
        self
    }

    /// Check internal consistency
    pub fn validate(&self) -> ConfigResult<()> {
        if self.shard_count == 0 || !self.shard_count.is_power_of_two() {
            return Err(ConfigError::InvalidShardCount(self.shard_count));
        }
        if self.low_water >= self.high_water {
            return Err(ConfigError::InvalidWaterMarks {
                low: self.low_water,
                high: self.high_water,
            });
        }
        if self.cleanup_interval.is_zero() {
            return Err(ConfigError::ZeroCleanupInterval);
        }
        if self.cleanup_interval > MAX_CLEANUP_INTERVAL {
            return Err(ConfigError::CleanupIntervalTooLong {
                secs: self.cleanup_interval.as_secs(),
                max_secs: MAX_CLEANUP_INTERVAL.as_secs(),
            });
        }
        Ok(())
    }

    /// Parse and validate a JSON document; missing fields take defaults
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden from the process environment
    ///
    /// Environment variables:
    /// - NAMED_LOCK_CLEANUP_INTERVAL_SECS
    /// - NAMED_LOCK_IDLE_SECS
    /// - NAMED_LOCK_MIN_LIFETIME_SECS
    /// - NAMED_LOCK_HIGH_WATER (low-water follows at half unless NAMED_LOCK_LOW_WATER is set)
    /// - NAMED_LOCK_LOW_WATER
    /// - NAMED_LOCK_SHARDS
    /// - NAMED_LOCK_ADAPTIVE (0/false disables switching)
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new();

        if let Some(v) = parse_u64(&lookup, "NAMED_LOCK_CLEANUP_INTERVAL_SECS")? {
            config.cleanup_interval = Duration::from_secs(v);
        }
        if let Some(v) = parse_u64(&lookup, "NAMED_LOCK_IDLE_SECS")? {
            config.idle_threshold = Duration::from_secs(v);
        }
        if let Some(v) = parse_u64(&lookup, "NAMED_LOCK_MIN_LIFETIME_SECS")? {
            config.min_lifetime = Duration::from_secs(v);
        }
        if let Some(v) = parse_u64(&lookup, "NAMED_LOCK_HIGH_WATER")? {
            config = config.with_high_water(to_mark("NAMED_LOCK_HIGH_WATER", v)?);
        }
        if let Some(v) = parse_u64(&lookup, "NAMED_LOCK_LOW_WATER")? {
            config.low_water = to_mark("NAMED_LOCK_LOW_WATER", v)?;
        }
        if let Some(v) = parse_u64(&lookup, "NAMED_LOCK_SHARDS")? {
            config.shard_count = usize::try_from(v).map_err(|_| invalid_env("NAMED_LOCK_SHARDS", v))?;
        }
        if let Some(raw) = lookup("NAMED_LOCK_ADAPTIVE") {
            config.adaptive = match raw.trim() {
                "1" | "true" => true,
                "0" | "false" => false,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        key: "NAMED_LOCK_ADAPTIVE".into(),
                        value: raw,
                    })
                }
            };
        }

        config.validate()?;
        Ok(config)
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_u64<F>(lookup: &F, key: &str) -> ConfigResult<Option<u64>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv {
                key: key.to_string(),
                value: raw,
            }),
    }
}

fn to_mark(key: &str, v: u64) -> ConfigResult<i64> {
    i64::try_from(v).map_err(|_| invalid_env(key, v))
}

fn invalid_env(key: &str, v: u64) -> ConfigError {
    ConfigError::InvalidEnv {
        key: key.to_string(),
        value: v.to_string(),
    }
}

/// Durations as fractional seconds
mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
