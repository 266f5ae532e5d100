//! Construction-time configuration for [`BigLock`](crate::BigLock).

use thiserror::Error;

/// Upper bound on a single predictive sleep. One second covers a five level
/// tree with 30ms reads and a handful of waiting threads.
pub const DEFAULT_MAX_SLEEP_US: u64 = 1_000_000;

/// Hold measurements at or above this are treated as invalid.
pub const DEFAULT_MAX_HELD_US: u64 = 250_000;

/// Holds at or below this never schedule a backoff; a sleep syscall costs more.
pub const DEFAULT_MIN_BACKOFF_US: u64 = 100;

/// Assumed cost of one cache miss when no miss wait time was recorded.
pub const DEFAULT_MISS_COST_US: u64 = 20_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("{key} must be greater than zero")]
    ZeroCeiling { key: &'static str },
}

/// Tuning knobs for the big lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BigLockConfig {
    /// Run the predictive backoff model. When `false` the lock is a plain mutex.
    pub adaptive_timing: bool,
    /// Ceiling on any single predictive sleep (`max_possible_sleep`).
    pub max_sleep_us: u64,
    /// Sanity ceiling on a measured hold duration.
    pub max_held_us: u64,
    pub min_backoff_us: u64,
    /// Per-miss hold estimate used when the oracle reports misses but no wait time.
    pub miss_cost_us: u64,
}

impl Default for BigLockConfig {
    fn default() -> Self {
        Self {
            // The model relies on a cheap high-resolution timer.
            adaptive_timing: cfg!(target_os = "linux"),
            max_sleep_us: DEFAULT_MAX_SLEEP_US,
            max_held_us: DEFAULT_MAX_HELD_US,
            min_backoff_us: DEFAULT_MIN_BACKOFF_US,
            miss_cost_us: DEFAULT_MISS_COST_US,
        }
    }
}

impl BigLockConfig {
    pub const ENV_ADAPTIVE_TIMING: &'static str = "BIGLOCK_ADAPTIVE_TIMING";
    pub const ENV_MAX_SLEEP_US: &'static str = "BIGLOCK_MAX_SLEEP_US";
    pub const ENV_MAX_HELD_US: &'static str = "BIGLOCK_MAX_HELD_US";
    pub const ENV_MIN_BACKOFF_US: &'static str = "BIGLOCK_MIN_BACKOFF_US";
    pub const ENV_MISS_COST_US: &'static str = "BIGLOCK_MISS_COST_US";

    /// A configuration with the adaptive model forced off.
    pub fn plain() -> Self {
        Self {
            adaptive_timing: false,
            ..Self::default()
        }
    }

    /// A configuration with the adaptive model forced on.
    pub fn adaptive() -> Self {
        Self {
            adaptive_timing: true,
            ..Self::default()
        }
    }

    pub fn with_adaptive_timing(mut self, enabled: bool) -> Self {
        self.adaptive_timing = enabled;
        self
    }

    pub fn with_max_sleep_us(mut self, micros: u64) -> Self {
        self.max_sleep_us = micros;
        self
    }

    pub fn with_max_held_us(mut self, micros: u64) -> Self {
        self.max_held_us = micros;
        self
    }

    pub fn with_min_backoff_us(mut self, micros: u64) -> Self {
        self.min_backoff_us = micros;
        self
    }

    pub fn with_miss_cost_us(mut self, micros: u64) -> Self {
        self.miss_cost_us = micros;
        self
    }

    /// Defaults overridden by any `BIGLOCK_*` environment variables that are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(raw) = lookup(Self::ENV_ADAPTIVE_TIMING) {
            cfg.adaptive_timing = parse_bool(Self::ENV_ADAPTIVE_TIMING, &raw)?;
        }
        if let Some(raw) = lookup(Self::ENV_MAX_SLEEP_US) {
            cfg.max_sleep_us = parse_micros(Self::ENV_MAX_SLEEP_US, &raw)?;
        }
        if let Some(raw) = lookup(Self::ENV_MAX_HELD_US) {
            cfg.max_held_us = parse_micros(Self::ENV_MAX_HELD_US, &raw)?;
        }
        if let Some(raw) = lookup(Self::ENV_MIN_BACKOFF_US) {
            cfg.min_backoff_us = parse_micros(Self::ENV_MIN_BACKOFF_US, &raw)?;
        }
        if let Some(raw) = lookup(Self::ENV_MISS_COST_US) {
            cfg.miss_cost_us = parse_micros(Self::ENV_MISS_COST_US, &raw)?;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_sleep_us == 0 {
            return Err(ConfigError::ZeroCeiling {
                key: Self::ENV_MAX_SLEEP_US,
            });
        }
        if self.max_held_us == 0 {
            return Err(ConfigError::ZeroCeiling {
                key: Self::ENV_MAX_HELD_US,
            });
        }
        Ok(())
    }
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: raw.to_string(),
        }),
    }
}

fn parse_micros(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim()
        .replace('_', "")
        .parse()
        .map_err(|_| ConfigError::InvalidValue {
            key,
            value: raw.to_string(),
        })
}
