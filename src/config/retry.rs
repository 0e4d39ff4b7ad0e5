use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::RetryError;

const DEFAULT_RETRIES: u32 = 10;
const DEFAULT_FACTOR: f64 = 2.0;
const DEFAULT_MIN_TIMEOUT_MS: u64 = 1_000;

/// Configuration for backoff schedules and retry operations.
///
/// Missing fields fall back to their defaults when deserialized, so a config
/// file only needs to name the values it changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Number of delays in the schedule
    pub retries: u32,
    /// Exponential growth factor applied per attempt
    pub factor: f64,
    /// Delay before the first retry in milliseconds
    pub min_timeout_ms: u64,
    /// Upper bound for any single delay, unbounded when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_timeout_ms: Option<u64>,
    /// Multiply each delay by a random value in `[1, 2)`
    pub randomize: bool,
    /// Keep retrying with the last delay once the schedule runs out
    pub forever: bool,
    /// Pending retry timers do not keep the operation alive
    pub unref: bool,
    /// Wall-clock budget measured from the first attempt, unbounded when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retry_time_ms: Option<u64>,
}

impl RetryConfig {
    /// Creates a configuration with the stock defaults.
    pub fn defaults() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            factor: DEFAULT_FACTOR,
            min_timeout_ms: DEFAULT_MIN_TIMEOUT_MS,
            max_timeout_ms: None,
            randomize: false,
            forever: false,
            unref: false,
            max_retry_time_ms: None,
        }
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_factor(mut self, factor: f64) -> Self {
        self.factor = factor;
        self
    }

    pub fn with_min_timeout_ms(mut self, min_timeout_ms: u64) -> Self {
        self.min_timeout_ms = min_timeout_ms;
        self
    }

    pub fn with_max_timeout_ms(mut self, max_timeout_ms: u64) -> Self {
        self.max_timeout_ms = Some(max_timeout_ms);
        self
    }

    pub fn with_randomize(mut self, randomize: bool) -> Self {
        self.randomize = randomize;
        self
    }

    pub fn with_forever(mut self, forever: bool) -> Self {
        self.forever = forever;
        self
    }

    pub fn with_unref(mut self, unref: bool) -> Self {
        self.unref = unref;
        self
    }

    pub fn with_max_retry_time_ms(mut self, max_retry_time_ms: u64) -> Self {
        self.max_retry_time_ms = Some(max_retry_time_ms);
        self
    }

    /// Effective delay cap, `u64::MAX` when unbounded.
    pub fn max_timeout_ms_or_unbounded(&self) -> u64 {
        self.max_timeout_ms.unwrap_or(u64::MAX)
    }

    /// Wall-clock budget for the whole operation.
    pub fn max_retry_time(&self) -> Option<Duration> {
        self.max_retry_time_ms.map(Duration::from_millis)
    }

    /// Rejects configurations that cannot produce a schedule.
    pub fn validate(&self) -> Result<(), RetryError> {
        if let Some(max) = self.max_timeout_ms {
            if self.min_timeout_ms > max {
                return Err(RetryError::InvalidConfig(format!(
                    "min_timeout_ms ({}) is greater than max_timeout_ms ({max})",
                    self.min_timeout_ms
                )));
            }
        }
        if !self.factor.is_finite() || self.factor <= 0.0 {
            return Err(RetryError::InvalidConfig(format!(
                "factor must be a finite positive number, got {}",
                self.factor
            )));
        }
        Ok(())
    }

    /// Extracts the flags a retry operation needs beyond its schedule.
    pub fn options(&self) -> OperationOptions {
        OperationOptions {
            forever: self.forever,
            unref: self.unref,
            max_retry_time: self.max_retry_time(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::defaults()
    }
}

/// Flags that shape a retry operation independently of its schedule.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OperationOptions {
    /// Reuse the last delay once the schedule is drained
    pub forever: bool,
    /// Pending timers hold only a weak reference to the operation
    pub unref: bool,
    /// Stop retrying once this much time has passed since the first attempt
    pub max_retry_time: Option<Duration>,
}

impl From<&RetryConfig> for OperationOptions {
    fn from(config: &RetryConfig) -> Self {
        config.options()
    }
}
