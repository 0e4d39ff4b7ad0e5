use rand::Rng;

use crate::{config::RetryConfig, error::RetryError};

use super::timeouts::TimeoutSchedule;

/// Input accepted by [`ScheduleSource::build`]: a configuration to expand, or
/// a caller-supplied list of delays used as-is.
#[derive(Clone, Copy, Debug)]
pub enum ScheduleSource<'a> {
    Config(&'a RetryConfig),
    Explicit(&'a [u64]),
}

impl<'a> From<&'a RetryConfig> for ScheduleSource<'a> {
    fn from(config: &'a RetryConfig) -> Self {
        Self::Config(config)
    }
}

impl<'a> From<&'a [u64]> for ScheduleSource<'a> {
    fn from(delays: &'a [u64]) -> Self {
        Self::Explicit(delays)
    }
}

impl<'a> From<&'a Vec<u64>> for ScheduleSource<'a> {
    fn from(delays: &'a Vec<u64>) -> Self {
        Self::Explicit(delays.as_slice())
    }
}

impl ScheduleSource<'_> {
    /// Produces the schedule. Explicit lists are copied unchanged.
    pub fn build(self) -> Result<TimeoutSchedule, RetryError> {
        match self {
            Self::Config(config) => build(config),
            Self::Explicit(delays) => Ok(TimeoutSchedule::from_delays(delays)),
        }
    }
}

/// Builds the sorted delay schedule for `config` using the thread-local RNG.
pub fn build(config: &RetryConfig) -> Result<TimeoutSchedule, RetryError> {
    build_with_rng(config, &mut rand::thread_rng())
}

/// Builds the sorted delay schedule for `config`, drawing jitter from `rng`.
pub fn build_with_rng<R: Rng + ?Sized>(
    config: &RetryConfig,
    rng: &mut R,
) -> Result<TimeoutSchedule, RetryError> {
    config.validate()?;
    Ok(generate(config, rng))
}

/// Delay in milliseconds before retry number `attempt` (zero based).
pub fn delay_for(attempt: u32, config: &RetryConfig) -> u64 {
    delay_for_with_rng(attempt, config, &mut rand::thread_rng())
}

/// `round(r * min_timeout * factor^attempt)` capped at `max_timeout`, where
/// `r` is 1, or uniform in `[1, 2)` when `randomize` is set.
pub fn delay_for_with_rng<R: Rng + ?Sized>(
    attempt: u32,
    config: &RetryConfig,
    rng: &mut R,
) -> u64 {
    let random = if config.randomize {
        rng.gen_range(1.0..2.0)
    } else {
        1.0
    };
    let growth = config.factor.powf(f64::from(attempt));
    let raw = (random * config.min_timeout_ms as f64 * growth).round();
    // float-to-int casts saturate, NaN maps to 0
    (raw as u64).min(config.max_timeout_ms_or_unbounded())
}

/// Expands an already validated configuration.
pub(crate) fn generate<R: Rng + ?Sized>(config: &RetryConfig, rng: &mut R) -> TimeoutSchedule {
    let mut delays: Vec<u64> = (0..config.retries)
        .map(|attempt| delay_for_with_rng(attempt, config, rng))
        .collect();

    if config.forever && delays.is_empty() {
        delays.push(delay_for_with_rng(config.retries, config, rng));
    }

    // jitter and the forever top-up can both break generation order
    let schedule = TimeoutSchedule::sorted(delays);
    log::trace!("built retry schedule: {:?}", schedule.as_slice());
    schedule
}
