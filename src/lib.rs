//! Exponential backoff schedules and a stateful retry operation.
//!
//! A [`RetryConfig`] expands into a [`TimeoutSchedule`] of delays. A
//! [`RetryOperation`] draws down that schedule as failures are reported and
//! decides after each one whether to wait and retry or give up, keeping the
//! error history so the most representative failure can be reported at the
//! end. [`Retrying`] applies the same engine to every call of a wrapped
//! service.
//!
//! ```no_run
//! use retry_op::{create_operation, RetryConfig};
//!
//! # async fn fetch() -> Result<String, String> { Ok(String::new()) }
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RetryConfig::default().with_retries(4).with_min_timeout_ms(100);
//! let op = create_operation::<String>(&config)?;
//! let body = op.run(|_attempt, _cancel| fetch()).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod operation;
pub mod schedule;
pub mod wrap;

pub use config::{OperationOptions, RetryConfig};
pub use error::RetryError;
pub use operation::{AttemptTimeout, Decision, Exhaustion, RetryOperation, RetryState};
pub use schedule::{ScheduleSource, TimeoutSchedule};
pub use wrap::{MethodSelection, RetryCapability, Retrying};

/// Builds a delay schedule from a configuration, or copies an explicit list.
pub fn build_schedule<'a>(
    source: impl Into<ScheduleSource<'a>>,
) -> Result<TimeoutSchedule, RetryError> {
    source.into().build()
}

/// Delay in milliseconds before retry number `attempt` (zero based).
pub fn delay_for(attempt: u32, config: &RetryConfig) -> u64 {
    schedule::delay_for(attempt, config)
}

/// Creates a retry operation for one logical action.
pub fn create_operation<E: Send + 'static>(
    config: &RetryConfig,
) -> Result<RetryOperation<E>, RetryError> {
    RetryOperation::new(config)
}

/// Wraps `inner` so the named operations, or all of them when `methods` is
/// `None`, retry according to `config`. Names outside
/// [`RetryCapability::METHODS`] are rejected.
pub fn wrap_methods<S: RetryCapability>(
    inner: S,
    config: RetryConfig,
    methods: Option<&[&str]>,
) -> Result<Retrying<S>, RetryError> {
    match methods {
        Some(names) => Retrying::with_methods(inner, config, names.iter().copied()),
        None => Retrying::new(inner, config),
    }
}
