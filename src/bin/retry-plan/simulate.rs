use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use retry_op::{
    Decision, RetryCapability, RetryConfig, RetryError, RetryState, Retrying, TimeoutSchedule,
};
use serde::Serialize;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("simulated failure")]
pub struct SimulatedFailure;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationReport {
    pub attempts: u32,
    pub succeeded: bool,
    pub elapsed_ms: u64,
    pub failure: Option<String>,
}

/// Replays the schedule against an action failing `failures` times, on a
/// virtual clock that jumps straight over every delay.
pub fn simulate_virtual(
    schedule: TimeoutSchedule,
    config: &RetryConfig,
    failures: u32,
) -> SimulationReport {
    let mut state = RetryState::new(schedule, config.options());
    let start = Instant::now();
    let mut elapsed = Duration::ZERO;
    state.begin(start);

    loop {
        if state.attempts() > failures {
            return report(&state, elapsed, None);
        }
        let Some(now) = start.checked_add(elapsed) else {
            return report(&state, elapsed, Some("clock overflow".to_string()));
        };
        match state.record_failure(SimulatedFailure, now) {
            Decision::Retry(delay) => {
                log::debug!("virtual attempt {} failed, waiting {delay:?}", state.attempts());
                elapsed = elapsed.saturating_add(delay);
                state.advance();
            }
            Decision::GiveUp(reason) => {
                return report(&state, elapsed, Some(format!("{reason:?}")));
            }
        }
    }
}

fn report(
    state: &RetryState<SimulatedFailure>,
    elapsed: Duration,
    failure: Option<String>,
) -> SimulationReport {
    SimulationReport {
        attempts: state.attempts(),
        succeeded: failure.is_none(),
        elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        failure,
    }
}

#[async_trait]
trait Endpoint: Send + Sync {
    async fn request(&self) -> Result<u32, SimulatedFailure>;
}

struct FlakyEndpoint {
    failures: u32,
    calls: AtomicU32,
}

impl RetryCapability for FlakyEndpoint {
    const METHODS: &'static [&'static str] = &["request"];
}

#[async_trait]
impl Endpoint for FlakyEndpoint {
    async fn request(&self) -> Result<u32, SimulatedFailure> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            Err(SimulatedFailure)
        } else {
            Ok(call)
        }
    }
}

#[async_trait]
impl<S: Endpoint> Endpoint for Retrying<S> {
    async fn request(&self) -> Result<u32, SimulatedFailure> {
        self.call("request", |inner| inner.request()).await
    }
}

/// Runs the same scenario through the retry wrapper with real timers.
pub async fn simulate_live(
    config: RetryConfig,
    failures: u32,
) -> Result<SimulationReport, RetryError> {
    let endpoint = FlakyEndpoint {
        failures,
        calls: AtomicU32::new(0),
    };
    let wrapped = Retrying::new(endpoint, config)?;
    let start = std::time::Instant::now();
    let outcome = wrapped.request().await;

    Ok(SimulationReport {
        attempts: wrapped.inner().calls.load(Ordering::SeqCst),
        succeeded: outcome.is_ok(),
        elapsed_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        failure: outcome.err().map(|err| err.to_string()),
    })
}
