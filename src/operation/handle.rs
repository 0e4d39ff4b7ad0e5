use std::fmt::{self, Display};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use rand::Rng;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

use crate::{
    config::{OperationOptions, RetryConfig},
    error::RetryError,
    schedule::{self, TimeoutSchedule},
};

use super::state::{Decision, Exhaustion, RetryState};
use super::timeout::AttemptTimeout;

type Action = Arc<dyn Fn(u32) + Send + Sync>;
type Shared<E> = Arc<Mutex<Engine<E>>>;

pub(super) struct Engine<E> {
    pub(super) state: RetryState<E>,
    pub(super) attempt_timeout: Option<AttemptTimeout>,
    pub(super) cancel: CancellationToken,
    action: Option<Action>,
    timer: Option<JoinHandle<()>>,
    deadline: Option<JoinHandle<()>>,
}

/// How a timer task refers back to its operation. Unref'd timers hold a weak
/// reference and give up if every handle was dropped before they fire.
enum Link<E> {
    Strong(Shared<E>),
    Weak(Weak<Mutex<Engine<E>>>),
}

impl<E> Link<E> {
    fn new(shared: &Shared<E>, unref: bool) -> Self {
        if unref {
            Self::Weak(Arc::downgrade(shared))
        } else {
            Self::Strong(Arc::clone(shared))
        }
    }

    fn upgrade(&self) -> Option<Shared<E>> {
        match self {
            Self::Strong(shared) => Some(Arc::clone(shared)),
            Self::Weak(weak) => weak.upgrade(),
        }
    }
}

/// Stateful retry controller for one logical action.
///
/// The handle is cheap to clone; clones share the same attempt counter,
/// error history and pending timer, so the action can report back through
/// its own copy. Attempts are strictly sequential and at most one retry timer
/// is pending at a time.
///
/// Timers run on the ambient Tokio runtime.
pub struct RetryOperation<E> {
    shared: Shared<E>,
}

impl<E> Clone for RetryOperation<E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<E: Send + 'static> RetryOperation<E> {
    /// Builds the schedule for `config` and wraps it in a fresh operation.
    pub fn new(config: &RetryConfig) -> Result<Self, RetryError> {
        Self::with_rng(config, &mut rand::thread_rng())
    }

    /// Like [`RetryOperation::new`] with an explicit jitter source.
    pub fn with_rng<R: Rng + ?Sized>(
        config: &RetryConfig,
        rng: &mut R,
    ) -> Result<Self, RetryError> {
        let schedule = schedule::build_with_rng(config, rng)?;
        Ok(Self::from_schedule(schedule, config.options()))
    }

    pub(crate) fn from_validated(config: &RetryConfig) -> Self {
        let schedule = schedule::generate(config, &mut rand::thread_rng());
        Self::from_schedule(schedule, config.options())
    }

    /// Wraps a prepared schedule, e.g. one built from explicit delays.
    pub fn from_schedule(schedule: TimeoutSchedule, options: OperationOptions) -> Self {
        let engine = Engine {
            state: RetryState::new(schedule, options),
            attempt_timeout: None,
            cancel: CancellationToken::new(),
            action: None,
            timer: None,
            deadline: None,
        };
        Self {
            shared: Arc::new(Mutex::new(engine)),
        }
    }

    /// Stores `action` and runs it immediately with the current attempt number.
    ///
    /// Scheduled retries call the same action again with the incremented count.
    /// Any timeout armed by an earlier [`RetryOperation::attempt_with_timeout`]
    /// is cleared.
    pub fn attempt<F>(&self, action: F)
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.start(Arc::new(action), None);
    }

    /// Like [`RetryOperation::attempt`], arming `timeout` for every attempt.
    pub fn attempt_with_timeout<F>(&self, action: F, timeout: AttemptTimeout)
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.start(Arc::new(action), Some(timeout));
    }

    fn start(&self, action: Action, timeout: Option<AttemptTimeout>) {
        let attempts = {
            let mut engine = self.lock();
            engine.attempt_timeout = timeout;
            engine.action = Some(Arc::clone(&action));
            engine.state.begin(Instant::now());
            let attempts = engine.state.attempts();
            arm_deadline(&self.shared, &mut engine, attempts);
            attempts
        };
        action(attempts);
    }

    /// Reports the outcome of the current attempt.
    ///
    /// Returns `true` when a retry has been scheduled. `None` means the
    /// attempt succeeded and always returns `false`; so does running out of
    /// delays or exceeding `max_retry_time`. Outside a Tokio runtime the
    /// failure is not recorded and `false` is returned.
    pub fn retry(&self, err: Option<E>) -> bool {
        let mut engine = self.lock();
        if let Some(deadline) = engine.deadline.take() {
            deadline.abort();
        }
        let Some(err) = err else {
            return false;
        };
        // without a runtime nothing can be scheduled; leave the state as it was
        let Ok(runtime) = Handle::try_current() else {
            log::warn!("no Tokio runtime available, failure not recorded");
            return false;
        };

        match engine.state.record_failure(err, Instant::now()) {
            Decision::GiveUp(reason) => {
                log::debug!(
                    "retry operation gave up after {} attempts: {reason:?}",
                    engine.state.attempts()
                );
                false
            }
            Decision::Retry(delay) => {
                let link = Link::new(&self.shared, engine.state.options().unref);
                let timer = runtime.spawn(fire_after(link, delay));
                if let Some(previous) = engine.timer.replace(timer) {
                    previous.abort();
                }
                log::debug!(
                    "attempt {} scheduled in {delay:?}",
                    engine.state.attempts().saturating_add(1)
                );
                true
            }
        }
    }

    /// Shorthand for `retry(result.err())`.
    pub fn retry_result<T>(&self, result: Result<T, E>) -> bool {
        self.retry(result.err())
    }

    /// Cancels pending timers and drops the remaining schedule.
    pub fn stop(&self) {
        let mut engine = self.lock();
        if let Some(timer) = engine.timer.take() {
            timer.abort();
        }
        if let Some(deadline) = engine.deadline.take() {
            deadline.abort();
        }
        engine.state.stop();
        engine.cancel.cancel();
        log::debug!(
            "retry operation stopped after {} attempts",
            engine.state.attempts()
        );
    }

    /// Restores the attempt counter and schedule for another logical action.
    pub fn reset(&self) {
        let mut engine = self.lock();
        engine.state.reset();
        if engine.cancel.is_cancelled() {
            engine.cancel = CancellationToken::new();
        }
    }

    pub fn attempts(&self) -> u32 {
        self.lock().state.attempts()
    }

    pub fn exhaustion(&self) -> Option<Exhaustion> {
        self.lock().state.exhaustion()
    }

    pub fn schedule(&self) -> TimeoutSchedule {
        self.lock().state.schedule().clone()
    }

    pub fn options(&self) -> OperationOptions {
        self.lock().state.options()
    }

    /// Whether a retry timer is armed and has not fired yet.
    pub fn is_pending(&self) -> bool {
        self.lock()
            .timer
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }

    /// Token cancelled by [`RetryOperation::stop`].
    pub fn cancellation_token(&self) -> CancellationToken {
        self.lock().cancel.clone()
    }

    pub(super) fn lock(&self) -> MutexGuard<'_, Engine<E>> {
        lock(&self.shared)
    }
}

impl<E: Clone + Send + 'static> RetryOperation<E> {
    /// Recorded failures in chronological order.
    pub fn errors(&self) -> Vec<E> {
        self.lock().state.errors().to_vec()
    }
}

impl<E: Clone + Display + Send + 'static> RetryOperation<E> {
    /// The most representative failure, see [`RetryState::main_error`].
    pub fn main_error(&self) -> Option<E> {
        self.lock().state.main_error().cloned()
    }
}

impl<E: Send + 'static> fmt::Debug for RetryOperation<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let engine = self.lock();
        f.debug_struct("RetryOperation")
            .field("attempts", &engine.state.attempts())
            .field("remaining", &engine.state.remaining())
            .field("errors", &engine.state.errors().len())
            .finish_non_exhaustive()
    }
}

fn lock<E>(shared: &Mutex<Engine<E>>) -> MutexGuard<'_, Engine<E>> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

fn arm_deadline<E: Send + 'static>(shared: &Shared<E>, engine: &mut Engine<E>, attempt: u32) {
    let Some(timeout) = engine.attempt_timeout.clone() else {
        return;
    };
    let Ok(runtime) = Handle::try_current() else {
        log::warn!("no Tokio runtime available, attempt deadline not armed");
        return;
    };
    let link = Link::new(shared, engine.state.options().unref);
    let task = runtime.spawn(async move {
        sleep(timeout.after()).await;
        if link.upgrade().is_some() {
            timeout.fire(attempt);
        }
    });
    if let Some(previous) = engine.deadline.replace(task) {
        previous.abort();
    }
}

async fn fire_after<E: Send + 'static>(link: Link<E>, delay: Duration) {
    sleep(delay).await;
    let Some(shared) = link.upgrade() else {
        log::debug!("retry operation dropped before its timer fired");
        return;
    };

    let (action, attempts) = {
        let mut engine = lock(&shared);
        engine.timer = None;
        let attempts = engine.state.advance();
        arm_deadline(&shared, &mut engine, attempts);
        (engine.action.clone(), attempts)
    };

    if let Some(action) = action {
        action(attempts);
    }
}
