use std::fmt::Display;
use std::future::Future;

use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

use super::handle::RetryOperation;
use super::state::Decision;
use super::timeout::AttemptTimeout;

impl<E> RetryOperation<E>
where
    E: Clone + Display + Send + 'static,
{
    /// Drives `action` to completion, sleeping through the schedule between
    /// failed attempts.
    ///
    /// `action` receives the attempt number and a token that is cancelled
    /// when the operation is stopped or the attempt deadline passes. On
    /// exhaustion the [main error](RetryOperation::main_error) is returned.
    /// A timeout left by an earlier `*_with_timeout` call is cleared.
    pub async fn run<T, F, Fut>(&self, action: F) -> Result<T, E>
    where
        F: FnMut(u32, CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.drive(action, None).await
    }

    /// Like [`RetryOperation::run`], arming `timeout` for every attempt.
    pub async fn run_with_timeout<T, F, Fut>(
        &self,
        action: F,
        timeout: AttemptTimeout,
    ) -> Result<T, E>
    where
        F: FnMut(u32, CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.drive(action, Some(timeout)).await
    }

    async fn drive<T, F, Fut>(
        &self,
        mut action: F,
        timeout: Option<AttemptTimeout>,
    ) -> Result<T, E>
    where
        F: FnMut(u32, CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let cancel = {
            let mut engine = self.lock();
            engine.attempt_timeout = timeout;
            engine.state.begin(Instant::now());
            engine.cancel.clone()
        };

        loop {
            let (attempt, timeout) = {
                let engine = self.lock();
                (engine.state.attempts(), engine.attempt_timeout.clone())
            };

            let err = match attempt_once(&mut action, attempt, &cancel, timeout.as_ref()).await {
                Ok(value) => {
                    log::debug!("attempt {attempt} succeeded");
                    return Ok(value);
                }
                Err(err) => err,
            };

            let decision = self
                .lock()
                .state
                .record_failure(err.clone(), Instant::now());
            match decision {
                Decision::Retry(delay) => {
                    log::debug!("attempt {attempt} failed: {err}; retrying in {delay:?}");
                    tokio::select! {
                        () = sleep(delay) => {}
                        () = cancel.cancelled() => {
                            log::debug!("retry operation stopped while waiting");
                            return Err(self.main_error().unwrap_or(err));
                        }
                    }
                    self.lock().state.advance();
                }
                Decision::GiveUp(reason) => {
                    log::debug!("attempt {attempt} failed: {err}; giving up ({reason:?})");
                    return Err(self.main_error().unwrap_or(err));
                }
            }
        }
    }
}

async fn attempt_once<T, E, F, Fut>(
    action: &mut F,
    attempt: u32,
    cancel: &CancellationToken,
    timeout: Option<&AttemptTimeout>,
) -> Result<T, E>
where
    F: FnMut(u32, CancellationToken) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let token = cancel.child_token();
    let attempt_fut = action(attempt, token.clone());
    tokio::pin!(attempt_fut);

    let Some(timeout) = timeout else {
        return attempt_fut.await;
    };

    tokio::select! {
        outcome = &mut attempt_fut => outcome,
        () = sleep(timeout.after()) => {
            timeout.fire(attempt);
            token.cancel();
            attempt_fut.await
        }
    }
}
