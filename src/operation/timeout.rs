use std::fmt;
use std::sync::Arc;
use std::time::Duration;

type TimeoutCallback = dyn Fn(u32) + Send + Sync;

/// Per-attempt deadline: if an attempt is still running after `after`, the
/// callback receives the current attempt number.
///
/// This is a liveness signal only. It does not count as a failure and does
/// not stop the attempt.
#[derive(Clone)]
pub struct AttemptTimeout {
    after: Duration,
    on_timeout: Arc<TimeoutCallback>,
}

impl AttemptTimeout {
    pub fn new<F>(after: Duration, on_timeout: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        Self {
            after,
            on_timeout: Arc::new(on_timeout),
        }
    }

    pub fn after(&self) -> Duration {
        self.after
    }

    pub(crate) fn fire(&self, attempt: u32) {
        log::debug!("attempt {attempt} still running after {:?}", self.after);
        (self.on_timeout)(attempt);
    }
}

impl fmt::Debug for AttemptTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttemptTimeout")
            .field("after", &self.after)
            .finish_non_exhaustive()
    }
}
