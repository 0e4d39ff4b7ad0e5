use std::collections::{HashMap, VecDeque};
use std::fmt::Display;
use std::time::Duration;

use tokio::time::Instant;

use crate::{config::OperationOptions, schedule::TimeoutSchedule};

/// Errors kept once a forever-mode operation has drained its schedule.
const FOREVER_ERROR_TAIL: usize = 1;

/// Why an operation stopped scheduling retries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Exhaustion {
    /// Every scheduled delay was used
    ScheduleSpent,
    /// `max_retry_time` elapsed since the first attempt
    DeadlineExceeded,
    /// `stop()` was called
    Stopped,
}

/// Outcome of reporting a failed attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    /// Wait this long, then run the next attempt
    Retry(Duration),
    /// No further attempts
    GiveUp(Exhaustion),
}

/// Timer-free retry bookkeeping: attempt count, error history and the
/// draw-down copy of the schedule.
///
/// [`RetryOperation`](super::RetryOperation) wraps this with timers; it is
/// public so callers with their own scheduling can drive it directly.
#[derive(Debug, Clone)]
pub struct RetryState<E> {
    original: TimeoutSchedule,
    remaining: VecDeque<u64>,
    cached_last: Option<u64>,
    errors: Vec<E>,
    attempts: u32,
    started: Option<Instant>,
    options: OperationOptions,
    stopped: bool,
    exhaustion: Option<Exhaustion>,
}

impl<E> RetryState<E> {
    pub fn new(schedule: TimeoutSchedule, options: OperationOptions) -> Self {
        let cached_last = if options.forever {
            schedule.last()
        } else {
            None
        };
        Self {
            remaining: schedule.as_slice().iter().copied().collect(),
            original: schedule,
            cached_last,
            errors: Vec::new(),
            attempts: 1,
            started: None,
            options,
            stopped: false,
            exhaustion: None,
        }
    }

    /// Marks the start of the first attempt; `max_retry_time` counts from here.
    pub fn begin(&mut self, now: Instant) {
        self.started = Some(now);
        self.exhaustion = None;
    }

    /// Records a failed attempt and decides whether another one follows.
    pub fn record_failure(&mut self, err: E, now: Instant) -> Decision {
        self.errors.push(err);

        if self.deadline_exceeded(now) {
            return self.give_up(Exhaustion::DeadlineExceeded);
        }

        let delay = match self.remaining.pop_front() {
            Some(delay) => delay,
            None => match self.cached_last {
                Some(last) => {
                    let excess = self.errors.len().saturating_sub(FOREVER_ERROR_TAIL);
                    self.errors.drain(..excess);
                    last
                }
                None if self.stopped => return self.give_up(Exhaustion::Stopped),
                None => return self.give_up(Exhaustion::ScheduleSpent),
            },
        };

        Decision::Retry(Duration::from_millis(delay))
    }

    /// Bumps the attempt counter when a scheduled retry actually runs.
    pub fn advance(&mut self) -> u32 {
        self.attempts = self.attempts.saturating_add(1);
        self.attempts
    }

    /// Drops every remaining delay, including the forever-mode cache.
    pub fn stop(&mut self) {
        self.remaining.clear();
        self.cached_last = None;
        self.stopped = true;
    }

    /// Restores the attempt counter and refills the schedule for reuse.
    ///
    /// Recorded errors are kept.
    pub fn reset(&mut self) {
        self.attempts = 1;
        self.remaining = self.original.as_slice().iter().copied().collect();
        self.cached_last = if self.options.forever {
            self.original.last()
        } else {
            None
        };
        self.stopped = false;
        self.exhaustion = None;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn errors(&self) -> &[E] {
        &self.errors
    }

    pub fn exhaustion(&self) -> Option<Exhaustion> {
        self.exhaustion
    }

    pub fn options(&self) -> OperationOptions {
        self.options
    }

    pub fn schedule(&self) -> &TimeoutSchedule {
        &self.original
    }

    /// Delays still queued before the schedule is drained.
    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }

    pub fn started(&self) -> Option<Instant> {
        self.started
    }

    fn deadline_exceeded(&self, now: Instant) -> bool {
        match (self.options.max_retry_time, self.started) {
            (Some(budget), Some(started)) => now.saturating_duration_since(started) >= budget,
            _ => false,
        }
    }

    fn give_up(&mut self, reason: Exhaustion) -> Decision {
        self.exhaustion = Some(reason);
        Decision::GiveUp(reason)
    }
}

impl<E: Display> RetryState<E> {
    /// The error whose message occurs most often.
    ///
    /// On equal counts the identity that reached the count last wins, and the
    /// returned value is the occurrence at which it did so.
    pub fn main_error(&self) -> Option<&E> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        let mut best: Option<(&E, usize)> = None;

        for err in &self.errors {
            let count = counts.entry(err.to_string()).or_insert(0);
            *count += 1;
            if best.map_or(true, |(_, top)| *count >= top) {
                best = Some((err, *count));
            }
        }

        best.map(|(err, _)| err)
    }
}
