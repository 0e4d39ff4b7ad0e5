use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Ordered delays, in milliseconds, between consecutive attempts.
///
/// Schedules produced from a [`RetryConfig`](crate::RetryConfig) are sorted
/// ascending. Schedules built from an explicit list keep the caller's order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeoutSchedule(Vec<u64>);

impl TimeoutSchedule {
    /// Copies an explicit list of delays verbatim.
    pub fn from_delays(delays: &[u64]) -> Self {
        Self(delays.to_vec())
    }

    pub(crate) fn sorted(mut delays: Vec<u64>) -> Self {
        delays.sort_unstable();
        Self(delays)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.0
    }

    pub fn last(&self) -> Option<u64> {
        self.0.last().copied()
    }

    /// Delays as [`Duration`] values.
    pub fn durations(&self) -> impl Iterator<Item = Duration> + '_ {
        self.0.iter().copied().map(Duration::from_millis)
    }

    /// Sum of every delay, saturating at `u64::MAX`.
    pub fn total_ms(&self) -> u64 {
        self.0.iter().fold(0u64, |acc, delay| acc.saturating_add(*delay))
    }

    pub fn into_vec(self) -> Vec<u64> {
        self.0
    }
}

impl From<Vec<u64>> for TimeoutSchedule {
    fn from(delays: Vec<u64>) -> Self {
        Self(delays)
    }
}

impl AsRef<[u64]> for TimeoutSchedule {
    fn as_ref(&self) -> &[u64] {
        &self.0
    }
}

impl<'a> IntoIterator for &'a TimeoutSchedule {
    type Item = &'a u64;
    type IntoIter = std::slice::Iter<'a, u64>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
