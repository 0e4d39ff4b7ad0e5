#[path = "operation/state.rs"]
mod state;

#[path = "operation/timeout.rs"]
mod timeout;

#[path = "operation/handle.rs"]
mod handle;

#[path = "operation/run.rs"]
mod run;

pub use handle::RetryOperation;
pub use state::{Decision, Exhaustion, RetryState};
pub use timeout::AttemptTimeout;

#[cfg(test)]
#[path = "operation/tests.rs"]
mod tests;
