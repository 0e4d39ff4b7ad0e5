#[path = "config/retry.rs"]
mod retry;

#[path = "config/load.rs"]
mod load;

pub use retry::{OperationOptions, RetryConfig};
