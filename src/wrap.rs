#[path = "wrap/capability.rs"]
mod capability;

#[path = "wrap/wrapper.rs"]
mod wrapper;

pub use capability::{MethodSelection, RetryCapability};
pub use wrapper::Retrying;
