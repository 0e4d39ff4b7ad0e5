#[path = "schedule/timeouts.rs"]
mod timeouts;

#[path = "schedule/builder.rs"]
mod builder;

pub use builder::{build, build_with_rng, delay_for, delay_for_with_rng, ScheduleSource};
pub(crate) use builder::generate;
pub use timeouts::TimeoutSchedule;
