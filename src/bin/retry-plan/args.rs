use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use retry_op::RetryConfig;

#[derive(Parser, Debug)]
#[command(
    name = "retry-plan",
    about = "Preview retry backoff schedules and simulate flaky actions"
)]
pub struct CliArgs {
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub retries: Option<u32>,
    #[arg(long)]
    pub factor: Option<f64>,
    /// Delay before the first retry in milliseconds
    #[arg(long)]
    pub min_timeout: Option<u64>,
    /// Cap for any single delay in milliseconds
    #[arg(long)]
    pub max_timeout: Option<u64>,
    #[arg(long)]
    pub randomize: bool,
    #[arg(long)]
    pub forever: bool,
    /// Overall retry budget in milliseconds
    #[arg(long)]
    pub max_retry_time: Option<u64>,
    /// Seed for reproducible jitter
    #[arg(long)]
    pub seed: Option<u64>,
    /// Replay an action that fails this many times before succeeding
    #[arg(long)]
    pub simulate_failures: Option<u32>,
    /// Run the simulation with real timers instead of a virtual clock
    #[arg(long, requires = "simulate_failures")]
    pub live: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

impl CliArgs {
    /// Layers command-line flags over a loaded configuration.
    pub fn apply(&self, mut config: RetryConfig) -> RetryConfig {
        if let Some(retries) = self.retries {
            config.retries = retries;
        }
        if let Some(factor) = self.factor {
            config.factor = factor;
        }
        if let Some(min) = self.min_timeout {
            config.min_timeout_ms = min;
        }
        if let Some(max) = self.max_timeout {
            config.max_timeout_ms = Some(max);
        }
        if let Some(budget) = self.max_retry_time {
            config.max_retry_time_ms = Some(budget);
        }
        config.randomize |= self.randomize;
        config.forever |= self.forever;
        config
    }
}
