use std::fmt::Write;

use retry_op::{RetryConfig, TimeoutSchedule};
use serde::Serialize;

use crate::simulate::SimulationReport;

#[derive(Debug, Serialize)]
pub struct Plan<'a> {
    pub config: &'a RetryConfig,
    pub schedule: &'a TimeoutSchedule,
    pub total_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub simulation: Option<SimulationReport>,
}

pub fn render_json(plan: &Plan<'_>) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(plan)?)
}

pub fn render_text(plan: &Plan<'_>) -> String {
    let config = plan.config;
    let max = config
        .max_timeout_ms
        .map(|ms| format!("{ms}ms"))
        .unwrap_or_else(|| "unbounded".to_string());
    let mut out = String::new();
    let _ = writeln!(
        out,
        "retries: {}  factor: {}  min: {}ms  max: {max}  randomize: {}  forever: {}",
        config.retries, config.factor, config.min_timeout_ms, config.randomize, config.forever
    );
    let _ = writeln!(out, "{:>5}  {:>12}  {:>14}", "retry", "delay_ms", "cumulative_ms");

    let mut cumulative = 0u64;
    for (idx, delay) in plan.schedule.as_slice().iter().enumerate() {
        cumulative = cumulative.saturating_add(*delay);
        let _ = writeln!(out, "{:>5}  {:>12}  {:>14}", idx + 1, delay, cumulative);
    }
    let _ = writeln!(out, "total: {}ms", plan.total_ms);

    if let Some(sim) = &plan.simulation {
        let status = if sim.succeeded { "succeeded" } else { "gave up" };
        let _ = write!(
            out,
            "simulation: {status} after {} attempts in {}ms",
            sim.attempts, sim.elapsed_ms
        );
        if let Some(failure) = &sim.failure {
            let _ = write!(out, " ({failure})");
        }
        out.push('\n');
    }
    out
}
