#[path = "retry-plan/app.rs"]
mod app;
#[path = "retry-plan/args.rs"]
mod args;
#[path = "retry-plan/config.rs"]
mod config;
#[path = "retry-plan/logging.rs"]
mod logging;
#[path = "retry-plan/output.rs"]
mod output;
#[path = "retry-plan/simulate.rs"]
mod simulate;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    app::run().await
}
