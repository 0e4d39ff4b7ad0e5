use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use retry_op::{schedule, RetryConfig, TimeoutSchedule};

use crate::args::{CliArgs, OutputFormat};
use crate::config::load_config;
use crate::logging::init_logging;
use crate::output::{render_json, render_text, Plan};
use crate::simulate::{simulate_live, simulate_virtual};

pub async fn run() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let _logger = init_logging(&args.log_level)?;

    let config = args.apply(load_config(args.config.as_deref())?);
    config.validate()?;
    let schedule = build(&config, args.seed)?;
    log::debug!("schedule for {config:?}: {:?}", schedule.as_slice());

    let simulation = match args.simulate_failures {
        Some(failures) if args.live => Some(simulate_live(config.clone(), failures).await?),
        Some(failures) => Some(simulate_virtual(schedule.clone(), &config, failures)),
        None => None,
    };

    let plan = Plan {
        config: &config,
        schedule: &schedule,
        total_ms: schedule.total_ms(),
        simulation,
    };
    match args.format {
        OutputFormat::Text => print!("{}", render_text(&plan)),
        OutputFormat::Json => println!("{}", render_json(&plan)?),
    }
    Ok(())
}

fn build(config: &RetryConfig, seed: Option<u64>) -> anyhow::Result<TimeoutSchedule> {
    let schedule = match seed {
        Some(seed) => schedule::build_with_rng(config, &mut StdRng::seed_from_u64(seed))?,
        None => schedule::build(config)?,
    };
    Ok(schedule)
}
