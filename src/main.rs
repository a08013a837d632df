//! Crop Arbitrator - scenario runner
//!
//! Runs a TOML scenario day by day and prints each day's arbitration
//! results as a text table or JSON.

use std::path::PathBuf;

use clap::Parser;
use crop_arbitrator::core::config::ArbitratorConfig;
use crop_arbitrator::core::error::Result;
use crop_arbitrator::core::types::Day;
use crop_arbitrator::organ::DailyConditions;
use crop_arbitrator::simulation::{DailyReport, Scenario};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

/// Run a crop arbitration scenario
#[derive(Parser, Debug)]
#[command(name = "crop-arbitrator")]
#[command(about = "Run daily biomass and nitrogen arbitration for a crop scenario")]
struct Args {
    /// Scenario file
    #[arg(default_value = "data/scenarios/wheat.toml")]
    scenario: PathBuf,

    /// Arbitrator settings applied to every plant, replacing the scenario's
    #[arg(long)]
    config: Option<PathBuf>,

    /// Days to simulate (defaults to the scenario's own)
    #[arg(long)]
    days: Option<Day>,

    /// Output format: text or json
    #[arg(long, default_value = "text")]
    format: String,

    /// Daily random variation in photosynthesis, as a fraction (0 = none)
    #[arg(long, default_value_t = 0.0)]
    jitter: f64,

    /// Random seed for the daily variation
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Run the scenario this many times in parallel and check the runs agree
    #[arg(long, default_value_t = 1)]
    replicates: usize,

    /// Enable debug logging
    #[arg(long, short = 'v')]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        "crop_arbitrator=debug"
    } else {
        "crop_arbitrator=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut scenario = Scenario::load_from_toml(&args.scenario)?;
    if let Some(path) = &args.config {
        let config = ArbitratorConfig::load_from_toml(path)?;
        tracing::info!(
            "Using {} for DM and {} for N from {}",
            config.dm_policy,
            config.n_policy,
            path.display()
        );
        scenario.arbitrator = config;
        for plant in &mut scenario.plants {
            plant.arbitrator = None;
        }
    }
    let days = args.days.unwrap_or(scenario.days);
    let weather = daily_conditions(&scenario.conditions, days, args.jitter, args.seed);
    tracing::info!(
        "Running {} for {} days ({} replicate(s), seed {})",
        args.scenario.display(),
        days,
        args.replicates.max(1),
        args.seed
    );

    let runs = (0..args.replicates.max(1))
        .into_par_iter()
        .map(|_| run_scenario(&scenario, &weather))
        .collect::<Result<Vec<_>>>()?;

    let reports = &runs[0];
    if runs.iter().skip(1).any(|run| run != reports) {
        tracing::error!("Replicate runs diverged from identical inputs");
        std::process::exit(1);
    }
    if runs.len() > 1 {
        tracing::info!("{} replicate runs produced identical reports", runs.len());
    }

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(reports)?),
        _ => print_text(reports),
    }
    Ok(())
}

/// One set of conditions per day, varied around the scenario's base
fn daily_conditions(
    base: &DailyConditions,
    days: Day,
    jitter: f64,
    seed: u64,
) -> Vec<DailyConditions> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let jitter = jitter.clamp(0.0, 1.0);
    (0..days)
        .map(|_| {
            let variation = if jitter > 0.0 {
                rng.gen_range(-jitter..=jitter)
            } else {
                0.0
            };
            DailyConditions {
                radiation_factor: (base.radiation_factor * (1.0 + variation)).max(0.0),
            }
        })
        .collect()
}

fn run_scenario(scenario: &Scenario, weather: &[DailyConditions]) -> Result<Vec<DailyReport>> {
    let mut sim = scenario.build()?;
    weather.iter().map(|conditions| sim.run_day(conditions)).collect()
}

fn print_text(reports: &[DailyReport]) {
    println!(
        "{:>4}  {:<12} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9}",
        "day", "crop", "dm_alloc", "n_alloc", "n_limit", "sink_lim", "live_wt", "live_n"
    );
    for report in reports {
        for plant in &report.plants {
            match &plant.summary {
                Some(summary) => println!(
                    "{:>4}  {:<12} {:>9.3} {:>9.4} {:>9.3} {:>9.3} {:>9.2} {:>9.4}",
                    report.day,
                    plant.crop,
                    summary.dm.allocated,
                    summary.n.allocated,
                    summary.dm.nutrient_limitation,
                    summary.dm.sink_limitation,
                    plant.live_wt,
                    plant.live_n
                ),
                None => println!(
                    "{:>4}  {:<12} {:>9} {:>9} {:>9} {:>9} {:>9.2} {:>9.4}",
                    report.day, plant.crop, "-", "-", "-", "-", plant.live_wt, plant.live_n
                ),
            }
        }
    }
    if let Some(last) = reports.last() {
        println!(
            "soil: {:.2} kg/ha mineral N, {:.2} mm water",
            last.soil_mineral_n, last.soil_water
        );
    }
}
