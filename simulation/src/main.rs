//! Demographics simulation runner
//!
//! Usage: `demographics [config.json] [end-date]`. Seeds the founding families, runs the
//! calendar to the end date and logs a summary.

use anyhow::Context;
use chrono::{Datelike, NaiveDate};
use tracing::info;
use tracing_subscriber::FmtSubscriber;

use simulation::{SimulationConfig, SimulationWorld};

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => SimulationConfig::load_from_path(&path)
            .with_context(|| format!("loading configuration from {}", path))?,
        None => SimulationConfig::default(),
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.tracing_level())
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let end = match args.next() {
        Some(text) => NaiveDate::parse_from_str(&text, "%Y-%m-%d")
            .with_context(|| format!("parsing end date '{}'", text))?,
        None => NaiveDate::from_ymd_opt(config.start_date.year() + 10, 1, 1)
            .context("start date too late for a ten year run")?,
    };

    info!("Demographics simulation starting on {} (seed {})", config.start_date, config.seed);
    let mut world = SimulationWorld::new(config)?;
    world.seed_founders()?;
    info!("Population seeded. Living: {}", world.population());

    let started = std::time::Instant::now();
    let timeline = world.advance_to(end)?;
    let elapsed = started.elapsed();

    let stats = world.vital_statistics(world.config.start_date.year(), end.year())?;
    info!(
        "Ran to {} in {:?}: {} event days, {} births, {} deaths, {} marriages, {} living",
        end,
        elapsed,
        timeline.len(),
        stats.total_births(),
        stats.total_deaths(),
        stats.total_marriages(),
        world.population()
    );
    let memory = memory_stats::memory_stats()
        .map(|stats| stats.physical_mem as u64)
        .unwrap_or(0);
    info!("Physical memory in use: {} bytes", memory);
    Ok(())
}
