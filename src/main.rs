use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::info;

use grid_traffic::simulation::{compose, Layout, PortLayout, SimConfig, SpawnConfig, UnitConfig};

#[derive(Clone, Copy, ValueEnum)]
enum LayoutArg {
    /// One crossroad with its four approach and four exit lines
    Single,
    /// Four crossroads in a 2x2 mesh
    Grid2,
    /// Sixteen crossroads in a 4x4 mesh
    Grid4,
}

impl From<LayoutArg> for Layout {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::Single => Layout::Single,
            LayoutArg::Grid2 => Layout::Grid2x2,
            LayoutArg::Grid4 => Layout::Grid4x4,
        }
    }
}

#[derive(Parser)]
#[command(name = "grid_traffic")]
#[command(about = "Cellular automaton traffic simulation on signal-controlled crossroads")]
struct Cli {
    /// Network topology to build
    #[arg(long, value_enum, default_value = "single")]
    layout: LayoutArg,

    /// Number of simulation ticks to run
    #[arg(long, default_value = "1000")]
    ticks: u64,

    /// Cells per approach and exit line
    #[arg(long, default_value = "10")]
    length: usize,

    /// Red phase duration in ticks
    #[arg(long, default_value = "5")]
    red: u32,

    /// Green phase duration in ticks
    #[arg(long, default_value = "5")]
    green: u32,

    /// Light phase offset applied to every unit
    #[arg(long, default_value = "0")]
    offset: u32,

    /// Lanes per crossroad side
    #[arg(long, default_value = "1")]
    lanes: usize,

    /// Probability that a generator attempts a spawn each tick
    #[arg(long, default_value = "0.5")]
    spawn_probability: f64,

    /// Use a fixed straight-through route instead of random walks
    #[arg(long)]
    fixed_route: bool,

    /// Enable the randomised yield rule on one-lane crossroads
    #[arg(long)]
    alternate_yield: bool,

    /// Reroute vehicles blocked this many ticks inside a crossroad
    #[arg(long)]
    reroute_after: Option<u32>,

    /// Seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,

    /// Log a summary every this many ticks
    #[arg(long, default_value = "100")]
    report_every: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    run_headless(&cli)
}

/// Run the simulation and log aggregate statistics
fn run_headless(cli: &Cli) -> Result<()> {
    let layout: Layout = cli.layout.into();

    let spawn = SpawnConfig {
        probability: cli.spawn_probability,
        random_walk: !cli.fixed_route,
        route: vec![0],
        ..SpawnConfig::default()
    };
    let unit = UnitConfig {
        length: cli.length,
        red: cli.red,
        green: cli.green,
        layout: PortLayout::uniform(cli.lanes),
        alternate_yield: cli.alternate_yield,
        spawn: Some(spawn),
    };
    let sim = SimConfig {
        seed: cli.seed,
        reroute_after: cli.reroute_after,
        ..SimConfig::default()
    };
    let offsets = vec![cli.offset; layout.unit_count()];

    let mut composition =
        compose(layout, sim, &unit, &offsets).context("Failed to build the road network")?;
    let network = &mut composition.network;

    info!("Running traffic simulation in headless mode...");
    info!("Ticks: {}, units: {}", cli.ticks, layout.unit_count());

    let report_every = cli.report_every.max(1);
    for tick in 1..=cli.ticks {
        let stats = network
            .tick()
            .with_context(|| format!("Simulation failed at tick {}", tick))?;
        if tick % report_every == 0 {
            info!(
                "--- After tick {} --- cars: {}, moved: {:.1}, speed: {:.3}",
                tick,
                stats.cars,
                stats.moved,
                stats.speed()
            );
        }
    }

    let spawned = network.spawned();
    let completed = network.completed();
    let history = network.stats();
    let mean_speed = if history.is_empty() {
        0.0
    } else {
        history.iter().map(|s| s.speed()).sum::<f32>() / history.len() as f32
    };

    info!("=== SIMULATION COMPLETE ===");
    info!("Total ticks: {}", network.tick_count());
    info!("Total cars spawned: {}", spawned);
    info!("Total cars completed: {}", completed);
    info!("Active cars: {}", network.live_cars());
    info!("Total segments: {}", network.segments().count());
    info!("Mean speed: {:.3}", mean_speed);
    info!(
        "Success rate: {:.1}%",
        if spawned > 0 {
            (completed as f32 / spawned as f32) * 100.0
        } else {
            0.0
        }
    );
    Ok(())
}
