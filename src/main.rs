//! MEV Competition Simulator CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mev_competition_sim::{
    analytics::logger::{print_summary, SimulationLogger},
    bots::victim::Persona,
    config::SimulationConfig,
    simulation::{latency::LatencyProfile, CompetitionOrchestrator},
};

#[derive(Parser)]
#[command(name = "mev-sim")]
#[command(version)]
#[command(about = "MEV extractor competition simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a competition simulation
    Run {
        /// JSON configuration file (defaults are used when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Maximum number of rounds
        #[arg(short, long)]
        rounds: Option<u64>,

        /// Wall-clock budget in minutes
        #[arg(short, long)]
        duration: Option<f64>,

        /// Seed for every random stream
        #[arg(long)]
        seed: Option<u64>,

        /// Multiplier on real latency sleeps (0 disables sleeping)
        #[arg(long)]
        time_scale: Option<f64>,

        /// Output directory for results
        #[arg(short, long)]
        output: Option<String>,

        /// Do not write results to disk
        #[arg(long)]
        no_save: bool,
    },

    /// Seeded run with no latency sleeps
    Quick {
        #[arg(short, long, default_value = "50")]
        rounds: u64,
    },

    /// List latency presets and victim personas
    Profiles,

    /// Re-print the summary of a saved run
    Summary {
        /// Results JSON written by `run`
        #[arg(short, long)]
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .compact()
        .init();

    match cli.command {
        Commands::Run {
            config,
            rounds,
            duration,
            seed,
            time_scale,
            output,
            no_save,
        } => {
            let mut config = match config {
                Some(path) => SimulationConfig::from_json_file(&path)?,
                None => SimulationConfig::default(),
            };
            if let Some(rounds) = rounds {
                config.target_rounds = rounds;
            }
            if let Some(duration) = duration {
                config.duration_minutes = duration;
            }
            if seed.is_some() {
                config.seed = seed;
            }
            if let Some(scale) = time_scale {
                config.latency_time_scale = scale;
            }
            if let Some(output) = output {
                config.output_dir = output;
            }
            run_simulation(config, !no_save).await?;
        }

        Commands::Quick { rounds } => {
            let config = SimulationConfig {
                target_rounds: rounds,
                ..SimulationConfig::quick_test()
            };
            run_simulation(config, false).await?;
        }

        Commands::Profiles => print_profiles(),

        Commands::Summary { input } => {
            let run = SimulationLogger::load_results(&input)?;
            print_summary(&run);
        }
    }

    Ok(())
}

async fn run_simulation(config: SimulationConfig, save: bool) -> Result<()> {
    let output_dir = config.output_dir.clone();
    let mut orchestrator =
        CompetitionOrchestrator::new(config).context("Invalid simulation configuration")?;
    orchestrator.setup_from_gateway().await?;

    let stop = orchestrator.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current round");
            stop.stop();
        }
    });

    let run = orchestrator.run().await.context("Simulation run failed")?;
    print_summary(&run);

    if save {
        let logger = SimulationLogger::new(&output_dir);
        let json_path = logger.save_results(&run)?;
        logger.save_summary(&run)?;
        info!("Results saved to: {}", json_path.display());
    }

    Ok(())
}

fn print_profiles() {
    println!();
    println!("LATENCY PROFILES (ms: detect / update / calc / bundle / submit, jitter)");
    for name in LatencyProfile::preset_names() {
        if let Some(p) = LatencyProfile::preset(name) {
            println!(
                "  {:<22} {:>5.0} / {:>5.0} / {:>5.0} / {:>5.0} / {:>5.0}  ±{:.0}%  total {:.0}",
                name,
                p.block_detection,
                p.market_update,
                p.calculation,
                p.bundle_creation,
                p.network_submission,
                p.jitter * 100.0,
                p.total_average_latency()
            );
        }
    }

    println!();
    println!("VICTIM PERSONAS (interval s, amount range, slippage)");
    for persona in Persona::ALL {
        let p = persona.pattern();
        println!(
            "  {:<12} {:>6.0}s  {:>8.1} - {:<8.1} {:>5.1}%",
            persona.as_str(),
            p.interval_secs,
            p.amount_min,
            p.amount_max,
            p.slippage_tolerance * 100.0
        );
    }
    println!();
}
