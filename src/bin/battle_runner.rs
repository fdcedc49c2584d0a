//! Headless Battle Runner
//!
//! Plays one scenario to the end with the default AI and prints the result.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use valor_tactics::battle::{spawn_resolver, BattleEngine, BattleEvent, BattleSummary, Definitions, Scenario};
use valor_tactics::core::config::BattleConfig;
use valor_tactics::core::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

/// Headless Battle Runner - AI vs AI on a tile grid
#[derive(Parser, Debug)]
#[command(name = "battle_runner")]
#[command(about = "Resolve a grid battle scenario and report the outcome")]
struct Args {
    /// Class, skill and status definitions
    #[arg(long, default_value = "data/definitions.toml")]
    definitions: PathBuf,

    /// Grid size and unit placement
    #[arg(long, default_value = "data/scenarios/skirmish.toml")]
    scenario: PathBuf,

    /// Engine configuration; defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Random seed, overrides the configured one
    #[arg(long)]
    seed: Option<u64>,

    /// Cap on rounds, overrides the configured one (0 = unlimited)
    #[arg(long)]
    max_turns: Option<u32>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
}

/// JSON output structure
#[derive(Serialize)]
struct BattleReport<'a> {
    seed: u64,
    #[serde(flatten)]
    summary: &'a BattleSummary,
    events: &'a [BattleEvent],
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("valor_tactics=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => BattleConfig::load(path)?,
        None => BattleConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(max_turns) = args.max_turns {
        config.max_turns = max_turns;
    }

    let definitions = Definitions::load(&args.definitions)?;
    let scenario = Scenario::load(&args.scenario)?;
    let state = scenario.build_state(&definitions, config.valor_barrier_scale)?;

    let (resolver, worker) = spawn_resolver(config.resolver_queue);
    let seed = config.seed;
    let mut engine = BattleEngine::new(state, definitions, config, resolver)?;
    let summary = engine.run().await;

    match args.format {
        OutputFormat::Json => {
            let report = BattleReport {
                seed,
                summary: &summary,
                events: engine.events(),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            for event in engine.events() {
                println!("[turn {:>3}] {}", event.turn, event.event_type);
            }
            println!(
                "\n{} after {} turns, survivors: {}",
                summary.reason,
                summary.turns,
                summary
                    .survivors
                    .iter()
                    .map(|id| id.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
    }

    // Dropping the engine closes the last sender and lets the worker exit
    drop(engine);
    if let Err(e) = worker.await {
        tracing::warn!("Resolver worker ended abnormally: {}", e);
    }

    Ok(())
}
