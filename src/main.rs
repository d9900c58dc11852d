use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use staking_pool::{
    external::{InMemoryAssetLedger, SystemClock},
    scenario::{replay, simulate, Scenario, SimulationParams},
    snapshot::PoolSnapshot,
    PoolConfig, StakingPool,
};

/// Staking ledger with time-weighted yield accrual.
#[derive(Parser)]
#[command(name = "staking-pool")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Pool config file (JSON)
    #[arg(short, long, global = true, env = "STAKING_POOL_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSON scenario against an in-memory pool
    Replay {
        /// Scenario file
        scenario: PathBuf,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Print the projection curve for the active config
    Curve,

    /// Run a seeded random workload and check ledger invariants
    Simulate {
        #[arg(long, default_value_t = 8)]
        participants: usize,

        #[arg(long, default_value_t = 1_000)]
        steps: usize,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// External balance minted to every participant
        #[arg(long, default_value_t = 1_000_000)]
        initial_balance: u64,
    },

    /// Check a snapshot's state root and ledger invariants
    VerifySnapshot {
        /// Snapshot file, or a replay report containing one
        snapshot: PathBuf,
    },
}

fn load_config(path: Option<&Path>) -> Result<PoolConfig> {
    match path {
        Some(path) => PoolConfig::from_path(path).context("loading pool config"),
        None => Ok(PoolConfig::default()),
    }
}

fn write_json<T: serde::Serialize>(value: &T, out: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match out {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).ok();
            }
            fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            eprintln!("report → {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn read_snapshot(path: &Path) -> Result<PoolSnapshot> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_slice(&bytes)?;
    let snapshot = match value.get("snapshot") {
        Some(inner) => serde_json::from_value(inner.clone())?,
        None => serde_json::from_value(value)?,
    };
    Ok(snapshot)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Replay { scenario, out } => {
            let bytes =
                fs::read(&scenario).with_context(|| format!("reading {}", scenario.display()))?;
            let scenario: Scenario = serde_json::from_slice(&bytes).context("parsing scenario")?;
            let report = replay(&scenario, config)?;
            write_json(&report, out.as_deref())?;
        }
        Commands::Curve => {
            let pool = StakingPool::new(
                "curve",
                config,
                InMemoryAssetLedger::new(),
                SystemClock,
            )?;
            write_json(&pool.get_yields()?, None)?;
        }
        Commands::Simulate {
            participants,
            steps,
            seed,
            initial_balance,
        } => {
            let summary = simulate(
                SimulationParams {
                    participants,
                    steps,
                    seed,
                    initial_balance,
                },
                config,
            )?;
            write_json(&summary, None)?;
            if !summary.violations.is_empty() {
                bail!("{} invariant violations", summary.violations.len());
            }
        }
        Commands::VerifySnapshot { snapshot } => {
            let snap = read_snapshot(&snapshot)?;
            let root = hex::encode(snap.state_root);
            let pool = StakingPool::restore(snap, config, InMemoryAssetLedger::new(), SystemClock)?;
            println!(
                "verify-snapshot: OK (state_root {root}, {} participants, total_staked {})",
                pool.participants().count(),
                pool.total_staked()
            );
        }
    }
    Ok(())
}
