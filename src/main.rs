use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use smallcapbot::backtest::{PaperBroker, SessionRunner, SyntheticMarket};
use smallcapbot::persistence::{JsonFileStore, MemoryStore, StateStore};
use smallcapbot::{StrategyConfig, StrategyEngine};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "smallcapbot", version, about = "Small-cap rotation decision engine")]
struct Cli {
    /// TOML config file (defaults and SMALLCAP_* env vars apply otherwise)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the engine against a seeded synthetic market and paper broker
    Simulate {
        #[arg(long, default_value_t = 250)]
        days: usize,
        #[arg(long, default_value_t = 400)]
        symbols: usize,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        #[arg(long, default_value_t = 1_000_000.0)]
        cash: f64,
        /// Persist state to the configured state file instead of memory
        #[arg(long)]
        persist: bool,
    },
    /// Print the persisted strategy state
    State,
    /// Load and validate configuration
    CheckConfig,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();
    let config = StrategyConfig::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Command::Simulate {
            days,
            symbols,
            seed,
            cash,
            persist,
        } => {
            tracing::info!("🚀 Simulating {} days over {} symbols (seed {})", days, symbols, seed);

            let market = SyntheticMarket::generate(seed, symbols, days);
            let broker = PaperBroker::new(cash, config.lot_size);
            let mut runner = SessionRunner::new(market, broker);

            let metrics = if persist {
                let store = JsonFileStore::new(config.state_path.clone());
                let mut engine = StrategyEngine::new(config, store).context("starting engine")?;
                runner.run(&mut engine, days)?
            } else {
                let mut engine =
                    StrategyEngine::new(config, MemoryStore::new()).context("starting engine")?;
                runner.run(&mut engine, days)?
            };

            metrics.print_report();
        }
        Command::State => {
            let store = JsonFileStore::new(config.state_path.clone());
            match store.load()? {
                Some(state) => println!("{}", serde_json::to_string_pretty(&state)?),
                None => println!("No saved state at {}", store.path().display()),
            }
        }
        Command::CheckConfig => {
            println!("✅ Configuration valid");
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("smallcapbot=info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
