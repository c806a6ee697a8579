use atm_controller::application::Collaborators;
use atm_controller::application::session::Terminal;
use atm_controller::config::AtmConfig;
use atm_controller::domain::ports::{SharedClock, SharedStore};
use atm_controller::infrastructure::in_memory::InMemoryRemoteStore;
#[cfg(feature = "storage-rocksdb")]
use atm_controller::infrastructure::rocksdb::RocksDbRemoteStore;
use atm_controller::infrastructure::simulated::{
    ManualClock, ScriptedInput, SimulatedActuator, StaticFacialVerifier,
};
use atm_controller::infrastructure::system::SystemClock;
use atm_controller::interfaces::csv::account_reader::{AccountReader, seed_directory};
use atm_controller::interfaces::csv::account_writer::{AccountWriter, collect_states};
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Accounts CSV used to seed the directory
    accounts: PathBuf,

    /// Keypad script such as "4821# 3 9137# 1 2000#". Read from stdin when omitted.
    #[arg(long)]
    keys: Option<String>,

    /// Queue one touch press of N active samples. Repeatable.
    #[arg(long = "touch", value_name = "N")]
    touches: Vec<usize>,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Time holds and dwells against the wall clock instead of simulated time
    #[arg(long)]
    realtime: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "atm_controller=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(io::stderr().is_terminal()),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AtmConfig::load(path).into_diagnostic()?,
        None => AtmConfig::default(),
    };
    config.validate().into_diagnostic()?;

    let store = open_store(cli.db_path.as_deref()).into_diagnostic()?;

    let script = match cli.keys {
        Some(keys) => keys,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf).into_diagnostic()?;
            buf
        }
    };
    let input = ScriptedInput::with_keys(&script).into_diagnostic()?;
    for samples in &cli.touches {
        input.push_press(*samples).await;
    }

    let clock: SharedClock = if cli.realtime {
        Arc::new(SystemClock::new())
    } else {
        Arc::new(ManualClock::new())
    };

    let collab = Collaborators {
        store: store.clone(),
        input: Arc::new(input),
        actuator: Arc::new(SimulatedActuator::new()),
        clock,
        facial: Arc::new(StaticFacialVerifier::default()),
    };
    let terminal = Terminal::new(collab, config.clone());
    terminal.start().await.into_diagnostic()?;

    let file = File::open(&cli.accounts).into_diagnostic()?;
    let mut seeds = Vec::new();
    for seed in AccountReader::new(file).accounts() {
        match seed {
            Ok(seed) => seeds.push(seed),
            Err(e) => warn!(error = %e, "Skipping malformed account row"),
        }
    }
    seed_directory(store.as_ref(), &config.directory_path, seeds)
        .await
        .into_diagnostic()?;

    let outcomes = terminal.run().await.into_diagnostic()?;
    info!(sessions = outcomes.len(), "Run complete");

    let states = collect_states(store.as_ref(), &config.directory_path)
        .await
        .into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = AccountWriter::new(stdout.lock());
    writer.write_accounts(states).into_diagnostic()?;

    Ok(())
}

#[cfg(feature = "storage-rocksdb")]
fn open_store(db_path: Option<&Path>) -> atm_controller::error::Result<SharedStore> {
    if let Some(path) = db_path {
        info!(path = %path.display(), "Using RocksDB blackboard");
        return Ok(Arc::new(RocksDbRemoteStore::open(path)?));
    }
    Ok(Arc::new(InMemoryRemoteStore::new()))
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_store(db_path: Option<&Path>) -> atm_controller::error::Result<SharedStore> {
    if db_path.is_some() {
        warn!(
            "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to in-memory storage."
        );
    }
    Ok(Arc::new(InMemoryRemoteStore::new()))
}
