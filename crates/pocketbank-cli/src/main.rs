//! Pocketbank - personal ledger in your terminal

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pocketbank_ledger::{AccountStore, LedgerConfig, LedgerEngine, MemoryStore, SledStore, StoreConfig};
use pocketbank_types::LedgerError;
use tracing_subscriber::EnvFilter;

mod output;

const DEFAULT_DATA_DIR: &str = "pocketbank-data";

/// Exit status when a transfer debited the sender but could not credit the
/// recipient. Needs manual reconciliation; scripts must not retry.
const EXIT_PARTIAL_TRANSFER: u8 = 3;

/// Pocketbank - deposit, withdraw and send money between accounts
#[derive(Parser)]
#[command(name = "pocketbank", version, about, long_about = None)]
struct Cli {
    /// Ledger config file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory for the on-disk ledger (overrides the config store)
    #[arg(long, global = true, env = "POCKETBANK_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new account with a zero balance
    Register {
        username: String,
    },

    /// Show the balance of an account
    Balance {
        username: String,
    },

    /// Deposit money into an account
    Deposit {
        username: String,
        /// Amount, e.g. 1,234.50
        amount: String,
    },

    /// Withdraw money from an account
    Withdraw {
        username: String,
        /// Amount, e.g. 1,234.50
        amount: String,
    },

    /// Send money to another account
    Transfer {
        sender: String,
        /// Amount, e.g. 1,234.50
        amount: String,
        recipient: String,
    },

    /// Rank all accounts by balance
    Ranking,
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{:#}", e));
            match e.downcast_ref::<LedgerError>() {
                Some(LedgerError::PartialTransferFailure { .. }) => {
                    ExitCode::from(EXIT_PARTIAL_TRANSFER)
                }
                _ => ExitCode::FAILURE,
            }
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<LedgerConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            let mut config = LedgerConfig::from_json_str(&raw)?;
            // The library default is the memory store; on the command line
            // that would drop every change, so only honour it when explicit.
            if !names_store(&raw) {
                config.store = default_store();
            }
            config
        }
        None => LedgerConfig {
            store: default_store(),
            ..LedgerConfig::default()
        },
    };
    if let Some(dir) = &cli.data_dir {
        config.store = StoreConfig::Sled { path: dir.clone() };
    }
    if config.store == StoreConfig::Memory {
        tracing::warn!("memory store selected; changes are discarded when the command exits");
    }
    Ok(config)
}

fn default_store() -> StoreConfig {
    StoreConfig::Sled {
        path: PathBuf::from(DEFAULT_DATA_DIR),
    }
}

fn names_store(raw: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(raw)
        .map(|value| value.get("store").is_some())
        .unwrap_or(false)
}

fn run(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    tracing::debug!(?config, "loaded ledger config");

    match &config.store {
        StoreConfig::Memory => execute(LedgerEngine::with_config(MemoryStore::new(), &config), cli),
        StoreConfig::Sled { path } => {
            let store = SledStore::open(path)
                .with_context(|| format!("opening ledger at {}", path.display()))?;
            execute(LedgerEngine::with_config(store, &config), cli)
        }
    }
}

fn execute<S: AccountStore>(engine: LedgerEngine<S>, cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Register { username } => {
            let account = engine.open_account(username)?;
            output::registered(&account, cli.json)
        }
        Commands::Balance { username } => {
            let balance = engine.balance(username)?;
            output::balance(username.trim(), balance, cli.json)
        }
        Commands::Deposit { username, amount } => {
            let balance = engine.deposit(username, amount)?;
            output::applied("Deposit successful", username.trim(), balance, cli.json)
        }
        Commands::Withdraw { username, amount } => {
            let balance = engine.withdraw(username, amount)?;
            output::applied("Withdrawal successful", username.trim(), balance, cli.json)
        }
        Commands::Transfer {
            sender,
            amount,
            recipient,
        } => {
            let receipt = engine.transfer(sender, amount, recipient)?;
            output::receipt(&receipt, cli.json)
        }
        Commands::Ranking => output::ranking(&engine.ranking()?, cli.json),
    }
}
