//! Herald - guild config store maintenance tool.
//!
//! Operator entry point for the guild configuration store:
//!
//! - `migrate <backend> [args...]` - copy every guild config into another
//!   store and make it the active one on next start
//! - `show <guild_id>` - print one guild's config (created if absent)
//! - `list` - print every persisted guild config
//!
//! Exit codes for `migrate`: 0 done, 1 fatal, 2 some guilds failed to copy,
//! 3 copied but the settings file could not be updated.

use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use herald::config::{Config, StoreSelector};
use herald::context::open_active_store;
use herald::migration::{Migrator, SelectorOutcome};
use herald::store::{open_store, BackendKind};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

const EXIT_RECORD_FAILURES: u8 = 2;
const EXIT_SELECTOR_FAILED: u8 = 3;

#[derive(Parser)]
#[command(name = "herald")]
#[command(about = "Guild config store maintenance", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Copy every guild config to another store and activate it
    Migrate {
        /// Destination backend (json, sqlite, mongo or a full store name)
        backend: String,

        /// Constructor arguments for the destination, joined with spaces
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Print one guild's config, creating it if absent
    Show {
        guild_id: u64,
    },

    /// Print every persisted guild config
    List,
}

fn main() -> ExitCode {
    // Load .env file first (before anything else)
    dotenvy::dotenv().ok();

    // If RUST_LOG is not set, default to "info" level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("herald=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match run(cli.command, &config) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command, config: &Config) -> anyhow::Result<ExitCode> {
    match command {
        Command::Migrate { backend, args } => migrate(config, &backend, &args.join(" ")),
        Command::Show { guild_id } => {
            let (_, store) = open_active_store(config)?;
            let guild = store.get_or_create(guild_id)?;
            println!("{}", serde_json::to_string_pretty(&guild.snapshot())?);
            Ok(ExitCode::SUCCESS)
        }
        Command::List => {
            let (_, store) = open_active_store(config)?;
            let mut all: Vec<_> = store.get_all()?.iter().map(|c| c.snapshot()).collect();
            all.sort_by_key(|s| s.tenant_id());
            println!("{}", serde_json::to_string_pretty(&all)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn migrate(config: &Config, backend: &str, args: &str) -> anyhow::Result<ExitCode> {
    let kind: BackendKind = backend.parse()?;
    let target = StoreSelector::new(kind, args);

    let (current, source) = open_active_store(config).context("cannot open current store")?;
    if current.kind == target.kind && current.effective_args() == target.effective_args() {
        bail!("{} is already the active store", source.describe());
    }

    let destination = open_store(target.kind, &target.args, config.guild_cache)
        .context("cannot open destination store")?;
    info!("Migrating {} -> {}", source.describe(), destination.describe());

    let report = Migrator::new(source.as_ref(), destination.as_ref())
        .run(&config.settings_path, target)?;

    let code = match report.selector {
        SelectorOutcome::Rewritten => {
            info!("Successfully migrated {} configurations", report.copied);
            ExitCode::SUCCESS
        }
        SelectorOutcome::Skipped => {
            for failure in &report.failures {
                error!("Guild {}: {}", failure.tenant_id, failure.error);
            }
            ExitCode::from(EXIT_RECORD_FAILURES)
        }
        SelectorOutcome::Failed(_) => ExitCode::from(EXIT_SELECTOR_FAILED),
    };
    Ok(code)
}
