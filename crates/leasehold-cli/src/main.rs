//! Leasehold operator command line
//!
//! Bootstraps the lock table, inspects and force-releases lock records, and
//! exercises the lock protocol against a live store.

mod commands;
mod logging;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use leasehold_core::config::{DB_URL, LOG_LEVEL};
use leasehold_core::{Configuration, LockProvider};
use leasehold_persistence::{LockStore, MemoryLockStore, SqlLockStore};
use tracing::info;

/// Command line arguments
#[derive(Debug, Parser)]
#[command(name = "leasehold", version, about = "Lease-based distributed lock tooling")]
struct Cli {
    /// Configuration file (defaults to conf/leasehold.yml when present)
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,
    #[arg(long = "db-url", env = "DATABASE_URL")]
    database_url: Option<String>,
    #[arg(long = "log-level")]
    log_level: Option<String>,
    /// Backing store; `memory` only makes sense for `hold` and `race`
    #[arg(long = "store", value_enum, default_value_t = StoreKind::Sql)]
    store: StoreKind,
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum StoreKind {
    Sql,
    Memory,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the lock table if it does not exist
    InitSchema,
    /// Print the record of a lock key as JSON
    Inspect { lock_key: String },
    /// Delete the record of a lock key regardless of its holder
    Release { lock_key: String },
    /// Acquire a lock, hold it while renewing, then release it
    Hold {
        lock_key: String,
        #[arg(long = "lease-ms")]
        lease_ms: Option<u64>,
        #[arg(long = "hold-ms", default_value_t = 10_000)]
        hold_ms: u64,
    },
    /// Race concurrent workers for one lock key
    Race {
        lock_key: String,
        #[arg(long, default_value_t = 9)]
        workers: usize,
        #[arg(long = "wait-ms", default_value_t = 30_000)]
        wait_ms: u64,
        #[arg(long = "lease-ms", default_value_t = 10_000)]
        lease_ms: u64,
        #[arg(long = "hold-ms", default_value_t = 5_000)]
        hold_ms: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let mut overrides: Vec<(String, config::Value)> = Vec::new();
    if let Some(v) = args.database_url {
        overrides.push((DB_URL.to_string(), v.into()));
    }
    if let Some(v) = args.log_level {
        overrides.push((LOG_LEVEL.to_string(), v.into()));
    }
    let configuration = Configuration::load_with_overrides(args.config.as_deref(), overrides)?;

    let logging_config =
        logging::LoggingConfig::new(configuration.log_dir(), &configuration.log_level());
    let _logging_guard = logging::init_logging(&logging_config)?;

    let store: Arc<dyn LockStore> = match args.store {
        StoreKind::Sql => {
            let sql = SqlLockStore::connect(&configuration.database_settings()?).await?;
            if let Command::InitSchema = args.command {
                return commands::init_schema(&sql).await;
            }
            Arc::new(sql)
        }
        StoreKind::Memory => {
            if let Command::InitSchema = args.command {
                anyhow::bail!("init-schema requires the sql store");
            }
            Arc::new(MemoryLockStore::new())
        }
    };
    store.health_check().await?;
    info!(storage_mode = %store.storage_mode(), "Lock store ready");

    let settings = configuration.lock_settings();
    let provider = LockProvider::new(store.clone(), settings);

    match args.command {
        Command::InitSchema => {}
        Command::Inspect { lock_key } => match commands::inspect(store.as_ref(), &lock_key).await? {
            Some(view) => println!("{}", serde_json::to_string_pretty(&view)?),
            None => println!("absent"),
        },
        Command::Release { lock_key } => {
            let deleted = commands::release(store.as_ref(), &lock_key).await?;
            println!("{}", if deleted { "released" } else { "absent" });
        }
        Command::Hold {
            lock_key,
            lease_ms,
            hold_ms,
        } => {
            let lease = lease_ms
                .map(Duration::from_millis)
                .unwrap_or(settings.default_lease);
            commands::hold(&provider, &lock_key, lease, Duration::from_millis(hold_ms)).await?;
        }
        Command::Race {
            lock_key,
            workers,
            wait_ms,
            lease_ms,
            hold_ms,
        } => {
            let report = commands::race(
                &provider,
                &lock_key,
                workers,
                Duration::from_millis(wait_ms),
                Duration::from_millis(lease_ms),
                Duration::from_millis(hold_ms),
            )
            .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
