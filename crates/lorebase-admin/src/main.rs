//! # lorebase-admin
//!
//! Maintenance tool for a Lorebase database file.
//!
//! Configuration comes from the same `LOREBASE_*` environment variables the
//! store reads, with `--db` and `--multi-tenant` taking precedence. Opening
//! the store always runs the schema migrator first.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use lorebase_shared::Tenancy;
use lorebase_store::{AuditFilter, Database, StoreConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lorebase-admin")]
#[command(author, version, about = "Maintenance commands for the Lorebase store")]
#[command(propagate_version = true)]
struct Cli {
    /// Database file (default: LOREBASE_DB_PATH or the platform data dir)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Open in multi-tenant mode (creates the admin account if missing)
    #[arg(long, global = true)]
    multi_tenant: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bring the schema up to date and report what changed
    Migrate,

    /// Show whether an account is locked out
    LockStatus {
        username: String,
    },

    /// Clear failed login attempts for an account
    Unlock {
        username: String,
    },

    /// Delete expired login tokens
    PurgeTokens,

    /// Print audit entries as JSON lines, newest first
    Audit {
        /// Only entries with this operation
        #[arg(short, long)]
        operation: Option<String>,

        /// Maximum number of entries
        #[arg(short, long, default_value_t = 50)]
        limit: u32,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,lorebase_store=debug")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn store_config(cli: &Cli) -> StoreConfig {
    let mut config = StoreConfig::from_env();
    if let Some(path) = &cli.db {
        config.db_path = Some(path.clone());
    }
    if cli.multi_tenant {
        config.tenancy = Tenancy::Multi;
    }
    config
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = store_config(&cli);
    let (db, report) = Database::open_with_report(&config).context("opening store")?;
    info!(path = %db.path().display(), "store ready");

    match cli.command {
        Commands::Migrate => {
            if report.is_noop() {
                println!("schema is current");
            } else {
                for column in &report.columns_added {
                    println!("added column {column}");
                }
                for account in &report.accounts_created {
                    println!("created account {account}");
                }
                for table in &report.tables_rebuilt {
                    println!("rebuilt table {table}");
                }
                if report.sessions_backfilled > 0 {
                    println!("backfilled {} sessions", report.sessions_backfilled);
                }
            }
            if let Some(admin) = db.take_initial_admin() {
                println!(
                    "initial admin password for '{}': {} (must be changed at first login)",
                    admin.username, admin.password
                );
            }
        }
        Commands::LockStatus { username } => {
            let state = db.is_account_locked(&username);
            println!("{}", serde_json::to_string(&state)?);
        }
        Commands::Unlock { username } => {
            let removed = db
                .clear_failed_logins(&username)
                .with_context(|| format!("clearing failed logins for {username}"))?;
            println!("cleared {removed} failed attempts for {username}");
        }
        Commands::PurgeTokens => {
            let purged = db.purge_expired_tokens()?;
            println!("purged {purged} expired tokens");
        }
        Commands::Audit { operation, limit } => {
            let entries = db.query_audit(&AuditFilter {
                operation,
                limit: Some(limit),
                ..Default::default()
            })?;
            for entry in entries {
                println!("{}", serde_json::to_string(&entry)?);
            }
        }
    }
    Ok(())
}
