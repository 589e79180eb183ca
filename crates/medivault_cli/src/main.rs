//! Operator CLI.
//!
//! # Responsibility
//! - Probe `medivault_core` linkage (`ping`).
//! - Create or migrate a database file ahead of server start.
//! - Bootstrap the first admin account, which public sign-up cannot create.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use medivault_core::db::migrations::{latest_version, schema_version};
use medivault_core::{init_stderr_logging, open_db, UserService};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "medivault")]
#[command(about = "MediVault operator tooling")]
struct Cli {
    /// Log level: trace, debug, info, warn or error
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print core version and a linkage probe
    Ping,
    /// Open the database and apply pending migrations
    Migrate {
        /// SQLite database file
        #[arg(long)]
        db: PathBuf,
    },
    /// Create an administrator account
    CreateAdmin {
        /// SQLite database file
        #[arg(long)]
        db: PathBuf,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// Full display name
        #[arg(long)]
        name: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let outcome = init_stderr_logging(&cli.log_level)
        .context("failed to initialize logging")
        .and_then(|()| run(cli.command));

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Ping => {
            println!("medivault_core ping={}", medivault_core::ping());
            println!("medivault_core version={}", medivault_core::core_version());
        }
        Commands::Migrate { db } => {
            let conn =
                open_db(&db).with_context(|| format!("failed to migrate {}", db.display()))?;
            let version = schema_version(&conn).context("failed to read schema version")?;
            println!(
                "{} at schema version {version} (latest {})",
                db.display(),
                latest_version()
            );
        }
        Commands::CreateAdmin {
            db,
            email,
            password,
            name,
        } => {
            let conn = open_db(&db).with_context(|| format!("failed to open {}", db.display()))?;
            let users =
                UserService::from_connection(&conn).context("failed to prepare user store")?;
            let admin = users
                .bootstrap_admin(&email, &password, &name)
                .with_context(|| format!("failed to create admin {email}"))?;
            info!(
                "event=admin_create module=cli status=ok user_id={}",
                admin.id
            );
            println!("created admin {} ({})", admin.email, admin.id);
        }
    }
    Ok(())
}
