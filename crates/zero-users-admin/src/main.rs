/*!
 * Zero-Users Admin
 *
 * Operator CLI for retiring users:
 * 1. Resolve a handle (username, alias or id) to the stored user
 * 2. Remove the user and every index entry that references it
 *
 * Usage:
 *   cargo run -p zero-users-admin -- show <handle>
 *   cargo run -p zero-users-admin -- remove <handle> [--json]
 */

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use zero_users_core::{IdentityResolver, StoreIdentityResolver, UserRemoval, UserRemovalService};
use zero_users_storage::RocksDbStorage;

use config::Config;

// CLI structure
#[derive(Parser)]
#[command(name = "zero-users-admin")]
#[command(about = "Remove users and their index entries")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the stored record a handle resolves to
    Show {
        /// Username, alias or user id
        handle: String,
    },
    /// Remove a user (not revertible)
    ///
    /// Retrying after a store failure works only while the handle still
    /// resolves. Once the data record is deleted, leftover tokens, throttle
    /// counters and organization memberships must be cleaned by a caller
    /// that kept the resolved record.
    Remove {
        /// Username, alias or user id
        handle: String,

        /// Print the removal report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "zero_users=info,zero_users_admin=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<zero_users_core::RemovalError>() {
                Some(removal) if removal.is_client_error() => {
                    eprintln!("rejected ({}): {}", removal.status_code(), removal);
                }
                Some(removal) if removal.is_retryable() => {
                    eprintln!(
                        "store failure, retry while the handle still resolves: {:#}",
                        e
                    );
                }
                _ => eprintln!("error: {:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::from_env()?;
    let storage = Arc::new(
        RocksDbStorage::open(&config.database_path)
            .with_context(|| format!("opening {}", config.database_path.display()))?,
    );

    match cli.command {
        Commands::Show { handle } => {
            let record = StoreIdentityResolver::new(storage).resolve(&handle).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Commands::Remove { handle, json } => {
            tracing::info!("Removing {} from {}", handle, config.database_path.display());
            let service = UserRemovalService::with_store(storage, config.removal);
            let report = service.remove_user(&handle).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("removed user {}", report.user_id);
                println!("  primary pipeline: {:?}", report.results);
                println!("  organizations:    {:?}", report.organizations);
                println!("  caches busted at: {}", report.invalidated_at);
            }
        }
    }

    Ok(())
}
