//! pqo-cli — operator commands for inspecting and repairing a running
//! procurement orchestration deployment without going through the HTTP
//! surface pqo-daemon exposes.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "pqo")]
#[command(about = "Procurement orchestration operator CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Document store commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Duplicate-detection sweep commands
    Reconcile {
        #[command(subcommand)]
        cmd: ReconcileCmd,
    },

    /// Transactional outbox commands
    Outbox {
        #[command(subcommand)]
        cmd: OutboxCmd,
    },

    /// Distributed lock commands
    Lock {
        #[command(subcommand)]
        cmd: LockCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    /// Connect and run a trivial query
    Status,
    /// Apply pending migrations
    Migrate,
}

#[derive(Subcommand)]
enum ReconcileCmd {
    /// Run one duplicate-detection sweep immediately
    Run {
        /// Freshness bound in minutes used to report `clean` afterward
        #[arg(long, default_value_t = 10)]
        freshness_minutes: i64,
    },
}

#[derive(Subcommand)]
enum OutboxCmd {
    /// List messages that exhausted their retry budget
    DeadLetters {
        #[arg(long, default_value_t = 100)]
        limit: i64,
    },
    /// Reset a dead-lettered message back to pending
    Retry {
        #[arg(long)]
        id: String,
    },
}

#[derive(Subcommand)]
enum LockCmd {
    /// Check whether a scope/resource pair is currently held
    Status {
        #[arg(long)]
        scope: String,
        #[arg(long)]
        resource_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => match cmd {
            DbCmd::Status => commands::db::status().await?,
            DbCmd::Migrate => commands::db::migrate().await?,
        },

        Commands::Reconcile { cmd } => match cmd {
            ReconcileCmd::Run { freshness_minutes } => commands::reconcile::run(freshness_minutes).await?,
        },

        Commands::Outbox { cmd } => match cmd {
            OutboxCmd::DeadLetters { limit } => commands::outbox::list_dead_letters(limit).await?,
            OutboxCmd::Retry { id } => commands::outbox::retry(id).await?,
        },

        Commands::Lock { cmd } => match cmd {
            LockCmd::Status { scope, resource_id } => commands::lock::status(scope, resource_id).await?,
        },
    }

    Ok(())
}
