//! FriendFace CLI - browse cached profiles in your terminal

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod output;

use commands::{config, doctor, logs, show, status, sync, users};
use friendface_core::services::LogEvent;

/// FriendFace - fetch and browse user profiles
#[derive(Parser)]
#[command(name = "ff", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the profile feed and update the local cache
    Sync {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List cached users
    Users {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one user with tags and friends
    Show {
        /// User id
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show cache status and last sync
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run cache health checks
    Doctor {
        /// Show verbose output
        #[arg(long, short)]
        verbose: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// View and manage the event log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },

    /// Show or change the feed endpoint
    Config {
        #[command(subcommand)]
        command: config::ConfigCommands,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Sync { .. } => "sync",
            Commands::Users { .. } => "users",
            Commands::Show { .. } => "show",
            Commands::Status { .. } => "status",
            Commands::Doctor { .. } => "doctor",
            Commands::Logs { .. } => "logs",
            Commands::Config { .. } => "config",
        }
    }
}

fn init_tracing() {
    // Diagnostics go to stderr so --json output stays clean
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("Error: {:#}", e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let logger = commands::get_logger();
    commands::log_event(
        logger.as_deref(),
        LogEvent::new("command_executed").with_command(cli.command.name()),
    );

    match cli.command {
        Commands::Sync { json } => sync::run(logger, json).await,
        Commands::Users { json } => users::run(json),
        Commands::Show { id, json } => show::run(&id, json),
        Commands::Status { json } => status::run(json),
        Commands::Doctor { verbose, json } => doctor::run(verbose, json),
        Commands::Logs { command } => logs::run(command),
        Commands::Config { command } => config::run(command),
    }
}
