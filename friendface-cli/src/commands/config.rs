//! Config command - show or change the feed endpoint

use std::path::Path;

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use friendface_core::config::{Config, ENDPOINT_ENV};

use super::get_data_dir;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the endpoint the next sync will use
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Store a new feed endpoint in settings.json
    SetEndpoint {
        /// Feed URL (https, or http for loopback hosts)
        url: String,
    },
}

/// Validate `url`, then persist it without touching other settings
fn set_endpoint(data_dir: &Path, url: &str) -> Result<Config> {
    std::fs::create_dir_all(data_dir)?;
    let mut config = Config::load(data_dir)?;
    config.set_endpoint(url)?;
    config.save(data_dir)?;
    Ok(config)
}

pub fn run(command: ConfigCommands) -> Result<()> {
    let data_dir = get_data_dir()?;

    match command {
        ConfigCommands::Show { json } => {
            let config = Config::load(&data_dir)?;
            let overridden = std::env::var(ENDPOINT_ENV).is_ok_and(|v| !v.is_empty());

            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "endpoint": config.endpoint,
                        "env_override": overridden,
                        "data_dir": data_dir.to_string_lossy(),
                    })
                );
            } else {
                println!("Endpoint: {}", config.endpoint);
                if overridden {
                    println!("{}", format!("(set by {})", ENDPOINT_ENV).dimmed());
                }
                println!("Data directory: {}", data_dir.display());
            }
        }
        ConfigCommands::SetEndpoint { url } => {
            set_endpoint(&data_dir, &url)?;
            println!("{} endpoint set to {}", "Saved:".green(), url);
            if std::env::var(ENDPOINT_ENV).is_ok_and(|v| !v.is_empty()) {
                println!(
                    "{}",
                    format!("{} is set and still takes precedence", ENDPOINT_ENV).yellow()
                );
            }
        }
    }

    Ok(())
}
