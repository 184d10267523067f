//! Sync command - fetch the profile feed into the local cache

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;
use friendface_core::services::LoggingService;
use indicatif::{ProgressBar, ProgressStyle};

use super::get_context;

fn spinner(endpoint: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(format!("Fetching {}", endpoint));
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

pub async fn run(logger: Option<Arc<LoggingService>>, json: bool) -> Result<()> {
    let mut ctx = get_context()?;
    if let Some(logger) = logger {
        ctx = ctx.with_logger(logger);
    }

    let pb = (!json && atty::is(atty::Stream::Stdout)).then(|| spinner(&ctx.config.endpoint));

    let result = ctx.sync_service.sync().await;

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    let result = result.context("Sync failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    let report = &result.report;
    println!("{} {}", "Synced:".green(), ctx.config.endpoint);
    println!("  Users: {} ({} new)", report.users_ingested, report.users_new);
    println!("  Friends: {}", report.friends_ingested);
    println!("  Memberships: {}", report.memberships);
    if report.duplicates_collapsed > 0 {
        println!(
            "  Duplicate ids collapsed: {}",
            report.duplicates_collapsed.to_string().yellow()
        );
    }

    if !report.warnings.is_empty() {
        println!();
        println!("{}", "Warnings:".yellow().bold());
        for warning in &report.warnings {
            println!("  - {}", warning);
        }
    }

    if report.users_ingested == 0 {
        println!("{}", "The feed returned no users; cache left unchanged.".yellow());
    }

    Ok(())
}
