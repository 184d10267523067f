//! Status command - cache contents and last sync

use anyhow::Result;
use colored::Colorize;
use comfy_table::{ContentArrangement, Table};

use super::get_context;
use crate::output::{format_rfc3339, format_size};

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let status = ctx.status_service.get_status()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("{}", "Profile Cache Status".bold());
    println!();

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.add_row(vec!["Users", &status.total_users.to_string()]);
    table.add_row(vec!["Friends", &status.total_friends.to_string()]);
    table.add_row(vec!["Memberships", &status.total_memberships.to_string()]);
    table.add_row(vec!["Cache size", &format_size(status.db_size_bytes)]);

    println!("{}", table);
    println!();

    println!("Endpoint: {}", ctx.config.endpoint);
    match &status.last_sync {
        Some(run) => println!(
            "Last sync: {} ({} users, {} new)",
            format_rfc3339(&run.finished_at),
            run.users_ingested,
            run.users_new
        ),
        None => println!("{}", "Never synced. Run 'ff sync'.".yellow()),
    }

    Ok(())
}
