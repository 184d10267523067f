//! Users command - master list of cached users

use anyhow::Result;
use colored::Colorize;
use comfy_table::{Cell, Color};
use serde::Serialize;

use super::get_context;
use crate::output;

#[derive(Serialize)]
struct UserRow<'a> {
    id: &'a str,
    name: &'a str,
    active: bool,
    company: &'a str,
    email: &'a str,
    friends: usize,
    tags: Vec<String>,
}

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let users = ctx.users()?;

    if json {
        let rows: Vec<UserRow> = users
            .iter()
            .map(|u| UserRow {
                id: &u.id,
                name: u.display_name(),
                active: u.is_active,
                company: u.display_company(),
                email: u.display_email(),
                friends: u.friends.len(),
                tags: u.display_tags(),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if users.is_empty() {
        println!("{}", "No users cached. Run 'ff sync' to fetch them.".yellow());
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["Name", "Status", "Company", "Email", "Friends", "ID"]);

    for user in &users {
        let status = if user.is_active {
            Cell::new(user.activity_label()).fg(Color::Green)
        } else {
            Cell::new(user.activity_label()).fg(Color::DarkGrey)
        };
        table.add_row(vec![
            Cell::new(user.display_name()),
            status,
            Cell::new(user.display_company()),
            Cell::new(user.display_email()),
            Cell::new(user.friends.len()),
            Cell::new(&user.id),
        ]);
    }

    println!("{}", table);
    println!("{} user(s)", users.len());

    Ok(())
}
