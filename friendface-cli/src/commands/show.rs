//! Show command - detail view of one user

use anyhow::{bail, Result};
use colored::Colorize;
use friendface_core::{FriendView, User};
use serde::Serialize;

use super::get_context;
use crate::output;

/// Detail view with every nullable field already resolved
#[derive(Serialize)]
struct UserDetail<'a> {
    id: &'a str,
    name: &'a str,
    age: i16,
    active: bool,
    company: &'a str,
    email: &'a str,
    address: &'a str,
    about: &'a str,
    registered: String,
    tags: Vec<String>,
    friends: Vec<FriendView>,
}

impl<'a> From<&'a User> for UserDetail<'a> {
    fn from(user: &'a User) -> Self {
        Self {
            id: &user.id,
            name: user.display_name(),
            age: user.age,
            active: user.is_active,
            company: user.display_company(),
            email: user.display_email(),
            address: user.display_address(),
            about: user.display_about(),
            registered: user.display_registered(),
            tags: user.display_tags(),
            friends: user.display_friends(),
        }
    }
}

pub fn run(id: &str, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let Some(user) = ctx.user(id)? else {
        bail!("No cached user with id {}", id);
    };
    let detail = UserDetail::from(&user);

    if json {
        println!("{}", serde_json::to_string_pretty(&detail)?);
        return Ok(());
    }

    println!("{}", detail.name.bold());
    let status = if detail.active {
        user.activity_label().green()
    } else {
        user.activity_label().dimmed()
    };
    println!("{}", status);
    println!();

    let mut table = output::create_table();
    table.add_row(vec!["Age", &detail.age.to_string()]);
    table.add_row(vec!["Company", detail.company]);
    table.add_row(vec!["Email", detail.email]);
    table.add_row(vec!["Address", detail.address]);
    table.add_row(vec!["Registered", &detail.registered]);
    println!("{}", table);
    println!();

    println!("{}", "About".bold());
    println!("{}", detail.about);
    println!();

    println!("{}", "Tags".bold());
    if detail.tags.is_empty() {
        println!("  {}", "none".dimmed());
    } else {
        println!("  {}", detail.tags.join("  "));
    }
    println!();

    println!("{}", "Friends".bold());
    if detail.friends.is_empty() {
        println!("  {}", "none".dimmed());
    }
    for friend in &detail.friends {
        println!("  • {} {}", friend.name, format!("({})", friend.id).dimmed());
    }

    Ok(())
}
