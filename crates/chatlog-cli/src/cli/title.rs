//! Title CLI commands: list, set, show, delete.

use anyhow::Result;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;

use chatlog_core::chat::repository::ChatRepository;
use chatlog_types::chat::DeleteOutcome;

use super::SessionArgs;
use crate::state::AppState;

/// List a user's titles, most recently updated first.
pub async fn list_titles(state: &AppState, user: &str, json: bool) -> Result<()> {
    let titles = state.session_service().titles(user).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&titles)?);
        return Ok(());
    }

    if titles.is_empty() {
        println!();
        println!(
            "  {} No titles for '{}'.",
            style("i").blue().bold(),
            style(user).cyan()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Session").fg(Color::White),
        Cell::new("Title").fg(Color::White),
        Cell::new("Created").fg(Color::White),
        Cell::new("Updated").fg(Color::White),
    ]);

    for title in &titles {
        table.add_row(vec![
            Cell::new(&title.session_id).fg(Color::White),
            Cell::new(&title.title).fg(Color::Cyan),
            Cell::new(title.created_at.format("%Y-%m-%d %H:%M").to_string()).fg(Color::DarkGrey),
            Cell::new(title.updated_at.format("%Y-%m-%d %H:%M").to_string()).fg(Color::White),
        ]);
    }

    println!();
    println!("  Titles for '{}'", style(user).cyan().bold());
    println!();
    println!("{table}");
    println!();

    Ok(())
}

/// Set a session title. The display cap is applied.
pub async fn set_title(state: &AppState, target: &SessionArgs, title: &str, json: bool) -> Result<()> {
    let key = target.key()?;
    let record = state.session_service().rename(&key, title).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        println!(
            "  {} Title for '{}' set to {}",
            style("*").green().bold(),
            key,
            style(&record.title).bold()
        );
    }

    Ok(())
}

/// Show a session title.
pub async fn show_title(state: &AppState, target: &SessionArgs, json: bool) -> Result<()> {
    let key = target.key()?;
    let record = state.store.get_title(&key).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    match record {
        Some(record) => {
            println!();
            println!("  {}", style(&record.title).cyan().bold());
            println!();
            println!(
                "  Created: {}",
                record.created_at.format("%Y-%m-%d %H:%M UTC")
            );
            println!(
                "  Updated: {}",
                record.updated_at.format("%Y-%m-%d %H:%M UTC")
            );
            println!();
        }
        None => println!(
            "  {} '{}' has no title.",
            style("i").blue().bold(),
            key
        ),
    }

    Ok(())
}

/// Delete a session title. The messages are kept.
pub async fn delete_title(state: &AppState, target: &SessionArgs, json: bool) -> Result<()> {
    let key = target.key()?;
    let outcome = state.store.delete_title(&key).await?;

    if json {
        println!("{}", serde_json::json!({"outcome": outcome}));
        return Ok(());
    }

    match outcome {
        DeleteOutcome::Deleted => println!(
            "  {} Title for '{}' deleted.",
            style("x").red().bold(),
            key
        ),
        DeleteOutcome::NotFound => println!(
            "  {} '{}' has no title; nothing to delete.",
            style("i").blue().bold(),
            key
        ),
    }

    Ok(())
}
