//! Session-level CLI commands: list, exchange, edit, remove.
//!
//! `exchange` and `edit` go through `ChatService`, so a first exchange names
//! the session and editing the opening message renames it.

use anyhow::Result;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;
use dialoguer::Confirm;
use uuid::Uuid;

use chatlog_core::chat::repository::ChatRepository;
use chatlog_core::chat::service::Exchange;
use chatlog_types::chat::SessionKey;

use super::SessionArgs;
use crate::state::AppState;

/// List a user's sessions with their titles.
///
/// # Examples
///
/// ```bash
/// chatlog sessions alice
/// chatlog sessions alice --json
/// ```
pub async fn list_sessions(state: &AppState, user: &str, json: bool) -> Result<()> {
    let service = state.session_service();
    let session_ids = service.sessions(user).await?;
    let titles = service.titles(user).await?;

    if json {
        let sessions: Vec<_> = session_ids
            .iter()
            .map(|id| {
                let title = titles.iter().find(|t| &t.session_id == id).map(|t| &t.title);
                serde_json::json!({"session_id": id, "title": title})
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(());
    }

    if session_ids.is_empty() {
        println!();
        println!(
            "  {} No sessions found for '{}'. Start one with: {}",
            style("i").blue().bold(),
            style(user).cyan(),
            style(format!("chatlog exchange {user} \"hello\" --reply \"hi\"")).yellow()
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
        Cell::new("Messages").fg(Color::White),
    ]);

    for id in &session_ids {
        let key = SessionKey::new(user, id.as_str())?;
        let count = state.store.list_messages(&key).await?.len();
        let title_cell = match titles.iter().find(|t| &t.session_id == id) {
            Some(t) => Cell::new(&t.title).fg(Color::Cyan),
            None => Cell::new("(untitled)").fg(Color::DarkGrey),
        };

        table.add_row(vec![
            Cell::new(id).fg(Color::White),
            title_cell,
            Cell::new(count.to_string()).fg(Color::White),
        ]);
    }

    println!();
    println!("  Sessions for '{}'", style(user).cyan().bold());
    println!();
    println!("{table}");
    println!();
    println!(
        "  {} session{}",
        style(session_ids.len()).bold(),
        if session_ids.len() == 1 { "" } else { "s" }
    );
    println!();

    Ok(())
}

/// Store a user message and the reply produced for it.
///
/// # Examples
///
/// ```bash
/// chatlog exchange alice "Plan a trip to Kyoto" --reply "Sure! When?"
/// chatlog exchange alice "Next week" --reply "Great." --session 0193...
/// ```
pub async fn exchange(
    state: &AppState,
    user: &str,
    session: Option<String>,
    message: &str,
    reply: String,
    json: bool,
) -> Result<()> {
    let session = session.unwrap_or_else(|| Uuid::now_v7().to_string());
    let key = SessionKey::new(user, session)?;

    let exchange = state.chat_service(reply).send(&key, message).await?;
    print_exchange(&key, &exchange, json)
}

/// Replace the user message at `sequence` (and everything after it).
///
/// # Examples
///
/// ```bash
/// chatlog edit alice trip 3 "Actually, plan for Osaka" --reply "Osaka it is."
/// ```
pub async fn edit(
    state: &AppState,
    target: &SessionArgs,
    sequence: u32,
    message: &str,
    reply: String,
    json: bool,
) -> Result<()> {
    let key = target.key()?;
    let exchange = state.chat_service(reply).edit(&key, sequence, message).await?;
    print_exchange(&key, &exchange, json)
}

/// Delete a session's messages and title, with confirmation.
pub async fn remove(state: &AppState, target: &SessionArgs, force: bool, json: bool) -> Result<()> {
    let key = target.key()?;
    let service = state.session_service();

    if !force && !json {
        let count = service.history(&key).await?.len();
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Delete session '{}' ({} messages)?",
                style(&key).red().bold(),
                count
            ))
            .default(false)
            .interact()?;

        if !confirmed {
            println!("  Cancelled.");
            return Ok(());
        }
    }

    let removal = service.delete_session(&key).await?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "user_id": key.user_id,
                "session_id": key.session_id,
                "messages": removal.messages,
                "title": removal.title,
            })
        );
    } else {
        println!(
            "  {} Session '{}' deleted ({} message{}{}).",
            style("x").red().bold(),
            key,
            removal.messages,
            if removal.messages == 1 { "" } else { "s" },
            if removal.title.is_deleted() { ", title" } else { "" }
        );
    }

    Ok(())
}

fn print_exchange(key: &SessionKey, exchange: &Exchange, json: bool) -> Result<()> {
    if json {
        let output = serde_json::json!({
            "user_id": key.user_id,
            "session_id": key.session_id,
            "exchange": exchange,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!();
    println!("  Session '{}'", style(key).cyan().bold());
    if let Some(title) = &exchange.title {
        println!("  Title:  {}", style(&title.title).bold());
    }
    println!();
    println!(
        "  {} {}",
        style(format!("#{} you", exchange.request.sequence)).cyan(),
        exchange.request.content
    );
    println!(
        "  {} {}",
        style(format!("#{} assistant", exchange.reply.sequence)).green(),
        exchange.reply.content
    );
    println!();

    Ok(())
}
