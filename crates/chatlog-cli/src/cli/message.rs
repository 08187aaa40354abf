//! Message-level CLI commands: append, history, clear, delete, rewind.

use anyhow::Result;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;
use dialoguer::Confirm;

use chatlog_core::chat::repository::ChatRepository;
use chatlog_types::chat::{DeleteOutcome, MessageRole, NewMessage};

use super::SessionArgs;
use crate::state::AppState;

/// Append a single message with a store-assigned sequence number.
///
/// # Examples
///
/// ```bash
/// chatlog append alice trip "What should I pack?"
/// chatlog append alice trip "A raincoat." --role assistant
/// ```
pub async fn append(
    state: &AppState,
    target: &SessionArgs,
    content: String,
    role: MessageRole,
    json: bool,
) -> Result<()> {
    let key = target.key()?;
    let stored = state
        .store
        .append_message(&key, &NewMessage { role, content })
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stored)?);
    } else {
        println!(
            "  {} Stored {} message #{} in {}",
            style("+").green().bold(),
            stored.role,
            style(stored.sequence).bold(),
            style(&key).cyan()
        );
    }

    Ok(())
}

/// Show every message in a session, oldest first.
pub async fn history(state: &AppState, target: &SessionArgs, json: bool) -> Result<()> {
    let key = target.key()?;
    let messages = state.session_service().history(&key).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&messages)?);
        return Ok(());
    }

    if messages.is_empty() {
        println!();
        println!(
            "  {} No messages in '{}'.",
            style("i").blue().bold(),
            style(&key).cyan()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("#").fg(Color::White),
        Cell::new("Role").fg(Color::White),
        Cell::new("Content").fg(Color::White),
    ]);

    for message in &messages {
        let role_cell = match message.role {
            MessageRole::User => Cell::new("user").fg(Color::Cyan),
            MessageRole::Assistant => Cell::new("assistant").fg(Color::Green),
        };
        table.add_row(vec![
            Cell::new(message.sequence.to_string()).fg(Color::DarkGrey),
            role_cell,
            Cell::new(&message.content),
        ]);
    }

    println!();
    println!("  History for '{}'", style(&key).cyan().bold());
    println!();
    println!("{table}");
    println!();
    println!(
        "  {} message{}",
        style(messages.len()).bold(),
        if messages.len() == 1 { "" } else { "s" }
    );
    println!();

    Ok(())
}

/// Remove every message in a session, with confirmation.
pub async fn clear(state: &AppState, target: &SessionArgs, force: bool, json: bool) -> Result<()> {
    let key = target.key()?;

    if !force && !json {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Clear all messages in '{}'?",
                style(&key).red().bold()
            ))
            .default(false)
            .interact()?;

        if !confirmed {
            println!("  Cancelled.");
            return Ok(());
        }
    }

    let removed = state.session_service().clear(&key).await?;

    if json {
        println!(
            "{}",
            serde_json::json!({"user_id": key.user_id, "session_id": key.session_id, "removed": removed})
        );
    } else {
        println!(
            "  {} Cleared {} message{} from '{}'.",
            style("x").red().bold(),
            removed,
            if removed == 1 { "" } else { "s" },
            key
        );
    }

    Ok(())
}

/// Delete one message. A missing message is reported, not treated as a failure.
pub async fn delete(state: &AppState, target: &SessionArgs, sequence: u32, json: bool) -> Result<()> {
    let key = target.key()?;
    let outcome = state.session_service().delete_message(&key, sequence).await?;

    if json {
        println!(
            "{}",
            serde_json::json!({"sequence": sequence, "outcome": outcome})
        );
        return Ok(());
    }

    match outcome {
        DeleteOutcome::Deleted => println!(
            "  {} Deleted message #{} from '{}'.",
            style("x").red().bold(),
            sequence,
            key
        ),
        DeleteOutcome::NotFound => println!(
            "  {} No message #{} in '{}'; nothing to delete.",
            style("i").blue().bold(),
            sequence,
            key
        ),
    }

    Ok(())
}

/// Delete the message at `sequence` and everything after it.
pub async fn rewind(state: &AppState, target: &SessionArgs, sequence: u32, json: bool) -> Result<()> {
    let key = target.key()?;
    let removed = state.store.delete_from(&key, sequence).await?;

    if json {
        println!(
            "{}",
            serde_json::json!({"from": sequence, "removed": removed})
        );
    } else {
        println!(
            "  {} Rewound '{}' to before #{} ({} message{} removed).",
            style("<").yellow().bold(),
            key,
            sequence,
            removed,
            if removed == 1 { "" } else { "s" }
        );
    }

    Ok(())
}
