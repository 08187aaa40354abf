//! Store status command.

use anyhow::Result;
use console::style;

use chatlog_infra::config::{BACKEND_ENV, DATABASE_URL_ENV};
use chatlog_types::config::BackendKind;

use crate::state::AppState;

/// Display the selected backend and where its data lives.
pub async fn status(state: &AppState, json: bool) -> Result<()> {
    let backend = state.store.kind();
    let sqlite = &state.config.sqlite;
    let location = match backend {
        BackendKind::InMemory => None,
        BackendKind::Sqlite => Some(chatlog_infra::sqlite::pool::database_url(
            sqlite,
            &state.data_dir,
        )),
    };

    if json {
        let status = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "data_dir": state.data_dir.display().to_string(),
            "backend": backend.to_string(),
            "persistent": backend == BackendKind::Sqlite,
            "database": location,
            "messages_collection": sqlite.messages_collection,
            "titles_collection": sqlite.titles_collection,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!();
    println!("  {} chatlog v{}", style("#").bold(), env!("CARGO_PKG_VERSION"));
    println!();

    println!("  {}", style("── Store ──").dim());
    println!("  Backend:  {}", style(backend).bold());
    match &location {
        Some(url) => {
            println!("  Database: {}", style(url).cyan());
            println!(
                "  Tables:   {}, {}",
                sqlite.messages_collection, sqlite.titles_collection
            );
        }
        None => println!(
            "  {}",
            style("In-memory: data lives only for this process.").yellow()
        ),
    }
    println!();

    println!("  {}", style("── Paths ──").dim());
    println!("  Data dir: {}", state.data_dir.display());
    println!(
        "  Config:   {}",
        state.data_dir.join("config.toml").display()
    );
    println!(
        "  Env:      {}, {}",
        style(BACKEND_ENV).dim(),
        style(DATABASE_URL_ENV).dim()
    );
    println!();

    Ok(())
}
