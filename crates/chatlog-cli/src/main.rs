//! chatlog CLI entry point.
//!
//! Binary name: `chatlog`
//!
//! Parses CLI arguments, sets up tracing, opens the configured store once,
//! then dispatches to the matching command handler.

mod cli;
mod state;

use clap::Parser;

use chatlog_observe::{init_tracing, shutdown_tracing, TracingOptions};
use cli::{Cli, Commands, TitleCommand};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let tracing_options = TracingOptions {
        json: cli.json,
        otel: cli.otel,
        ..TracingOptions::from_verbosity(cli.verbose, cli.quiet)
    };
    init_tracing(&tracing_options)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let state = AppState::init(cli.data_dir.clone(), cli.backend).await?;
    tracing::debug!(backend = %state.store.kind(), data_dir = %state.data_dir.display(), "Store ready");

    let json = cli.json;
    let result = match cli.command {
        Commands::Append {
            target,
            content,
            role,
        } => cli::message::append(&state, &target, content, role, json).await,

        Commands::History { target } => cli::message::history(&state, &target, json).await,

        Commands::Clear { target, force } => {
            cli::message::clear(&state, &target, force, json).await
        }

        Commands::Delete { target, sequence } => {
            cli::message::delete(&state, &target, sequence, json).await
        }

        Commands::Rewind { target, sequence } => {
            cli::message::rewind(&state, &target, sequence, json).await
        }

        Commands::Sessions { user } => cli::session::list_sessions(&state, &user, json).await,

        Commands::Titles { user } => cli::title::list_titles(&state, &user, json).await,

        Commands::Title { action } => match action {
            TitleCommand::Set { target, title } => {
                cli::title::set_title(&state, &target, &title, json).await
            }
            TitleCommand::Show { target } => cli::title::show_title(&state, &target, json).await,
            TitleCommand::Delete { target } => {
                cli::title::delete_title(&state, &target, json).await
            }
        },

        Commands::Exchange {
            user,
            message,
            reply,
            session,
        } => cli::session::exchange(&state, &user, session, &message, reply, json).await,

        Commands::Edit {
            target,
            sequence,
            message,
            reply,
        } => cli::session::edit(&state, &target, sequence, &message, reply, json).await,

        Commands::Remove { target, force } => {
            cli::session::remove(&state, &target, force, json).await
        }

        Commands::Status => cli::status::status(&state, json).await,
    };

    state.store.close().await;
    result
}
