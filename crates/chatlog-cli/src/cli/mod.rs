//! CLI command definitions for the `chatlog` binary.
//!
//! Uses clap derive macros for argument parsing. Most commands address one
//! conversation as `<USER> <SESSION>`.

pub mod message;
pub mod session;
pub mod status;
pub mod title;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use chatlog_types::chat::{MessageRole, SessionKey};
use chatlog_types::config::BackendKind;

/// Inspect and edit stored chat sessions.
#[derive(Parser)]
#[command(name = "chatlog", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Only log errors (command results are still printed).
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Data directory holding config.toml and the SQLite file.
    #[arg(long, global = true, env = "CHATLOG_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Storage backend, overriding config.toml (inmemory | sqlite).
    #[arg(long, global = true)]
    pub backend: Option<BackendKind>,

    /// Export tracing spans to stdout through OpenTelemetry.
    #[arg(long, global = true, conflicts_with = "json")]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Identifies one conversation.
#[derive(Args, Debug, Clone)]
pub struct SessionArgs {
    /// User that owns the session.
    pub user: String,

    /// Session identifier.
    pub session: String,
}

impl SessionArgs {
    pub fn key(&self) -> anyhow::Result<SessionKey> {
        Ok(SessionKey::new(&self.user, &self.session)?)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Append one message to a session.
    Append {
        #[command(flatten)]
        target: SessionArgs,

        /// Message text.
        content: String,

        /// Author of the message.
        #[arg(long, default_value = "user")]
        role: MessageRole,
    },

    /// Show a session's messages in order.
    #[command(alias = "log")]
    History {
        #[command(flatten)]
        target: SessionArgs,
    },

    /// Remove every message in a session. The title is kept.
    Clear {
        #[command(flatten)]
        target: SessionArgs,

        /// Skip confirmation prompt.
        #[arg(long)]
        force: bool,
    },

    /// Delete a single message by sequence number.
    Delete {
        #[command(flatten)]
        target: SessionArgs,

        /// Sequence number of the message.
        sequence: u32,
    },

    /// Delete a message and everything after it.
    Rewind {
        #[command(flatten)]
        target: SessionArgs,

        /// First sequence number to discard.
        sequence: u32,
    },

    /// List a user's sessions that have messages.
    #[command(alias = "ls")]
    Sessions {
        /// User whose sessions to list.
        user: String,
    },

    /// List a user's session titles, most recently updated first.
    Titles {
        /// User whose titles to list.
        user: String,
    },

    /// Manage a session title.
    Title {
        #[command(subcommand)]
        action: TitleCommand,
    },

    /// Record a user message and its reply; names the session on its first exchange.
    Exchange {
        /// User that owns the session.
        user: String,

        /// User message text.
        message: String,

        /// Assistant reply to store.
        #[arg(long)]
        reply: String,

        /// Session identifier (a new one is generated when omitted).
        #[arg(long, short)]
        session: Option<String>,
    },

    /// Replace a past user message and everything after it with a new exchange.
    Edit {
        #[command(flatten)]
        target: SessionArgs,

        /// Sequence number of the user message being edited.
        sequence: u32,

        /// Replacement user message.
        message: String,

        /// Assistant reply to store.
        #[arg(long)]
        reply: String,
    },

    /// Delete a session's messages and its title.
    #[command(alias = "rm")]
    Remove {
        #[command(flatten)]
        target: SessionArgs,

        /// Skip confirmation prompt.
        #[arg(long)]
        force: bool,
    },

    /// Show backend and configuration status.
    Status,
}

#[derive(Subcommand)]
pub enum TitleCommand {
    /// Set (or replace) a session title.
    Set {
        #[command(flatten)]
        target: SessionArgs,

        /// New title.
        title: String,
    },

    /// Show a session title.
    Show {
        #[command(flatten)]
        target: SessionArgs,
    },

    /// Delete a session title.
    Delete {
        #[command(flatten)]
        target: SessionArgs,
    },
}
