//! Infrastructure layer for chatlog.
//!
//! Contains the implementations of the `ChatRepository` trait defined in
//! `chatlog-core`: a process-lifetime in-memory store and a SQLite store,
//! plus the `ChatStore` factory that picks one at startup and the loader
//! for `config.toml`.

pub mod config;
pub mod memory;
pub mod sqlite;
pub mod store;
