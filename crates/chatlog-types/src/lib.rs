//! Shared domain types for chatlog.
//!
//! This crate contains the data model of the conversation store: chat
//! messages, session keys, session titles, store configuration, and the
//! associated error types.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod chat;
pub mod config;
pub mod error;
