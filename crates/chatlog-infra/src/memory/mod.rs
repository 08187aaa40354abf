//! In-memory storage layer.
//!
//! Repository implementations that live for the process lifetime only.

pub mod chat;
