//! Repository contract and session orchestration for chatlog.
//!
//! This crate defines the "ports" (the `ChatRepository` trait and the reply /
//! title generator traits) that the infrastructure layer and external
//! collaborators implement. It depends only on `chatlog-types` -- never on
//! `chatlog-infra` or any database/IO crate.

pub mod chat;
