//! Chat session and message persistence abstractions for chatlog.
//!
//! This module defines the `ChatRepository` trait that the infrastructure
//! layer implements, the collaborator traits for reply and title generation,
//! and the `ChatService` orchestrator built on top of them.

pub mod generator;
pub mod repository;
pub mod service;
pub mod title;
