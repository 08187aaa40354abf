//! Observability setup for chatlog binaries.
//!
//! Installs the global `tracing` subscriber (human-readable or JSON) and,
//! on request, bridges spans to OpenTelemetry.

pub mod tracing_setup;

pub use tracing_setup::{init_tracing, shutdown_tracing, TracingOptions};
