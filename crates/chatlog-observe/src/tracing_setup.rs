//! Tracing subscriber initialization with structured logging and optional
//! OpenTelemetry trace export.
//!
//! # Usage
//!
//! ```no_run
//! use chatlog_observe::TracingOptions;
//!
//! // Human-readable logs at `warn`
//! chatlog_observe::init_tracing(&TracingOptions::default()).unwrap();
//! ```
//!
//! Logs always go to stderr so that `--json` output on stdout stays parseable.
//! The OpenTelemetry stdout exporter has no writer option, so OTel export and
//! JSON output cannot be enabled together.

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use std::sync::OnceLock;

/// Stores the OTel tracer provider so it can be shut down cleanly on exit.
static TRACER_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

/// How the global subscriber should be set up.
#[derive(Debug, Clone)]
pub struct TracingOptions {
    /// Filter directives used when `RUST_LOG` is unset, e.g. `"info,chatlog=debug"`.
    pub filter: String,
    /// Emit newline-delimited JSON instead of the human-readable format.
    pub json: bool,
    /// Export spans to stdout through OpenTelemetry. Conflicts with `json`.
    pub otel: bool,
}

impl Default for TracingOptions {
    fn default() -> Self {
        Self {
            filter: "warn".to_string(),
            json: false,
            otel: false,
        }
    }
}

impl TracingOptions {
    /// Map CLI verbosity flags to a filter: `--quiet` is `error`, no flag is
    /// `warn`, `-v` adds debug for chatlog crates, `-vv` and up is `trace`.
    pub fn from_verbosity(verbose: u8, quiet: bool) -> Self {
        let filter = match verbose {
            0 if quiet => "error",
            0 => "warn",
            1 => "info,chatlog=debug,chatlog_core=debug,chatlog_infra=debug",
            _ => "trace",
        };
        Self {
            filter: filter.to_string(),
            ..Self::default()
        }
    }
}

/// Initialize the global tracing subscriber.
///
/// - `RUST_LOG` wins over `options.filter` when set.
/// - When `options.otel` is true, additionally bridges tracing spans to
///   OpenTelemetry using a stdout exporter.
///
/// # Errors
///
/// Returns an error if `json` and `otel` are both set, the global subscriber
/// has already been set, or the filter directives do not parse.
pub fn init_tracing(options: &TracingOptions) -> Result<(), Box<dyn std::error::Error>> {
    if options.json && options.otel {
        return Err("OpenTelemetry stdout export cannot be combined with JSON output".into());
    }

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&options.filter)?,
    };

    let (text_layer, json_layer) = if options.json {
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_span_events(FmtSpan::CLOSE);
        (None, Some(layer))
    } else {
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_span_events(FmtSpan::CLOSE);
        (Some(layer), None)
    };

    let otel_layer = if options.otel {
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
            .build();
        let tracer = provider.tracer("chatlog");

        // Store the provider for shutdown and register it globally.
        let _ = TRACER_PROVIDER.set(provider.clone());
        opentelemetry::global::set_tracer_provider(provider);

        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(text_layer)
        .with(json_layer)
        .with(otel_layer)
        .try_init()?;

    Ok(())
}

/// Flush pending traces and shut down the OpenTelemetry tracer provider.
///
/// No-op when OTel was not enabled.
pub fn shutdown_tracing() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        if let Err(e) = provider.shutdown() {
            eprintln!("Warning: OTel tracer provider shutdown error: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_filter() {
        assert_eq!(TracingOptions::from_verbosity(0, true).filter, "error");
        assert_eq!(TracingOptions::from_verbosity(0, false).filter, "warn");
        assert!(TracingOptions::from_verbosity(1, false).filter.contains("chatlog_infra=debug"));
        assert_eq!(TracingOptions::from_verbosity(3, false).filter, "trace");
    }

    #[test]
    fn quiet_is_ignored_when_verbose() {
        assert_ne!(TracingOptions::from_verbosity(1, true).filter, "error");
    }

    #[test]
    fn json_with_otel_is_rejected() {
        let options = TracingOptions {
            json: true,
            otel: true,
            ..TracingOptions::default()
        };
        let err = init_tracing(&options).unwrap_err();
        assert!(err.to_string().contains("JSON output"));
        assert!(TRACER_PROVIDER.get().is_none());
    }

    #[test]
    fn default_options_are_plain_text() {
        let options = TracingOptions::default();
        assert!(!options.json);
        assert!(!options.otel);
    }
}
