//! Observability infrastructure for berth.
//!
//! Structured logging with consistent spans. This module provides the
//! initialization helper and span constructors used across all berth
//! components.

use tracing::Span;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

impl LogFormat {
    /// Builds the output layer for this format.
    fn output_layer(self) -> Box<dyn Layer<Registry> + Send + Sync> {
        match self {
            Self::Json => fmt::layer().json().boxed(),
            Self::Pretty => fmt::layer().pretty().boxed(),
        }
    }
}

/// Initializes the logging subsystem.
///
/// Call at application startup. The first caller installs the global
/// subscriber; later calls find it already set and are no-ops, so repeated
/// initialization (test binaries, nested startup paths) is safe.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Controls log levels (e.g., `info`, `berth_store=debug`).
///   Malformed directives are dropped rather than rejected; the default
///   level is `info`.
pub fn init_logging(format: LogFormat) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    if tracing_subscriber::registry()
        .with(format.output_layer())
        .with(filter)
        .try_init()
        .is_err()
    {
        tracing::debug!("global subscriber already installed, keeping it");
    }
}

/// Creates a span for task store operations.
#[must_use]
pub fn task_span(operation: &str, task_guid: &str) -> Span {
    tracing::info_span!(
        "task",
        op = operation,
        task_guid = task_guid,
    )
}

/// Creates a span for LRP store operations.
#[must_use]
pub fn lrp_span(operation: &str, process_guid: &str) -> Span {
    tracing::info_span!(
        "lrp",
        op = operation,
        process_guid = process_guid,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logging_is_idempotent() {
        // The second call loses the install race and must not panic.
        init_logging(LogFormat::Pretty);
        init_logging(LogFormat::Json);
    }

    #[test]
    fn default_format_is_pretty() {
        assert_eq!(LogFormat::default(), LogFormat::Pretty);
    }

    #[test]
    fn span_helpers_create_spans() {
        let span = task_span("start", "task-guid");
        let _guard = span.enter();
        tracing::info!("test message in span");

        let span = lrp_span("desire", "process-guid");
        let _guard = span.enter();
        tracing::info!("test message in span");
    }
}
