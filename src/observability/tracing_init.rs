//! Tracing initialization with configurable logging formats.

use tracing_subscriber::{
    EnvFilter, Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::config::{LogFormat, LogLevel, LoggingConfig, ObservabilityConfig};

/// Initialize the tracing subscriber with the given configuration.
///
/// This sets up:
/// - Console logging with configurable format (pretty, compact, JSON)
/// - Environment-based log filtering (`RUST_LOG` overrides the config)
pub fn init_tracing(config: &ObservabilityConfig) -> Result<(), TracingError> {
    let logging = &config.logging;
    let filter = build_env_filter(logging);

    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = match (&logging.format, logging.timestamps)
    {
        (LogFormat::Pretty, true) => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(logging.file_line)
            .with_line_number(logging.file_line)
            .boxed(),
        (LogFormat::Pretty, false) => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(logging.file_line)
            .with_line_number(logging.file_line)
            .without_time()
            .boxed(),
        (LogFormat::Compact, true) => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(true)
            .with_file(logging.file_line)
            .with_line_number(logging.file_line)
            .boxed(),
        (LogFormat::Compact, false) => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(true)
            .with_file(logging.file_line)
            .with_line_number(logging.file_line)
            .without_time()
            .boxed(),
        // Span fields (collector, job id) are only toggleable in JSON output.
        (LogFormat::Json, true) => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(logging.include_spans)
            .with_span_list(logging.include_spans)
            .with_file(logging.file_line)
            .with_line_number(logging.file_line)
            .boxed(),
        (LogFormat::Json, false) => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(logging.include_spans)
            .with_span_list(logging.include_spans)
            .with_file(logging.file_line)
            .with_line_number(logging.file_line)
            .without_time()
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter)
        .try_init()
        .map_err(|e| TracingError::Init(e.to_string()))
}

/// Build the environment filter from logging config.
fn build_env_filter(config: &LoggingConfig) -> EnvFilter {
    let base_level = match config.level {
        LogLevel::Trace => "trace",
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error => "error",
    };

    if let Ok(env_filter) = std::env::var("RUST_LOG") {
        EnvFilter::try_new(env_filter).unwrap_or_else(|_| EnvFilter::new(base_level))
    } else if let Some(filter) = &config.filter {
        let combined = format!("{},{}", base_level, filter);
        EnvFilter::try_new(combined).unwrap_or_else(|_| EnvFilter::new(base_level))
    } else {
        EnvFilter::new(base_level)
    }
}

/// Tracing initialization errors.
#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("Failed to initialize tracing: {0}")]
    Init(String),
}
