//! # Observability
//!
//! Provides a simple, configurable interface for initializing tracing for
//! `llm-chatroom`. Turn execution emits structured events (`event = "turn_appended"`,
//! `event = "run_failed"`, ...) under `llm_chatroom` targets.

use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Configuration for initializing the observability system.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// The maximum log level to capture.
    pub level: Level,
    /// The target for the logs.
    pub target: LogTarget,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            target: LogTarget::default(),
        }
    }
}

/// Defines the output target for logs.
#[derive(Debug, Clone, Default)]
pub enum LogTarget {
    /// Log to the console (stderr, so stdout stays free for the conversation).
    #[default]
    Console,
    /// Log to a file.
    File(String),
}

/// Builds the filter: `RUST_LOG` directives plus `llm_chatroom=<level>`.
pub fn build_filter(level: Level) -> Result<EnvFilter, Box<dyn std::error::Error>> {
    Ok(EnvFilter::from_default_env().add_directive(format!("llm_chatroom={}", level).parse()?))
}

/// Initializes the global tracing subscriber.
///
/// Call once at startup. Returns an error if a global subscriber is already
/// installed or the log file cannot be created.
pub fn init(config: ObservabilityConfig) -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = tracing_subscriber::registry().with(build_filter(config.level)?);

    match config.target {
        LogTarget::Console => {
            let layer = fmt::layer().with_writer(std::io::stderr);
            subscriber.with(layer).try_init()?;
        }
        LogTarget::File(path) => {
            let file = std::fs::File::create(path)?;
            let layer = fmt::layer().with_ansi(false).with_writer(file);
            subscriber.with(layer).try_init()?;
        }
    };

    Ok(())
}
