//! Logging setup.

use std::sync::Once;

use tracing::Span;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// JSON structured logs
    Json,
    /// Human-readable logs
    #[default]
    Pretty,
}

/// Install the global subscriber. Later calls are no-ops.
///
/// Levels come from `RUST_LOG` (default `info`).
pub fn init(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json().with_writer(std::io::stderr))
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().compact().with_writer(std::io::stderr))
                    .init();
            }
        }
    });
}

/// Span wrapping one administrative command.
#[must_use]
pub fn command_span(command: &str, db: &str) -> Span {
    tracing::info_span!("command", cmd = command, db = db)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init(LogFormat::Pretty);
        init(LogFormat::Json);
    }

    #[test]
    fn test_command_span() {
        let span = command_span("status", "test.db");
        let _guard = span.enter();
        tracing::info!("inside command span");
    }
}
