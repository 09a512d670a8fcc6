//! Structured logging initialization, shared by every binary that embeds
//! the Anemochory crates.

use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Minimum severity to emit. `RUST_LOG` still overrides this via
/// `EnvFilter::from_default_env` when set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("global tracing subscriber was already installed")]
    AlreadyInitialized,
}

/// Installs a `tracing-subscriber` `fmt` layer filtered by `level`, or by
/// `RUST_LOG` if that environment variable is set. Safe to call once per
/// process; a second call returns `AlreadyInitialized` rather than
/// panicking.
pub fn try_init(level: LogLevel) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|_| LoggingError::AlreadyInitialized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_maps_to_the_expected_filter_directive() {
        assert_eq!(LogLevel::Info.as_str(), "info");
        assert_eq!(LogLevel::Trace.as_str(), "trace");
    }
}
