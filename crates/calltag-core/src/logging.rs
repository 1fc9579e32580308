//! Logging setup for hosts embedding the coordinator
//!
//! The crate itself only emits `tracing` events; hosts that have no
//! subscriber of their own can install one here. Every session runs inside a
//! `call_session` span carrying its id, so turning on span events shows one
//! line per session start and end.

use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{CallTagError, CallTagResult};

/// Environment variable that replaces the default filter
pub const LOG_ENV: &str = "CALLTAG_LOG";

/// Logging options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Level for this crate's events
    pub level: Level,
    /// Emit one JSON object per line
    pub json: bool,
    /// Log `call_session` span open and close
    pub session_spans: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json: false,
            session_spans: false,
        }
    }
}

impl LoggingConfig {
    /// Options from a level name such as `"debug"`
    pub fn from_level(level: &str) -> CallTagResult<Self> {
        Ok(Self {
            level: parse_log_level(level)?,
            ..Self::default()
        })
    }

    /// Filter used when [`LOG_ENV`] is unset: this crate at `level`, nothing else
    pub fn default_directive(&self) -> String {
        format!("calltag_core={}", self.level.to_string().to_lowercase())
    }

    fn filter(&self) -> CallTagResult<EnvFilter> {
        match std::env::var(LOG_ENV) {
            Ok(directives) => EnvFilter::try_new(&directives)
                .map_err(|e| CallTagError::config(format!("invalid {}: {}", LOG_ENV, e))),
            Err(_) => Ok(EnvFilter::new(self.default_directive())),
        }
    }
}

/// Install a global `tracing` subscriber
///
/// Fails with a configuration error if `CALLTAG_LOG` does not parse or a
/// subscriber is already installed.
pub fn setup_logging(config: &LoggingConfig) -> CallTagResult<()> {
    let span_events = if config.session_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let builder = fmt::Subscriber::builder()
        .with_env_filter(config.filter()?)
        .with_span_events(span_events);

    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| CallTagError::config(format!("logging already initialized: {}", e)))?;

    tracing::info!("calltag-core v{} logging at {}", crate::VERSION, config.level);
    Ok(())
}

/// Parse a log level from a string
pub fn parse_log_level(level: &str) -> CallTagResult<Level> {
    Level::from_str(level).map_err(|_| CallTagError::config(format!("Invalid log level: {}", level)))
}
