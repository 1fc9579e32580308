//! Error types for the caller overlay coordinator

use thiserror::Error;

/// Result type for calltag operations
pub type CallTagResult<T> = Result<T, CallTagError>;

/// Errors that can occur while coordinating a call session
///
/// None of these escape the coordinator as a crash: lookup and host faults are
/// logged, reported as session events and degrade to "no overlay".
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallTagError {
    /// No lookup port registered; the caller is treated as unknown
    #[error("No lookup port configured")]
    LookupPortUnconfigured,

    /// The lookup port failed; the caller is treated as unknown
    #[error("Lookup failed: {message}")]
    LookupFailure { message: String },

    /// `show` was called while a surface is already on screen
    #[error("Overlay already shown")]
    AlreadyShown,

    /// The host removed the surface outside of our control
    #[error("Overlay surface detached externally")]
    SurfaceDetachedExternally,

    /// The overlay host refused an operation
    #[error("Overlay host error during {operation}: {message}")]
    Host { operation: String, message: String },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// The session already finished and no longer accepts commands
    #[error("Session closed")]
    SessionClosed,

    /// Internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl CallTagError {
    /// Create a lookup failure
    pub fn lookup_failure(message: impl Into<String>) -> Self {
        Self::LookupFailure {
            message: message.into(),
        }
    }

    /// Create an overlay host error
    pub fn host(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Host {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error only means "unknown caller"
    pub fn is_unknown_caller(&self) -> bool {
        matches!(
            self,
            Self::LookupPortUnconfigured | Self::LookupFailure { .. }
        )
    }
}
