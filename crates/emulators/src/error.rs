//! Error types for emulator launches

use std::time::Duration;
use thiserror::Error;

/// Result type for emulator operations
pub type Result<T> = std::result::Result<T, EmulatorError>;

/// Errors that can occur while starting or stopping an emulator
#[derive(Debug, Error)]
pub enum EmulatorError {
    /// Invalid launch options
    #[error("Configuration error: {0}")]
    Config(String),

    /// The emulator program could not be started
    #[error("Failed to spawn emulator process: {0}")]
    Spawn(#[source] std::io::Error),

    /// No readiness announcement was seen before the deadline
    #[error("Timeout starting child process after {0:?}")]
    Timeout(Duration),

    /// The announcement matched but its token is not a URL
    #[error("Failed to parse API URL {token:?}: {source}")]
    MalformedEndpoint {
        /// Token captured from the announcement line
        token: String,
        /// Underlying parse failure
        #[source]
        source: url::ParseError,
    },

    /// Reading the child's stderr failed
    #[error("Error reading child process stderr: {0}")]
    Stream(#[source] std::io::Error),

    /// The child's stderr closed without ever announcing an endpoint
    #[error("Unable to find API server URL")]
    NoEndpoint,

    /// Killing the child process failed
    #[error("Failed to kill emulator process: {0}")]
    Terminate(#[source] std::io::Error),
}

impl EmulatorError {
    /// Create a new `Config` error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error is a readiness timeout
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Whether this error ended a launch attempt (as opposed to a teardown)
    #[must_use]
    pub fn is_startup_failure(&self) -> bool {
        !matches!(self, Self::Terminate(_))
    }

    /// User-facing action to take
    pub fn suggested_action(&self) -> &str {
        match self {
            Self::Config(_) => "Fix the emulator options before launching",
            Self::Spawn(_) => "Check that the Cloud SDK is installed and on PATH",
            Self::Timeout(_) => {
                "Raise the startup timeout or check that the datastore emulator component is installed"
            }
            Self::MalformedEndpoint { .. } | Self::NoEndpoint => {
                "The emulator's announcement format may have changed; check the Cloud SDK version"
            }
            Self::Stream(_) => "The emulator exited unexpectedly; inspect its stderr output",
            Self::Terminate(_) => "The emulator may still be running; stop it manually",
        }
    }
}
