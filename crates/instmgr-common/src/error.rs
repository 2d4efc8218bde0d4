//! Error types for the session layer.
//!
//! All errors implement `std::error::Error` via `thiserror`. The `Timeout`
//! variant is deliberately distinct: the operation watcher classifies a
//! timed-out wait as "device is rebooting" and enters the reconnect path
//! instead of failing the watch outright.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors that can occur on the console session line.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No registered pattern matched within the allotted window.
    #[error("timed out after {timeout:?} waiting for {waiting_for}")]
    Timeout {
        /// Human-readable description of what was being waited for.
        waiting_for: String,
        /// The window that elapsed.
        timeout: Duration,
    },

    /// A command was issued while the session was disconnected.
    #[error("session is not connected")]
    NotConnected,

    /// The device did not become reachable within the reconnect ceiling.
    #[error("device did not become reachable within {ceiling:?}")]
    ReconnectFailed {
        /// The ceiling that was exceeded.
        ceiling: Duration,
    },

    /// The underlying transport failed.
    #[error("session transport failure: {message}")]
    Transport {
        /// Transport-provided failure description.
        message: String,
    },
}

impl SessionError {
    /// Creates a timeout error.
    pub fn timeout(waiting_for: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            waiting_for: waiting_for.into(),
            timeout,
        }
    }

    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Returns true if this error is a pattern-wait timeout.
    ///
    /// Used by callers that treat a timed-out wait as "the device dropped
    /// the session" rather than a protocol failure.
    pub fn is_timeout(&self) -> bool {
        matches!(self, SessionError::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display() {
        let err = SessionError::timeout("prompt", Duration::from_secs(30));
        assert!(err.to_string().contains("prompt"));
        assert!(err.is_timeout());
    }

    #[test]
    fn test_classification() {
        assert!(!SessionError::NotConnected.is_timeout());
        assert!(!SessionError::transport("broken pipe").is_timeout());
        assert!(!SessionError::ReconnectFailed {
            ceiling: Duration::from_secs(1500)
        }
        .is_timeout());
    }
}
