//! Operation-unit result taxonomy.
//!
//! Every fatal variant carries the offending command output where one
//! exists: workflows are diagnosed from raw device output, and a failure
//! without it is not actionable.

use instmgr_common::{DialogueError, SessionError, WatchError};
use thiserror::Error;

/// Result of running one operation unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// The unit completed successfully (including "nothing to do").
    Success,
    /// The job description was rejected before touching the device.
    InvalidJob,
    /// The device reported the operation as aborted.
    Aborted,
    /// The unit failed.
    Failed,
}

impl TaskStatus {
    /// Returns true if the unit completed successfully.
    pub fn is_success(&self) -> bool {
        matches!(self, TaskStatus::Success)
    }
}

/// Error type for operation-unit failures.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The job description is unusable (missing repository, no acceptable
    /// packages, malformed URL).
    #[error("invalid job: {message}")]
    InvalidJob {
        /// What is wrong with the job.
        message: String,
    },

    /// The device's own abort signature ended the operation.
    #[error("operation aborted by the device; output: {output}")]
    Aborted {
        /// The raw device output carrying the abort.
        output: String,
    },

    /// The operation failed on the device.
    #[error("{message}; output: {output}")]
    Operation {
        /// What failed.
        message: String,
        /// The raw device output that triggered the failure.
        output: String,
    },

    /// The dialogue executor failed (protocol desync, session loss).
    #[error(transparent)]
    Dialogue(#[from] DialogueError),

    /// The operation watcher or reload barrier failed.
    #[error(transparent)]
    Watch(#[from] WatchError),

    /// The session failed outside a dialogue.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Unexpected internal state.
    #[error("internal error: {message}")]
    Internal {
        /// What went wrong.
        message: String,
    },
}

impl TaskError {
    /// Creates an invalid-job error.
    pub fn invalid_job(message: impl Into<String>) -> Self {
        Self::InvalidJob {
            message: message.into(),
        }
    }

    /// Creates a device-abort error.
    pub fn aborted(output: impl Into<String>) -> Self {
        Self::Aborted {
            output: output.into(),
        }
    }

    /// Creates an operation failure carrying the raw output.
    pub fn operation(message: impl Into<String>, output: impl Into<String>) -> Self {
        Self::Operation {
            message: message.into(),
            output: output.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Converts this error to a [`TaskStatus`].
    pub fn to_status(&self) -> TaskStatus {
        match self {
            TaskError::InvalidJob { .. } => TaskStatus::InvalidJob,
            TaskError::Aborted { .. } => TaskStatus::Aborted,
            _ => TaskStatus::Failed,
        }
    }
}

/// Result type for operation units.
pub type TaskResult<T> = Result<T, TaskError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(TaskStatus::Success.is_success());
        assert!(!TaskStatus::Failed.is_success());
        assert!(!TaskStatus::Aborted.is_success());
    }

    #[test]
    fn test_error_to_status() {
        assert_eq!(
            TaskError::invalid_job("no repository provided").to_status(),
            TaskStatus::InvalidJob
        );
        assert_eq!(
            TaskError::aborted("Install operation 28 aborted").to_status(),
            TaskStatus::Aborted
        );
        assert_eq!(
            TaskError::operation("activate failed", "Error: ...").to_status(),
            TaskStatus::Failed
        );
    }

    #[test]
    fn test_fatal_errors_carry_output() {
        let err = TaskError::operation("operation 12 failed", "Error:    insufficient disk space");
        assert!(err.to_string().contains("insufficient disk space"));

        let err = TaskError::aborted("Install operation 28 aborted");
        assert!(err.to_string().contains("operation 28 aborted"));
    }
}
