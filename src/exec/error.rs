//! Errors raised while running commands on the remote system.

use thiserror::Error;

/// Errors surfaced by a [`super::RemoteExecutor`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ExecError {
    /// Raised when a local helper process (`ssh`, `rsync`, `sh`) cannot be
    /// started.
    #[error("failed to spawn {program}: {message}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Operating system error string.
        message: String,
    },
    /// Raised when the command finished with a non-zero exit status.
    #[error("`{command}` exited with status {status_text}: {stderr}")]
    CommandFailure {
        /// Command line that was executed.
        command: String,
        /// Exit status as reported by the OS.
        status: Option<i32>,
        /// Human readable representation of the exit status.
        status_text: String,
        /// Stdout captured from the command.
        stdout: String,
        /// Stderr captured from the command.
        stderr: String,
    },
}

impl ExecError {
    /// Returns the captured stderr for command failures, or an empty string.
    #[must_use]
    pub fn stderr(&self) -> &str {
        match self {
            Self::CommandFailure { stderr, .. } => stderr,
            Self::Spawn { .. } => "",
        }
    }
}
