//! Remote command execution.
//!
//! [`RemoteExecutor`] is the seam every higher layer talks through.
//! [`SshClient`] implements it by shelling out to the system `ssh` client
//! through a [`CommandRunner`], so tests can swap in a scripted runner.

mod error;
mod runner;
mod ssh;
mod util;

pub use error::ExecError;
pub use runner::{CommandOutput, CommandRunner, ProcessCommandRunner};
pub use ssh::SshClient;
pub use util::expand_tilde;

use serde::Serialize;

/// Captured output from a successful remote command.
#[derive(Clone, Debug, Default, Serialize, Eq, PartialEq)]
pub struct ExecOutput {
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
}

/// Runs shell commands on the remote system.
pub trait RemoteExecutor {
    /// Executes `command` through the remote login shell.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::CommandFailure`] when the command exits non-zero
    /// and [`ExecError::Spawn`] when the transport cannot be started.
    ///
    /// # Security
    ///
    /// `command` is passed verbatim. Callers must shell-escape untrusted
    /// arguments.
    fn execute(&self, command: &str) -> Result<ExecOutput, ExecError>;
}

impl<T: RemoteExecutor + ?Sized> RemoteExecutor for Box<T> {
    fn execute(&self, command: &str) -> Result<ExecOutput, ExecError> {
        (**self).execute(command)
    }
}

/// Converts a captured [`CommandOutput`] into [`ExecOutput`], mapping a
/// non-zero exit to [`ExecError::CommandFailure`].
///
/// # Errors
///
/// Returns [`ExecError::CommandFailure`] when the exit code is not zero.
pub fn check_output(command: &str, output: CommandOutput) -> Result<ExecOutput, ExecError> {
    if output.is_success() {
        return Ok(ExecOutput {
            stdout: output.stdout,
            stderr: output.stderr,
        });
    }
    Err(ExecError::CommandFailure {
        command: command.to_owned(),
        status: output.code,
        status_text: output.status_text(),
        stdout: output.stdout,
        stderr: output.stderr.trim().to_owned(),
    })
}

/// Quotes a value for a POSIX shell.
#[must_use]
pub fn quote(value: &str) -> String {
    shell_escape::unix::escape(value.into()).into_owned()
}
