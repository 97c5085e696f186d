//! `ssh`-backed executor.

use std::ffi::OsString;

use tracing::debug;

use super::{
    CommandRunner, ExecError, ExecOutput, ProcessCommandRunner, RemoteExecutor, check_output,
    expand_tilde, quote,
};
use crate::config::{ClusterConfig, ConfigError, SshTarget};

/// Runs remote commands and file transfers through the system `ssh` and
/// `rsync` binaries.
#[derive(Clone, Debug)]
pub struct SshClient<R: CommandRunner> {
    config: ClusterConfig,
    target: SshTarget,
    runner: R,
}

impl SshClient<ProcessCommandRunner> {
    /// Convenience constructor that wires the real process runner and the
    /// configured login target.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation fails or the host is unset.
    pub fn with_process_runner(config: ClusterConfig) -> Result<Self, ConfigError> {
        let target = config.target()?;
        Self::new(config, target, ProcessCommandRunner)
    }
}

impl<R: CommandRunner> SshClient<R> {
    /// Creates a client for `target` using the SSH settings in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration validation fails.
    pub fn new(config: ClusterConfig, target: SshTarget, runner: R) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            target,
            runner,
        })
    }

    /// Returns the configuration the client was built with.
    #[must_use]
    pub const fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Returns the login target.
    #[must_use]
    pub const fn target(&self) -> &SshTarget {
        &self.target
    }

    pub(crate) const fn runner(&self) -> &R {
        &self.runner
    }

    /// Closes a multiplexed master connection. A no-op when connection
    /// multiplexing is not configured.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError`] when `ssh -O exit` fails.
    pub fn close(&self) -> Result<(), ExecError> {
        if self.config.ssh_control_path.is_none() {
            return Ok(());
        }
        let mut args = self.common_ssh_options();
        args.push(OsString::from("-O"));
        args.push(OsString::from("exit"));
        args.push(OsString::from(self.target.destination()));
        let output = self.runner.run(&self.config.ssh_bin, &args)?;
        check_output("ssh -O exit", output).map(|_| ())
    }

    fn build_ssh_args(&self, remote_command: &str) -> Vec<OsString> {
        let mut args = self.common_ssh_options();
        args.push(OsString::from(self.target.destination()));
        args.push(OsString::from(remote_command));
        args
    }

    pub(crate) fn common_ssh_options(&self) -> Vec<OsString> {
        let mut args = vec![
            OsString::from("-p"),
            OsString::from(self.target.port.to_string()),
        ];

        if let Some(ref identity_file) = self.config.ssh_identity_file {
            args.push(OsString::from("-i"));
            args.push(OsString::from(expand_tilde(identity_file)));
        }

        let mut option = |value: String| {
            args.push(OsString::from("-o"));
            args.push(OsString::from(value));
        };

        if self.config.ssh_batch_mode {
            option("BatchMode=yes".to_owned());
        }
        if !self.config.ssh_strict_host_key_checking {
            option("StrictHostKeyChecking=no".to_owned());
        }
        if !self.config.ssh_known_hosts_file.trim().is_empty() {
            option(format!(
                "UserKnownHostsFile={}",
                self.config.ssh_known_hosts_file
            ));
        }
        option(format!(
            "ConnectTimeout={}",
            self.config.ssh_connect_timeout_secs
        ));
        option(format!(
            "ServerAliveInterval={}",
            self.config.ssh_server_alive_interval_secs
        ));
        option(format!(
            "ServerAliveCountMax={}",
            self.config.ssh_server_alive_count_max
        ));
        if let Some(ref control_path) = self.config.ssh_control_path {
            option("ControlMaster=auto".to_owned());
            option(format!("ControlPath={}", expand_tilde(control_path)));
            option("ControlPersist=yes".to_owned());
        }

        args
    }

    /// Remote shell string handed to `rsync --rsh`. rsync splits it into
    /// words itself, so every word is quoted.
    pub(crate) fn remote_shell(&self) -> String {
        std::iter::once(quote(&self.config.ssh_bin))
            .chain(
                self.common_ssh_options()
                    .iter()
                    .map(|arg| quote(&arg.to_string_lossy())),
            )
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl<R: CommandRunner> RemoteExecutor for SshClient<R> {
    fn execute(&self, command: &str) -> Result<ExecOutput, ExecError> {
        debug!(host = %self.target.host, command, "executing remote command");
        let args = self.build_ssh_args(command);
        let output = self.runner.run(&self.config.ssh_bin, &args)?;
        check_output(command, output)
    }
}
