//! Configuration loading via `ortho-config`.
//!
//! [`ClusterConfig`] carries the SSH, rsync and SLURM settings for one
//! compute system. Values merge defaults, `taccjm.toml`, and `TACCJM_*`
//! environment variables.

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

/// Default remote root. Expanded on the remote host, so `$SCRATCH` resolves
/// to the user's scratch filesystem.
pub const DEFAULT_REMOTE_ROOT: &str = "$SCRATCH/taccjm";

/// Default command that prints allocation balances on TACC systems.
pub const DEFAULT_ALLOCATION_COMMAND: &str = "/usr/local/etc/taccinfo";

/// Cluster connection and scheduler settings loaded via `ortho-config`.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "TACCJM",
    discovery(
        app_name = "taccjm",
        env_var = "TACCJM_CONFIG_PATH",
        config_file_name = "taccjm.toml",
        dotfile_name = ".taccjm.toml",
        project_file_name = "taccjm.toml"
    )
)]
pub struct ClusterConfig {
    /// Login host of the compute system, for example `ls6.tacc.utexas.edu`.
    pub host: Option<String>,
    /// Remote user to connect as.
    pub ssh_user: Option<String>,
    /// SSH port on the login host.
    #[ortho_config(default = 22)]
    pub ssh_port: u16,
    /// Path to the `ssh` executable.
    #[ortho_config(default = "ssh".to_owned())]
    pub ssh_bin: String,
    /// Path to the `rsync` executable.
    #[ortho_config(default = "rsync".to_owned())]
    pub rsync_bin: String,
    /// Private key used for authentication. Supports `~/` expansion. When
    /// unset, SSH falls back to its default key locations and agent.
    pub ssh_identity_file: Option<String>,
    /// Whether to force batch mode so SSH never prompts.
    #[ortho_config(default = true)]
    pub ssh_batch_mode: bool,
    /// Whether to enforce host key checking.
    #[ortho_config(default = true)]
    pub ssh_strict_host_key_checking: bool,
    /// Known hosts file override. Empty keeps the SSH default.
    #[ortho_config(default = String::new())]
    pub ssh_known_hosts_file: String,
    /// Seconds to wait for the TCP connection before giving up.
    #[ortho_config(default = 30)]
    pub ssh_connect_timeout_secs: u32,
    /// Seconds between keep-alive probes on an open connection.
    #[ortho_config(default = 15)]
    pub ssh_server_alive_interval_secs: u32,
    /// Unanswered keep-alive probes tolerated before the connection drops.
    #[ortho_config(default = 4)]
    pub ssh_server_alive_count_max: u32,
    /// Control socket path for connection multiplexing. Multiplexing lets a
    /// single MFA-authenticated login serve every later command.
    pub ssh_control_path: Option<String>,
    /// Remote directory holding apps, jobs, scripts and trash.
    #[ortho_config(default = DEFAULT_REMOTE_ROOT.to_owned())]
    pub remote_root: String,
    /// Command used to submit batch scripts.
    #[ortho_config(default = "sbatch".to_owned())]
    pub sbatch_bin: String,
    /// Command used to cancel scheduler jobs.
    #[ortho_config(default = "scancel".to_owned())]
    pub scancel_bin: String,
    /// Command used to query job accounting state.
    #[ortho_config(default = "sacct".to_owned())]
    pub sacct_bin: String,
    /// Command used to list the scheduler queue.
    #[ortho_config(default = "squeue".to_owned())]
    pub squeue_bin: String,
    /// Command printing the allocation balance table.
    #[ortho_config(default = DEFAULT_ALLOCATION_COMMAND.to_owned())]
    pub allocation_command: String,
}

/// User, host and port for one SSH destination.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SshTarget {
    /// Remote user name.
    pub user: String,
    /// Host name or address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl SshTarget {
    /// Returns the `user@host` form used by `ssh` and `rsync`.
    #[must_use]
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}

impl ClusterConfig {
    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("taccjm")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Checks that every command and path setting is non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] naming the environment variable
    /// and TOML key that supply the value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_value(&self.ssh_bin, "ssh_bin")?;
        require_value(&self.rsync_bin, "rsync_bin")?;
        require_value(&self.remote_root, "remote_root")?;
        require_value(&self.sbatch_bin, "sbatch_bin")?;
        require_value(&self.scancel_bin, "scancel_bin")?;
        require_value(&self.sacct_bin, "sacct_bin")?;
        require_value(&self.squeue_bin, "squeue_bin")?;
        require_value(&self.allocation_command, "allocation_command")?;
        require_optional_value(self.ssh_identity_file.as_deref(), "ssh_identity_file")?;
        require_optional_value(self.ssh_control_path.as_deref(), "ssh_control_path")?;
        if self.ssh_port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ssh_port".to_owned(),
                message: "port must be between 1 and 65535".to_owned(),
            });
        }
        Ok(())
    }

    /// Returns the configured login target.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when `host` or `ssh_user` is
    /// unset or blank.
    pub fn target(&self) -> Result<SshTarget, ConfigError> {
        let host = require_present(self.host.as_deref(), "host")?;
        let user = require_present(self.ssh_user.as_deref(), "ssh_user")?;
        Ok(SshTarget {
            user: user.to_owned(),
            host: host.to_owned(),
            port: self.ssh_port,
        })
    }
}

fn missing(field: &str) -> ConfigError {
    ConfigError::MissingField(format!(
        "{field}: set TACCJM_{} or add {field} to taccjm.toml",
        field.to_uppercase()
    ))
}

fn require_value(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(missing(field));
    }
    Ok(())
}

fn require_optional_value(value: Option<&str>, field: &str) -> Result<(), ConfigError> {
    value.map_or(Ok(()), |v| require_value(v, field))
}

fn require_present<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, ConfigError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim()),
        _ => Err(missing(field)),
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field {0}")]
    MissingField(String),
    /// Indicates a field holds a value outside its accepted range.
    #[error("invalid value for {field}: {message}")]
    InvalidValue {
        /// Offending field.
        field: String,
        /// Description of the accepted values.
        message: String,
    },
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
