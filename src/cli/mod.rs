//! Command-line interface definitions for the `taccjm` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// Top-level CLI for the `taccjm` binary.
#[derive(Debug, Parser)]
#[command(
    name = "taccjm",
    version,
    about = "Deploy applications and manage SLURM jobs on a remote HPC system",
    arg_required_else_help = true
)]
pub(crate) struct Cli {
    #[command(flatten)]
    pub(crate) log: LogArgs,
    #[command(subcommand)]
    pub(crate) command: Command,
}

/// Logging flags accepted by every subcommand.
#[derive(Debug, Args)]
pub(crate) struct LogArgs {
    /// Log filter used when `TACCJM_LOG` is unset.
    #[arg(long, global = true, value_name = "FILTER", default_value = "warn")]
    pub(crate) log_level: String,
    /// Console log format: `compact` or `json`.
    #[arg(long, global = true, value_name = "FORMAT", default_value = "compact")]
    pub(crate) log_format: String,
    /// Also write JSON logs to this file.
    #[arg(long, global = true, value_name = "PATH")]
    pub(crate) log_file: Option<Utf8PathBuf>,
}

/// `taccjm` subcommands.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Run a shell command on the remote system.
    Exec {
        /// Command line, passed to the remote shell as is.
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// List allocations and their remaining service units.
    Allocations,
    /// List jobs in the scheduler queue.
    Queue {
        /// Only show jobs owned by this user.
        #[arg(long)]
        user: Option<String>,
    },
    /// Move files between this machine and the remote system.
    #[command(subcommand)]
    Files(FilesCommand),
    /// Deploy and inspect applications.
    #[command(subcommand)]
    Apps(AppsCommand),
    /// Stage, submit and inspect jobs.
    #[command(subcommand)]
    Jobs(JobsCommand),
    /// Deploy and run helper scripts.
    #[command(subcommand)]
    Scripts(ScriptsCommand),
    /// Restore or empty removed files and jobs.
    #[command(subcommand)]
    Trash(TrashCommand),
}

/// Line selection for `peek` subcommands. Defaults to the first ten lines.
#[derive(Debug, Args)]
pub(crate) struct PeekArgs {
    /// Show the first N lines.
    #[arg(long, value_name = "N", conflicts_with = "tail")]
    pub(crate) head: Option<usize>,
    /// Show the last N lines.
    #[arg(long, value_name = "N")]
    pub(crate) tail: Option<usize>,
}

/// `taccjm files` subcommands. Remote paths are absolute or relative to the
/// remote home directory.
#[derive(Debug, Subcommand)]
pub(crate) enum FilesCommand {
    /// List a remote directory.
    List {
        /// Remote directory.
        path: Utf8PathBuf,
    },
    /// Upload a file or directory.
    Send {
        /// Local source.
        local: Utf8PathBuf,
        /// Remote destination.
        remote: Utf8PathBuf,
        /// Also upload dotfiles.
        #[arg(long)]
        include_hidden: bool,
        /// Only upload files matching this glob, for example `*.csv`.
        #[arg(long, value_name = "GLOB")]
        include: Option<String>,
    },
    /// Download a file or directory.
    Get {
        /// Remote source.
        remote: Utf8PathBuf,
        /// Local destination.
        local: Utf8PathBuf,
    },
    /// Print the first or last lines of a remote file.
    Peek {
        /// Remote file.
        path: Utf8PathBuf,
        #[command(flatten)]
        range: PeekArgs,
    },
    /// Move a remote file or directory to trash.
    Remove {
        /// Remote path, absolute or relative to the remote root.
        path: String,
    },
}

/// `taccjm apps` subcommands.
#[derive(Debug, Subcommand)]
pub(crate) enum AppsCommand {
    /// Deploy an application from a local directory.
    Deploy {
        /// Directory holding the app JSON and `assets/`.
        #[arg(default_value = ".")]
        dir: Utf8PathBuf,
        /// Application JSON inside `dir`.
        #[arg(long, default_value = "app.json")]
        config_file: String,
        /// Project TOML inside `dir` supplying template values.
        #[arg(long, default_value = "project.toml")]
        project_file: String,
        /// Replace an application with the same id.
        #[arg(long)]
        overwrite: bool,
    },
    /// List deployed applications.
    List,
    /// Show a deployed application's configuration.
    Show {
        /// Application id, `name--version`.
        app_id: String,
    },
    /// Print a deployed application's wrapper script.
    Wrapper {
        /// Application id, `name--version`.
        app_id: String,
    },
}

/// `taccjm jobs` subcommands.
#[derive(Debug, Subcommand)]
pub(crate) enum JobsCommand {
    /// Set up a job from a local directory and stage it.
    Setup {
        /// Directory holding the job JSON and its inputs.
        #[arg(default_value = ".")]
        dir: Utf8PathBuf,
        /// Job JSON inside `dir`.
        #[arg(long, default_value = "job.json")]
        job_file: String,
        /// Project TOML inside `dir` supplying template values.
        #[arg(long, default_value = "project.toml")]
        project_file: String,
        /// Validate and print the job without staging it.
        #[arg(long)]
        dry_run: bool,
    },
    /// List job ids.
    List,
    /// Show a job record.
    Show {
        /// Job id.
        job_id: String,
    },
    /// Change the email or allocation of a staged job.
    Update {
        /// Job id.
        job_id: String,
        /// Notification address.
        #[arg(long)]
        email: Option<String>,
        /// Allocation to charge.
        #[arg(long)]
        allocation: Option<String>,
    },
    /// Submit a staged job.
    Submit {
        /// Job id.
        job_id: String,
    },
    /// Cancel a submitted or running job.
    Cancel {
        /// Job id.
        job_id: String,
    },
    /// Refresh a job's status from the scheduler.
    Status {
        /// Job id.
        job_id: String,
    },
    /// Cancel if needed and move a job to trash.
    Cleanup {
        /// Job id.
        job_id: String,
    },
    /// Bring a cleaned-up job back from trash.
    Restore {
        /// Job id.
        job_id: String,
    },
    /// List files in a job directory.
    Ls {
        /// Job id.
        job_id: String,
        /// Subdirectory inside the job directory.
        #[arg(default_value = "")]
        subdir: String,
    },
    /// Download a job file or directory into `DEST/<job_id>/`.
    Get {
        /// Job id.
        job_id: String,
        /// Path inside the job directory.
        path: String,
        /// Local destination directory.
        #[arg(long, default_value = ".")]
        dest: Utf8PathBuf,
    },
    /// Upload a local file or directory into a job directory.
    Send {
        /// Job id.
        job_id: String,
        /// Local source.
        local: Utf8PathBuf,
        /// Subdirectory inside the job directory.
        #[arg(long, default_value = "")]
        dest_dir: String,
        /// Only upload files matching this glob.
        #[arg(long, value_name = "GLOB")]
        include: Option<String>,
    },
    /// Print the first or last lines of a job file.
    Peek {
        /// Job id.
        job_id: String,
        /// Path inside the job directory.
        path: String,
        #[command(flatten)]
        range: PeekArgs,
    },
}

/// `taccjm scripts` subcommands.
#[derive(Debug, Subcommand)]
pub(crate) enum ScriptsCommand {
    /// Deploy a local script. Python files get a remote `python3` shebang.
    Deploy {
        /// Local script file.
        file: Utf8PathBuf,
        /// Deployed name; defaults to the file stem.
        #[arg(long)]
        name: Option<String>,
    },
    /// Run a deployed script.
    Run {
        /// Script name.
        name: String,
        /// Pass this job's directory as the first argument.
        #[arg(long)]
        job: Option<String>,
        /// Further arguments.
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// List deployed scripts.
    List,
}

/// `taccjm trash` subcommands.
#[derive(Debug, Subcommand)]
pub(crate) enum TrashCommand {
    /// Move a removed path back to its original location.
    Restore {
        /// Path as given to `files remove`.
        path: String,
    },
    /// Permanently delete everything in trash.
    Empty,
}
