//! Core library for the `taccjm` job manager.
//!
//! The crate deploys applications and runs SLURM batch jobs on a remote
//! HPC system reached over SSH. [`JobManager`] ties together a
//! [`RemoteExecutor`] for shell commands, a [`FileTransfer`] gateway for
//! files, and the remote directory layout (`apps/`, `jobs/`, `scripts/`,
//! `trash/`). [`SessionRegistry`] and [`Heartbeat`] keep several sessions
//! alive and poll their allocations in the background.

pub mod apps;
pub mod config;
pub mod exec;
pub mod heartbeat;
pub mod jobs;
pub mod layout;
pub mod logging;
pub mod scheduler;
pub mod scripts;
pub mod session;
pub mod templates;
pub mod test_support;
pub mod transfer;

pub use apps::{AppConfig, AppError, AppRecord, AppRegistry, DeployOptions};
pub use config::{ClusterConfig, ConfigError, SshTarget};
pub use exec::{
    CommandOutput, CommandRunner, ExecError, ExecOutput, ProcessCommandRunner, RemoteExecutor,
    SshClient,
};
pub use heartbeat::{Heartbeat, HeartbeatConfig, HeartbeatError, HeartbeatHandle, HeartbeatStats};
pub use jobs::{
    CleanupOutcome, JobConfig, JobError, JobManager, JobStatus, JobUpdate, ManagerSettings,
};
pub use layout::RemoteLayout;
pub use scheduler::{Allocation, QueueEntry, SchedulerCommands};
pub use scripts::{ScriptError, ScriptRegistry};
pub use session::{SessionApi, SessionError, SessionInfo, SessionRegistry, SessionSpec};
pub use transfer::{FilePattern, FileTransfer, PeekRange, SendOptions, TransferError};
