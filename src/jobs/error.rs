//! Errors raised by the job lifecycle manager.

use thiserror::Error;

use super::JobStatus;
use crate::apps::AppError;
use crate::exec::ExecError;
use crate::scripts::ScriptError;
use crate::templates::TemplateError;
use crate::transfer::TransferError;

/// Errors surfaced by [`super::JobManager`].
#[derive(Debug, Error)]
pub enum JobError {
    /// No job record exists for the id.
    #[error("job {job_id} not found")]
    NotFound {
        /// Requested job id.
        job_id: String,
    },
    /// The job left the `staged` state already.
    #[error("job {job_id} was already submitted (status {status})")]
    AlreadySubmitted {
        /// Job id.
        job_id: String,
        /// Current status.
        status: JobStatus,
    },
    /// The job is already cancelled.
    #[error("job {job_id} is already cancelled")]
    AlreadyCancelled {
        /// Job id.
        job_id: String,
    },
    /// The job has already completed or failed.
    #[error("job {job_id} already finished with status {status}")]
    AlreadyFinished {
        /// Job id.
        job_id: String,
        /// Final status.
        status: JobStatus,
    },
    /// The job has no scheduler id to act on.
    #[error("job {job_id} has not been submitted")]
    NotSubmitted {
        /// Job id.
        job_id: String,
    },
    /// The scheduler rejected the batch script.
    #[error("failed to submit job {job_id}: scheduler returned `{message}`")]
    Submission {
        /// Job id.
        job_id: String,
        /// Scheduler output line.
        message: String,
    },
    /// A job field is missing or malformed.
    #[error("invalid job field {field}: {message}")]
    ConfigValidation {
        /// Offending field.
        field: String,
        /// What is wrong with it.
        message: String,
    },
    /// A path or id would escape its base directory.
    #[error("invalid path {path}: {message}")]
    InvalidPath {
        /// Offending path or id.
        path: String,
        /// What is wrong with it.
        message: String,
    },
    /// The stored record is not valid JSON.
    #[error("job record {job_id} is malformed: {message}")]
    Parse {
        /// Job id.
        job_id: String,
        /// Parser message.
        message: String,
    },
    /// Application lookup failed.
    #[error(transparent)]
    App(#[from] AppError),
    /// Template loading or rendering failed.
    #[error(transparent)]
    Template(#[from] TemplateError),
    /// File transfer failed.
    #[error(transparent)]
    Transfer(#[from] TransferError),
    /// Script deployment or execution failed.
    #[error(transparent)]
    Script(#[from] ScriptError),
    /// Remote command failed.
    #[error(transparent)]
    Exec(#[from] ExecError),
}

impl JobError {
    pub(crate) fn invalid_path(path: impl Into<String>, message: &str) -> Self {
        Self::InvalidPath {
            path: path.into(),
            message: message.to_owned(),
        }
    }
}
