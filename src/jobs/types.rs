//! Job records and lifecycle states.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::JobError;
use crate::apps::AppRecord;
use crate::layout::is_single_component;

/// Lifecycle state of a job.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Files are in place; not yet handed to the scheduler.
    Staged,
    /// Accepted by the scheduler and waiting to run.
    Submitted,
    /// Running on compute nodes.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished unsuccessfully.
    Failed,
    /// Cancelled by the user.
    Cancelled,
}

impl JobStatus {
    /// `true` for states the scheduler can still move on.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Submitted | Self::Running)
    }

    /// `true` once the job has run to an end.
    #[must_use]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// `true` for states no scheduler event changes.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Lowercase name used in persisted records.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Staged => "staged",
            Self::Submitted => "submitted",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A job description and, once staged, its persisted record.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobConfig {
    /// Job name, used as the prefix of the job id.
    #[serde(default)]
    pub name: String,
    /// Id of the deployed application to run.
    #[serde(default)]
    pub app_id: String,
    /// Assigned when staged.
    #[serde(rename = "job_id", default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    /// Remote job directory, assigned when staged.
    #[serde(rename = "job_dir", default, skip_serializing_if = "Option::is_none")]
    pub job_dir: Option<String>,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    /// Scheduler partition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue: Option<String>,
    /// Requested node count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_count: Option<u32>,
    /// Tasks per node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processors_per_node: Option<u32>,
    /// Wall-clock limit as `HH:MM:SS`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_run_time: Option<String>,
    /// Input name to local path. Each file or directory is sent into the
    /// job directory and exported under its name.
    #[serde(default)]
    pub inputs: BTreeMap<String, String>,
    /// Parameter name to value, exported to the job environment.
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
    /// Notification address for scheduler mail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Allocation charged for the job.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocation: Option<String>,
    /// Lifecycle state, present once staged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    /// Scheduler job id, present once submitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduler_id: Option<String>,
}

impl JobConfig {
    /// Current state, `staged` for records written before a status existed.
    #[must_use]
    pub fn status(&self) -> JobStatus {
        self.status.unwrap_or(JobStatus::Staged)
    }

    /// Fills unset fields from the application defaults. App parameter
    /// defaults are merged under the job's own values.
    #[must_use]
    pub fn with_app_defaults(mut self, app: &AppRecord) -> Self {
        let defaults = &app.config;
        if self.desc.is_none() && !defaults.short_description.is_empty() {
            self.desc = Some(defaults.short_description.clone());
        }
        if self.queue.is_none() {
            self.queue.clone_from(&defaults.default_queue);
        }
        self.node_count.get_or_insert(defaults.default_node_count);
        self.processors_per_node
            .get_or_insert(defaults.default_processors_per_node);
        if self.max_run_time.is_none() {
            self.max_run_time = Some(defaults.default_max_run_time.clone());
        }
        for (key, value) in &defaults.parameters {
            self.parameters
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        self
    }

    /// Checks the fields needed to stage and submit.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::ConfigValidation`] naming the first bad field.
    pub fn validate(&self) -> Result<(), JobError> {
        let invalid = |field: &str, message: &str| JobError::ConfigValidation {
            field: field.to_owned(),
            message: message.to_owned(),
        };
        if !is_single_component(&self.name) || self.name.contains(char::is_whitespace) {
            return Err(invalid("name", "must be a non-empty name without '/' or spaces"));
        }
        if self.app_id.trim().is_empty() {
            return Err(invalid("appId", "must name a deployed application"));
        }
        if self.queue.as_deref().is_none_or(|queue| queue.trim().is_empty()) {
            return Err(invalid("queue", "set queue or the app's defaultQueue"));
        }
        if self.node_count == Some(0) {
            return Err(invalid("nodeCount", "must be at least 1"));
        }
        if self.processors_per_node == Some(0) {
            return Err(invalid("processorsPerNode", "must be at least 1"));
        }
        if self
            .max_run_time
            .as_deref()
            .is_none_or(|time| time.trim().is_empty())
        {
            return Err(invalid("maxRunTime", "must be a wall time such as 00:10:00"));
        }
        for (field, value) in [("email", &self.email), ("allocation", &self.allocation)] {
            if value
                .as_deref()
                .is_some_and(|v| v.is_empty() || v.contains(char::is_whitespace))
            {
                return Err(invalid(field, "must be a single word without whitespace"));
            }
        }
        for name in self.inputs.keys().chain(self.parameters.keys()) {
            if !is_env_name(name) {
                return Err(JobError::ConfigValidation {
                    field: name.clone(),
                    message: String::from("input and parameter names must be valid shell variable names"),
                });
            }
        }
        Ok(())
    }
}

/// Editable fields accepted by [`super::JobManager::stage_job`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct JobUpdate {
    /// New notification address.
    pub email: Option<String>,
    /// New allocation.
    pub allocation: Option<String>,
}

impl JobUpdate {
    /// `true` when the update changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.email.is_none() && self.allocation.is_none()
    }
}

/// Result of [`super::JobManager::cleanup_job`].
#[derive(Clone, Copy, Debug, Serialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum CleanupOutcome {
    /// The job directory was moved to trash.
    Removed,
    /// No such job existed.
    AlreadyGone,
}

fn is_env_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
