//! SLURM command rendering and output parsing.

use serde::{Deserialize, Serialize};

use crate::config::ClusterConfig;
use crate::exec::quote;
use crate::jobs::JobStatus;

/// Name of the batch script inside every job directory.
pub const SUBMIT_SCRIPT: &str = "submit_script.sh";

/// `squeue` output format: id, name, user, state, nodes, time left, start.
const QUEUE_FORMAT: &str = "%i|%j|%u|%T|%D|%L|%S";

/// Scheduler commands used by the job manager.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SchedulerCommands {
    /// Submit command.
    pub sbatch: String,
    /// Cancel command.
    pub scancel: String,
    /// Accounting query command.
    pub sacct: String,
    /// Queue listing command.
    pub squeue: String,
    /// Allocation balance command.
    pub allocations: String,
}

impl SchedulerCommands {
    /// Takes the scheduler binaries from the cluster configuration.
    #[must_use]
    pub fn from_config(config: &ClusterConfig) -> Self {
        Self {
            sbatch: config.sbatch_bin.clone(),
            scancel: config.scancel_bin.clone(),
            sacct: config.sacct_bin.clone(),
            squeue: config.squeue_bin.clone(),
            allocations: config.allocation_command.clone(),
        }
    }

    /// Submits the job directory's batch script from inside that directory.
    #[must_use]
    pub fn submit(&self, job_dir: &str) -> String {
        format!("cd {} && {} {SUBMIT_SCRIPT}", quote(job_dir), self.sbatch)
    }

    /// Cancels a scheduler job.
    #[must_use]
    pub fn cancel(&self, scheduler_id: &str) -> String {
        format!("{} {}", self.scancel, quote(scheduler_id))
    }

    /// Queries the allocation-level state of a scheduler job.
    #[must_use]
    pub fn state(&self, scheduler_id: &str) -> String {
        format!("{} -n -X -P -j {} -o State", self.sacct, quote(scheduler_id))
    }

    /// Lists queued jobs, optionally for a single user.
    #[must_use]
    pub fn queue(&self, user: Option<&str>) -> String {
        let mut command = format!("{} -h -o {}", self.squeue, quote(QUEUE_FORMAT));
        if let Some(user) = user {
            command.push_str(" -u ");
            command.push_str(&quote(user));
        }
        command
    }
}

/// Extracts the scheduler id from `sbatch` output.
///
/// The last non-empty line decides: `error` or `FAILED` in it marks a
/// rejection, otherwise its last token is the id.
///
/// # Errors
///
/// Returns the offending line when the submission was rejected.
pub fn parse_submission(stdout: &str) -> Result<String, String> {
    let line = stdout
        .lines()
        .map(str::trim)
        .rfind(|line| !line.is_empty())
        .unwrap_or_default();
    if line.is_empty() || line.contains("error") || line.contains("FAILED") {
        return Err(if line.is_empty() {
            String::from("no output from sbatch")
        } else {
            line.to_owned()
        });
    }
    line.split_whitespace()
        .last()
        .map(ToOwned::to_owned)
        .ok_or_else(|| line.to_owned())
}

/// Maps a SLURM state name to a job status. Unknown states give `None`.
#[must_use]
pub fn status_from_state(state: &str) -> Option<JobStatus> {
    let name = state
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .trim_end_matches('+');
    match name {
        "PENDING" | "CONFIGURING" | "REQUEUED" | "RESIZING" | "SUSPENDED" => {
            Some(JobStatus::Submitted)
        }
        "RUNNING" | "COMPLETING" | "STAGE_OUT" => Some(JobStatus::Running),
        "COMPLETED" => Some(JobStatus::Completed),
        "CANCELLED" => Some(JobStatus::Cancelled),
        "FAILED" | "TIMEOUT" | "NODE_FAIL" | "OUT_OF_MEMORY" | "BOOT_FAIL" | "DEADLINE"
        | "PREEMPTED" => Some(JobStatus::Failed),
        _ => None,
    }
}

/// Maps `sacct` output to a job status using its first state line.
#[must_use]
pub fn status_from_sacct(stdout: &str) -> Option<JobStatus> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .and_then(status_from_state)
}

/// One compute allocation and its remaining balance.
#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
pub struct Allocation {
    /// Project name charged with `sbatch -A`.
    pub name: String,
    /// Remaining service units.
    pub service_units: i64,
    /// Expiration date as printed by the system.
    pub expiration: String,
}

/// Parses the project balance table printed by `taccinfo`.
///
/// Rows sit between the first and second dashed banner lines; every
/// `|`-separated cell holding `name units date` is one allocation. Header
/// cells and blank cells are skipped.
#[must_use]
pub fn parse_allocations(stdout: &str) -> Vec<Allocation> {
    let mut allocations: Vec<Allocation> = Vec::new();
    let is_banner = |line: &str| line.trim_start().starts_with('-');
    let has_banner = stdout.lines().any(is_banner);
    let rows = stdout
        .lines()
        .skip_while(|line| has_banner && !is_banner(line))
        .skip_while(|line| is_banner(line))
        .take_while(|line| !is_banner(line));

    for cell in rows.flat_map(|line| line.split('|')) {
        let tokens: Vec<&str> = cell.split_whitespace().collect();
        let [name, units, expiration] = tokens.as_slice() else {
            continue;
        };
        let Ok(service_units) = units.parse::<i64>() else {
            continue;
        };
        if allocations.iter().any(|existing| existing.name == *name) {
            continue;
        }
        allocations.push(Allocation {
            name: (*name).to_owned(),
            service_units,
            expiration: (*expiration).to_owned(),
        });
    }
    allocations
}

/// A row of `squeue` output.
#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
pub struct QueueEntry {
    /// Scheduler job id.
    pub job_id: String,
    /// Job name.
    pub name: String,
    /// Owning user.
    pub user: String,
    /// SLURM state name.
    pub state: String,
    /// Allocated node count.
    pub nodes: u32,
    /// Remaining wall time.
    pub time_left: String,
    /// Actual or expected start time.
    pub start_time: String,
}

/// Parses `squeue -h -o "%i|%j|%u|%T|%D|%L|%S"` output, skipping
/// malformed rows.
#[must_use]
pub fn parse_queue(stdout: &str) -> Vec<QueueEntry> {
    stdout
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.trim().split('|').map(str::trim).collect();
            let [job_id, name, user, state, nodes, time_left, start_time] = fields.as_slice()
            else {
                return None;
            };
            Some(QueueEntry {
                job_id: (*job_id).to_owned(),
                name: (*name).to_owned(),
                user: (*user).to_owned(),
                state: (*state).to_owned(),
                nodes: nodes.parse().ok()?,
                time_left: (*time_left).to_owned(),
                start_time: (*start_time).to_owned(),
            })
        })
        .collect()
}
