//! Job lifecycle manager.
//!
//! A job moves `staged -> submitted -> running -> completed/failed`, or to
//! `cancelled` by request. Every job directory under `{root}/jobs/` holds a
//! `job.json` record written last while staging, so a directory without a
//! record never outlives a failed setup.

mod error;
mod submit_script;
mod types;

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub use error::JobError;
pub use submit_script::render_submit_script;
pub use types::{CleanupOutcome, JobConfig, JobStatus, JobUpdate};

use crate::apps::{AppRecord, AppRegistry};
use crate::config::ClusterConfig;
use crate::exec::{ExecOutput, RemoteExecutor, quote};
use crate::layout::{RemoteLayout, is_contained_relative, is_expandable_root, is_single_component};
use crate::scheduler::{self, Allocation, QueueEntry, SUBMIT_SCRIPT, SchedulerCommands};
use crate::scripts::ScriptRegistry;
use crate::templates::{load_project_config, load_templated_json};
use crate::transfer::{FileTransfer, PeekRange, SendOptions, TransferError};
use submit_script::input_file_name;

/// Stored job record.
pub const JOB_RECORD: &str = "job.json";

/// Hex digits of the random job id suffix.
const JOB_SUFFIX_LEN: usize = 12;

/// `scancel` stderr for ids the scheduler no longer tracks.
const UNKNOWN_SCHEDULER_JOB: &str = "Invalid job id";

/// Settings for [`JobManager::connect`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ManagerSettings {
    /// Remote root, expanded on the remote host.
    pub remote_root: String,
    /// Scheduler commands.
    pub scheduler: SchedulerCommands,
}

impl ManagerSettings {
    /// Takes the remote root and scheduler commands from the configuration.
    #[must_use]
    pub fn from_config(config: &ClusterConfig) -> Self {
        Self {
            remote_root: config.remote_root.clone(),
            scheduler: SchedulerCommands::from_config(config),
        }
    }
}

/// Drives applications, jobs and scripts on one remote system.
///
/// Operations are blocking and unsynchronised; callers serialise access per
/// job.
#[derive(Debug)]
pub struct JobManager<E, T> {
    executor: E,
    transfer: T,
    layout: RemoteLayout,
    scheduler: SchedulerCommands,
}

impl<E: RemoteExecutor, T: FileTransfer> JobManager<E, T> {
    /// Resolves the remote root and creates the apps, jobs, scripts and
    /// trash directories beneath it.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::InvalidPath`] for a root containing `..` or shell
    /// metacharacters, or one that does not expand to an absolute path, and
    /// [`JobError::Exec`] when the remote commands fail.
    pub fn connect(executor: E, transfer: T, settings: ManagerSettings) -> Result<Self, JobError> {
        if !is_expandable_root(&settings.remote_root) {
            return Err(JobError::invalid_path(
                settings.remote_root,
                "remote root must not contain '..' or shell metacharacters",
            ));
        }
        let resolved = executor.execute(&format!("echo {}", settings.remote_root))?;
        let root = resolved.stdout.trim();
        if !root.starts_with('/') || root.contains("..") {
            return Err(JobError::invalid_path(
                root,
                "remote root did not expand to an absolute path",
            ));
        }

        let layout = RemoteLayout::new(root);
        let dirs = [
            layout.apps_dir(),
            layout.jobs_dir(),
            layout.scripts_dir(),
            layout.trash_dir(),
        ]
        .iter()
        .map(|dir| quote(dir.as_str()))
        .collect::<Vec<_>>()
        .join(" ");
        executor.execute(&format!("mkdir -p {dirs}"))?;
        info!(root = %layout.root(), "job manager connected");

        Ok(Self {
            executor,
            transfer,
            layout,
            scheduler: settings.scheduler,
        })
    }

    /// Remote directory layout.
    #[must_use]
    pub const fn layout(&self) -> &RemoteLayout {
        &self.layout
    }

    /// Underlying executor.
    #[must_use]
    pub const fn executor(&self) -> &E {
        &self.executor
    }

    /// Underlying transfer gateway.
    #[must_use]
    pub const fn transfer(&self) -> &T {
        &self.transfer
    }

    /// Releases the executor and transfer gateway.
    #[must_use]
    pub fn into_parts(self) -> (E, T) {
        (self.executor, self.transfer)
    }

    /// Application registry under this manager's root.
    #[must_use]
    pub const fn apps(&self) -> AppRegistry<'_, E, T> {
        AppRegistry::new(&self.layout, &self.executor, &self.transfer)
    }

    /// Script registry under this manager's root.
    #[must_use]
    pub const fn scripts(&self) -> ScriptRegistry<'_, E, T> {
        ScriptRegistry::new(&self.layout, &self.executor, &self.transfer)
    }

    /// Runs an arbitrary command on the remote system.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Exec`] when the command fails.
    pub fn execute(&self, command: &str) -> Result<ExecOutput, JobError> {
        Ok(self.executor.execute(command)?)
    }

    // ---- Job records ----

    /// Lists job ids.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Transfer`] when the jobs directory is unreadable.
    pub fn list_jobs(&self) -> Result<Vec<String>, JobError> {
        Ok(self.transfer.list(&self.layout.jobs_dir())?)
    }

    fn checked_job_dir(&self, job_id: &str) -> Result<Utf8PathBuf, JobError> {
        if is_single_component(job_id) {
            Ok(self.layout.job_dir(job_id))
        } else {
            Err(JobError::invalid_path(job_id, "job id must be a single path component"))
        }
    }

    /// Loads a job record.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::NotFound`] for an unknown id and
    /// [`JobError::Parse`] for a malformed record.
    pub fn load_job(&self, job_id: &str) -> Result<JobConfig, JobError> {
        let path = self.checked_job_dir(job_id)?.join(JOB_RECORD);
        let contents = self.transfer.read(&path).map_err(|err| {
            if err.is_not_found() {
                JobError::NotFound {
                    job_id: job_id.to_owned(),
                }
            } else {
                JobError::Transfer(err)
            }
        })?;
        serde_json::from_str(&contents).map_err(|err| JobError::Parse {
            job_id: job_id.to_owned(),
            message: err.to_string(),
        })
    }

    fn save_job(&self, job: &JobConfig) -> Result<(), JobError> {
        let job_dir = job.job_dir.as_deref().ok_or_else(|| JobError::ConfigValidation {
            field: String::from("job_dir"),
            message: String::from("must be set before saving"),
        })?;
        let json = serde_json::to_string_pretty(job).map_err(|err| JobError::Parse {
            job_id: job.job_id.clone().unwrap_or_default(),
            message: err.to_string(),
        })?;
        self.transfer
            .write(&Utf8Path::new(job_dir).join(JOB_RECORD), &json)?;
        Ok(())
    }

    fn write_submit_script(&self, job: &JobConfig, job_dir: &Utf8Path) -> Result<(), JobError> {
        let script_path = job_dir.join(SUBMIT_SCRIPT);
        self.transfer
            .write(&script_path, &render_submit_script(job)?)?;
        self.executor
            .execute(&format!("chmod +x {}", quote(script_path.as_str())))?;
        Ok(())
    }

    // ---- Lifecycle ----

    /// Fills a job from its application's defaults and, with `stage`,
    /// creates its directory with the app files, inputs, submit script and
    /// record.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::App`] when the application is not deployed,
    /// [`JobError::ConfigValidation`] for invalid fields, and transfer or
    /// exec errors while staging. A failed staging removes the job directory.
    pub fn setup_job(&self, config: JobConfig, stage: bool) -> Result<JobConfig, JobError> {
        if config.app_id.trim().is_empty() {
            return Err(JobError::ConfigValidation {
                field: String::from("appId"),
                message: String::from("must name a deployed application"),
            });
        }
        let app = self.apps().load_config(&config.app_id)?;
        let mut job = config.with_app_defaults(&app);
        job.validate()?;
        if !stage {
            return Ok(job);
        }

        let job_id = allocate_job_id(&job.name);
        let job_dir = self.layout.job_dir(&job_id);
        job.job_id = Some(job_id.clone());
        job.job_dir = Some(job_dir.to_string());
        job.status = Some(JobStatus::Staged);
        job.scheduler_id = None;

        if let Err(err) = self.stage_files(&job, &app, &job_dir) {
            self.discard_job_dir(&job_dir);
            return Err(err);
        }
        info!(job_id = %job_id, app_id = %app.id, "staged job");
        Ok(job)
    }

    /// Loads a templated job file from `local_dir` and sets it up.
    ///
    /// Relative input paths are resolved against `local_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Template`] when the files cannot be loaded, then
    /// anything [`JobManager::setup_job`] returns.
    pub fn setup_job_from_dir(
        &self,
        local_dir: &Utf8Path,
        job_file: &str,
        project_file: Option<&str>,
        stage: bool,
    ) -> Result<JobConfig, JobError> {
        let project = match project_file {
            Some(name) if local_dir.join(name).is_file() => {
                Some(load_project_config(&local_dir.join(name))?)
            }
            _ => None,
        };
        let mut config: JobConfig =
            load_templated_json(&local_dir.join(job_file), project.as_ref())?;
        for path in config.inputs.values_mut() {
            if Utf8Path::new(path.as_str()).is_relative() {
                *path = local_dir.join(path.as_str()).to_string();
            }
        }
        self.setup_job(config, stage)
    }

    fn stage_files(&self, job: &JobConfig, app: &AppRecord, job_dir: &Utf8Path) -> Result<(), JobError> {
        let dir = quote(job_dir.as_str());
        self.executor.execute(&format!("mkdir {dir}"))?;
        let app_dir = self.layout.app_dir(&app.id);
        self.executor
            .execute(&format!("cp -r {}/. {dir}/", quote(app_dir.as_str())))?;

        for (name, local) in &job.inputs {
            let remote = job_dir.join(input_file_name(local)?);
            debug!(input = %name, %local, %remote, "sending job input");
            self.transfer
                .send(Utf8Path::new(local), &remote, SendOptions::default())?;
        }

        self.write_submit_script(job, job_dir)?;
        self.save_job(job)
    }

    fn discard_job_dir(&self, job_dir: &Utf8Path) {
        if let Err(err) = self
            .executor
            .execute(&format!("rm -rf {}", quote(job_dir.as_str())))
        {
            warn!(dir = %job_dir, error = %err, "failed to remove partially staged job");
        }
    }

    /// Updates the editable fields of a staged job and re-renders its
    /// submit script.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::NotFound`] for an unknown id and
    /// [`JobError::AlreadySubmitted`] once the job left `staged`.
    pub fn stage_job(&self, job_id: &str, update: JobUpdate) -> Result<JobConfig, JobError> {
        let mut job = self.load_job(job_id)?;
        let status = job.status();
        if status != JobStatus::Staged {
            return Err(JobError::AlreadySubmitted {
                job_id: job_id.to_owned(),
                status,
            });
        }
        if update.is_empty() {
            return Ok(job);
        }
        if update.email.is_some() {
            job.email = update.email;
        }
        if update.allocation.is_some() {
            job.allocation = update.allocation;
        }
        job.validate()?;
        let job_dir = self.checked_job_dir(job_id)?;
        self.write_submit_script(&job, &job_dir)?;
        self.save_job(&job)?;
        info!(job_id, "updated staged job");
        Ok(job)
    }

    /// Hands a staged job to the scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::AlreadySubmitted`] unless the job is `staged`,
    /// and [`JobError::Submission`] when the scheduler rejects it; the
    /// record is then left unchanged.
    pub fn submit_job(&self, job_id: &str) -> Result<JobConfig, JobError> {
        let mut job = self.load_job(job_id)?;
        let status = job.status();
        if status != JobStatus::Staged {
            return Err(JobError::AlreadySubmitted {
                job_id: job_id.to_owned(),
                status,
            });
        }
        let job_dir = self.checked_job_dir(job_id)?;
        let output = self.executor.execute(&self.scheduler.submit(job_dir.as_str()))?;
        let scheduler_id =
            scheduler::parse_submission(&output.stdout).map_err(|message| JobError::Submission {
                job_id: job_id.to_owned(),
                message,
            })?;

        job.scheduler_id = Some(scheduler_id.clone());
        job.status = Some(JobStatus::Submitted);
        self.save_job(&job)?;
        info!(job_id, scheduler_id = %scheduler_id, "submitted job");
        Ok(job)
    }

    /// Cancels a submitted or running job.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::NotSubmitted`], [`JobError::AlreadyCancelled`] or
    /// [`JobError::AlreadyFinished`] for jobs that cannot be cancelled, and
    /// [`JobError::Exec`] when `scancel` fails; the record is then unchanged.
    pub fn cancel_job(&self, job_id: &str) -> Result<JobConfig, JobError> {
        let mut job = self.load_job(job_id)?;
        let Some(scheduler_id) = job.scheduler_id.clone() else {
            return Err(JobError::NotSubmitted {
                job_id: job_id.to_owned(),
            });
        };
        match job.status() {
            JobStatus::Cancelled => {
                return Err(JobError::AlreadyCancelled {
                    job_id: job_id.to_owned(),
                });
            }
            status if status.is_finished() => {
                return Err(JobError::AlreadyFinished {
                    job_id: job_id.to_owned(),
                    status,
                });
            }
            _ => {}
        }

        self.executor.execute(&self.scheduler.cancel(&scheduler_id))?;
        job.status = Some(JobStatus::Cancelled);
        self.save_job(&job)?;
        info!(job_id, scheduler_id = %scheduler_id, "cancelled job");
        Ok(job)
    }

    /// Updates a submitted job's status from scheduler accounting.
    ///
    /// Jobs without a scheduler id or in a terminal state are returned
    /// unchanged. The record is rewritten only when the status changes.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::NotFound`] for an unknown id and
    /// [`JobError::Exec`] when `sacct` fails.
    pub fn refresh_status(&self, job_id: &str) -> Result<JobConfig, JobError> {
        let mut job = self.load_job(job_id)?;
        let Some(scheduler_id) = job.scheduler_id.clone() else {
            return Ok(job);
        };
        if job.status().is_terminal() {
            return Ok(job);
        }
        let output = self.executor.execute(&self.scheduler.state(&scheduler_id))?;
        match scheduler::status_from_sacct(&output.stdout) {
            Some(status) if status != job.status() => {
                info!(job_id, from = %job.status(), to = %status, "job status changed");
                job.status = Some(status);
                self.save_job(&job)?;
            }
            Some(_) => {}
            None => debug!(job_id, stdout = %output.stdout.trim(), "no scheduler state yet"),
        }
        Ok(job)
    }

    /// Removes a job, cancelling it first when the scheduler still reports
    /// it active. The job directory is moved to trash.
    ///
    /// The status is refreshed before deciding to cancel, so a job that
    /// finished since the last refresh is not cancelled. `scancel`
    /// rejecting the id as invalid means the scheduler already forgot the
    /// job and does not stop the cleanup.
    ///
    /// # Errors
    ///
    /// Returns cancellation or removal errors; the job is then left in
    /// place. An unknown id is not an error and yields
    /// [`CleanupOutcome::AlreadyGone`].
    pub fn cleanup_job(&self, job_id: &str) -> Result<CleanupOutcome, JobError> {
        let mut job = match self.load_job(job_id) {
            Ok(job) => job,
            Err(JobError::NotFound { .. }) => {
                debug!(job_id, "cleanup of unknown job");
                return Ok(CleanupOutcome::AlreadyGone);
            }
            Err(err) => return Err(err),
        };
        if job.scheduler_id.is_some() && job.status().is_active() {
            match self.refresh_status(job_id) {
                Ok(refreshed) => job = refreshed,
                Err(JobError::Exec(err)) => {
                    warn!(job_id, error = %err, "status refresh failed before cleanup");
                }
                Err(err) => return Err(err),
            }
        }
        if job.scheduler_id.is_some() && job.status().is_active() {
            match self.cancel_job(job_id) {
                Ok(_) => {}
                Err(JobError::Exec(err)) if err.stderr().contains(UNKNOWN_SCHEDULER_JOB) => {
                    info!(job_id, "scheduler no longer knows the job; skipping cancel");
                }
                Err(err) => return Err(err),
            }
        }
        let job_dir = self.checked_job_dir(job_id)?;
        self.move_to_trash(&job_dir)?;
        info!(job_id, "cleaned up job");
        Ok(CleanupOutcome::Removed)
    }

    /// Moves a job directory back out of trash.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Transfer`] with `PathNotFound` when the job is
    /// not in trash and [`JobError::InvalidPath`] when a job with the same
    /// id exists again.
    pub fn restore_job(&self, job_id: &str) -> Result<JobConfig, JobError> {
        let job_dir = self.checked_job_dir(job_id)?;
        self.restore(job_dir.as_str())?;
        let job = self.load_job(job_id)?;
        info!(job_id, "restored job");
        Ok(job)
    }

    // ---- Trash ----

    /// Resolves `path` against the remote root. Absolute paths are kept.
    fn resolve_remote(&self, path: &str) -> Result<Utf8PathBuf, JobError> {
        let candidate = Utf8Path::new(path);
        if path.trim().is_empty()
            || candidate
                .components()
                .any(|component| component == Utf8Component::ParentDir)
        {
            return Err(JobError::invalid_path(path, "must be a non-empty path without '..'"));
        }
        let resolved = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.layout.root().join(candidate)
        };
        if self.layout.root().starts_with(&resolved) || resolved.starts_with(self.layout.trash_dir())
        {
            return Err(JobError::invalid_path(
                path,
                "must not be the remote root, one of its parents, or inside trash",
            ));
        }
        Ok(resolved)
    }

    /// Moves a remote file or directory to trash, replacing any earlier
    /// trash entry for the same path. Relative paths resolve against the
    /// remote root.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::InvalidPath`] for the root, trash or paths with
    /// `..`, and [`JobError::Transfer`] with `PathNotFound` when `path` is
    /// missing.
    pub fn remove(&self, path: &str) -> Result<Utf8PathBuf, JobError> {
        let source = self.resolve_remote(path)?;
        self.move_to_trash(&source)?;
        info!(path = %source, "moved to trash");
        Ok(self.layout.trash_path_for(&source))
    }

    /// Moves a path removed with [`JobManager::remove`] back to where it
    /// was.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Transfer`] with `PathNotFound` when trash holds
    /// no entry for `path` and [`JobError::InvalidPath`] when something
    /// already occupies `path`.
    pub fn restore(&self, path: &str) -> Result<Utf8PathBuf, JobError> {
        let destination = self.resolve_remote(path)?;
        let trashed = self.layout.trash_path_for(&destination);
        let (from, to) = (quote(trashed.as_str()), quote(destination.as_str()));
        let check = self.executor.execute(&format!(
            "if [ ! -e {from} ]; then echo missing; elif [ -e {to} ]; then echo occupied; fi"
        ))?;
        match check.stdout.trim() {
            "missing" => {
                return Err(TransferError::PathNotFound { path: trashed }.into());
            }
            "occupied" => {
                return Err(JobError::invalid_path(
                    path,
                    "already exists; remove it before restoring",
                ));
            }
            _ => {}
        }
        let parent = destination.parent().unwrap_or_else(|| self.layout.root());
        self.executor
            .execute(&format!("mkdir -p {} && mv {from} {to}", quote(parent.as_str())))
            .map_err(|err| TransferError::from_exec(&destination, err))?;
        info!(path = %destination, "restored from trash");
        Ok(destination)
    }

    fn move_to_trash(&self, path: &Utf8Path) -> Result<(), JobError> {
        let destination = quote(self.layout.trash_path_for(path).as_str());
        self.executor
            .execute(&format!(
                "rm -rf {destination} && mv {} {destination}",
                quote(path.as_str())
            ))
            .map_err(|err| TransferError::from_exec(path, err))?;
        Ok(())
    }

    /// Permanently deletes everything in trash.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Exec`] when removal fails.
    pub fn empty_trash(&self) -> Result<(), JobError> {
        let trash = quote(self.layout.trash_dir().as_str());
        self.executor.execute(&format!(
            "find {trash} -mindepth 1 -maxdepth 1 -exec rm -rf {{}} +"
        ))?;
        Ok(())
    }

    // ---- Job files ----

    fn job_path(&self, job_id: &str, path: &str) -> Result<Utf8PathBuf, JobError> {
        let relative = Utf8Path::new(path);
        if !is_contained_relative(relative) {
            return Err(JobError::invalid_path(
                path,
                "must be relative to the job directory without '..'",
            ));
        }
        let job_dir = self.checked_job_dir(job_id)?;
        Ok(if path.is_empty() {
            job_dir
        } else {
            job_dir.join(relative)
        })
    }

    /// Lists files in a job directory or one of its subdirectories.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::InvalidPath`] for escaping paths and
    /// [`JobError::Transfer`] when the directory is missing.
    pub fn list_job_files(&self, job_id: &str, subdir: &str) -> Result<Vec<String>, JobError> {
        Ok(self.transfer.list(&self.job_path(job_id, subdir)?)?)
    }

    /// Downloads a job file or directory into `dest_dir/{job_id}/`.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Transfer`] with `PathNotFound` when the remote
    /// path does not exist.
    pub fn get_job_file(
        &self,
        job_id: &str,
        path: &str,
        dest_dir: &Utf8Path,
    ) -> Result<Utf8PathBuf, JobError> {
        let remote = self.job_path(job_id, path)?;
        let name = remote
            .file_name()
            .ok_or_else(|| JobError::invalid_path(path, "must name a file"))?;
        let local_dir = dest_dir.join(job_id);
        Dir::create_ambient_dir_all(&local_dir, ambient_authority())
            .map_err(|err| TransferError::from_io(&local_dir, &err))?;
        let local = local_dir.join(name);
        self.transfer.get(&remote, &local)?;
        Ok(local)
    }

    /// Uploads a local file or directory into a job directory. `options`
    /// filter what a directory upload copies.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::NotFound`] for an unknown job and
    /// [`JobError::Transfer`] when the local path is missing.
    pub fn send_job_file(
        &self,
        job_id: &str,
        local: &Utf8Path,
        dest_subdir: &str,
        options: SendOptions,
    ) -> Result<Utf8PathBuf, JobError> {
        self.load_job(job_id)?;
        let name = local
            .file_name()
            .ok_or_else(|| JobError::invalid_path(local.as_str(), "must name a file"))?;
        let remote = self.job_path(job_id, dest_subdir)?.join(name);
        self.transfer.send(local, &remote, options)?;
        Ok(remote)
    }

    /// Returns the first or last lines of a job file.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Transfer`] when the file is missing or
    /// unreadable.
    pub fn peek_job_file(&self, job_id: &str, path: &str, range: PeekRange) -> Result<String, JobError> {
        Ok(self.transfer.peek(&self.job_path(job_id, path)?, range)?)
    }

    /// Reads a whole job file.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Transfer`] when the file is missing.
    pub fn read_job_file(&self, job_id: &str, path: &str) -> Result<String, JobError> {
        Ok(self.transfer.read(&self.job_path(job_id, path)?)?)
    }

    /// Replaces a job file with `contents`.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::NotFound`] for an unknown job and
    /// [`JobError::Transfer`] when the write fails.
    pub fn write_job_file(&self, job_id: &str, path: &str, contents: &str) -> Result<(), JobError> {
        self.load_job(job_id)?;
        let target = self.job_path(job_id, path)?;
        if target == self.layout.job_dir(job_id).join(JOB_RECORD) {
            return Err(JobError::invalid_path(path, "the job record is managed by taccjm"));
        }
        self.transfer.write(&target, contents)?;
        Ok(())
    }

    // ---- Scheduler queries ----

    /// Lists the user's allocations and balances.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Exec`] when the allocation command fails.
    pub fn allocations(&self) -> Result<Vec<Allocation>, JobError> {
        let output = self.executor.execute(&self.scheduler.allocations)?;
        Ok(scheduler::parse_allocations(&output.stdout))
    }

    /// Lists queued jobs, optionally for one user.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Exec`] when `squeue` fails.
    pub fn queue(&self, user: Option<&str>) -> Result<Vec<QueueEntry>, JobError> {
        let output = self.executor.execute(&self.scheduler.queue(user))?;
        Ok(scheduler::parse_queue(&output.stdout))
    }

    /// Runs a deployed script, passing the job directory first when a job
    /// is named.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::NotFound`] for an unknown job and
    /// [`JobError::Exec`] when the script fails.
    pub fn run_script(
        &self,
        name: &str,
        job_id: Option<&str>,
        args: &[String],
    ) -> Result<ExecOutput, JobError> {
        let job_dir = match job_id {
            Some(job_id) => {
                self.load_job(job_id)?;
                Some(self.checked_job_dir(job_id)?)
            }
            None => None,
        };
        Ok(self.scripts().run(name, job_dir.as_deref(), args)?)
    }
}

fn allocate_job_id(name: &str) -> String {
    let suffix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(JOB_SUFFIX_LEN)
        .collect();
    format!("{name}_{suffix}")
}
