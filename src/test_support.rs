//! Test support utilities shared across unit and integration tests.
//!
//! [`FakeCluster`] stands in for a login node: the "remote" filesystem is a
//! local directory, remote commands run through `sh -c`, and shell scripts
//! play `sbatch`, `scancel`, `sacct`, `squeue` and `taccinfo`.

use std::cell::RefCell;
use std::collections::{BTreeSet, VecDeque};
use std::env;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::rc::Rc;

use camino::{Utf8Path, Utf8PathBuf};
use tokio::sync::{Mutex, MutexGuard};

use crate::config::{ClusterConfig, DEFAULT_ALLOCATION_COMMAND, DEFAULT_REMOTE_ROOT};
use crate::exec::{
    CommandOutput, CommandRunner, ExecError, ExecOutput, ProcessCommandRunner, RemoteExecutor,
    check_output, quote,
};
use crate::jobs::{JobError, JobManager, ManagerSettings};
use crate::scheduler::SchedulerCommands;
use crate::transfer::{
    FileTransfer, PeekRange, SendOptions, TransferError, is_hidden, staging_path,
};

/// Cluster configuration with defaults for every field and a fixed host.
#[must_use]
pub fn sample_cluster_config() -> ClusterConfig {
    ClusterConfig {
        host: Some(String::from("login.example.org")),
        ssh_user: Some(String::from("alice")),
        ssh_port: 22,
        ssh_bin: String::from("ssh"),
        rsync_bin: String::from("rsync"),
        ssh_identity_file: None,
        ssh_batch_mode: true,
        ssh_strict_host_key_checking: true,
        ssh_known_hosts_file: String::new(),
        ssh_connect_timeout_secs: 30,
        ssh_server_alive_interval_secs: 15,
        ssh_server_alive_count_max: 4,
        ssh_control_path: None,
        remote_root: DEFAULT_REMOTE_ROOT.to_owned(),
        sbatch_bin: String::from("sbatch"),
        scancel_bin: String::from("scancel"),
        sacct_bin: String::from("sacct"),
        squeue_bin: String::from("squeue"),
        allocation_command: DEFAULT_ALLOCATION_COMMAND.to_owned(),
    }
}

// ---- Scripted runner ----

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
///
/// Used to drive deterministic command outcomes without spawning processes.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    responses: Rc<RefCell<VecDeque<CommandOutput>>>,
    invocations: Rc<RefCell<Vec<CommandInvocation>>>,
}

/// Records a single invocation made through [`ScriptedRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInvocation {
    /// Program name as passed to the runner.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
}

impl CommandInvocation {
    /// Returns a shell-like command string for assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(
            self.args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        parts.join(" ")
    }
}

impl ScriptedRunner {
    /// Creates a new runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        self.invocations.borrow().clone()
    }

    /// Pushes a successful exit status.
    pub fn push_success(&self) {
        self.push_output(Some(0), "", "");
    }

    /// Pushes a failing exit code with stderr text.
    pub fn push_failure(&self, code: i32) {
        self.push_output(Some(code), "", "simulated failure");
    }

    /// Pushes a response with no exit code to simulate abnormal termination.
    pub fn push_missing_exit_code(&self) {
        self.push_output(None, "", "");
    }

    /// Pushes an explicit command output response.
    pub fn push_output(
        &self,
        code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        self.responses.borrow_mut().push_back(CommandOutput {
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        });
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, ExecError> {
        self.invocations.borrow_mut().push(CommandInvocation {
            program: program.to_owned(),
            args: args.to_vec(),
        });
        self.responses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| ExecError::Spawn {
                program: program.to_owned(),
                message: String::from("no scripted response available"),
            })
    }
}

// ---- Local stand-ins for the remote system ----

/// Executes "remote" commands with the local `sh`.
#[derive(Clone, Debug, Default)]
pub struct LocalShell {
    runner: ProcessCommandRunner,
}

impl RemoteExecutor for LocalShell {
    fn execute(&self, command: &str) -> Result<ExecOutput, ExecError> {
        let args = [OsString::from("-c"), OsString::from(command)];
        let output = self.runner.run("sh", &args)?;
        check_output(command, output)
    }
}

/// [`FileTransfer`] over the local filesystem.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalFiles;

/// Copies `source` into `dest`. With a pattern, directories are created
/// only when a matching file lands in them, as `--prune-empty-dirs` does.
fn copy_tree(
    root: &Utf8Path,
    source: &Utf8Path,
    dest: &Utf8Path,
    options: &SendOptions,
) -> Result<(), TransferError> {
    if options.pattern.is_none() || source == root {
        fs::create_dir_all(dest).map_err(|err| TransferError::from_io(dest, &err))?;
    }
    let entries = source
        .read_dir_utf8()
        .map_err(|err| TransferError::from_io(source, &err))?;
    for item in entries {
        let entry = item.map_err(|err| TransferError::from_io(source, &err))?;
        if options.exclude_hidden && is_hidden(entry.file_name()) {
            continue;
        }
        let target = dest.join(entry.file_name());
        if entry.path().is_dir() {
            copy_tree(root, entry.path(), &target, options)?;
            continue;
        }
        if let Some(ref pattern) = options.pattern {
            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            if !pattern.matches(relative) {
                continue;
            }
        }
        copy_file(entry.path(), &target)?;
    }
    Ok(())
}

fn copy_file(source: &Utf8Path, dest: &Utf8Path) -> Result<(), TransferError> {
    if let Some(parent) = dest.parent().filter(|p| !p.as_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| TransferError::from_io(parent, &err))?;
    }
    fs::copy(source, dest).map_err(|err| TransferError::from_io(source, &err))?;
    Ok(())
}

impl FileTransfer for LocalFiles {
    fn send(
        &self,
        local: &Utf8Path,
        remote: &Utf8Path,
        options: SendOptions,
    ) -> Result<(), TransferError> {
        if local.is_dir() {
            copy_tree(local, local, remote, &options)
        } else if local.is_file() {
            copy_file(local, remote)
        } else {
            Err(TransferError::PathNotFound {
                path: local.to_path_buf(),
            })
        }
    }

    fn get(&self, remote: &Utf8Path, local: &Utf8Path) -> Result<(), TransferError> {
        if remote.is_dir() {
            let everything = SendOptions {
                exclude_hidden: false,
                pattern: None,
            };
            copy_tree(remote, remote, local, &everything)
        } else if remote.is_file() {
            copy_file(remote, local)
        } else {
            Err(TransferError::PathNotFound {
                path: remote.to_path_buf(),
            })
        }
    }

    fn list(&self, remote: &Utf8Path) -> Result<Vec<String>, TransferError> {
        let entries = remote
            .read_dir_utf8()
            .map_err(|err| TransferError::from_io(remote, &err))?;
        let mut names = Vec::new();
        for item in entries {
            let entry = item.map_err(|err| TransferError::from_io(remote, &err))?;
            names.push(entry.file_name().to_owned());
        }
        names.sort();
        Ok(names)
    }

    fn peek(&self, remote: &Utf8Path, range: PeekRange) -> Result<String, TransferError> {
        let contents = self.read(remote)?;
        let lines: Vec<&str> = contents.split_inclusive('\n').collect();
        let selected = match range {
            PeekRange::Head(count) => lines.iter().take(count).copied().collect::<String>(),
            PeekRange::Default => lines
                .iter()
                .take(PeekRange::DEFAULT_LINES)
                .copied()
                .collect(),
            PeekRange::Tail(count) => lines
                .iter()
                .skip(lines.len().saturating_sub(count))
                .copied()
                .collect(),
        };
        Ok(selected)
    }

    fn read(&self, remote: &Utf8Path) -> Result<String, TransferError> {
        fs::read_to_string(remote).map_err(|err| TransferError::from_io(remote, &err))
    }

    fn write(&self, remote: &Utf8Path, contents: &str) -> Result<(), TransferError> {
        let staging = staging_path(remote);
        fs::write(&staging, contents).map_err(|err| TransferError::from_io(remote, &err))?;
        fs::rename(&staging, remote).map_err(|err| TransferError::from_io(remote, &err))
    }
}

// ---- Fake cluster ----

const TACCINFO_OUTPUT: &str = "\
--------------------- Project balances for user tester ----------------------
| Name           Avail SUs     Expires | Name           Avail SUs     Expires |
| TEST-ALLOC-1         500  2030-12-31 | TEST-ALLOC-2          25  2030-06-30 |
------------------------ Disk quotas for user tester ------------------------
| Disk         Usage (GB)     Limit    %Used   File Usage       Limit   %Used |
| /home1              1.0      10.0    10.00          100      200000    0.05 |
-------------------------------------------------------------------------------
";

/// A throwaway "login node" rooted in a local directory.
#[derive(Clone, Debug)]
pub struct FakeCluster {
    base: Utf8PathBuf,
}

impl FakeCluster {
    /// Writes the fake scheduler scripts under `base/bin` and prepares
    /// `base/remote` as the remote root.
    ///
    /// # Errors
    ///
    /// Returns any I/O error from creating the directories or scripts.
    pub fn install(base: &Utf8Path) -> io::Result<Self> {
        let cluster = Self {
            base: base.to_path_buf(),
        };
        fs::create_dir_all(cluster.remote_root())?;
        fs::create_dir_all(cluster.bin_dir())?;
        fs::create_dir_all(cluster.state_dir())?;

        let state = quote(cluster.state_dir().as_str());
        let scripts = [
            (
                "sbatch",
                format!(
                    r#"[ -f "$1" ] || {{ echo "sbatch: error: Unable to open file $1" >&2; exit 1; }}
count=$(cat {state}/counter 2>/dev/null || echo 1000)
count=$((count + 1))
echo "$count" > {state}/counter
echo PENDING > {state}/"$count"
echo "-----------------------------------------------------------------"
echo "          Welcome to the Fake Cluster"
echo "-----------------------------------------------------------------"
echo "Submitted batch job $count"
"#
                ),
            ),
            (
                "scancel",
                format!(
                    r#"[ -f {state}/"$1" ] || {{ echo "scancel: error: Invalid job id $1" >&2; exit 1; }}
echo CANCELLED > {state}/"$1"
"#
                ),
            ),
            (
                "sacct",
                format!(
                    r#"id=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-j" ]; then id=$2; fi
  shift
done
cat {state}/"$id" 2>/dev/null
exit 0
"#
                ),
            ),
            (
                "squeue",
                format!(
                    r#"for f in {state}/[0-9]*; do
  [ -f "$f" ] || continue
  id=$(basename "$f")
  echo "$id|job$id|tester|$(cat "$f")|1|10:00|N/A"
done
"#
                ),
            ),
            (
                "taccinfo",
                format!("cat <<'TACCINFO'\n{TACCINFO_OUTPUT}TACCINFO\n"),
            ),
        ];
        for (name, body) in scripts {
            fs::write(cluster.bin_dir().join(name), format!("#!/bin/sh\n{body}"))?;
        }
        Ok(cluster)
    }

    fn bin_dir(&self) -> Utf8PathBuf {
        self.base.join("bin")
    }

    fn state_dir(&self) -> Utf8PathBuf {
        self.base.join("scheduler")
    }

    fn bin(&self, name: &str) -> String {
        format!("sh {}", quote(self.bin_dir().join(name).as_str()))
    }

    /// Directory playing the remote root.
    #[must_use]
    pub fn remote_root(&self) -> Utf8PathBuf {
        self.base.join("remote")
    }

    /// Scheduler commands pointing at the fake scripts.
    #[must_use]
    pub fn scheduler(&self) -> SchedulerCommands {
        SchedulerCommands {
            sbatch: self.bin("sbatch"),
            scancel: self.bin("scancel"),
            sacct: self.bin("sacct"),
            squeue: self.bin("squeue"),
            allocations: self.bin("taccinfo"),
        }
    }

    /// Manager settings for this cluster.
    #[must_use]
    pub fn settings(&self) -> ManagerSettings {
        ManagerSettings {
            remote_root: self.remote_root().to_string(),
            scheduler: self.scheduler(),
        }
    }

    /// Connects a manager with the plain local executor and gateway.
    ///
    /// # Errors
    ///
    /// Returns [`JobError`] when the remote layout cannot be created.
    pub fn manager(&self) -> Result<JobManager<LocalShell, LocalFiles>, JobError> {
        JobManager::connect(LocalShell::default(), LocalFiles, self.settings())
    }

    /// Connects a manager whose executor and gateway accept injected
    /// faults. The returned doubles share state with the manager's copies.
    ///
    /// # Errors
    ///
    /// Returns [`JobError`] when the remote layout cannot be created.
    pub fn faulty_manager(&self) -> Result<FaultyManager, JobError> {
        let executor = FaultyExecutor::new(LocalShell::default());
        let transfer = FaultyTransfer::new(LocalFiles);
        let manager = JobManager::connect(executor.clone(), transfer.clone(), self.settings())?;
        Ok(FaultyManager {
            manager,
            executor,
            transfer,
        })
    }

    /// Overrides the scheduler state of a submitted job.
    ///
    /// # Errors
    ///
    /// Returns any I/O error from writing the state file.
    pub fn set_job_state(&self, scheduler_id: &str, state: &str) -> io::Result<()> {
        fs::write(self.state_dir().join(scheduler_id), format!("{state}\n"))
    }

    /// Current scheduler state of a job, if it was ever submitted.
    #[must_use]
    pub fn job_state(&self, scheduler_id: &str) -> Option<String> {
        fs::read_to_string(self.state_dir().join(scheduler_id))
            .ok()
            .map(|state| state.trim().to_owned())
    }
}

/// A manager wired to fault-injecting doubles plus handles to them.
#[derive(Debug)]
pub struct FaultyManager {
    /// The manager under test.
    pub manager: JobManager<FaultyExecutor<LocalShell>, FaultyTransfer<LocalFiles>>,
    /// Handle sharing the manager's executor faults.
    pub executor: FaultyExecutor<LocalShell>,
    /// Handle sharing the manager's transfer faults.
    pub transfer: FaultyTransfer<LocalFiles>,
}

// ---- Fault injection ----

#[derive(Clone, Debug)]
enum CannedResponse {
    Stdout(String),
    Failure(String),
}

#[derive(Clone, Debug)]
struct CommandFault {
    needle: String,
    response: CannedResponse,
    remaining: Option<usize>,
}

/// Wraps an executor and answers matching commands with canned output or
/// failures.
#[derive(Clone, Debug)]
pub struct FaultyExecutor<E> {
    inner: E,
    faults: Rc<RefCell<Vec<CommandFault>>>,
    commands: Rc<RefCell<Vec<String>>>,
}

impl<E> FaultyExecutor<E> {
    /// Wraps `inner` with no faults configured.
    #[must_use]
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            faults: Rc::default(),
            commands: Rc::default(),
        }
    }

    fn push(&self, needle: &str, response: CannedResponse, remaining: Option<usize>) {
        self.faults.borrow_mut().push(CommandFault {
            needle: needle.to_owned(),
            response,
            remaining,
        });
    }

    /// Answers the next command containing `needle` with `stdout` and a
    /// zero exit, without running it.
    pub fn respond_once(&self, needle: &str, stdout: &str) {
        self.push(needle, CannedResponse::Stdout(stdout.to_owned()), Some(1));
    }

    /// Fails the next command containing `needle` with `stderr`.
    pub fn fail_once(&self, needle: &str, stderr: &str) {
        self.push(needle, CannedResponse::Failure(stderr.to_owned()), Some(1));
    }

    /// Fails every command containing `needle` with `stderr`.
    pub fn fail_always(&self, needle: &str, stderr: &str) {
        self.push(needle, CannedResponse::Failure(stderr.to_owned()), None);
    }

    /// Removes every configured fault.
    pub fn clear(&self) {
        self.faults.borrow_mut().clear();
    }

    /// Commands seen so far, including answered ones.
    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        self.commands.borrow().clone()
    }

    fn take_fault(&self, command: &str) -> Option<CannedResponse> {
        let mut faults = self.faults.borrow_mut();
        let fault = faults.iter_mut().find(|fault| {
            fault.remaining != Some(0) && command.contains(fault.needle.as_str())
        })?;
        if let Some(remaining) = fault.remaining.as_mut() {
            *remaining -= 1;
        }
        Some(fault.response.clone())
    }
}

impl<E: RemoteExecutor> RemoteExecutor for FaultyExecutor<E> {
    fn execute(&self, command: &str) -> Result<ExecOutput, ExecError> {
        self.commands.borrow_mut().push(command.to_owned());
        match self.take_fault(command) {
            Some(CannedResponse::Stdout(stdout)) => Ok(ExecOutput {
                stdout,
                stderr: String::new(),
            }),
            Some(CannedResponse::Failure(stderr)) => Err(ExecError::CommandFailure {
                command: command.to_owned(),
                status: Some(1),
                status_text: String::from("1"),
                stdout: String::new(),
                stderr,
            }),
            None => self.inner.execute(command),
        }
    }
}

/// Gateway operation selected by [`FaultyTransfer::fail_once`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransferOp {
    /// [`FileTransfer::send`].
    Send,
    /// [`FileTransfer::get`].
    Get,
    /// [`FileTransfer::list`].
    List,
    /// [`FileTransfer::peek`].
    Peek,
    /// [`FileTransfer::read`].
    Read,
    /// [`FileTransfer::write`].
    Write,
}

/// Wraps a gateway and denies matching operations with
/// [`TransferError::PermissionDenied`].
#[derive(Clone, Debug)]
pub struct FaultyTransfer<T> {
    inner: T,
    faults: Rc<RefCell<Vec<(TransferOp, String)>>>,
}

impl<T> FaultyTransfer<T> {
    /// Wraps `inner` with no faults configured.
    #[must_use]
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            faults: Rc::default(),
        }
    }

    /// Denies the next `op` whose remote path contains `needle`.
    pub fn fail_once(&self, op: TransferOp, needle: &str) {
        self.faults.borrow_mut().push((op, needle.to_owned()));
    }

    fn check(&self, op: TransferOp, path: &Utf8Path) -> Result<(), TransferError> {
        let mut faults = self.faults.borrow_mut();
        let position = faults
            .iter()
            .position(|(fault_op, needle)| *fault_op == op && path.as_str().contains(needle.as_str()));
        match position {
            Some(index) => {
                faults.remove(index);
                Err(TransferError::PermissionDenied {
                    path: path.to_path_buf(),
                })
            }
            None => Ok(()),
        }
    }
}

impl<T: FileTransfer> FileTransfer for FaultyTransfer<T> {
    fn send(
        &self,
        local: &Utf8Path,
        remote: &Utf8Path,
        options: SendOptions,
    ) -> Result<(), TransferError> {
        self.check(TransferOp::Send, remote)?;
        self.inner.send(local, remote, options)
    }

    fn get(&self, remote: &Utf8Path, local: &Utf8Path) -> Result<(), TransferError> {
        self.check(TransferOp::Get, remote)?;
        self.inner.get(remote, local)
    }

    fn list(&self, remote: &Utf8Path) -> Result<Vec<String>, TransferError> {
        self.check(TransferOp::List, remote)?;
        self.inner.list(remote)
    }

    fn peek(&self, remote: &Utf8Path, range: PeekRange) -> Result<String, TransferError> {
        self.check(TransferOp::Peek, remote)?;
        self.inner.peek(remote, range)
    }

    fn read(&self, remote: &Utf8Path) -> Result<String, TransferError> {
        self.check(TransferOp::Read, remote)?;
        self.inner.read(remote)
    }

    fn write(&self, remote: &Utf8Path, contents: &str) -> Result<(), TransferError> {
        self.check(TransferOp::Write, remote)?;
        self.inner.write(remote, contents)
    }
}

// ---- Sample application ----

/// Writes a small templated application and job under `dir`:
/// `project.toml`, `app.json`, `assets/` (with a hidden file), `job.json`
/// and `input.txt`.
///
/// # Errors
///
/// Returns any I/O error from writing the files.
pub fn write_sample_app(dir: &Utf8Path) -> io::Result<()> {
    fs::create_dir_all(dir.join("assets"))?;
    fs::write(
        dir.join("project.toml"),
        "[app]\nname = \"test_app\"\nversion = \"1.0.0\"\n\n[job]\nname = \"test_job\"\n",
    )?;
    fs::write(
        dir.join("app.json"),
        r#"{
  "name": "{{ app.name }}",
  "version": "{{ app.version }}",
  "entryCommand": "sh run.sh",
  "shortDescription": "Sample app for {{ app.name }}",
  "defaultQueue": "development",
  "defaultMaxRunTime": "00:05:00",
  "inputs": {"input1": "A text file"},
  "parameters": {"param1": "default value"}
}
"#,
    )?;
    fs::write(
        dir.join("assets").join("run.sh"),
        "#!/bin/sh\necho \"param1=$param1\"\ncat \"$input1\"\n",
    )?;
    fs::write(dir.join("assets").join(".hidden_file"), "not deployed\n")?;
    fs::write(
        dir.join("job.json"),
        r#"{
  "name": "{{ job.name }}",
  "appId": "{{ app.name }}--{{ app.version }}",
  "desc": "Sample job",
  "inputs": {"input1": "input.txt"},
  "parameters": {"param1": "hello world"}
}
"#,
    )?;
    fs::write(dir.join("input.txt"), "line one\nline two\nline three\n")?;
    Ok(())
}

// ---- Environment ----

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: Mutex<()> = Mutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets and removes environment variables while holding a global mutex.
    /// A `None` value removes the variable.
    pub async fn set_vars(pairs: &[(&str, Option<&str>)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            previous.push(((*key).to_owned(), env::var_os(key)));
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe {
                match value {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
