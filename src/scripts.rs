//! Helper scripts deployed under `{root}/scripts/`.
//!
//! Python files get a shebang pointing at the remote `python3`; anything
//! else is uploaded as is. Scripts are stored without their extension.

use camino::Utf8Path;
use thiserror::Error;
use tracing::info;

use crate::exec::{ExecError, ExecOutput, RemoteExecutor, quote};
use crate::layout::{RemoteLayout, is_single_component};
use crate::templates::{TemplateError, read_local_file};
use crate::transfer::{FileTransfer, SendOptions, TransferError};

/// Locates `python3` on the remote login node.
const PYTHON_LOOKUP: &str = "module load python3 > /dev/null 2>&1; command -v python3";

/// Errors raised by the script registry.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// Script name is empty or contains a path separator.
    #[error("invalid script name {name}")]
    InvalidName {
        /// Offending name.
        name: String,
    },
    /// No `python3` was found on the remote system.
    #[error("python3 not found on the remote system")]
    PythonNotFound,
    /// Local script could not be read.
    #[error(transparent)]
    Local(#[from] TemplateError),
    /// Upload failed.
    #[error(transparent)]
    Transfer(#[from] TransferError),
    /// Remote command failed.
    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// Deploys, runs and lists helper scripts.
pub struct ScriptRegistry<'a, E, T> {
    layout: &'a RemoteLayout,
    executor: &'a E,
    transfer: &'a T,
}

impl<'a, E: RemoteExecutor, T: FileTransfer> ScriptRegistry<'a, E, T> {
    /// Creates a registry over an existing remote layout.
    #[must_use]
    pub const fn new(layout: &'a RemoteLayout, executor: &'a E, transfer: &'a T) -> Self {
        Self {
            layout,
            executor,
            transfer,
        }
    }

    /// Uploads `local_file` as an executable script named `name`, or the
    /// file stem when no name is given. Returns the deployed name.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptError::Transfer`] with `PathNotFound` when the local
    /// file is missing.
    pub fn deploy(&self, local_file: &Utf8Path, name: Option<&str>) -> Result<String, ScriptError> {
        if !local_file.is_file() {
            return Err(TransferError::PathNotFound {
                path: local_file.to_path_buf(),
            }
            .into());
        }
        let script_name = name
            .or_else(|| local_file.file_stem())
            .unwrap_or_default()
            .to_owned();
        if !is_single_component(&script_name) {
            return Err(ScriptError::InvalidName { name: script_name });
        }
        let remote = self.layout.scripts_dir().join(&script_name);

        if local_file.extension() == Some("py") {
            let lookup = self.executor.execute(PYTHON_LOOKUP)?;
            let python = lookup.stdout.trim();
            if python.is_empty() {
                return Err(ScriptError::PythonNotFound);
            }
            let body = read_local_file(local_file)?;
            self.transfer
                .write(&remote, &format!("#!{python}\n{body}"))?;
        } else {
            self.transfer.send(local_file, &remote, SendOptions::default())?;
        }
        self.executor
            .execute(&format!("chmod +x {}", quote(remote.as_str())))?;
        info!(script = %script_name, "deployed script");
        Ok(script_name)
    }

    /// Runs a deployed script. `job_dir`, when given, is passed as the first
    /// argument; every argument is shell-quoted.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptError::InvalidName`] for a bad name and
    /// [`ScriptError::Exec`] when the script exits non-zero.
    pub fn run(
        &self,
        name: &str,
        job_dir: Option<&Utf8Path>,
        args: &[String],
    ) -> Result<ExecOutput, ScriptError> {
        if !is_single_component(name) {
            return Err(ScriptError::InvalidName {
                name: name.to_owned(),
            });
        }
        let mut command = quote(self.layout.scripts_dir().join(name).as_str());
        for arg in job_dir
            .map(Utf8Path::as_str)
            .into_iter()
            .chain(args.iter().map(String::as_str))
        {
            command.push(' ');
            command.push_str(&quote(arg));
        }
        Ok(self.executor.execute(&command)?)
    }

    /// Lists deployed script names.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptError::Transfer`] when the scripts directory is
    /// unreadable.
    pub fn list(&self) -> Result<Vec<String>, ScriptError> {
        Ok(self.transfer.list(&self.layout.scripts_dir())?)
    }
}
