//! File transfer between the local machine and the remote system.
//!
//! [`FileTransfer`] covers bulk copies (`send`/`get`), directory listings,
//! partial reads (`peek`) and small whole-file records (`read`/`write`).

use camino::{Utf8Path, Utf8PathBuf};
use globset::{GlobBuilder, GlobMatcher};
use thiserror::Error;

use crate::exec::ExecError;

mod ssh;

/// Options for [`FileTransfer::send`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SendOptions {
    /// Skip entries whose names start with `.` when sending a directory.
    pub exclude_hidden: bool,
    /// When set, a directory send copies only the files this glob matches.
    pub pattern: Option<FilePattern>,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            exclude_hidden: true,
            pattern: None,
        }
    }
}

/// Shell-style glob selecting files inside a directory send.
///
/// A glob without `/` is matched against file names, as rsync does for its
/// include rules; otherwise it is matched against the path relative to the
/// directory being sent. `*` never crosses a `/`.
#[derive(Clone, Debug)]
pub struct FilePattern {
    glob: String,
    matcher: GlobMatcher,
}

impl FilePattern {
    /// Compiles `glob`.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::InvalidPattern`] when the glob is empty or
    /// malformed.
    pub fn new(glob: &str) -> Result<Self, TransferError> {
        let invalid = |message: String| TransferError::InvalidPattern {
            pattern: glob.to_owned(),
            message,
        };
        if glob.trim().is_empty() {
            return Err(invalid(String::from("pattern must not be empty")));
        }
        let matcher = GlobBuilder::new(glob)
            .literal_separator(true)
            .build()
            .map_err(|err| invalid(err.to_string()))?
            .compile_matcher();
        Ok(Self {
            glob: glob.to_owned(),
            matcher,
        })
    }

    /// The glob text, as handed to `rsync --include`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.glob
    }

    /// Returns `true` when the file at `relative` should be sent.
    #[must_use]
    pub fn matches(&self, relative: &Utf8Path) -> bool {
        if self.glob.contains('/') {
            self.matcher
                .is_match(relative.as_str().trim_start_matches('/'))
        } else {
            relative
                .file_name()
                .is_some_and(|name| self.matcher.is_match(name))
        }
    }
}

impl PartialEq for FilePattern {
    fn eq(&self, other: &Self) -> bool {
        self.glob == other.glob
    }
}

impl Eq for FilePattern {}

/// Portion of a file returned by [`FileTransfer::peek`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum PeekRange {
    /// First `n` lines.
    Head(usize),
    /// Last `n` lines.
    Tail(usize),
    /// The `head` default of ten lines.
    #[default]
    Default,
}

impl PeekRange {
    /// Lines shown by [`PeekRange::Default`].
    pub const DEFAULT_LINES: usize = 10;
}

/// Moves files to and from the remote system.
pub trait FileTransfer {
    /// Copies a local file or directory tree to `remote`. Parent directories
    /// of `remote` are created.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::PathNotFound`] when `local` is missing.
    fn send(&self, local: &Utf8Path, remote: &Utf8Path, options: SendOptions)
    -> Result<(), TransferError>;

    /// Copies a remote file or directory tree to `local`.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::PathNotFound`] when `remote` is missing.
    fn get(&self, remote: &Utf8Path, local: &Utf8Path) -> Result<(), TransferError>;

    /// Lists the entry names of a remote directory, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::PathNotFound`] when `remote` is missing.
    fn list(&self, remote: &Utf8Path) -> Result<Vec<String>, TransferError>;

    /// Returns the first or last lines of a remote file.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::PathNotFound`] or
    /// [`TransferError::PermissionDenied`] when the file cannot be read.
    fn peek(&self, remote: &Utf8Path, range: PeekRange) -> Result<String, TransferError>;

    /// Reads a whole remote text file.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::PathNotFound`] when the file is missing.
    fn read(&self, remote: &Utf8Path) -> Result<String, TransferError>;

    /// Atomically replaces a remote text file. The parent directory must
    /// already exist.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::PathNotFound`] when the parent is missing.
    fn write(&self, remote: &Utf8Path, contents: &str) -> Result<(), TransferError>;
}

/// Errors raised by a [`FileTransfer`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum TransferError {
    /// Local or remote path does not exist.
    #[error("path not found: {path}")]
    PathNotFound {
        /// Missing path.
        path: Utf8PathBuf,
    },
    /// Path exists but cannot be accessed.
    #[error("permission denied: {path}")]
    PermissionDenied {
        /// Inaccessible path.
        path: Utf8PathBuf,
    },
    /// Underlying command failed for another reason.
    #[error(transparent)]
    Exec(#[from] ExecError),
    /// A file pattern could not be compiled.
    #[error("invalid file pattern {pattern}: {message}")]
    InvalidPattern {
        /// Offending glob.
        pattern: String,
        /// Parser message.
        message: String,
    },
    /// Local filesystem operation failed.
    #[error("local I/O error on {path}: {message}")]
    LocalIo {
        /// Local path involved.
        path: Utf8PathBuf,
        /// Operating system error string.
        message: String,
    },
}

impl TransferError {
    /// Classifies a failed remote command touching `path` by its stderr.
    ///
    /// Exit status 255 is ssh's own failure (authentication, connection)
    /// and never says anything about `path`.
    #[must_use]
    pub fn from_exec(path: &Utf8Path, err: ExecError) -> Self {
        if matches!(err, ExecError::CommandFailure { status: Some(255), .. }) {
            return Self::Exec(err);
        }
        let stderr = err.stderr();
        if stderr.contains("No such file or directory") {
            Self::PathNotFound {
                path: path.to_path_buf(),
            }
        } else if stderr.contains("Permission denied") {
            Self::PermissionDenied {
                path: path.to_path_buf(),
            }
        } else {
            Self::Exec(err)
        }
    }

    /// Classifies a local I/O error touching `path`.
    #[must_use]
    pub fn from_io(path: &Utf8Path, err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::PathNotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => Self::LocalIo {
                path: path.to_path_buf(),
                message: err.to_string(),
            },
        }
    }

    /// Returns `true` for [`TransferError::PathNotFound`].
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::PathNotFound { .. })
    }
}

/// Returns `true` when an entry name is hidden.
#[must_use]
pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Temporary sibling used for atomic writes.
#[must_use]
pub fn staging_path(path: &Utf8Path) -> Utf8PathBuf {
    let name = path.file_name().unwrap_or("record");
    path.with_file_name(format!(".{name}.tmp"))
}
