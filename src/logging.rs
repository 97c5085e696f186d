//! Tracing subscriber setup shared by the binaries.
//!
//! Console output goes to stderr so stdout stays free for command results.
//! An optional log file receives JSON records through a non-blocking writer.

use std::io;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable overriding the log filter.
pub const LOG_ENV: &str = "TACCJM_LOG";

/// Console log format.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Single-line human readable events.
    #[default]
    Compact,
}

impl FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            other => Err(LoggingError::UnknownFormat(other.to_owned())),
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LogOptions {
    /// Filter used when `TACCJM_LOG` is unset, for example `info`.
    pub level: String,
    /// Console format.
    pub format: LogFormat,
    /// Whether to log to stderr at all.
    pub console: bool,
    /// JSON log file, created with its parent directories.
    pub file: Option<Utf8PathBuf>,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            level: String::from("warn"),
            format: LogFormat::Compact,
            console: true,
            file: None,
        }
    }
}

/// Errors raised while installing the subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The filter directive does not parse.
    #[error("invalid log filter {directive}: {message}")]
    InvalidFilter {
        /// Offending directive.
        directive: String,
        /// Parser message.
        message: String,
    },
    /// The format name is not recognised.
    #[error("unknown log format {0}; expected json or compact")]
    UnknownFormat(String),
    /// The log file could not be opened.
    #[error("cannot open log file {path}: {message}")]
    File {
        /// Log file path.
        path: Utf8PathBuf,
        /// Operating system error string.
        message: String,
    },
    /// A global subscriber is already installed.
    #[error("logging already initialised: {0}")]
    AlreadyInitialised(String),
}

/// Keeps the file writer flushing until dropped.
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

fn build_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    let directive = std::env::var(LOG_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| level.to_owned());
    EnvFilter::try_new(&directive).map_err(|err| LoggingError::InvalidFilter {
        directive,
        message: err.to_string(),
    })
}

fn open_log_file(path: &Utf8Path) -> Result<RollingFileAppender, LoggingError> {
    let file_err = |message: String| LoggingError::File {
        path: path.to_path_buf(),
        message,
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| file_err(String::from("path has no file name")))?;
    let dir = path
        .parent()
        .filter(|p| !p.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    Dir::create_ambient_dir_all(dir, ambient_authority()).map_err(|err| file_err(err.to_string()))?;
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(dir)
        .map_err(|err| file_err(err.to_string()))
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Returns [`LoggingError`] for an invalid filter, an unopenable log file,
/// or when a subscriber is already installed.
pub fn init(options: &LogOptions) -> Result<LogGuard, LoggingError> {
    let filter = build_filter(&options.level)?;

    let console = options.console.then_some(options.format);
    let json_console = (console == Some(LogFormat::Json))
        .then(|| fmt::layer().json().with_writer(io::stderr));
    let compact_console = (console == Some(LogFormat::Compact))
        .then(|| fmt::layer().compact().with_writer(io::stderr));

    let (file_layer, guard) = match options.file.as_deref() {
        Some(path) => {
            let (writer, guard) = tracing_appender::non_blocking(open_log_file(path)?);
            let layer = fmt::layer().json().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    Registry::default()
        .with(filter)
        .with(json_console)
        .with(compact_console)
        .with(file_layer)
        .try_init()
        .map_err(|err| LoggingError::AlreadyInitialised(err.to_string()))?;

    Ok(LogGuard { _file: guard })
}
