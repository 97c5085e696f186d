//! Keeps remote sessions alive and logs their allocation balances.
//!
//! Connects every `--session`, then polls them on a fixed interval until
//! Ctrl-C. Logs go to a JSON file, `~/.taccjm/heartbeat_<ids>.log.json` by
//! default. The final latency statistics print as JSON on stdout.

use std::io::{self, Write};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use clap::Parser;
use thiserror::Error;
use tracing::info;

use taccjm::exec::expand_tilde;
use taccjm::heartbeat::DEFAULT_INTERVAL;
use taccjm::logging::{self, LogFormat, LogOptions, LoggingError};
use taccjm::{
    ClusterConfig, ConfigError, Heartbeat, HeartbeatConfig, HeartbeatError, ProcessCommandRunner,
    SessionError, SessionRegistry, SessionSpec, SshClient,
};

type Registry = SessionRegistry<SshClient<ProcessCommandRunner>>;

#[derive(Debug, Parser)]
#[command(
    name = "taccjm-heartbeat",
    version,
    about = "Keep SSH sessions alive and log allocation balances"
)]
struct Cli {
    /// Session to monitor, as `id=user@host[:port]`. Repeatable.
    #[arg(long = "session", value_name = "ID=USER@HOST[:PORT]", required = true)]
    sessions: Vec<SessionSpec>,
    /// Seconds between polls.
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_INTERVAL.as_secs())]
    interval_secs: u64,
    /// JSON log file.
    #[arg(long, value_name = "PATH")]
    log_file: Option<Utf8PathBuf>,
    /// Log filter used when `TACCJM_LOG` is unset.
    #[arg(long, value_name = "FILTER", default_value = "info")]
    log_level: String,
}

#[derive(Debug, Error)]
enum HeartbeatCliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Logging(#[from] LoggingError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Heartbeat(#[from] HeartbeatError),
    #[error("failed to wait for Ctrl-C: {0}")]
    Signal(io::Error),
    #[error("failed to write statistics: {0}")]
    Output(#[from] serde_json::Error),
}

fn default_log_file(sessions: &[SessionSpec]) -> Utf8PathBuf {
    let ids: Vec<&str> = sessions.iter().map(|spec| spec.id.as_str()).collect();
    Utf8PathBuf::from(expand_tilde(&format!(
        "~/.taccjm/heartbeat_{}.log.json",
        ids.join("_")
    )))
}

fn connect_all(config: &ClusterConfig, sessions: &[SessionSpec]) -> Result<Registry, HeartbeatCliError> {
    let registry = Registry::new();
    for spec in sessions {
        let client = SshClient::new(config.clone(), spec.target.clone(), ProcessCommandRunner)?;
        registry.connect(
            &spec.id,
            &spec.target.host,
            &spec.target.user,
            spec.target.port,
            client,
        )?;
    }
    Ok(registry)
}

async fn run(cli: Cli) -> Result<(), HeartbeatCliError> {
    let log_file = cli
        .log_file
        .clone()
        .unwrap_or_else(|| default_log_file(&cli.sessions));
    let _log_guard = logging::init(&LogOptions {
        level: cli.log_level.clone(),
        format: LogFormat::Json,
        console: false,
        file: Some(log_file),
    })?;

    let config = ClusterConfig::load_without_cli_args()?;
    let registry = connect_all(&config, &cli.sessions)?;
    let heartbeat = Heartbeat::new(
        Arc::new(registry),
        HeartbeatConfig {
            interval: Duration::from_secs(cli.interval_secs),
            allocation_command: config.allocation_command.clone(),
        },
    )?;

    let handle = heartbeat.spawn();
    let signal = tokio::signal::ctrl_c().await;
    let stats = handle.stop().await?;
    signal.map_err(HeartbeatCliError::Signal)?;

    let summary = stats.summary();
    info!(num_calls = summary.num_calls, "heartbeat finished");
    writeln!(io::stdout(), "{}", serde_json::to_string(&summary)?).ok();
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let exit_code = match run(cli).await {
        Ok(()) => 0,
        Err(err) => {
            writeln!(io::stderr(), "{err}").ok();
            1
        }
    };

    process::exit(exit_code);
}
