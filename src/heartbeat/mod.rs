//! Periodic session and allocation monitor.
//!
//! Every tick lists the open sessions and runs the allocation command in
//! each. Failures are logged and the loop carries on; only
//! [`HeartbeatHandle::stop`] ends it.

mod stats;

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

pub use stats::{HeartbeatStats, StatsSummary};

use crate::config::DEFAULT_ALLOCATION_COMMAND;
use crate::scheduler::{Allocation, parse_allocations};
use crate::session::{SessionApi, SessionError};

/// Default tick interval.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

/// Tick settings.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HeartbeatConfig {
    /// Delay between the starts of consecutive ticks.
    pub interval: Duration,
    /// Command printing the allocation table.
    pub allocation_command: String,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            allocation_command: DEFAULT_ALLOCATION_COMMAND.to_owned(),
        }
    }
}

/// Errors raised by the heartbeat.
#[derive(Debug, Error)]
pub enum HeartbeatError {
    /// The interval must be positive.
    #[error("heartbeat interval must be greater than zero")]
    ZeroInterval,
    /// The background task panicked or was aborted.
    #[error("heartbeat task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Allocation check result for one session.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionReport {
    /// Session id.
    pub id: String,
    /// Parsed allocations, or the failure message.
    pub allocations: Result<Vec<Allocation>, String>,
}

/// Outcome of one tick.
#[derive(Clone, Debug, PartialEq)]
pub struct TickReport {
    /// Latency of the `list_sessions` call.
    pub api_time: Duration,
    /// Wall time spent on the whole tick.
    pub elapsed: Duration,
    /// Per-session results.
    pub sessions: Vec<SessionReport>,
}

/// Runs one tick synchronously.
///
/// # Errors
///
/// Returns the [`SessionError`] from `list_sessions`. Per-session failures
/// are recorded in the report instead.
pub fn poll_once<S: SessionApi + ?Sized>(
    api: &S,
    allocation_command: &str,
) -> Result<TickReport, SessionError> {
    let started = Instant::now();
    let sessions = api.list_sessions()?;
    let api_time = started.elapsed();
    let connections: Vec<&str> = sessions.iter().map(|s| s.id.as_str()).collect();
    info!(api_time = api_time.as_secs_f64(), ?connections, "listed sessions");

    let mut reports = Vec::with_capacity(sessions.len());
    for session in &sessions {
        info!(session = %session.id, host = %session.host, "checking connection");
        let allocations = match api.execute(&session.id, allocation_command) {
            Ok(output) => {
                let allocations = parse_allocations(&output.stdout);
                for allocation in &allocations {
                    info!(
                        session = %session.id,
                        allocation = %allocation.name,
                        service_units = allocation.service_units,
                        expiration = %allocation.expiration,
                        "found allocation"
                    );
                }
                Ok(allocations)
            }
            Err(err) => {
                warn!(session = %session.id, error = %err, "allocation check failed");
                Err(err.to_string())
            }
        };
        reports.push(SessionReport {
            id: session.id.clone(),
            allocations,
        });
    }

    Ok(TickReport {
        api_time,
        elapsed: started.elapsed(),
        sessions: reports,
    })
}

/// Heartbeat monitor owning its statistics.
pub struct Heartbeat<S> {
    api: Arc<S>,
    config: HeartbeatConfig,
    stats: HeartbeatStats,
}

impl<S: SessionApi + Send + Sync + 'static> Heartbeat<S> {
    /// Creates a monitor over `api`.
    ///
    /// # Errors
    ///
    /// Returns [`HeartbeatError::ZeroInterval`] for a zero interval.
    pub fn new(api: Arc<S>, config: HeartbeatConfig) -> Result<Self, HeartbeatError> {
        if config.interval.is_zero() {
            return Err(HeartbeatError::ZeroInterval);
        }
        Ok(Self {
            api,
            config,
            stats: HeartbeatStats::default(),
        })
    }

    /// Starts ticking on the current tokio runtime. The first tick runs
    /// immediately.
    #[must_use]
    pub fn spawn(self) -> HeartbeatHandle {
        let (stop, stopped) = watch::channel(false);
        let task = tokio::spawn(self.run(stopped));
        HeartbeatHandle { stop, task }
    }

    async fn run(mut self, mut stopped: watch::Receiver<bool>) -> HeartbeatStats {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = self.config.interval.as_secs_f64(), "heartbeat started");
        loop {
            tokio::select! {
                biased;
                changed = stopped.changed() => {
                    if changed.is_err() || *stopped.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => self.beat().await,
            }
        }
        let summary = self.stats.summary();
        info!(
            num_calls = summary.num_calls,
            avg_time = summary.avg_time,
            std_dev = summary.std_dev,
            "heartbeat stopped"
        );
        self.stats
    }

    async fn beat(&mut self) {
        let api = Arc::clone(&self.api);
        let command = self.config.allocation_command.clone();
        let outcome = tokio::task::spawn_blocking(move || poll_once(api.as_ref(), &command)).await;
        match outcome {
            Ok(Ok(report)) => {
                self.stats.record(report.api_time);
                let summary = self.stats.summary();
                info!(
                    api_time = report.api_time.as_secs_f64(),
                    tick_time = report.elapsed.as_secs_f64(),
                    connections = report.sessions.len(),
                    num_calls = summary.num_calls,
                    avg_time = summary.avg_time,
                    std_dev = summary.std_dev,
                    "heartbeat tick"
                );
            }
            Ok(Err(err)) => error!(error = %err, "listing sessions failed"),
            Err(err) => error!(error = %err, "heartbeat tick panicked"),
        }
    }
}

/// Handle to a running heartbeat.
pub struct HeartbeatHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<HeartbeatStats>,
}

impl HeartbeatHandle {
    /// Signals the loop to stop after any in-flight tick and returns the
    /// final statistics.
    ///
    /// # Errors
    ///
    /// Returns [`HeartbeatError::Join`] when the task panicked.
    pub async fn stop(self) -> Result<HeartbeatStats, HeartbeatError> {
        self.stop.send_replace(true);
        Ok(self.task.await?)
    }
}
