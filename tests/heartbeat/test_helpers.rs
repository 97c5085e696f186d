//! Shared fixtures for heartbeat scenarios.

use std::fmt;
use std::sync::Arc;

use rstest::fixture;
use tempfile::TempDir;

use taccjm::heartbeat::{StatsSummary, TickReport};
use taccjm::{ExecOutput, SessionApi, SessionError, SessionInfo, SessionRegistry};

use super::test_doubles::{DynExecutor, SlowApi, UnavailableApi};

/// The session provider a scenario runs the heartbeat against.
pub enum TestApi {
    Registry(SessionRegistry<DynExecutor>),
    Unavailable(UnavailableApi),
    Slow(SlowApi),
}

impl fmt::Debug for TestApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registry(_) => f.write_str("Registry"),
            Self::Unavailable(api) => f.debug_tuple("Unavailable").field(api).finish(),
            Self::Slow(api) => f.debug_tuple("Slow").field(api).finish(),
        }
    }
}

impl SessionApi for TestApi {
    fn list_sessions(&self) -> Result<Vec<SessionInfo>, SessionError> {
        match self {
            Self::Registry(api) => api.list_sessions(),
            Self::Unavailable(api) => api.list_sessions(),
            Self::Slow(api) => api.list_sessions(),
        }
    }

    fn execute(&self, id: &str, command: &str) -> Result<ExecOutput, SessionError> {
        match self {
            Self::Registry(api) => api.execute(id, command),
            Self::Unavailable(api) => api.execute(id, command),
            Self::Slow(api) => api.execute(id, command),
        }
    }
}

#[derive(Clone, Debug)]
pub struct HeartbeatContext {
    #[allow(dead_code, reason = "keeps the fake cluster scripts on disk")]
    pub scratch: Option<Arc<TempDir>>,
    pub api: Option<Arc<TestApi>>,
    pub allocation_command: String,
    pub report: Option<Result<TickReport, String>>,
    pub stats: Option<StatsSummary>,
    pub creation: Option<Result<(), String>>,
}

impl HeartbeatContext {
    pub fn api(&self) -> Arc<TestApi> {
        self.api
            .clone()
            .unwrap_or_else(|| panic!("test setup requires a session provider"))
    }

    pub fn report(&self) -> &TickReport {
        match self.report.as_ref() {
            Some(Ok(report)) => report,
            other => panic!("expected a tick report, got {other:?}"),
        }
    }
}

#[fixture]
pub fn heartbeat_context() -> HeartbeatContext {
    HeartbeatContext {
        scratch: None,
        api: None,
        allocation_command: String::from("taccinfo"),
        report: None,
        stats: None,
        creation: None,
    }
}
