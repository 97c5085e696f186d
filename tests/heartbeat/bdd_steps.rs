//! BDD step definitions for the session heartbeat.

use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use rstest_bdd_macros::{given, then, when};
use tempfile::TempDir;

use taccjm::heartbeat::poll_once;
use taccjm::test_support::{FakeCluster, LocalShell};
use taccjm::{Heartbeat, HeartbeatConfig, SessionRegistry};

use super::test_doubles::{DroppedConnection, DynExecutor, SlowApi, UnavailableApi};
use super::test_helpers::{HeartbeatContext, TestApi};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Runtime::new().unwrap_or_else(|err| panic!("tokio runtime: {err}"))
}

#[given("a healthy session and a dropped session")]
fn healthy_and_dropped(mut heartbeat_context: HeartbeatContext) -> HeartbeatContext {
    let dir = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let base = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
        .unwrap_or_else(|path| panic!("temp dir should be utf8: {}", path.display()));
    let cluster = FakeCluster::install(&base).unwrap_or_else(|err| panic!("fake cluster: {err}"));
    let registry: SessionRegistry<DynExecutor> = SessionRegistry::new();
    registry
        .connect("ls6", "ls6.example.org", "tester", 22, Box::new(LocalShell::default()))
        .unwrap_or_else(|err| panic!("connect ls6: {err}"));
    registry
        .connect("frontera", "frontera.example.org", "tester", 22, Box::new(DroppedConnection))
        .unwrap_or_else(|err| panic!("connect frontera: {err}"));
    heartbeat_context.allocation_command = cluster.scheduler().allocations;
    heartbeat_context.scratch = Some(Arc::new(dir));
    heartbeat_context.api = Some(Arc::new(TestApi::Registry(registry)));
    heartbeat_context
}

#[given("a session provider that cannot list sessions")]
fn unavailable_provider(mut heartbeat_context: HeartbeatContext) -> HeartbeatContext {
    heartbeat_context.api = Some(Arc::new(TestApi::Unavailable(UnavailableApi::default())));
    heartbeat_context
}

#[given("a provider that lists in {list:u64} milliseconds and checks in {check:u64} milliseconds")]
fn slow_provider(mut heartbeat_context: HeartbeatContext, list: u64, check: u64) -> HeartbeatContext {
    heartbeat_context.api = Some(Arc::new(TestApi::Slow(SlowApi {
        list_delay: Duration::from_millis(list),
        check_delay: Duration::from_millis(check),
    })));
    heartbeat_context
}

#[when("one heartbeat tick runs")]
fn one_tick(mut heartbeat_context: HeartbeatContext) -> HeartbeatContext {
    let api = heartbeat_context.api();
    heartbeat_context.report = Some(
        poll_once(api.as_ref(), &heartbeat_context.allocation_command)
            .map_err(|err| err.to_string()),
    );
    heartbeat_context
}

#[when("the heartbeat runs for {total:u64} milliseconds every {interval:u64} milliseconds")]
fn run_heartbeat(mut heartbeat_context: HeartbeatContext, total: u64, interval: u64) -> HeartbeatContext {
    let config = HeartbeatConfig {
        interval: Duration::from_millis(interval),
        allocation_command: heartbeat_context.allocation_command.clone(),
    };
    let heartbeat = Heartbeat::new(heartbeat_context.api(), config)
        .unwrap_or_else(|err| panic!("heartbeat: {err}"));
    let stats = runtime().block_on(async move {
        let handle = heartbeat.spawn();
        tokio::time::sleep(Duration::from_millis(total)).await;
        handle.stop().await
    });
    heartbeat_context.stats =
        Some(stats.unwrap_or_else(|err| panic!("heartbeat stop: {err}")).summary());
    heartbeat_context
}

#[when("a heartbeat is created with a zero interval")]
fn zero_interval(mut heartbeat_context: HeartbeatContext) -> HeartbeatContext {
    let config = HeartbeatConfig {
        interval: Duration::ZERO,
        ..HeartbeatConfig::default()
    };
    heartbeat_context.creation = Some(
        Heartbeat::new(heartbeat_context.api(), config)
            .map(|_| ())
            .map_err(|err| format!("{err:?}")),
    );
    heartbeat_context
}

#[then("the tick reports {count:u32} sessions")]
fn tick_reports(heartbeat_context: &HeartbeatContext, count: u32) -> Result<(), StepError> {
    let seen = heartbeat_context.report().sessions.len();
    if u32::try_from(seen).ok() == Some(count) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!("expected {count} sessions, got {seen}")))
    }
}

#[then("session \"{id}\" lists allocations \"{names}\"")]
fn lists_allocations(
    heartbeat_context: &HeartbeatContext,
    id: String,
    names: String,
) -> Result<(), StepError> {
    let session = heartbeat_context
        .report()
        .sessions
        .iter()
        .find(|session| session.id == id)
        .ok_or_else(|| StepError::Assertion(format!("no report for {id}")))?;
    let allocations = session
        .allocations
        .as_ref()
        .map_err(|err| StepError::Assertion(format!("{id} check failed: {err}")))?;
    let found: Vec<&str> = allocations.iter().map(|a| a.name.as_str()).collect();
    let wanted: Vec<&str> = names.split(',').collect();
    if found == wanted {
        Ok(())
    } else {
        Err(StepError::Assertion(format!("expected {wanted:?}, got {found:?}")))
    }
}

#[then("session \"{id}\" reports a failed allocation check")]
fn failed_check(heartbeat_context: &HeartbeatContext, id: String) -> Result<(), StepError> {
    let session = heartbeat_context
        .report()
        .sessions
        .iter()
        .find(|session| session.id == id)
        .ok_or_else(|| StepError::Assertion(format!("no report for {id}")))?;
    if session.allocations.is_err() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!("{id} check unexpectedly passed")))
    }
}

fn summary(heartbeat_context: &HeartbeatContext) -> Result<u64, StepError> {
    heartbeat_context
        .stats
        .map(|stats| stats.num_calls)
        .ok_or_else(|| StepError::Assertion(String::from("the heartbeat never ran")))
}

#[then("at least {count:u64} ticks were recorded")]
fn ticks_recorded(heartbeat_context: &HeartbeatContext, count: u64) -> Result<(), StepError> {
    let calls = summary(heartbeat_context)?;
    if calls >= count {
        Ok(())
    } else {
        Err(StepError::Assertion(format!("expected {count} ticks, got {calls}")))
    }
}

#[then("no ticks were recorded")]
fn no_ticks(heartbeat_context: &HeartbeatContext) -> Result<(), StepError> {
    let calls = summary(heartbeat_context)?;
    if calls == 0 {
        Ok(())
    } else {
        Err(StepError::Assertion(format!("expected no ticks, got {calls}")))
    }
}

#[then("sessions were listed at least {count:u32} times")]
fn listed_times(heartbeat_context: &HeartbeatContext, count: u32) -> Result<(), StepError> {
    let provider = heartbeat_context.api();
    let TestApi::Unavailable(api) = provider.as_ref() else {
        return Err(StepError::Assertion(String::from("provider does not count calls")));
    };
    let calls = api.calls();
    if u32::try_from(calls).is_ok_and(|calls| calls >= count) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!("expected {count} listings, got {calls}")))
    }
}

#[then("the api time is at least {millis:u64} milliseconds")]
fn api_time_at_least(heartbeat_context: &HeartbeatContext, millis: u64) -> Result<(), StepError> {
    let api_time = heartbeat_context.report().api_time;
    if api_time >= Duration::from_millis(millis) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!("api time was {api_time:?}")))
    }
}

#[then("the tick took at least {millis:u64} milliseconds longer than the api time")]
fn tick_longer(heartbeat_context: &HeartbeatContext, millis: u64) -> Result<(), StepError> {
    let report = heartbeat_context.report();
    let extra = report.elapsed.saturating_sub(report.api_time);
    if extra >= Duration::from_millis(millis) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "tick took {:?} with api time {:?}",
            report.elapsed, report.api_time
        )))
    }
}

#[then("creation fails with a zero interval error")]
fn zero_interval_rejected(heartbeat_context: &HeartbeatContext) -> Result<(), StepError> {
    match heartbeat_context.creation.as_ref() {
        Some(Err(err)) if err.contains("ZeroInterval") => Ok(()),
        other => Err(StepError::Assertion(format!("expected ZeroInterval, got {other:?}"))),
    }
}
