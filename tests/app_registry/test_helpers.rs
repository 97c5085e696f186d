//! Shared fixtures and helpers for application registry scenarios.

use std::rc::Rc;

use camino::Utf8PathBuf;
use rstest::fixture;
use tempfile::TempDir;

use taccjm::test_support::{FakeCluster, FaultyManager, write_sample_app};
use taccjm::{AppError, AppRecord, DeployOptions};

/// Result of the last registry call a scenario made.
#[derive(Clone, Debug)]
pub enum AppOutcome {
    Deployed(Box<AppRecord>),
    Wrapper,
    Failure(String),
}

impl AppOutcome {
    pub fn from_deploy(result: Result<AppRecord, AppError>) -> Self {
        result.map_or_else(
            |err| Self::Failure(format!("{err:?}")),
            |record| Self::Deployed(Box::new(record)),
        )
    }
}

/// A fake cluster plus the sample application sources on local disk.
#[derive(Debug)]
pub struct World {
    _dir: TempDir,
    pub cluster: FakeCluster,
    pub local: Utf8PathBuf,
    pub faulty: FaultyManager,
}

#[derive(Clone, Debug)]
pub struct AppContext {
    pub world: Option<Rc<World>>,
    pub options: DeployOptions,
    pub first: Option<AppRecord>,
    pub outcome: Option<AppOutcome>,
}

impl AppContext {
    pub fn world(&self) -> Rc<World> {
        self.world
            .clone()
            .unwrap_or_else(|| panic!("test setup requires a cluster"))
    }

    pub fn deployed(&self) -> &AppRecord {
        match self.outcome.as_ref() {
            Some(AppOutcome::Deployed(record)) => record,
            other => panic!("expected a deployed app, got {other:?}"),
        }
    }
}

#[fixture]
pub fn app_context() -> AppContext {
    AppContext {
        world: None,
        options: DeployOptions::default(),
        first: None,
        outcome: None,
    }
}

pub fn sample_world() -> World {
    let dir = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let base = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
        .unwrap_or_else(|path| panic!("temp dir should be utf8: {}", path.display()));
    let cluster = FakeCluster::install(&base.join("cluster"))
        .unwrap_or_else(|err| panic!("fake cluster: {err}"));
    let local = base.join("app");
    write_sample_app(&local).unwrap_or_else(|err| panic!("sample app: {err}"));
    let faulty = cluster
        .faulty_manager()
        .unwrap_or_else(|err| panic!("connect: {err}"));
    World {
        _dir: dir,
        cluster,
        local,
        faulty,
    }
}
