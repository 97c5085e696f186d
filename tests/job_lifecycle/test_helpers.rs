//! Shared fixtures and helpers for job lifecycle scenarios.

use std::rc::Rc;

use camino::Utf8PathBuf;
use rstest::fixture;
use tempfile::TempDir;

use taccjm::apps::DeployOptions;
use taccjm::test_support::{FakeCluster, FaultyManager, write_sample_app};
use taccjm::{CleanupOutcome, JobConfig, JobError};

/// Result of the last action a scenario took.
#[derive(Clone, Debug)]
pub enum JobOutcome {
    Job(Box<JobConfig>),
    Cleanup(CleanupOutcome),
    Failure(String),
}

impl JobOutcome {
    pub fn from_job(result: Result<JobConfig, JobError>) -> Self {
        result.map_or_else(|err| Self::Failure(format!("{err:?}")), |job| Self::Job(Box::new(job)))
    }
}

/// A fake cluster with the sample application sources written locally.
#[derive(Debug)]
pub struct World {
    _dir: TempDir,
    pub cluster: FakeCluster,
    pub local: Utf8PathBuf,
    pub faulty: FaultyManager,
}

#[derive(Clone, Debug)]
pub struct JobContext {
    pub world: Option<Rc<World>>,
    pub job_id: Option<String>,
    pub outcome: Option<JobOutcome>,
}

impl JobContext {
    pub fn world(&self) -> Rc<World> {
        self.world
            .clone()
            .unwrap_or_else(|| panic!("test setup requires a cluster"))
    }

    pub fn job_id(&self) -> String {
        self.job_id
            .clone()
            .unwrap_or_else(|| panic!("test setup requires a staged job"))
    }
}

#[fixture]
pub fn job_context() -> JobContext {
    JobContext {
        world: None,
        job_id: None,
        outcome: None,
    }
}

pub fn deployed_world() -> World {
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
    faulty
        .manager
        .apps()
        .deploy(&local, &DeployOptions::default())
        .unwrap_or_else(|err| panic!("deploy: {err}"));
    World {
        _dir: dir,
        cluster,
        local,
        faulty,
    }
}
