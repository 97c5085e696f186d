//! BDD step definitions for the job lifecycle.

use std::rc::Rc;

use rstest_bdd_macros::{given, then, when};
use taccjm::test_support::TransferOp;

use super::test_helpers::{JobContext, JobOutcome, deployed_world};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

#[given("a cluster with the sample application deployed")]
fn deployed_cluster(mut job_context: JobContext) -> JobContext {
    job_context.world = Some(Rc::new(deployed_world()));
    job_context
}

#[given("a staged sample job")]
fn staged_job(job_context: JobContext) -> JobContext {
    let mut staged = stage_sample_job(job_context);
    if let Some(JobOutcome::Failure(err)) = staged.outcome.take() {
        panic!("staging failed: {err}");
    }
    staged
}

#[given("a submitted sample job")]
fn submitted_job(job_context: JobContext) -> JobContext {
    let staged = staged_job(job_context);
    let world = staged.world();
    world
        .faulty
        .manager
        .submit_job(&staged.job_id())
        .unwrap_or_else(|err| panic!("submit: {err}"));
    staged
}

#[given("the scheduler answers the next submission with \"{stdout}\"")]
fn sbatch_answers(job_context: JobContext, stdout: String) -> JobContext {
    job_context
        .world()
        .faulty
        .executor
        .respond_once("sbatch", &format!("{stdout}\n"));
    job_context
}

#[given("scancel fails with \"{stderr}\"")]
fn scancel_fails(job_context: JobContext, stderr: String) -> JobContext {
    job_context
        .world()
        .faulty
        .executor
        .fail_once("scancel", &stderr);
    job_context
}

#[given("the scheduler reports the job \"{state}\"")]
fn scheduler_reports(job_context: JobContext, state: String) -> JobContext {
    let world = job_context.world();
    let job = world
        .faulty
        .manager
        .load_job(&job_context.job_id())
        .unwrap_or_else(|err| panic!("load: {err}"));
    let scheduler_id = job
        .scheduler_id
        .unwrap_or_else(|| panic!("test setup requires a submitted job"));
    world
        .cluster
        .set_job_state(&scheduler_id, &state)
        .unwrap_or_else(|err| panic!("scheduler state: {err}"));
    job_context
}

#[given("uploads to \"{name}\" are denied")]
fn uploads_denied(job_context: JobContext, name: String) -> JobContext {
    job_context
        .world()
        .faulty
        .transfer
        .fail_once(TransferOp::Send, &name);
    job_context
}

#[given("moves into trash fail")]
fn trash_moves_fail(job_context: JobContext) -> JobContext {
    job_context.world().faulty.executor.fail_once(
        "/trash/",
        "mv: cannot move job directory: Device or resource busy",
    );
    job_context
}

#[when("I set up the sample job without staging")]
fn setup_unstaged(mut job_context: JobContext) -> JobContext {
    let world = job_context.world();
    job_context.outcome = Some(JobOutcome::from_job(world.faulty.manager.setup_job_from_dir(
        &world.local,
        "job.json",
        Some("project.toml"),
        false,
    )));
    job_context
}

#[when("I stage the sample job")]
fn stage_sample_job(mut job_context: JobContext) -> JobContext {
    let world = job_context.world();
    let outcome = JobOutcome::from_job(world.faulty.manager.setup_job_from_dir(
        &world.local,
        "job.json",
        Some("project.toml"),
        true,
    ));
    if let JobOutcome::Job(ref job) = outcome {
        job_context.job_id.clone_from(&job.job_id);
    }
    job_context.outcome = Some(outcome);
    job_context
}

#[when("I submit the job")]
fn submit(mut job_context: JobContext) -> JobContext {
    let world = job_context.world();
    job_context.outcome = Some(JobOutcome::from_job(
        world.faulty.manager.submit_job(&job_context.job_id()),
    ));
    job_context
}

#[when("I cancel the job")]
fn cancel(mut job_context: JobContext) -> JobContext {
    let world = job_context.world();
    job_context.outcome = Some(JobOutcome::from_job(
        world.faulty.manager.cancel_job(&job_context.job_id()),
    ));
    job_context
}

#[when("I restore the job")]
fn restore(mut job_context: JobContext) -> JobContext {
    let world = job_context.world();
    job_context.outcome = Some(JobOutcome::from_job(
        world.faulty.manager.restore_job(&job_context.job_id()),
    ));
    job_context
}

#[when("I clean up the job")]
fn cleanup_current(job_context: JobContext) -> JobContext {
    let job_id = job_context.job_id();
    cleanup_named(job_context, job_id)
}

#[when("I clean up job \"{job_id}\"")]
fn cleanup_named(mut job_context: JobContext, job_id: String) -> JobContext {
    let world = job_context.world();
    job_context.outcome = Some(match world.faulty.manager.cleanup_job(&job_id) {
        Ok(outcome) => JobOutcome::Cleanup(outcome),
        Err(err) => JobOutcome::Failure(format!("{err:?}")),
    });
    job_context
}

#[then("the job has no job id")]
fn has_no_job_id(job_context: &JobContext) -> Result<(), StepError> {
    let Some(JobOutcome::Job(job)) = job_context.outcome.as_ref() else {
        return Err(StepError::Assertion(format!(
            "expected a job, got {:?}",
            job_context.outcome
        )));
    };
    let json = serde_json::to_value(job.as_ref())
        .map_err(|err| StepError::Assertion(format!("encode: {err}")))?;
    if job.job_id.is_none() && json.get("job_id").is_none() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!("unstaged job carries an id: {json}")))
    }
}

#[then("the stored job is \"{status}\"")]
fn stored_status(job_context: &JobContext, status: String) -> Result<(), StepError> {
    let job = job_context
        .world()
        .faulty
        .manager
        .load_job(&job_context.job_id())
        .map_err(|err| StepError::Assertion(format!("load: {err}")))?;
    let json = serde_json::to_value(&job)
        .map_err(|err| StepError::Assertion(format!("encode: {err}")))?;
    if json.get("status").and_then(|value| value.as_str()) == Some(status.as_str()) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!("expected status {status}, got {json}")))
    }
}

#[then("the job is listed")]
fn job_listed(job_context: &JobContext) -> Result<(), StepError> {
    let jobs = list_jobs(job_context)?;
    if jobs == [job_context.job_id()] {
        Ok(())
    } else {
        Err(StepError::Assertion(format!("unexpected jobs {jobs:?}")))
    }
}

#[then("no jobs are listed")]
fn no_jobs_listed(job_context: &JobContext) -> Result<(), StepError> {
    let jobs = list_jobs(job_context)?;
    if jobs.is_empty() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!("expected no jobs, got {jobs:?}")))
    }
}

fn list_jobs(job_context: &JobContext) -> Result<Vec<String>, StepError> {
    job_context
        .world()
        .faulty
        .manager
        .list_jobs()
        .map_err(|err| StepError::Assertion(format!("list: {err}")))
}

#[then("the request fails with \"{kind}\"")]
fn request_fails(job_context: &JobContext, kind: String) -> Result<(), StepError> {
    match job_context.outcome.as_ref() {
        Some(JobOutcome::Failure(err)) if err.contains(kind.as_str()) => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected a {kind} failure, got {other:?}"
        ))),
    }
}

#[then("the scheduler received {count:u32} submission")]
fn submissions(job_context: &JobContext, count: u32) -> Result<(), StepError> {
    let seen = scheduler_commands(job_context, "sbatch");
    if u32::try_from(seen).ok() == Some(count) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!("expected {count} submissions, saw {seen}")))
    }
}

#[then("the scheduler state is \"{state}\"")]
fn scheduler_state(job_context: &JobContext, state: String) -> Result<(), StepError> {
    let world = job_context.world();
    let job = world
        .faulty
        .manager
        .load_job(&job_context.job_id())
        .map_err(|err| StepError::Assertion(format!("load: {err}")))?;
    let actual = job
        .scheduler_id
        .and_then(|scheduler_id| world.cluster.job_state(&scheduler_id));
    if actual.as_deref() == Some(state.as_str()) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!("expected {state}, got {actual:?}")))
    }
}

#[then("the cleanup reports \"{expected}\"")]
fn cleanup_reports(job_context: &JobContext, expected: String) -> Result<(), StepError> {
    match job_context.outcome.as_ref() {
        Some(JobOutcome::Cleanup(outcome)) if format!("{outcome:?}") == expected => Ok(()),
        other => Err(StepError::Assertion(format!("expected {expected}, got {other:?}"))),
    }
}

#[then("scancel was never run")]
fn scancel_never_run(job_context: &JobContext) -> Result<(), StepError> {
    let seen = scheduler_commands(job_context, "scancel");
    if seen == 0 {
        Ok(())
    } else {
        Err(StepError::Assertion(format!("scancel ran {seen} times")))
    }
}

fn scheduler_commands(job_context: &JobContext, program: &str) -> usize {
    job_context
        .world()
        .faulty
        .executor
        .commands()
        .iter()
        .filter(|command| command.contains(program))
        .count()
}
