//! BDD scenarios for the job lifecycle.

use rstest_bdd_macros::scenario;

use super::test_helpers::{JobContext, job_context};

#[scenario(
    path = "tests/features/job_lifecycle.feature",
    name = "Setting up without staging assigns no job id"
)]
fn scenario_setting_up_without_staging_assigns_no_job_id(job_context: JobContext) {
    let _ = job_context;
}

#[scenario(
    path = "tests/features/job_lifecycle.feature",
    name = "Staging assigns a job id and records the job"
)]
fn scenario_staging_assigns_a_job_id_and_records_the_job(job_context: JobContext) {
    let _ = job_context;
}

#[scenario(
    path = "tests/features/job_lifecycle.feature",
    name = "A job is submitted only once"
)]
fn scenario_a_job_is_submitted_only_once(job_context: JobContext) {
    let _ = job_context;
}

#[scenario(
    path = "tests/features/job_lifecycle.feature",
    name = "A rejected submission can be retried"
)]
fn scenario_a_rejected_submission_can_be_retried(job_context: JobContext) {
    let _ = job_context;
}

#[scenario(
    path = "tests/features/job_lifecycle.feature",
    name = "Cancelling needs a submission and succeeds once"
)]
fn scenario_cancelling_needs_a_submission_and_succeeds_once(job_context: JobContext) {
    let _ = job_context;
}

#[scenario(
    path = "tests/features/job_lifecycle.feature",
    name = "A failed scancel leaves the job submitted"
)]
fn scenario_a_failed_scancel_leaves_the_job_submitted(job_context: JobContext) {
    let _ = job_context;
}

#[scenario(
    path = "tests/features/job_lifecycle.feature",
    name = "Cleaning up an unknown job is not an error"
)]
fn scenario_cleaning_up_an_unknown_job_is_not_an_error(job_context: JobContext) {
    let _ = job_context;
}

#[scenario(
    path = "tests/features/job_lifecycle.feature",
    name = "Cleaned up jobs go to trash and can be restored"
)]
fn scenario_cleaned_up_jobs_go_to_trash_and_can_be_restored(job_context: JobContext) {
    let _ = job_context;
}

#[scenario(
    path = "tests/features/job_lifecycle.feature",
    name = "Cleanup proceeds when the scheduler has forgotten the job"
)]
fn scenario_cleanup_proceeds_when_the_scheduler_has_forgotten_the_job(job_context: JobContext) {
    let _ = job_context;
}

#[scenario(
    path = "tests/features/job_lifecycle.feature",
    name = "Cleanup does not cancel a job that finished meanwhile"
)]
fn scenario_cleanup_does_not_cancel_a_job_that_finished_meanwhile(job_context: JobContext) {
    let _ = job_context;
}

#[scenario(
    path = "tests/features/job_lifecycle.feature",
    name = "A failed input upload leaves no job behind"
)]
fn scenario_a_failed_input_upload_leaves_no_job_behind(job_context: JobContext) {
    let _ = job_context;
}

#[scenario(
    path = "tests/features/job_lifecycle.feature",
    name = "A failed move to trash keeps the job"
)]
fn scenario_a_failed_move_to_trash_keeps_the_job(job_context: JobContext) {
    let _ = job_context;
}
