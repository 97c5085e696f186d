//! BDD scenarios for the application registry.

use rstest_bdd_macros::scenario;

use super::test_helpers::{AppContext, app_context};

#[scenario(
    path = "tests/features/app_registry.feature",
    name = "A deployed record round trips through load"
)]
fn scenario_a_deployed_record_round_trips_through_load(app_context: AppContext) {
    let _ = app_context;
}

#[scenario(
    path = "tests/features/app_registry.feature",
    name = "The wrapper runs the entry command"
)]
fn scenario_the_wrapper_runs_the_entry_command(app_context: AppContext) {
    let _ = app_context;
}

#[scenario(
    path = "tests/features/app_registry.feature",
    name = "Hidden assets are not deployed"
)]
fn scenario_hidden_assets_are_not_deployed(app_context: AppContext) {
    let _ = app_context;
}

#[scenario(
    path = "tests/features/app_registry.feature",
    name = "An unknown application has no wrapper"
)]
fn scenario_an_unknown_application_has_no_wrapper(app_context: AppContext) {
    let _ = app_context;
}

#[scenario(
    path = "tests/features/app_registry.feature",
    name = "Redeploying needs overwrite"
)]
fn scenario_redeploying_needs_overwrite(app_context: AppContext) {
    let _ = app_context;
}

#[scenario(
    path = "tests/features/app_registry.feature",
    name = "A failed upload leaves no partial application"
)]
fn scenario_a_failed_upload_leaves_no_partial_application(app_context: AppContext) {
    let _ = app_context;
}

#[scenario(
    path = "tests/features/app_registry.feature",
    name = "A failed redeploy keeps the previous deployment"
)]
fn scenario_a_failed_redeploy_keeps_the_previous_deployment(app_context: AppContext) {
    let _ = app_context;
}

#[scenario(
    path = "tests/features/app_registry.feature",
    name = "An invalid configuration is rejected before upload"
)]
fn scenario_an_invalid_configuration_is_rejected_before_upload(app_context: AppContext) {
    let _ = app_context;
}
