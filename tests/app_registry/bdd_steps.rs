//! BDD step definitions for the application registry.

use std::fs;
use std::rc::Rc;

use rstest_bdd_macros::{given, then, when};
use taccjm::test_support::TransferOp;

use super::test_helpers::{AppContext, AppOutcome, sample_world};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

#[given("a cluster and the sample application sources")]
fn sample_sources(mut app_context: AppContext) -> AppContext {
    app_context.world = Some(Rc::new(sample_world()));
    app_context
}

#[given("the sample application is already deployed")]
fn already_deployed(app_context: AppContext) -> AppContext {
    let deployed = deploy(app_context);
    if let Some(AppOutcome::Failure(ref err)) = deployed.outcome {
        panic!("deploy failed: {err}");
    }
    deployed
}

#[given("writes to \"{name}\" are denied")]
fn writes_denied(app_context: AppContext, name: String) -> AppContext {
    app_context
        .world()
        .faulty
        .transfer
        .fail_once(TransferOp::Write, &name);
    app_context
}

#[given("the application version is \"{version}\"")]
fn broken_version(mut app_context: AppContext, version: String) -> AppContext {
    let world = app_context.world();
    let config = serde_json::json!({
        "name": "test_app",
        "version": version,
        "entryCommand": "sh run.sh",
    });
    fs::write(world.local.join("broken.json"), config.to_string())
        .unwrap_or_else(|err| panic!("write config: {err}"));
    app_context.options.config_file = String::from("broken.json");
    app_context
}

#[when("I deploy the sample application")]
fn deploy(mut app_context: AppContext) -> AppContext {
    let world = app_context.world();
    let outcome = AppOutcome::from_deploy(
        world
            .faulty
            .manager
            .apps()
            .deploy(&world.local, &app_context.options),
    );
    if app_context.first.is_none()
        && let AppOutcome::Deployed(ref record) = outcome
    {
        app_context.first = Some(record.as_ref().clone());
    }
    app_context.outcome = Some(outcome);
    app_context
}

#[when("I redeploy the sample application with overwrite")]
fn redeploy(mut app_context: AppContext) -> AppContext {
    app_context.options.overwrite = true;
    deploy(app_context)
}

#[when("I ask for the wrapper of \"{app_id}\"")]
fn ask_for_wrapper(mut app_context: AppContext, app_id: String) -> AppContext {
    let world = app_context.world();
    app_context.outcome = Some(
        match world.faulty.manager.apps().get_wrapper(&app_id) {
            Ok(_) => AppOutcome::Wrapper,
            Err(err) => AppOutcome::Failure(format!("{err:?}")),
        },
    );
    app_context
}

#[then("the deployed id is \"{app_id}\"")]
fn deployed_id(app_context: &AppContext, app_id: String) -> Result<(), StepError> {
    let record = app_context.deployed();
    if record.id == app_id {
        Ok(())
    } else {
        Err(StepError::Assertion(format!("expected {app_id}, got {}", record.id)))
    }
}

#[then("the stored record matches the deployed one")]
fn stored_matches_deployed(app_context: &AppContext) -> Result<(), StepError> {
    let record = app_context.deployed();
    compare_stored(app_context, record)
}

#[then("the stored record matches the first deployment")]
fn stored_matches_first(app_context: &AppContext) -> Result<(), StepError> {
    let first = app_context
        .first
        .as_ref()
        .ok_or_else(|| StepError::Assertion(String::from("nothing was deployed")))?;
    compare_stored(app_context, first)
}

fn compare_stored(
    app_context: &AppContext,
    expected: &taccjm::AppRecord,
) -> Result<(), StepError> {
    let stored = app_context
        .world()
        .faulty
        .manager
        .apps()
        .load_config(&expected.id)
        .map_err(|err| StepError::Assertion(format!("load: {err}")))?;
    if &stored == expected {
        Ok(())
    } else {
        Err(StepError::Assertion(format!("stored {stored:?} differs from {expected:?}")))
    }
}

#[then("the deployed applications are \"{expected}\"")]
fn deployed_applications(app_context: &AppContext, expected: String) -> Result<(), StepError> {
    let apps = list_apps(app_context)?;
    let wanted: Vec<&str> = expected.split(',').collect();
    if apps == wanted {
        Ok(())
    } else {
        Err(StepError::Assertion(format!("expected {wanted:?}, got {apps:?}")))
    }
}

#[then("no applications are deployed")]
fn no_applications(app_context: &AppContext) -> Result<(), StepError> {
    let apps = list_apps(app_context)?;
    if apps.is_empty() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!("expected no apps, got {apps:?}")))
    }
}

fn list_apps(app_context: &AppContext) -> Result<Vec<String>, StepError> {
    app_context
        .world()
        .faulty
        .manager
        .apps()
        .list()
        .map_err(|err| StepError::Assertion(format!("list: {err}")))
}

#[then("the wrapper contains \"{line}\"")]
fn wrapper_contains(app_context: &AppContext, line: String) -> Result<(), StepError> {
    let wrapper = app_context
        .world()
        .faulty
        .manager
        .apps()
        .get_wrapper(&app_context.deployed().id)
        .map_err(|err| StepError::Assertion(format!("wrapper: {err}")))?;
    if wrapper.contains(line.as_str()) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!("{line:?} missing from:\n{wrapper}")))
    }
}

#[then("the deployed app has \"{present}\" but not \"{absent}\"")]
fn deployed_assets(
    app_context: &AppContext,
    present: String,
    absent: String,
) -> Result<(), StepError> {
    let app_dir = app_context
        .world()
        .cluster
        .remote_root()
        .join("apps")
        .join(&app_context.deployed().id);
    if !app_dir.join(&present).is_file() {
        return Err(StepError::Assertion(format!("{present} was not deployed")));
    }
    if app_dir.join(&absent).exists() {
        return Err(StepError::Assertion(format!("{absent} should not be deployed")));
    }
    Ok(())
}

#[then("the request fails with \"{kind}\"")]
fn request_fails(app_context: &AppContext, kind: String) -> Result<(), StepError> {
    match app_context.outcome.as_ref() {
        Some(AppOutcome::Failure(err)) if err.contains(kind.as_str()) => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected a {kind} failure, got {other:?}"
        ))),
    }
}
