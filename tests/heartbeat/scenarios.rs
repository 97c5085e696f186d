//! BDD scenarios for the session heartbeat.

use rstest_bdd_macros::scenario;

use super::test_helpers::{HeartbeatContext, heartbeat_context};

#[scenario(
    path = "tests/features/heartbeat.feature",
    name = "One tick reports every session"
)]
fn scenario_one_tick_reports_every_session(heartbeat_context: HeartbeatContext) {
    let _ = heartbeat_context;
}

#[scenario(
    path = "tests/features/heartbeat.feature",
    name = "The heartbeat keeps ticking through session failures"
)]
fn scenario_the_heartbeat_keeps_ticking_through_session_failures(heartbeat_context: HeartbeatContext) {
    let _ = heartbeat_context;
}

#[scenario(
    path = "tests/features/heartbeat.feature",
    name = "Listing failures are not counted"
)]
fn scenario_listing_failures_are_not_counted(heartbeat_context: HeartbeatContext) {
    let _ = heartbeat_context;
}

#[scenario(
    path = "tests/features/heartbeat.feature",
    name = "API time covers only the session listing"
)]
fn scenario_api_time_covers_only_the_session_listing(heartbeat_context: HeartbeatContext) {
    let _ = heartbeat_context;
}

#[scenario(
    path = "tests/features/heartbeat.feature",
    name = "A zero interval is rejected"
)]
fn scenario_a_zero_interval_is_rejected(heartbeat_context: HeartbeatContext) {
    let _ = heartbeat_context;
}
