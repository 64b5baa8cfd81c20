//! Scenario runs against fake probe tools.

use std::time::{Duration, Instant};

use netprobe_core::{
    PEER_DISCONNECT, PROBE_EXIT, ScenarioError, ScenarioOutcome, ZeroPayloadScenario,
};

use crate::common::{connecting_tool, has_bash, hanging_tool, resolver_in, silent_tool};

#[tokio::test]
async fn connecting_tool_passes_with_zero_payload() {
    if !has_bash() {
        return;
    }
    let dir = tempfile::tempdir().expect("tempdir");
    let nc = connecting_tool(dir.path(), "nc");

    let outcome = ZeroPayloadScenario::new(resolver_in(dir.path(), &["nc"]))
        .with_deadline(Duration::from_secs(5))
        .run()
        .await
        .expect("scenario passes");

    match outcome {
        ScenarioOutcome::Passed {
            tool,
            bytes_received,
            ..
        } => {
            assert_eq!(tool, nc);
            assert_eq!(bytes_received, 0);
        }
        ScenarioOutcome::Skipped(reason) => panic!("unexpected skip: {reason}"),
    }
}

#[tokio::test]
async fn hanging_tool_reports_both_operations_pending() {
    if !has_bash() {
        return;
    }
    let dir = tempfile::tempdir().expect("tempdir");
    let nc = hanging_tool(dir.path(), "nc");

    let started = Instant::now();
    let err = ZeroPayloadScenario::new(resolver_in(dir.path(), &["nc"]))
        .with_deadline(Duration::from_millis(300))
        .run_with_tool(&nc)
        .await
        .expect_err("liveness timeout");

    match err {
        ScenarioError::LivenessTimeout { pending, elapsed } => {
            assert_eq!(pending, [PROBE_EXIT, PEER_DISCONNECT]);
            assert!(elapsed >= Duration::from_millis(250), "{elapsed:?}");
        }
        other => panic!("expected LivenessTimeout, got {other:?}"),
    }
    // The hung tool is killed rather than waited out.
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn tool_that_never_connects_leaves_the_disconnect_pending() {
    if !has_bash() {
        return;
    }
    let dir = tempfile::tempdir().expect("tempdir");
    let nc = silent_tool(dir.path(), "nc");

    let err = ZeroPayloadScenario::new(resolver_in(dir.path(), &["nc"]))
        .with_deadline(Duration::from_millis(500))
        .run_with_tool(&nc)
        .await
        .expect_err("liveness timeout");

    assert_eq!(err.pending(), [PEER_DISCONNECT]);
}

#[tokio::test]
async fn unqualified_tool_skips() {
    let dir = tempfile::tempdir().expect("tempdir");
    let outcome = ZeroPayloadScenario::new(resolver_in(dir.path(), &["nc", "netcat"]))
        .run()
        .await
        .expect("skip is not an error");
    assert!(outcome.is_skipped());
}
