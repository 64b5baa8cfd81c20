//! End-to-end probe with whatever netcat the host provides.
//!
//! Only an OpenBSD-derived netcat advertises `-46`; without one the test
//! returns early instead of failing.

use std::time::Duration;

use netprobe_core::{ScenarioOutcome, ZeroPayloadScenario};
use netprobe_resolver::{Capability, DEFAULT_CANDIDATES, ResolvedTool, Resolver};

#[tokio::test]
async fn netcat_z_probe_is_noticed_within_one_second() {
    let resolver =
        Resolver::for_capability(DEFAULT_CANDIDATES.iter().copied(), Capability::DualStack);
    let ResolvedTool::Found(nc) = resolver.resolve_bounded(Duration::from_secs(5)).await else {
        eprintln!("skipping: requires an IPv6 capable (OpenBSD-derived) nc(1)");
        return;
    };

    let outcome = ZeroPayloadScenario::new(resolver)
        .with_bind_host("127.0.0.1")
        .with_deadline(Duration::from_secs(1))
        .run_with_tool(&nc)
        .await
        .expect("no stragglers");

    assert!(matches!(outcome, ScenarioOutcome::Passed { .. }), "{outcome:?}");
}
