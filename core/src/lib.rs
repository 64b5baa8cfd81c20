//! Zero-payload connection probe scenario.
//!
//! Composes the resolver, the disconnect-reporting server and the race
//! coordinator:
//!
//! ```text
//! resolve tool ──► NotFound ──► Skipped
//!      │
//!      ▼
//! bind server ──► spawn `<tool> -z host port` ──► await_all([probe exit, peer disconnect], deadline)
//!                                                      │ stragglers: LivenessTimeout
//!                                                      ▼ none: Passed
//! ```

mod scenario;

pub use netprobe_types::{ScenarioError, ScenarioOutcome, SkipReason};
pub use scenario::{PEER_DISCONNECT, PROBE_EXIT, ZeroPayloadScenario};
