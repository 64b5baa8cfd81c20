//! Core domain types for netprobe.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! The resolver, race coordinator, server and scenario crates all speak in these terms.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

// ============================================================================
// Capabilities
// ============================================================================

/// A feature an external tool must advertise in its help output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// IPv4/IPv6 dual-stack support, advertised by a `-46` token.
    ///
    /// Only the OpenBSD-derived netcat prints this; GNU and traditional
    /// netcat builds do not.
    DualStack,
}

impl Capability {
    /// Byte sequence whose presence in the diagnostic output signals the capability.
    #[must_use]
    pub const fn marker(self) -> &'static [u8] {
        match self {
            Self::DualStack => b"-46",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::DualStack => "dual-stack",
        }
    }

    /// Whether `output` (stdout followed by stderr) advertises this capability.
    #[must_use]
    pub fn detect(self, output: &[u8]) -> bool {
        contains_marker(output, self.marker())
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Byte-substring search. An empty marker matches everything.
#[must_use]
pub fn contains_marker(haystack: &[u8], marker: &[u8]) -> bool {
    if marker.is_empty() {
        return true;
    }
    haystack.windows(marker.len()).any(|window| window == marker)
}

// ============================================================================
// Resolution
// ============================================================================

/// Outcome of capability resolution.
///
/// `NotFound` is a normal outcome, not an error: the environment simply
/// lacks a qualifying tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedTool {
    Found(PathBuf),
    NotFound,
}

impl ResolvedTool {
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Found(path) => Some(path),
            Self::NotFound => None,
        }
    }

    #[must_use]
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    #[must_use]
    pub fn into_path(self) -> Option<PathBuf> {
        match self {
            Self::Found(path) => Some(path),
            Self::NotFound => None,
        }
    }
}

// ============================================================================
// Scenario outcomes
// ============================================================================

/// Why a scenario did not run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// No candidate exists or none advertises the required capability.
    ResolutionUnavailable { candidates: Vec<String> },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResolutionUnavailable { candidates } => write!(
                f,
                "no qualifying tool among [{}]",
                candidates.join(", ")
            ),
        }
    }
}

/// Successful or skipped scenario run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioOutcome {
    Passed {
        tool: PathBuf,
        elapsed: Duration,
        /// Bytes the server received from the probing peer before it closed.
        bytes_received: u64,
    },
    Skipped(SkipReason),
}

impl ScenarioOutcome {
    #[must_use]
    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed { .. })
    }

    #[must_use]
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }
}

/// Scenario failures. Resolution problems are not here: they skip.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// Operations were still pending when the deadline expired.
    #[error("liveness timeout after {elapsed:?}: still pending [{}]", .pending.join(", "))]
    LivenessTimeout {
        pending: Vec<String>,
        elapsed: Duration,
    },
    /// The resolved tool passed resolution but could not be spawned.
    #[error("failed to launch {}: {source}", .program.display())]
    ProcessLaunch {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

impl ScenarioError {
    /// Labels of operations that missed the deadline, if this is a timeout.
    #[must_use]
    pub fn pending(&self) -> &[String] {
        match self {
            Self::LivenessTimeout { pending, .. } => pending,
            Self::ProcessLaunch { .. } | Self::Bind { .. } => &[],
        }
    }
}
