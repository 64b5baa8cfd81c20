//! Capability-probing resolver.
//!
//! Given an ordered list of candidate executables, finds the first one that
//! exists and whose help output advertises a required feature. Absence is a
//! normal outcome ([`ResolvedTool::NotFound`]), never an error.
//!
//! ```text
//! candidates ─► locate on search path ─► run `<candidate> -h` ─► marker in stdout+stderr?
//!                   │ absent: skip              │ no: next candidate   │ yes: Found(path)
//! ```

mod bounded;
mod runner;

use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub use netprobe_types::{Capability, ResolvedTool};
pub use runner::{DiagnosticRunner, SystemRunner};

/// Netcat names and install locations tried by default, most preferred first.
pub const DEFAULT_CANDIDATES: &[&str] = &[
    "nc",
    "netcat",
    "/usr/bin/nc",
    "/usr/local/bin/nc",
    "/bin/nc.openbsd",
];

/// Argument that makes netcat print its usage text.
pub const DEFAULT_PROBE_ARG: &str = "-h";

/// Where candidate names are looked up.
#[derive(Debug, Clone, Default)]
enum SearchPath {
    /// The process `PATH`.
    #[default]
    Env,
    /// An explicit, already-joined list of directories.
    Dirs(OsString),
}

/// Resolves the first candidate executable whose diagnostic output contains a marker.
#[derive(Debug, Clone)]
pub struct Resolver<R = SystemRunner> {
    candidates: Vec<String>,
    probe_arg: String,
    marker: Vec<u8>,
    search_path: SearchPath,
    runner: R,
}

impl Resolver<SystemRunner> {
    pub fn new<I, S>(
        candidates: I,
        probe_arg: impl Into<String>,
        marker: impl Into<Vec<u8>>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            candidates: candidates.into_iter().map(Into::into).collect(),
            probe_arg: probe_arg.into(),
            marker: marker.into(),
            search_path: SearchPath::Env,
            runner: SystemRunner,
        }
    }

    /// Resolver for `capability` using the default help argument.
    pub fn for_capability<I, S>(candidates: I, capability: Capability) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(candidates, DEFAULT_PROBE_ARG, capability.marker())
    }
}

impl<R> Resolver<R> {
    /// Replace the process runner.
    pub fn with_runner<R2>(self, runner: R2) -> Resolver<R2> {
        Resolver {
            candidates: self.candidates,
            probe_arg: self.probe_arg,
            marker: self.marker,
            search_path: self.search_path,
            runner,
        }
    }

    /// Look candidates up in `dirs` instead of `PATH`.
    ///
    /// An empty list, or one that cannot be joined into a search path
    /// (a directory containing the separator), falls back to `PATH`.
    pub fn with_search_path<I>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let dirs: Vec<PathBuf> = dirs.into_iter().collect();
        self.search_path = if dirs.is_empty() {
            SearchPath::Env
        } else {
            match std::env::join_paths(&dirs) {
                Ok(joined) => SearchPath::Dirs(joined),
                Err(e) => {
                    tracing::warn!("Ignoring unusable search path {dirs:?}: {e}");
                    SearchPath::Env
                }
            }
        };
        self
    }

    #[must_use]
    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    #[must_use]
    pub fn probe_arg(&self) -> &str {
        &self.probe_arg
    }

    #[must_use]
    pub fn marker(&self) -> &[u8] {
        &self.marker
    }

    /// Find `candidate` on the configured search path.
    ///
    /// Absolute (or otherwise path-like) candidates are checked directly.
    #[must_use]
    pub fn locate(&self, candidate: &str) -> Option<PathBuf> {
        let found = match &self.search_path {
            SearchPath::Env => which::which(candidate),
            SearchPath::Dirs(dirs) => {
                let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
                which::which_in(candidate, Some(dirs), cwd)
            }
        };
        match found {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::debug!("Candidate '{candidate}' not found: {e}");
                None
            }
        }
    }

    /// Candidates that exist, in list order, paired with their resolved paths.
    fn present_candidates(&self) -> impl Iterator<Item = (&str, PathBuf)> {
        self.candidates
            .iter()
            .filter_map(|name| self.locate(name).map(|path| (name.as_str(), path)))
    }

    fn output_matches(&self, candidate: &str, output: Option<&[u8]>) -> bool {
        let Some(output) = output else {
            return false;
        };
        let matched = netprobe_types::contains_marker(output, &self.marker);
        if !matched {
            tracing::debug!(
                "Candidate '{candidate}' lacks marker '{}'",
                String::from_utf8_lossy(&self.marker)
            );
        }
        matched
    }
}

impl<R: DiagnosticRunner> Resolver<R> {
    /// Return the first candidate whose diagnostic output contains the marker.
    ///
    /// Each present candidate is executed at most once, in order, and the
    /// search stops at the first match.
    #[must_use]
    pub fn resolve(&self) -> ResolvedTool {
        for (name, path) in self.present_candidates() {
            let output = self.runner.run(&path, &self.probe_arg);
            if self.output_matches(name, output.as_deref()) {
                tracing::info!("Resolved '{name}' to {}", path.display());
                return ResolvedTool::Found(path);
            }
        }
        tracing::info!(
            "No qualifying tool among [{}]",
            self.candidates.join(", ")
        );
        ResolvedTool::NotFound
    }
}

/// Resolve `candidates` against `PATH`, probing each with `probe_arg`.
#[must_use]
pub fn resolve(candidates: &[&str], probe_arg: &str, required_marker: &[u8]) -> ResolvedTool {
    Resolver::new(candidates.iter().copied(), probe_arg, required_marker).resolve()
}

/// Whether the executable at `path` advertises IPv4/IPv6 dual-stack support.
#[must_use]
pub fn supports_dual_stack(path: &Path) -> bool {
    supports(path, Capability::DualStack, &SystemRunner)
}

/// Whether the executable at `path` advertises `capability`.
pub fn supports<R: DiagnosticRunner>(path: &Path, capability: Capability, runner: &R) -> bool {
    runner
        .run(path, DEFAULT_PROBE_ARG)
        .is_some_and(|output| capability.detect(&output))
}
