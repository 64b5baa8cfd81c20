//! Diagnostic invocation of candidate executables.

use std::path::Path;
use std::process::{Command, Stdio};

/// Runs a candidate with its diagnostic argument and returns the combined output.
///
/// Implementations return stdout followed by stderr. `None` means the
/// candidate could not be run at all; the resolver treats that exactly like
/// output without the marker.
pub trait DiagnosticRunner {
    fn run(&self, program: &Path, arg: &str) -> Option<Vec<u8>>;
}

/// Runs candidates as real child processes and waits for them to exit.
///
/// There is no timeout here. A candidate that never exits blocks the caller;
/// use `Resolver::resolve_bounded` where that matters.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl DiagnosticRunner for SystemRunner {
    fn run(&self, program: &Path, arg: &str) -> Option<Vec<u8>> {
        let output = match Command::new(program)
            .arg(arg)
            .stdin(Stdio::null())
            .output()
        {
            Ok(output) => output,
            Err(e) => {
                tracing::debug!("Failed to run {} {arg}: {e}", program.display());
                return None;
            }
        };

        if !output.status.success() {
            // Many netcat builds exit non-zero after printing usage.
            tracing::trace!(
                "{} {arg} exited with {}",
                program.display(),
                output.status
            );
        }

        let mut combined = output.stdout;
        combined.extend_from_slice(&output.stderr);
        Some(combined)
    }
}

impl<R: DiagnosticRunner + ?Sized> DiagnosticRunner for &R {
    fn run(&self, program: &Path, arg: &str) -> Option<Vec<u8>> {
        (**self).run(program, arg)
    }
}
