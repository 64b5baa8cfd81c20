//! Time-bounded asynchronous resolution.
//!
//! `Resolver::resolve` trusts every candidate to exit. This variant runs each
//! diagnostic invocation under a deadline and kills candidates that overrun it.

use std::io;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use crate::{ResolvedTool, Resolver};

/// Upper bound on captured diagnostic output per stream.
const MAX_PROBE_OUTPUT: u64 = 256 * 1024;

impl<R> Resolver<R> {
    /// Like [`Resolver::resolve`], but each candidate gets at most `timeout`
    /// to print its help and exit.
    ///
    /// A candidate that times out is killed and treated as non-matching.
    pub async fn resolve_bounded(&self, timeout: Duration) -> ResolvedTool {
        for (name, path) in self.present_candidates() {
            let output = run_bounded(&path, self.probe_arg(), timeout).await;
            if self.output_matches(name, output.as_deref()) {
                tracing::info!("Resolved '{name}' to {}", path.display());
                return ResolvedTool::Found(path);
            }
        }
        tracing::info!(
            "No qualifying tool among [{}]",
            self.candidates().join(", ")
        );
        ResolvedTool::NotFound
    }
}

/// Run `program arg`, returning stdout followed by stderr, or `None` if it
/// could not be spawned, could not be read, or did not finish within `timeout`.
async fn run_bounded(program: &Path, arg: &str, timeout: Duration) -> Option<Vec<u8>> {
    let mut child = match Command::new(program)
        .arg(arg)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            tracing::debug!("Failed to spawn {} {arg}: {e}", program.display());
            return None;
        }
    };

    let stdout_pipe = child.stdout.take()?;
    let stderr_pipe = child.stderr.take()?;

    let io_future = async {
        let mut stdout_buf = Vec::with_capacity(4096);
        let mut stderr_buf = Vec::with_capacity(1024);
        let (r1, r2) = futures_util::future::join(
            read_capped(stdout_pipe, &mut stdout_buf),
            read_capped(stderr_pipe, &mut stderr_buf),
        )
        .await;
        r1.ok()?;
        r2.ok()?;
        let status = child.wait().await.ok()?;
        tracing::trace!("{} {arg} exited with {status}", program.display());
        stdout_buf.extend_from_slice(&stderr_buf);
        Some(stdout_buf)
    };

    match tokio::time::timeout(timeout, io_future).await {
        Ok(output) => output,
        Err(_) => {
            tracing::warn!(
                "{} {arg} did not exit within {timeout:?}; treating as non-matching",
                program.display()
            );
            None
        }
    }
}

/// Keep the first `MAX_PROBE_OUTPUT` bytes of `pipe` and discard the rest.
///
/// The pipe is read to end-of-file so the child never blocks on a full pipe.
async fn read_capped<P>(pipe: P, buf: &mut Vec<u8>) -> io::Result<()>
where
    P: AsyncRead + Unpin,
{
    let mut bounded = pipe.take(MAX_PROBE_OUTPUT);
    bounded.read_to_end(buf).await?;
    tokio::io::copy(&mut bounded.into_inner(), &mut tokio::io::sink()).await?;
    Ok(())
}
