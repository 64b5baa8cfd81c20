use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use netprobe_config::{NetprobeConfig, ScenarioConfig};
use netprobe_race::{PendingOperation, await_all};
use netprobe_resolver::{ResolvedTool, Resolver};
use netprobe_server::{PeerClosed, ProbeServer};
use netprobe_types::{ScenarioError, ScenarioOutcome, SkipReason};
use tokio::process::Command;

/// Label of the probe subprocess's exit in race results.
pub const PROBE_EXIT: &str = "probe exit";
/// Label of the server's peer-disconnect notification in race results.
pub const PEER_DISCONNECT: &str = "peer disconnect";

/// Probe a freshly bound server with a connect-and-close tool and require
/// that both the tool and the server notice the connection end in time.
#[derive(Debug, Clone)]
pub struct ZeroPayloadScenario {
    resolver: Resolver,
    probe_timeout: Duration,
    bind_host: String,
    port: u16,
    deadline: Duration,
    probe_flag: String,
}

impl ZeroPayloadScenario {
    /// Scenario with default server settings and the given resolver.
    pub fn new(resolver: Resolver) -> Self {
        let defaults = ScenarioConfig::default();
        let deadline = defaults.deadline();
        Self {
            resolver,
            probe_timeout: netprobe_config::ResolverConfig::default().probe_timeout(),
            bind_host: defaults.bind_host,
            port: defaults.port,
            deadline,
            probe_flag: defaults.probe_flag,
        }
    }

    pub fn from_config(config: &NetprobeConfig) -> Self {
        Self {
            resolver: config.resolver.resolver(),
            probe_timeout: config.resolver.probe_timeout(),
            bind_host: config.scenario.bind_host.clone(),
            port: config.scenario.port,
            deadline: config.scenario.deadline(),
            probe_flag: config.scenario.probe_flag.clone(),
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_bind_host(mut self, host: impl Into<String>) -> Self {
        self.bind_host = host.into();
        self
    }

    #[must_use]
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    #[must_use]
    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Resolve a tool, then probe. Skips when no qualifying tool exists.
    pub async fn run(&self) -> Result<ScenarioOutcome, ScenarioError> {
        match self.resolver.resolve_bounded(self.probe_timeout).await {
            ResolvedTool::Found(tool) => self.run_with_tool(&tool).await,
            ResolvedTool::NotFound => {
                let reason = SkipReason::ResolutionUnavailable {
                    candidates: self.resolver.candidates().to_vec(),
                };
                tracing::info!("Skipping zero-payload probe: {reason}");
                Ok(ScenarioOutcome::Skipped(reason))
            }
        }
    }

    /// Probe with an already-resolved tool.
    pub async fn run_with_tool(&self, tool: &Path) -> Result<ScenarioOutcome, ScenarioError> {
        let server = ProbeServer::bind(&self.bind_host, self.port)
            .await
            .map_err(|source| ScenarioError::Bind {
                addr: format!("{}:{}", self.bind_host, self.port),
                source,
            })?;
        let addr = server.local_addr();
        let disconnect = server.disconnected();

        let mut child = Command::new(tool)
            .arg(&self.probe_flag)
            .arg(addr.ip().to_string())
            .arg(addr.port().to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ScenarioError::ProcessLaunch {
                program: tool.to_path_buf(),
                source,
            })?;
        tracing::info!(
            "Probing {addr} with {} {}",
            tool.display(),
            self.probe_flag
        );

        let mut exit: Option<std::io::Result<ExitStatus>> = None;
        let mut closed: Option<PeerClosed> = None;
        let (pending, elapsed) = {
            let operations = [
                PendingOperation::new(PROBE_EXIT, async {
                    exit = Some(child.wait().await);
                }),
                PendingOperation::new(PEER_DISCONNECT, async {
                    closed = disconnect.await;
                }),
            ];
            let result = await_all(operations, self.deadline).await;
            (result.straggler_labels(), result.elapsed())
        };

        if !pending.is_empty() {
            if exit.is_none() {
                tracing::warn!("Killing probe {} after {elapsed:?}", tool.display());
                if let Err(e) = child.kill().await {
                    tracing::warn!("Failed to kill probe {}: {e}", tool.display());
                }
            }
            server.shutdown().await;
            return Err(ScenarioError::LivenessTimeout { pending, elapsed });
        }
        server.shutdown().await;

        match exit {
            Some(Ok(status)) if !status.success() => {
                tracing::warn!("Probe {} exited with {status}", tool.display());
            }
            Some(Err(e)) => tracing::warn!("Failed to wait on probe {}: {e}", tool.display()),
            _ => {}
        }

        let bytes_received = closed.map_or(0, |c| c.bytes_received);
        tracing::info!("Zero-payload probe passed in {elapsed:?}");
        Ok(ScenarioOutcome::Passed {
            tool: PathBuf::from(tool),
            elapsed,
            bytes_received,
        })
    }
}
