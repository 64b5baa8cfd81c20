//! netprobe CLI.
//!
//! ```text
//! netprobe resolve          print the first candidate advertising dual-stack support
//! netprobe check <PATH>     report whether PATH advertises dual-stack support
//! netprobe run              bind a server, probe it with `<tool> -z`, require both to finish
//! ```
//!
//! Exit codes: 0 success, 1 failure, 2 skipped / not found.
//! Logs go to stderr (`RUST_LOG`, default `info`); results go to stdout.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use netprobe_config::NetprobeConfig;
use netprobe_core::{ScenarioError, ScenarioOutcome, ZeroPayloadScenario};
use netprobe_resolver::{ResolvedTool, supports_dual_stack};

const EXIT_SKIPPED: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "netprobe", version, about = "Zero-payload TCP probe checker", long_about = None)]
struct Cli {
    /// Config file (default: ~/.netprobe/config.toml or $NETPROBE_CONFIG)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the first candidate tool that advertises the required marker
    Resolve,
    /// Report whether an executable advertises dual-stack support
    Check {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
    /// Run the zero-payload probe scenario
    Run {
        /// Deadline for the probe and the disconnect notification
        #[arg(long, value_name = "MS")]
        deadline_ms: Option<u64>,
        /// Address the server binds to
        #[arg(long, value_name = "HOST")]
        host: Option<String>,
    },
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<NetprobeConfig> {
    let config = match path {
        Some(path) => NetprobeConfig::load_from(path)?,
        None => NetprobeConfig::load()?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref()).context("loading configuration")?;

    match cli.command {
        Command::Resolve => Ok(resolve(&config).await),
        Command::Check { path } => Ok(check(&path)),
        Command::Run { deadline_ms, host } => run(&config, deadline_ms, host).await,
    }
}

async fn resolve(config: &NetprobeConfig) -> ExitCode {
    let resolver = config.resolver.resolver();
    match resolver.resolve_bounded(config.resolver.probe_timeout()).await {
        ResolvedTool::Found(path) => {
            println!("{}", path.display());
            ExitCode::SUCCESS
        }
        ResolvedTool::NotFound => {
            println!(
                "no qualifying tool among [{}]",
                resolver.candidates().join(", ")
            );
            ExitCode::from(EXIT_SKIPPED)
        }
    }
}

fn check(path: &std::path::Path) -> ExitCode {
    if supports_dual_stack(path) {
        println!("{}: dual-stack supported", path.display());
        ExitCode::SUCCESS
    } else {
        println!("{}: dual-stack not advertised", path.display());
        ExitCode::from(EXIT_SKIPPED)
    }
}

async fn run(
    config: &NetprobeConfig,
    deadline_ms: Option<u64>,
    host: Option<String>,
) -> Result<ExitCode> {
    let mut scenario = ZeroPayloadScenario::from_config(config);
    if let Some(ms) = deadline_ms {
        scenario = scenario.with_deadline(std::time::Duration::from_millis(ms));
    }
    if let Some(host) = host {
        scenario = scenario.with_bind_host(host);
    }

    match scenario.run().await {
        Ok(ScenarioOutcome::Passed {
            tool,
            elapsed,
            bytes_received,
        }) => {
            println!(
                "PASS {} ({elapsed:?}, {bytes_received} bytes received)",
                tool.display()
            );
            Ok(ExitCode::SUCCESS)
        }
        Ok(ScenarioOutcome::Skipped(reason)) => {
            println!("SKIP {reason}");
            Ok(ExitCode::from(EXIT_SKIPPED))
        }
        Err(err @ ScenarioError::LivenessTimeout { .. }) => {
            println!("FAIL {err}");
            Ok(ExitCode::FAILURE)
        }
        Err(err) => Err(err).context("running zero-payload probe"),
    }
}
