//! Configuration for netprobe.
//!
//! Read from `~/.netprobe/config.toml`, or from the file named by
//! `NETPROBE_CONFIG`. Every key is optional; a missing file means defaults.
//!
//! ```toml
//! [resolver]
//! candidates = ["nc", "netcat", "/usr/bin/nc", "/usr/local/bin/nc", "/bin/nc.openbsd"]
//! probe_arg = "-h"
//! marker = "-46"
//! probe_timeout_ms = 5000
//! search_path = []
//!
//! [scenario]
//! bind_host = "127.0.0.1"
//! port = 0
//! deadline_ms = 1000
//! probe_flag = "-z"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use netprobe_resolver::{Capability, DEFAULT_CANDIDATES, DEFAULT_PROBE_ARG, Resolver};
use serde::Deserialize;
use thiserror::Error;

/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "NETPROBE_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config at {}: {message}", .path.display())]
    Invalid { path: PathBuf, message: String },
}

impl ConfigError {
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigError::Read { path, .. }
            | ConfigError::Parse { path, .. }
            | ConfigError::Invalid { path, .. } => path,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetprobeConfig {
    pub resolver: ResolverConfig,
    pub scenario: ScenarioConfig,
}

/// Which external tool to look for and how to recognise it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolverConfig {
    /// Names or absolute paths, most preferred first.
    pub candidates: Vec<String>,
    /// Argument that makes a candidate print its help.
    pub probe_arg: String,
    /// Text that must appear in the help output.
    pub marker: String,
    /// Per-candidate limit for the help invocation.
    pub probe_timeout_ms: u64,
    /// Directories searched instead of `PATH`. Empty means `PATH`.
    pub search_path: Vec<PathBuf>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            candidates: DEFAULT_CANDIDATES.iter().map(ToString::to_string).collect(),
            probe_arg: DEFAULT_PROBE_ARG.to_string(),
            marker: String::from_utf8_lossy(Capability::DualStack.marker()).into_owned(),
            probe_timeout_ms: 5_000,
            search_path: Vec::new(),
        }
    }
}

impl ResolverConfig {
    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Build a resolver from this configuration.
    #[must_use]
    pub fn resolver(&self) -> Resolver {
        Resolver::new(
            self.candidates.iter().cloned(),
            self.probe_arg.clone(),
            self.marker.as_bytes(),
        )
        .with_search_path(self.search_path.iter().cloned())
    }
}

/// Where the server listens and how long the probe may take.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScenarioConfig {
    pub bind_host: String,
    /// Port 0 picks an ephemeral port.
    pub port: u16,
    pub deadline_ms: u64,
    /// Tool flag for a connect-only scan.
    pub probe_flag: String,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            bind_host: "127.0.0.1".to_string(),
            port: 0,
            deadline_ms: 1_000,
            probe_flag: "-z".to_string(),
        }
    }
}

impl ScenarioConfig {
    #[must_use]
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}

impl NetprobeConfig {
    /// Load from the default location. A missing file yields defaults.
    pub fn load() -> Result<Self, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => {
                tracing::debug!("No home directory; using default config");
                Ok(Self::default())
            }
        }
    }

    /// Load from `path`. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("No config at {}; using defaults", path.display());
            return Ok(Self::default());
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        let config: Self = match toml::from_str(&content) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                return Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        config.validate().map_err(|message| ConfigError::Invalid {
            path: path.to_path_buf(),
            message,
        })?;
        Ok(config)
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    fn validate(&self) -> Result<(), String> {
        if self.resolver.candidates.is_empty() {
            return Err("resolver.candidates must not be empty".to_string());
        }
        if self.resolver.candidates.iter().any(|c| c.trim().is_empty()) {
            return Err("resolver.candidates entries must be non-empty".to_string());
        }
        if self.resolver.marker.is_empty() {
            return Err("resolver.marker must not be empty".to_string());
        }
        if self.scenario.bind_host.trim().is_empty() {
            return Err("scenario.bind_host must not be empty".to_string());
        }
        Ok(())
    }
}

pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".netprobe").join("config.toml"))
}
