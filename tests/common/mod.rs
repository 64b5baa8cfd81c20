//! Shared test utilities and fixtures
//!
//! Fake probe tools are bash scripts: `-h` prints netcat-style usage, and
//! `-z HOST PORT` behaviour is chosen per fixture.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use netprobe_resolver::Resolver;

const BASH: &str = "/bin/bash";

const HELP_BRANCH: &str = r#"if [ "$1" = "-h" ]; then
  echo 'usage: nc [-46CDdFhklNnrStUuvZz] [-I length] [-i interval]' >&2
  exit 1
fi"#;

/// Whether bash (needed for `/dev/tcp`) is available.
pub fn has_bash() -> bool {
    Path::new(BASH).exists()
}

fn write_tool(dir: &Path, name: &str, probe_body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!{BASH}\n{HELP_BRANCH}\n{probe_body}\n")).expect("write tool");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod tool");
    path
}

/// Connects to `$2:$3` and closes immediately, like `nc -z`.
pub fn connecting_tool(dir: &Path, name: &str) -> PathBuf {
    write_tool(
        dir,
        name,
        r#"exec 3<>"/dev/tcp/$2/$3" || exit 1
exec 3>&-
exit 0"#,
    )
}

/// Never connects and never exits on its own.
pub fn hanging_tool(dir: &Path, name: &str) -> PathBuf {
    write_tool(dir, name, "exec sleep 30")
}

/// Exits successfully without touching the network.
pub fn silent_tool(dir: &Path, name: &str) -> PathBuf {
    write_tool(dir, name, "exit 0")
}

/// Resolver that only searches `dir`.
pub fn resolver_in(dir: &Path, candidates: &[&str]) -> Resolver {
    Resolver::new(candidates.iter().copied(), "-h", "-46")
        .with_search_path([dir.to_path_buf()])
}
