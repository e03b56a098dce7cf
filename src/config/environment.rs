//! Startup environment detection.
//!
//! Inside a container the orchestrator injects the environment; locally the
//! worker reads a `.env` file from the working directory instead.

use std::path::Path;

const CONTAINER_ENV_VAR: &str = "IS_RUNNING_IN_CONTAINER";
const CGROUP_MARKERS: [&str; 3] = ["docker", "containerd", "kubepods"];

/// Best-effort check for running inside a container.
pub fn running_in_container() -> bool {
    if std::env::var_os(CONTAINER_ENV_VAR).is_some_and(|v| !v.is_empty()) {
        return true;
    }
    if Path::new("/.dockerenv").exists() {
        return true;
    }
    std::fs::read_to_string("/proc/1/cgroup")
        .map(|contents| cgroup_indicates_container(&contents))
        .unwrap_or(false)
}

fn cgroup_indicates_container(contents: &str) -> bool {
    CGROUP_MARKERS.iter().any(|marker| contents.contains(marker))
}

/// Load `.env` (overriding existing vars) unless running in a container.
///
/// Runs before telemetry is up, so it reports what it did instead of logging.
pub fn load_dotenv_unless_container() -> Bootstrap {
    if running_in_container() {
        return Bootstrap::Container;
    }
    Bootstrap::Local {
        dotenv_loaded: dotenvy::from_path_override(".env").is_ok(),
    }
}

/// How the process environment was prepared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bootstrap {
    Container,
    Local { dotenv_loaded: bool },
}
