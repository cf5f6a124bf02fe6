pub mod error;
pub mod parser;

pub use error::*;
pub use parser::{SpecOverrides, parse_spec_str, spec_from_overrides};

use clusterflow_core::ClusterSpec;
use std::path::{Path, PathBuf};

/// Environment variable pointing directly at a spec file
pub const CONFIG_PATH_ENV: &str = "CLUSTERFLOW_CONFIG_PATH";

const CANDIDATES: [&str; 2] = ["cluster.local.kdl", "cluster.kdl"];

/// Locate the cluster spec file
///
/// Search order:
/// 1. `CLUSTERFLOW_CONFIG_PATH`
/// 2. current directory: cluster.local.kdl, cluster.kdl
/// 3. `./.clusterflow/`, same order
/// 4. `~/.config/clusterflow/cluster.kdl`
pub fn find_spec_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!("{} points at missing file {}", CONFIG_PATH_ENV, path.display());
    }

    let current_dir = std::env::current_dir()?;

    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    let local_dir = current_dir.join(".clusterflow");
    if local_dir.is_dir() {
        for filename in &CANDIDATES {
            let path = local_dir.join(filename);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("clusterflow").join("cluster.kdl");
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::SpecFileNotFound)
}

/// Read and parse a spec file
pub fn load_spec_file(path: &Path, overrides: &SpecOverrides) -> Result<ClusterSpec> {
    tracing::debug!("Loading cluster spec from {}", path.display());
    let content = std::fs::read_to_string(path)?;
    parse_spec_str(&content, overrides)
}

/// Resolve the spec for a command
///
/// An explicit `path` is read directly. Otherwise the discovered spec file is
/// used, and when there is none the spec is built from `overrides` alone.
pub fn load_spec(path: Option<&Path>, overrides: &SpecOverrides) -> Result<ClusterSpec> {
    if let Some(path) = path {
        return load_spec_file(path, overrides);
    }
    match find_spec_file() {
        Ok(found) => load_spec_file(&found, overrides),
        Err(ConfigError::SpecFileNotFound) => spec_from_overrides(overrides),
        Err(e) => Err(e),
    }
}
