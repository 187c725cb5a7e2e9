//! Service configuration: a TOML file plus environment overrides.

pub mod schema;

pub use schema::{AuthConfig, Config, GatewayConfig, StoreConfig};

use anyhow::Context;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// `<platform config dir>/recordkeep/config.toml`, if a home directory exists.
pub fn default_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "recordkeep").map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Read `path` (missing file → defaults) and apply env overrides.
pub fn load(path: Option<&Path>) -> anyhow::Result<Config> {
    let path = path.map(Path::to_path_buf).or_else(default_path);
    let mut config = match path {
        Some(path) => read_file(&path)?,
        None => Config::default(),
    };
    config.apply_env_overrides(|key| std::env::var(key).ok());
    Ok(config)
}

fn read_file(path: &Path) -> anyhow::Result<Config> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "No config file; using defaults");
            return Ok(Config::default());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read config {}", path.display()))
        }
    };

    toml::from_str(&contents).with_context(|| format!("Failed to parse config {}", path.display()))
}
