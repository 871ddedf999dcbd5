//! Configuration loading, discovery, and validation.

mod types;
mod validation;

pub use types::*;

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Result, SnapshotError};

/// Project configuration file name.
pub const CONFIG_FILE_NAME: &str = "seedmancer.yaml";

/// Per-user fallback location, relative to the home directory.
const GLOBAL_CONFIG_PATH: &str = ".seedmancer/config.yaml";

/// A configuration together with where it was found.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub path: PathBuf,
    /// Directory containing the config file; storage paths are relative to it.
    pub project_root: PathBuf,
}

impl LoadedConfig {
    /// Absolute storage directory.
    pub fn storage_dir(&self) -> PathBuf {
        self.project_root.join(&self.config.storage_path)
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Load an explicit config file.
    pub fn load_at(path: &Path) -> Result<LoadedConfig> {
        let config = Self::load(path)?;
        let project_root = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(LoadedConfig {
            config,
            path: path.to_path_buf(),
            project_root,
        })
    }

    /// Find and load the config for `start`, searching `start` and its
    /// parents for `seedmancer.yaml`, then `~/.seedmancer/config.yaml`.
    pub fn discover(start: &Path) -> Result<LoadedConfig> {
        let home = std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map(PathBuf::from);
        Self::discover_with_home(start, home.as_deref())
    }

    /// [`Config::discover`] with an explicit home directory.
    pub fn discover_with_home(start: &Path, home: Option<&Path>) -> Result<LoadedConfig> {
        for dir in start.ancestors() {
            let candidate = dir.join(CONFIG_FILE_NAME);
            if candidate.is_file() {
                debug!("Using config file {}", candidate.display());
                return Self::load_at(&candidate);
            }
        }

        if let Some(home) = home {
            let candidate = home.join(GLOBAL_CONFIG_PATH);
            if candidate.is_file() {
                debug!("Using global config file {}", candidate.display());
                return Self::load_at(&candidate);
            }
        }

        Err(SnapshotError::Config(format!(
            "no {} found in {} or its parents, and no ~/{} (run `seedmancer init`)",
            CONFIG_FILE_NAME,
            start.display(),
            GLOBAL_CONFIG_PATH
        )))
    }

    /// Pick the connection URL: explicit argument first, then config.
    pub fn resolve_database_url(&self, explicit: Option<&str>) -> Result<String> {
        explicit
            .map(str::to_string)
            .or_else(|| self.database_url.clone())
            .ok_or_else(|| {
                SnapshotError::Config(
                    "database URL is required (--db-url or database_url in config)".into(),
                )
            })
    }
}
