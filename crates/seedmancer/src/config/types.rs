//! Configuration type definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::drivers::common::connection::redact_url;

/// Root configuration structure (`seedmancer.yaml`).
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding snapshots, relative to the project root.
    #[serde(default = "default_storage_path")]
    pub storage_path: String,

    /// Default connection URL when a command gets no `--db-url`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,

    #[serde(default)]
    pub export: ExportConfig,

    #[serde(default)]
    pub restore: RestoreConfig,

    #[serde(default)]
    pub generate: GenerateConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_path: default_storage_path(),
            database_url: None,
            export: ExportConfig::default(),
            restore: RestoreConfig::default(),
            generate: GenerateConfig::default(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("storage_path", &self.storage_path)
            .field("database_url", &self.database_url.as_deref().map(redact_url))
            .field("export", &self.export)
            .field("restore", &self.restore)
            .field("generate", &self.generate)
            .finish()
    }
}

/// Export behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Rows fetched per round trip while streaming a table.
    #[serde(default = "default_export_batch_size")]
    pub batch_size: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            batch_size: default_export_batch_size(),
        }
    }
}

/// Restore behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreConfig {
    /// Rows handed to the target writer per call.
    #[serde(default = "default_restore_batch_size")]
    pub batch_size: usize,

    /// Disable foreign key enforcement for the session during the load.
    #[serde(default = "default_true")]
    pub suspend_constraints: bool,
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            batch_size: default_restore_batch_size(),
            suspend_constraints: true,
        }
    }
}

/// Synthetic data generation behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateConfig {
    /// Rows per table.
    #[serde(default = "default_rows")]
    pub rows: usize,

    /// Chance of NULL for a nullable, non-key column.
    #[serde(default = "default_null_probability")]
    pub null_probability: f64,

    /// RNG seed for reproducible output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Attempts at a fresh unique value before falling back to a suffix.
    #[serde(default = "default_max_unique_attempts")]
    pub max_unique_attempts: usize,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            rows: default_rows(),
            null_probability: default_null_probability(),
            seed: None,
            max_unique_attempts: default_max_unique_attempts(),
        }
    }
}

// Default value functions for serde
fn default_storage_path() -> String {
    ".seedmancer".to_string()
}

fn default_export_batch_size() -> usize {
    5_000
}

fn default_restore_batch_size() -> usize {
    1_000
}

fn default_rows() -> usize {
    10
}

fn default_null_probability() -> f64 {
    0.1
}

fn default_max_unique_attempts() -> usize {
    1_000
}

fn default_true() -> bool {
    true
}
