//! Configuration validation.

use super::Config;
use crate::core::schema::Engine;
use crate::error::{Result, SnapshotError};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if config.storage_path.trim().is_empty() {
        return Err(SnapshotError::Config("storage_path is required".into()));
    }

    if let Some(url) = &config.database_url {
        Engine::from_url(url)?;
    }

    if config.export.batch_size == 0 {
        return Err(SnapshotError::Config(
            "export.batch_size must be at least 1".into(),
        ));
    }
    if config.restore.batch_size == 0 {
        return Err(SnapshotError::Config(
            "restore.batch_size must be at least 1".into(),
        ));
    }

    if config.generate.rows == 0 {
        return Err(SnapshotError::Config(
            "generate.rows must be at least 1".into(),
        ));
    }
    let p = config.generate.null_probability;
    if !(0.0..=1.0).contains(&p) {
        return Err(SnapshotError::Config(format!(
            "generate.null_probability must be between 0 and 1, got {}",
            p
        )));
    }
    if config.generate.max_unique_attempts == 0 {
        return Err(SnapshotError::Config(
            "generate.max_unique_attempts must be at least 1".into(),
        ));
    }

    Ok(())
}
