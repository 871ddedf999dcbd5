//! On-disk layout of the snapshot store.
//!
//! ```text
//! <storage>/databases/<database>/<version>/schema.json
//! <storage>/databases/<database>/<version>/<table>.csv
//! ```

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Result, SnapshotError};

/// Schema file name inside a snapshot directory.
pub const SCHEMA_FILE: &str = "schema.json";

/// Version directory used when no version name is given.
pub const UNVERSIONED: &str = "unversioned";

const DATABASES_DIR: &str = "databases";

/// A snapshot found in local storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalSnapshot {
    pub database: String,
    pub version: String,
    pub path: PathBuf,
    /// Number of row files next to the schema.
    pub table_files: usize,
}

/// Directory for one database snapshot version.
pub fn snapshot_dir(storage: &Path, database: &str, version: Option<&str>) -> Result<PathBuf> {
    let version = version.unwrap_or(UNVERSIONED);
    check_component("database name", database)?;
    check_component("version name", version)?;
    Ok(storage.join(DATABASES_DIR).join(database).join(version))
}

/// Row file for `table` inside a snapshot directory.
pub fn table_file(dir: &Path, table: &str) -> Result<PathBuf> {
    check_component("table name", table)?;
    Ok(dir.join(format!("{}.csv", table)))
}

/// Path components come from user input and table names; keep them inside
/// the snapshot store.
fn check_component(what: &str, name: &str) -> Result<()> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0')
    {
        return Err(SnapshotError::Config(format!(
            "invalid {} for a snapshot path: {:?}",
            what, name
        )));
    }
    Ok(())
}

/// Enumerate `databases/<db>/<version>` directories holding a schema file,
/// sorted by database then version.
pub fn list_local(storage: &Path) -> Result<Vec<LocalSnapshot>> {
    let root = storage.join(DATABASES_DIR);
    if !root.is_dir() {
        return Ok(Vec::new());
    }

    let mut found = Vec::new();
    for db_entry in std::fs::read_dir(&root)? {
        let db_entry = db_entry?;
        if !db_entry.file_type()?.is_dir() {
            continue;
        }
        let database = db_entry.file_name().to_string_lossy().into_owned();

        for version_entry in std::fs::read_dir(db_entry.path())? {
            let version_entry = version_entry?;
            let path = version_entry.path();
            if !path.join(SCHEMA_FILE).is_file() {
                continue;
            }
            let table_files = std::fs::read_dir(&path)?
                .filter_map(|e| e.ok())
                .filter(|e| e.path().extension().is_some_and(|ext| ext == "csv"))
                .count();
            found.push(LocalSnapshot {
                database: database.clone(),
                version: version_entry.file_name().to_string_lossy().into_owned(),
                path,
                table_files,
            });
        }
    }

    found.sort_by(|a, b| (&a.database, &a.version).cmp(&(&b.database, &b.version)));
    Ok(found)
}
