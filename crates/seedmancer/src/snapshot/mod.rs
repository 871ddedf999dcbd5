//! Snapshot directories: `schema.json` plus one `<table>.csv` per table.
//!
//! - [`layout`]: where snapshots live under the storage directory
//! - [`SnapshotWriter`]: writes the schema and streams encoded rows to CSV
//! - [`SnapshotReader`]: loads and validates the schema, decodes rows back

pub mod layout;
mod reader;
mod writer;

pub use layout::{list_local, snapshot_dir, table_file, LocalSnapshot, SCHEMA_FILE, UNVERSIONED};
pub use reader::{read_schema_file, SnapshotReader, TableRows};
pub use writer::{SnapshotWriter, TableWriter};
pub(crate) use writer::write_schema_file;

use serde::Serialize;

/// Rows written to or loaded from one table file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableCount {
    pub table: String,
    pub rows: u64,
}
