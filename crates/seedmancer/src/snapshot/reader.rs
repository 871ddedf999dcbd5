//! Snapshot reading.

use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::codec::{self, TypeCategory};
use crate::core::schema::{Schema, Table};
use crate::core::value::Row;
use crate::error::{Result, SnapshotError};

use super::layout::{table_file, SCHEMA_FILE};

/// A snapshot directory opened for restore.
#[derive(Debug)]
pub struct SnapshotReader {
    dir: PathBuf,
    schema: Schema,
}

impl SnapshotReader {
    /// Load and validate `schema.json` from `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let schema = read_schema_file(&dir.join(SCHEMA_FILE))?;
        info!(
            "Opened snapshot {} ({} tables, {} enums, from {})",
            dir.display(),
            schema.tables.len(),
            schema.enums.len(),
            schema.database_type
        );
        Ok(Self { dir, schema })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Open the row file for `table`. Returns `None` when the snapshot has no
    /// file for it (schema-only snapshots).
    pub fn rows(&self, table: &Table) -> Result<Option<TableRows>> {
        let path = table_file(&self.dir, &table.name)?;
        if !path.is_file() {
            debug!("No row file for {}", table.name);
            return Ok(None);
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&path)?;
        let header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        if header.is_empty() || header.iter().all(String::is_empty) {
            return Ok(Some(TableRows::empty(table)));
        }
        let positions = header_positions(table, &header)?;

        Ok(Some(TableRows {
            records: Some(reader.into_records()),
            table: table.name.clone(),
            positions,
            categories: table.columns.iter().map(TypeCategory::for_column).collect(),
            width: header.len(),
            line: 0,
        }))
    }
}

/// Read and validate a schema file.
pub fn read_schema_file(path: &Path) -> Result<Schema> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        SnapshotError::Serialization(format!("cannot read {}: {}", path.display(), e))
    })?;
    let mut schema: Schema = serde_json::from_str(&text).map_err(|e| {
        SnapshotError::Serialization(format!("invalid {}: {}", path.display(), e))
    })?;
    schema.validate()?;
    Ok(schema)
}

/// Position of each table column within the file header.
fn header_positions(table: &Table, header: &[String]) -> Result<Vec<usize>> {
    if header.len() != table.columns.len() {
        return Err(SnapshotError::load(
            &table.name,
            format!(
                "row file header has {} columns, schema declares {}",
                header.len(),
                table.columns.len()
            ),
        ));
    }
    table
        .columns
        .iter()
        .map(|column| {
            header
                .iter()
                .position(|h| h == &column.name)
                .ok_or_else(|| {
                    SnapshotError::load(
                        &table.name,
                        format!("row file header is missing column {}", column.name),
                    )
                })
        })
        .collect()
}

/// Decoded rows of one table file, in schema column order.
pub struct TableRows {
    records: Option<csv::StringRecordsIntoIter<File>>,
    table: String,
    positions: Vec<usize>,
    categories: Vec<TypeCategory>,
    width: usize,
    line: u64,
}

impl TableRows {
    fn empty(table: &Table) -> Self {
        Self {
            records: None,
            table: table.name.clone(),
            positions: Vec::new(),
            categories: Vec::new(),
            width: 0,
            line: 0,
        }
    }

    /// Data rows consumed so far.
    pub fn rows_read(&self) -> u64 {
        self.line
    }
}

impl Iterator for TableRows {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.records.as_mut()?.next()? {
            Ok(record) => record,
            Err(e) => return Some(Err(e.into())),
        };
        self.line += 1;

        if record.len() != self.width {
            return Some(Err(SnapshotError::RowFormat {
                table: self.table.clone(),
                row: self.line,
                expected: self.width,
                found: record.len(),
            }));
        }

        let row = self
            .positions
            .iter()
            .zip(&self.categories)
            .map(|(&pos, &category)| codec::decode(record.get(pos).unwrap_or_default(), category))
            .collect();
        Some(Ok(row))
    }
}
