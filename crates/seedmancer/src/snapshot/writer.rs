//! Snapshot writing.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::codec::{self, TypeCategory};
use crate::core::schema::{Schema, Table};
use crate::core::value::Row;
use crate::error::{Result, SnapshotError};

use super::layout::{table_file, SCHEMA_FILE};

/// Writes one snapshot directory.
#[derive(Debug)]
pub struct SnapshotWriter {
    dir: PathBuf,
}

impl SnapshotWriter {
    /// Create the snapshot directory (and parents) if needed.
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `schema.json`.
    pub fn write_schema(&self, schema: &Schema) -> Result<PathBuf> {
        let path = self.dir.join(SCHEMA_FILE);
        write_schema_file(&path, schema)?;
        Ok(path)
    }

    /// Open the row file for `table` and write its header.
    pub fn table_writer(&self, table: &Table) -> Result<TableWriter> {
        let path = table_file(&self.dir, &table.name)?;
        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record(table.columns.iter().map(|c| c.name.as_str()))?;
        debug!("Writing {}", path.display());
        Ok(TableWriter {
            writer,
            table: table.name.clone(),
            categories: table.columns.iter().map(TypeCategory::for_column).collect(),
            rows: 0,
        })
    }
}

/// Serialize a schema as pretty JSON to `path`.
pub(crate) fn write_schema_file(path: &Path, schema: &Schema) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut out, schema)?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}

/// Streams encoded rows for one table.
pub struct TableWriter {
    writer: csv::Writer<File>,
    table: String,
    categories: Vec<TypeCategory>,
    rows: u64,
}

impl TableWriter {
    /// Encode and append one row in column order.
    pub fn write_row(&mut self, row: &Row) -> Result<()> {
        if row.len() != self.categories.len() {
            return Err(SnapshotError::RowFormat {
                table: self.table.clone(),
                row: self.rows + 1,
                expected: self.categories.len(),
                found: row.len(),
            });
        }
        let record = row
            .iter()
            .zip(&self.categories)
            .map(|(value, category)| codec::encode(value, *category));
        self.writer.write_record(record)?;
        self.rows += 1;
        Ok(())
    }

    /// Flush the file and return the number of rows written.
    pub fn finish(mut self) -> Result<u64> {
        self.writer.flush()?;
        Ok(self.rows)
    }
}
