//! Export a live database into a snapshot directory.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::core::schema::{Schema, Table};
use crate::core::traits::{ReadOptions, SourceReader};
use crate::error::Result;
use crate::order::dependency_order;
use crate::snapshot::{write_schema_file, SnapshotWriter, TableCount};

/// Result of an export run.
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub status: String,
    pub database_type: String,
    pub output_dir: PathBuf,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub enums: usize,
    pub tables: Vec<TableCount>,
    pub rows_exported: u64,
    /// Foreign key edges dropped to order a cyclic graph.
    pub cyclic_edges: usize,
}

/// Streams every table of a source database into a snapshot.
pub struct Exporter<'a, R: SourceReader + ?Sized> {
    reader: &'a R,
    batch_size: usize,
}

impl<'a, R: SourceReader + ?Sized> Exporter<'a, R> {
    pub fn new(reader: &'a R, batch_size: usize) -> Self {
        Self {
            reader,
            batch_size: batch_size.max(1),
        }
    }

    /// Write `schema.json` and one row file per table into `dir`.
    pub async fn run(&self, dir: &Path) -> Result<ExportReport> {
        let started_at = Utc::now();
        info!("Phase: Introspect");
        let schema = self.reader.extract_schema().await?;
        info!(
            "Found {} tables and {} enums in {} source",
            schema.tables.len(),
            schema.enums.len(),
            schema.database_type
        );

        let writer = SnapshotWriter::create(dir)?;
        writer.write_schema(&schema)?;

        let order = dependency_order(&schema.tables);
        for edge in &order.broken_edges {
            warn!(
                "Foreign key cycle: dropped edge {}.{} -> {} for ordering",
                edge.from_table, edge.column, edge.to_table
            );
        }

        info!("Phase: Export rows");
        let mut tables = Vec::with_capacity(schema.tables.len());
        for name in &order.tables {
            let Some(table) = schema.table(name) else {
                continue;
            };
            let rows = self.export_table(&writer, table).await?;
            info!("{}: exported {} rows", table.name, rows);
            tables.push(TableCount {
                table: table.name.clone(),
                rows,
            });
        }

        let completed_at = Utc::now();
        let report = ExportReport {
            status: "completed".into(),
            database_type: schema.database_type.to_string(),
            output_dir: dir.to_path_buf(),
            started_at,
            completed_at,
            duration_seconds: (completed_at - started_at).num_milliseconds() as f64 / 1000.0,
            enums: schema.enums.len(),
            rows_exported: tables.iter().map(|t| t.rows).sum(),
            tables,
            cyclic_edges: order.broken_edges.len(),
        };
        info!(
            "Export completed: {} rows from {} tables in {:.1}s",
            report.rows_exported,
            report.tables.len(),
            report.duration_seconds
        );
        Ok(report)
    }

    async fn export_table(&self, writer: &SnapshotWriter, table: &Table) -> Result<u64> {
        let mut out = writer.table_writer(table)?;
        let mut rx = self
            .reader
            .read_table(ReadOptions::for_table(table, self.batch_size));
        while let Some(batch) = rx.recv().await {
            let batch = batch?;
            for row in &batch.rows {
                out.write_row(row)?;
            }
            if batch.is_last {
                break;
            }
        }
        out.finish()
    }

    /// Introspect and write only the schema model to `path`.
    pub async fn export_schema(&self, path: &Path) -> Result<Schema> {
        let schema = self.reader.extract_schema().await?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        write_schema_file(path, &schema)?;
        info!(
            "Wrote schema with {} tables to {}",
            schema.tables.len(),
            path.display()
        );
        Ok(schema)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use super::*;
    use crate::core::schema::{Column, Engine};
    use crate::core::value::{Batch, SqlValue};
    use crate::error::SnapshotError;
    use crate::snapshot::SnapshotReader;

    struct FakeReader {
        schema: Schema,
        rows: Vec<(String, Vec<Vec<SqlValue>>)>,
        fail_table: Option<String>,
    }

    #[async_trait]
    impl SourceReader for FakeReader {
        async fn extract_schema(&self) -> Result<Schema> {
            Ok(self.schema.clone())
        }

        fn read_table(&self, opts: ReadOptions) -> mpsc::Receiver<Result<Batch>> {
            let (tx, rx) = mpsc::channel(64);
            if self.fail_table.as_deref() == Some(opts.table.as_str()) {
                let _ = tx.try_send(Err(SnapshotError::load(&opts.table, "connection reset")));
                return rx;
            }
            let rows = self
                .rows
                .iter()
                .find(|(t, _)| t == &opts.table)
                .map(|(_, r)| r.clone())
                .unwrap_or_default();
            let mut chunks = rows.chunks(opts.batch_size).peekable();
            if chunks.peek().is_none() {
                let _ = tx.try_send(Ok(Batch::empty_final()));
            }
            while let Some(chunk) = chunks.next() {
                let mut batch = Batch::new(chunk.to_vec());
                if chunks.peek().is_none() {
                    batch = batch.mark_final();
                }
                let _ = tx.try_send(Ok(batch));
            }
            rx
        }

        fn engine(&self) -> Engine {
            Engine::Postgres
        }

        async fn close(&self) {}
    }

    fn source() -> FakeReader {
        let mut schema = Schema::new(Engine::Postgres);
        let mut posts = Table::new("posts");
        posts.columns.push(Column::new("id", "integer").primary());
        posts
            .columns
            .push(Column::new("user_id", "integer").references("users", "id"));
        posts.columns.push(Column::new("tags", "text[]"));
        let mut users = Table::new("users");
        users.columns.push(Column::new("id", "integer").primary());
        users.columns.push(Column::new("email", "text").unique());
        users.columns.push(Column::new("name", "text"));
        schema.tables.push(posts);
        schema.tables.push(users);

        FakeReader {
            schema,
            rows: vec![
                (
                    "users".into(),
                    (1..=5)
                        .map(|i| {
                            vec![
                                SqlValue::Int(i),
                                SqlValue::Text(format!("u{}@example.com", i)),
                                SqlValue::Null,
                            ]
                        })
                        .collect(),
                ),
                (
                    "posts".into(),
                    vec![vec![
                        SqlValue::Int(1),
                        SqlValue::Int(3),
                        SqlValue::Array("{a,b}".into()),
                    ]],
                ),
            ],
            fail_table: None,
        }
    }

    #[tokio::test]
    async fn test_export_writes_schema_and_rows() {
        let tmp = tempfile::tempdir().unwrap();
        let reader = source();
        let report = Exporter::new(&reader, 2).run(tmp.path()).await.unwrap();

        assert_eq!(report.rows_exported, 6);
        assert_eq!(report.tables[0].table, "users");
        assert_eq!(report.tables[0].rows, 5);

        let users = std::fs::read_to_string(tmp.path().join("users.csv")).unwrap();
        assert!(users.starts_with("id,email,name\n1,u1@example.com,NULL\n"));
        let posts = std::fs::read_to_string(tmp.path().join("posts.csv")).unwrap();
        assert_eq!(posts, "id,user_id,tags\n1,3,\"{a,b}\"\n");

        let snapshot = SnapshotReader::open(tmp.path()).unwrap();
        assert_eq!(snapshot.schema(), &reader.schema);
    }

    #[tokio::test]
    async fn test_empty_table_gets_header_only() {
        let tmp = tempfile::tempdir().unwrap();
        let mut reader = source();
        reader.rows.retain(|(t, _)| t != "posts");
        Exporter::new(&reader, 10).run(tmp.path()).await.unwrap();
        let posts = std::fs::read_to_string(tmp.path().join("posts.csv")).unwrap();
        assert_eq!(posts, "id,user_id,tags\n");
    }

    #[tokio::test]
    async fn test_read_error_aborts_export() {
        let tmp = tempfile::tempdir().unwrap();
        let mut reader = source();
        reader.fail_table = Some("users".into());
        let err = Exporter::new(&reader, 10).run(tmp.path()).await.unwrap_err();
        assert!(err.to_string().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_export_schema_only() {
        let tmp = tempfile::tempdir().unwrap();
        let reader = source();
        let path = tmp.path().join("out/schema.json");
        Exporter::new(&reader, 10).export_schema(&path).await.unwrap();
        assert!(path.is_file());
        assert!(!tmp.path().join("out/users.csv").exists());
    }
}
