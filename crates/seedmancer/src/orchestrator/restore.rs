//! Restore a snapshot into a target database.
//!
//! Phases, in order, stopping at the first fatal error:
//!
//! ```text
//! Idle -> EnumsCreated -> TablesCreated -> ConstraintsAttached -> DataLoaded -> Done
//! ```
//!
//! Foreign key enforcement is suspended for the session before any table is
//! touched and restored after the load. Tables are created without foreign
//! keys in any order; constraints are attached once every table exists, and
//! each one whose referenced table or column is missing on the target is
//! skipped. Each table's rows load inside their own transaction, in
//! dependency order; a table that fails is rolled back and reported while the
//! remaining tables continue.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::core::schema::{Schema, Table};
use crate::core::traits::{ConstraintOutcome, TargetWriter};
use crate::core::value::{Batch, Row, SqlValue};
use crate::error::{Result, SnapshotError};
use crate::order::dependency_order;
use crate::snapshot::{SnapshotReader, TableCount};

/// Restore state machine position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RestorePhase {
    Idle,
    EnumsCreated,
    TablesCreated,
    ConstraintsAttached,
    DataLoaded,
    Done,
}

impl fmt::Display for RestorePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RestorePhase::Idle => "Idle",
            RestorePhase::EnumsCreated => "EnumsCreated",
            RestorePhase::TablesCreated => "TablesCreated",
            RestorePhase::ConstraintsAttached => "ConstraintsAttached",
            RestorePhase::DataLoaded => "DataLoaded",
            RestorePhase::Done => "Done",
        };
        f.write_str(name)
    }
}

/// Restore tuning.
#[derive(Debug, Clone)]
pub struct RestoreOptions {
    /// Rows per `write_batch` call.
    pub batch_size: usize,
    /// Disable foreign key enforcement for the session during the load.
    pub suspend_constraints: bool,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self {
            batch_size: 1_000,
            suspend_constraints: true,
        }
    }
}

impl From<&crate::config::RestoreConfig> for RestoreOptions {
    fn from(config: &crate::config::RestoreConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            suspend_constraints: config.suspend_constraints,
        }
    }
}

/// A foreign key that was not attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedConstraint {
    pub table: String,
    pub column: String,
    pub references: String,
    pub reason: String,
}

/// A row that was not loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRow {
    pub table: String,
    /// 1-based data row number within the table file.
    pub row: u64,
    pub reason: String,
}

/// A table whose load was rolled back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedTable {
    pub table: String,
    pub error: String,
}

/// Result of a restore run.
#[derive(Debug, Clone, Serialize)]
pub struct RestoreReport {
    /// "completed", "completed_with_warnings", or "failed".
    pub status: String,
    /// Last phase reached.
    pub phase: RestorePhase,
    pub source_engine: String,
    pub target_engine: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub enums_created: usize,
    pub tables_created: usize,
    pub tables_truncated: usize,
    pub constraints_created: usize,
    pub constraints_existing: usize,
    pub skipped_constraints: Vec<SkippedConstraint>,
    pub skipped_rows: Vec<SkippedRow>,
    pub tables: Vec<TableCount>,
    pub failed_tables: Vec<FailedTable>,
    pub rows_loaded: u64,
}

impl RestoreReport {
    fn new(source: &Schema, target: &str) -> Self {
        let now = Utc::now();
        Self {
            status: "running".into(),
            phase: RestorePhase::Idle,
            source_engine: source.database_type.to_string(),
            target_engine: target.to_string(),
            started_at: now,
            completed_at: now,
            duration_seconds: 0.0,
            enums_created: 0,
            tables_created: 0,
            tables_truncated: 0,
            constraints_created: 0,
            constraints_existing: 0,
            skipped_constraints: Vec::new(),
            skipped_rows: Vec::new(),
            tables: Vec::new(),
            failed_tables: Vec::new(),
            rows_loaded: 0,
        }
    }

    /// True if any table failed to load.
    pub fn has_failures(&self) -> bool {
        !self.failed_tables.is_empty()
    }

    /// True if constraints or rows were skipped.
    pub fn has_warnings(&self) -> bool {
        !self.skipped_constraints.is_empty() || !self.skipped_rows.is_empty()
    }

    fn finish(&mut self) {
        self.completed_at = Utc::now();
        self.duration_seconds =
            (self.completed_at - self.started_at).num_milliseconds() as f64 / 1000.0;
        self.status = if self.has_failures() {
            "failed"
        } else if self.has_warnings() {
            "completed_with_warnings"
        } else {
            "completed"
        }
        .to_string();
    }
}

/// Drives one restore session through its phases.
pub struct RestoreOrchestrator<'a, W: TargetWriter + ?Sized> {
    writer: &'a mut W,
    options: RestoreOptions,
    phase: RestorePhase,
}

impl<'a, W: TargetWriter + ?Sized> RestoreOrchestrator<'a, W> {
    pub fn new(writer: &'a mut W, options: RestoreOptions) -> Self {
        Self {
            writer,
            options,
            phase: RestorePhase::Idle,
        }
    }

    pub fn phase(&self) -> RestorePhase {
        self.phase
    }

    fn advance(&mut self, phase: RestorePhase, report: &mut RestoreReport) {
        self.phase = phase;
        report.phase = phase;
        info!("Phase: {}", phase);
    }

    /// Restore every table in `snapshot`.
    pub async fn run(&mut self, snapshot: &SnapshotReader) -> Result<RestoreReport> {
        let schema = snapshot.schema();
        let mut report = RestoreReport::new(schema, self.writer.engine().as_str());
        info!(
            "Restoring {} tables from a {} snapshot into {}",
            schema.tables.len(),
            report.source_engine,
            report.target_engine
        );

        let suspended = self.suspend().await;
        let result = self.run_phases(snapshot, &mut report).await;
        if suspended {
            if let Err(e) = self.writer.resume_constraints().await {
                warn!("Could not re-enable foreign key checks: {}", e);
            }
        }
        result?;

        self.advance(RestorePhase::Done, &mut report);
        report.finish();
        info!(
            "Restore {}: {} rows into {} tables in {:.1}s ({} constraints skipped, {} rows skipped, {} tables failed)",
            report.status,
            report.rows_loaded,
            report.tables.len(),
            report.duration_seconds,
            report.skipped_constraints.len(),
            report.skipped_rows.len(),
            report.failed_tables.len()
        );
        Ok(report)
    }

    async fn suspend(&mut self) -> bool {
        if !self.options.suspend_constraints {
            return false;
        }
        match self.writer.suspend_constraints().await {
            Ok(()) => {
                debug!("Foreign key checks suspended for this session");
                true
            }
            Err(e) => {
                warn!(
                    "Could not suspend foreign key checks ({}); relying on load order",
                    e
                );
                false
            }
        }
    }

    async fn run_phases(
        &mut self,
        snapshot: &SnapshotReader,
        report: &mut RestoreReport,
    ) -> Result<()> {
        let schema = snapshot.schema();
        self.create_enums(schema, report).await?;
        self.create_tables(schema, report).await?;
        self.attach_constraints(schema, report).await?;
        self.load_data(snapshot, report).await
    }

    async fn create_enums(&mut self, schema: &Schema, report: &mut RestoreReport) -> Result<()> {
        for enum_type in &schema.enums {
            if self.writer.create_enum(enum_type).await? {
                debug!("Created enum {}", enum_type.name);
                report.enums_created += 1;
            }
        }
        self.advance(RestorePhase::EnumsCreated, report);
        Ok(())
    }

    async fn create_tables(&mut self, schema: &Schema, report: &mut RestoreReport) -> Result<()> {
        for table in &schema.tables {
            if self.writer.table_exists(&table.name).await? {
                debug!("Truncating existing table {}", table.name);
                self.writer.truncate_table(&table.name).await?;
                report.tables_truncated += 1;
            } else {
                debug!("Creating table {}", table.name);
                self.writer.create_table(table, schema).await?;
                report.tables_created += 1;
            }
        }
        self.advance(RestorePhase::TablesCreated, report);
        Ok(())
    }

    async fn attach_constraints(
        &mut self,
        schema: &Schema,
        report: &mut RestoreReport,
    ) -> Result<()> {
        for table in &schema.tables {
            for (column, fk) in table.foreign_keys() {
                let references = format!("{}.{}", fk.table, fk.column);
                let missing = if !self.writer.table_exists(&fk.table).await? {
                    Some(format!("referenced table {} does not exist on target", fk.table))
                } else if !self.writer.column_exists(&fk.table, &fk.column).await? {
                    Some(format!("referenced column {} does not exist on target", references))
                } else {
                    None
                };

                let reason = match missing {
                    Some(reason) => reason,
                    None => match self.writer.create_foreign_key(&table.name, &column.name, fk).await {
                        Ok(ConstraintOutcome::Created) => {
                            report.constraints_created += 1;
                            continue;
                        }
                        Ok(ConstraintOutcome::AlreadyExists) => {
                            report.constraints_existing += 1;
                            continue;
                        }
                        Err(e @ SnapshotError::Ddl { .. }) => e.to_string(),
                        Err(e) => return Err(e),
                    },
                };

                warn!(
                    "Skipping foreign key {}.{} -> {}: {}",
                    table.name, column.name, references, reason
                );
                report.skipped_constraints.push(SkippedConstraint {
                    table: table.name.clone(),
                    column: column.name.clone(),
                    references,
                    reason,
                });
            }
        }
        self.advance(RestorePhase::ConstraintsAttached, report);
        Ok(())
    }

    async fn load_data(&mut self, snapshot: &SnapshotReader, report: &mut RestoreReport) -> Result<()> {
        let schema = snapshot.schema();
        let order = dependency_order(&schema.tables);
        for edge in &order.broken_edges {
            warn!(
                "Foreign key cycle: {}.{} -> {} loads out of order",
                edge.from_table, edge.column, edge.to_table
            );
        }

        for name in &order.tables {
            let Some(table) = schema.table(name) else {
                continue;
            };
            match self.load_table(snapshot, table, report).await {
                Ok(rows) => {
                    info!("{}: loaded {} rows", table.name, rows);
                    report.rows_loaded += rows;
                    report.tables.push(TableCount {
                        table: table.name.clone(),
                        rows,
                    });
                }
                Err(e) if e.is_table_scoped() => {
                    error!("{}: load failed, rolled back: {}", table.name, e);
                    report.failed_tables.push(FailedTable {
                        table: table.name.clone(),
                        error: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
        self.advance(RestorePhase::DataLoaded, report);
        Ok(())
    }

    /// Load one table inside its own transaction.
    async fn load_table(
        &mut self,
        snapshot: &SnapshotReader,
        table: &Table,
        report: &mut RestoreReport,
    ) -> Result<u64> {
        let Some(rows) = snapshot.rows(table)? else {
            warn!("{}: no row file, nothing to load", table.name);
            return Ok(0);
        };

        self.writer.begin_table(table).await?;
        match self.write_rows(snapshot.schema(), table, rows, report).await {
            Ok(written) => {
                self.writer.commit_table(table).await?;
                Ok(written)
            }
            Err(e) => {
                if let Err(rollback) = self.writer.rollback_table(table).await {
                    warn!("{}: rollback failed: {}", table.name, rollback);
                }
                Err(e)
            }
        }
    }

    async fn write_rows(
        &mut self,
        schema: &Schema,
        table: &Table,
        rows: impl Iterator<Item = Result<Row>>,
        report: &mut RestoreReport,
    ) -> Result<u64> {
        let domains: Vec<Option<&[String]>> = table
            .columns
            .iter()
            .map(|c| c.enum_name.as_ref().and_then(|_| schema.enum_values(c)))
            .collect();

        let batch_size = self.options.batch_size.max(1);
        let mut pending: Vec<Row> = Vec::with_capacity(batch_size);
        // File row number of each pending row, to report skips.
        let mut numbers: Vec<u64> = Vec::with_capacity(batch_size);
        let mut written = 0u64;

        for (idx, row) in rows.enumerate() {
            let row = row?;
            let number = idx as u64 + 1;
            if let Some(reason) = enum_violation(table, &domains, &row) {
                warn!("{}: skipping row {}: {}", table.name, number, reason);
                report.skipped_rows.push(SkippedRow {
                    table: table.name.clone(),
                    row: number,
                    reason,
                });
                continue;
            }
            pending.push(row);
            numbers.push(number);
            if pending.len() >= batch_size {
                written += self.flush(table, &mut pending, &mut numbers, report).await?;
            }
        }
        if !pending.is_empty() {
            written += self.flush(table, &mut pending, &mut numbers, report).await?;
        }
        Ok(written)
    }

    async fn flush(
        &mut self,
        table: &Table,
        pending: &mut Vec<Row>,
        numbers: &mut Vec<u64>,
        report: &mut RestoreReport,
    ) -> Result<u64> {
        let batch = Batch::new(std::mem::take(pending));
        let outcome = self.writer.write_batch(table, batch).await?;
        for (idx, reason) in outcome.skipped {
            report.skipped_rows.push(SkippedRow {
                table: table.name.clone(),
                row: numbers.get(idx).copied().unwrap_or_default(),
                reason,
            });
        }
        numbers.clear();
        Ok(outcome.written)
    }
}

/// Describe the first enum value in `row` outside its column's domain.
fn enum_violation(table: &Table, domains: &[Option<&[String]>], row: &Row) -> Option<String> {
    for ((column, domain), value) in table.columns.iter().zip(domains).zip(row) {
        let (Some(domain), SqlValue::Text(v)) = (domain, value) else {
            continue;
        };
        if !domain.iter().any(|d| d == v) {
            return Some(format!(
                "value {:?} is not a member of enum column {}",
                v, column.name
            ));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use async_trait::async_trait;

    use super::*;
    use crate::core::schema::{Column, ColumnDefault, Engine, EnumType, ForeignKey};
    use crate::core::traits::WriteOutcome;
    use crate::snapshot::SnapshotWriter;

    /// In-memory target recording every call.
    #[derive(Default)]
    struct FakeWriter {
        tables: HashMap<String, Vec<String>>,
        data: HashMap<String, Vec<Row>>,
        staged: Vec<Row>,
        enums: HashSet<String>,
        constraints: Vec<String>,
        calls: Vec<String>,
        fail_suspend: bool,
        reject_table: Option<String>,
    }

    impl FakeWriter {
        fn with_table(mut self, name: &str, columns: &[&str]) -> Self {
            self.tables
                .insert(name.into(), columns.iter().map(|c| c.to_string()).collect());
            self
        }
    }

    #[async_trait]
    impl TargetWriter for FakeWriter {
        fn engine(&self) -> Engine {
            Engine::Postgres
        }

        async fn suspend_constraints(&mut self) -> Result<()> {
            self.calls.push("suspend".into());
            if self.fail_suspend {
                return Err(SnapshotError::connection("permission denied", "suspend"));
            }
            Ok(())
        }

        async fn resume_constraints(&mut self) -> Result<()> {
            self.calls.push("resume".into());
            Ok(())
        }

        async fn create_enum(&mut self, enum_type: &EnumType) -> Result<bool> {
            Ok(self.enums.insert(enum_type.name.clone()))
        }

        async fn table_exists(&mut self, table: &str) -> Result<bool> {
            Ok(self.tables.contains_key(table))
        }

        async fn column_exists(&mut self, table: &str, column: &str) -> Result<bool> {
            Ok(self
                .tables
                .get(table)
                .is_some_and(|cols| cols.iter().any(|c| c == column)))
        }

        async fn truncate_table(&mut self, table: &str) -> Result<()> {
            self.calls.push(format!("truncate {}", table));
            self.data.remove(table);
            Ok(())
        }

        async fn create_table(&mut self, table: &Table, _schema: &Schema) -> Result<()> {
            self.calls.push(format!("create {}", table.name));
            self.tables.insert(
                table.name.clone(),
                table.columns.iter().map(|c| c.name.clone()).collect(),
            );
            Ok(())
        }

        async fn create_foreign_key(
            &mut self,
            table: &str,
            column: &str,
            fk: &ForeignKey,
        ) -> Result<ConstraintOutcome> {
            let name = format!("{}.{}->{}.{}", table, column, fk.table, fk.column);
            if self.constraints.contains(&name) {
                return Ok(ConstraintOutcome::AlreadyExists);
            }
            self.constraints.push(name);
            Ok(ConstraintOutcome::Created)
        }

        async fn begin_table(&mut self, table: &Table) -> Result<()> {
            self.calls.push(format!("begin {}", table.name));
            self.staged.clear();
            Ok(())
        }

        async fn write_batch(&mut self, table: &Table, batch: Batch) -> Result<WriteOutcome> {
            if self.reject_table.as_deref() == Some(table.name.as_str()) {
                return Err(SnapshotError::ConstraintViolation {
                    table: table.name.clone(),
                    message: "duplicate key".into(),
                });
            }
            let written = batch.len() as u64;
            self.staged.extend(batch.rows);
            Ok(WriteOutcome {
                written,
                skipped: Vec::new(),
            })
        }

        async fn commit_table(&mut self, table: &Table) -> Result<()> {
            self.calls.push(format!("commit {}", table.name));
            let rows = std::mem::take(&mut self.staged);
            self.data.entry(table.name.clone()).or_default().extend(rows);
            Ok(())
        }

        async fn rollback_table(&mut self, table: &Table) -> Result<()> {
            self.calls.push(format!("rollback {}", table.name));
            self.staged.clear();
            Ok(())
        }

        async fn close(&mut self) {}
    }

    fn users_table() -> Table {
        let mut users = Table::new("users");
        users.columns.push(
            Column::new("id", "integer")
                .primary()
                .with_default(ColumnDefault::Sequence("users_id_seq".into())),
        );
        users.columns.push(Column::new("email", "text").unique());
        users.columns.push(Column::new("name", "text"));
        users
    }

    fn posts_table() -> Table {
        let mut posts = Table::new("posts");
        posts.columns.push(Column::new("id", "integer").primary());
        posts
            .columns
            .push(Column::new("user_id", "integer").references("users", "id"));
        posts
    }

    fn write_snapshot(dir: &std::path::Path, schema: &Schema, files: &[(&str, &str)]) -> SnapshotReader {
        SnapshotWriter::create(dir)
            .unwrap()
            .write_schema(schema)
            .unwrap();
        for (name, body) in files {
            std::fs::write(dir.join(format!("{}.csv", name)), body).unwrap();
        }
        SnapshotReader::open(dir).unwrap()
    }

    // =========================================================================
    // Phase tests
    // =========================================================================

    #[tokio::test]
    async fn test_users_round_trip_into_empty_target() {
        let tmp = tempfile::tempdir().unwrap();
        let mut schema = Schema::new(Engine::Postgres);
        schema.tables.push(users_table());
        let snapshot = write_snapshot(
            tmp.path(),
            &schema,
            &[("users", "id,email,name\n1,ada@example.com,Ada\n2,grace@example.com,NULL\n")],
        );

        let mut writer = FakeWriter::default();
        let report = RestoreOrchestrator::new(&mut writer, RestoreOptions::default())
            .run(&snapshot)
            .await
            .unwrap();

        assert_eq!(report.status, "completed");
        assert_eq!(report.phase, RestorePhase::Done);
        assert_eq!(report.tables_created, 1);
        assert_eq!(report.rows_loaded, 2);
        assert_eq!(
            writer.data["users"],
            vec![
                vec![SqlValue::Int(1), SqlValue::from("ada@example.com"), SqlValue::from("Ada")],
                vec![SqlValue::Int(2), SqlValue::from("grace@example.com"), SqlValue::Null],
            ]
        );
        assert_eq!(writer.calls.first().map(String::as_str), Some("suspend"));
        assert_eq!(writer.calls.last().map(String::as_str), Some("resume"));
    }

    #[tokio::test]
    async fn test_missing_referenced_table_skips_constraint_only() {
        let tmp = tempfile::tempdir().unwrap();
        let mut schema = Schema::new(Engine::Postgres);
        schema.tables.push(posts_table());
        let snapshot = write_snapshot(tmp.path(), &schema, &[("posts", "id,user_id\n1,7\n")]);

        let mut writer = FakeWriter::default();
        let report = RestoreOrchestrator::new(&mut writer, RestoreOptions::default())
            .run(&snapshot)
            .await
            .unwrap();

        assert_eq!(report.skipped_constraints.len(), 1);
        assert_eq!(report.skipped_constraints[0].references, "users.id");
        assert!(report.skipped_constraints[0].reason.contains("does not exist"));
        assert_eq!(report.status, "completed_with_warnings");
        assert!(!report.has_failures());
        assert_eq!(writer.data["posts"].len(), 1);
        assert!(writer.constraints.is_empty());
    }

    #[tokio::test]
    async fn test_missing_referenced_column_skips_constraint() {
        let tmp = tempfile::tempdir().unwrap();
        let mut schema = Schema::new(Engine::Postgres);
        schema.tables.push(posts_table());
        let snapshot = write_snapshot(tmp.path(), &schema, &[]);

        let mut writer = FakeWriter::default().with_table("users", &["uid"]);
        let report = RestoreOrchestrator::new(&mut writer, RestoreOptions::default())
            .run(&snapshot)
            .await
            .unwrap();
        assert_eq!(report.skipped_constraints.len(), 1);
        assert!(report.skipped_constraints[0].reason.contains("column users.id"));
    }

    #[tokio::test]
    async fn test_constraints_attached_after_all_tables_exist() {
        let tmp = tempfile::tempdir().unwrap();
        let mut schema = Schema::new(Engine::Postgres);
        // Referencing table first: creation order must not matter.
        schema.tables.push(posts_table());
        schema.tables.push(users_table());
        let snapshot = write_snapshot(
            tmp.path(),
            &schema,
            &[
                ("posts", "id,user_id\n1,1\n"),
                ("users", "id,email,name\n1,a@example.com,A\n"),
            ],
        );

        let mut writer = FakeWriter::default();
        let report = RestoreOrchestrator::new(&mut writer, RestoreOptions::default())
            .run(&snapshot)
            .await
            .unwrap();
        assert_eq!(report.constraints_created, 1);
        assert_eq!(writer.constraints, vec!["posts.user_id->users.id"]);

        // Load follows dependency order.
        let begins: Vec<&str> = writer
            .calls
            .iter()
            .filter_map(|c| c.strip_prefix("begin "))
            .collect();
        assert_eq!(begins, vec!["users", "posts"]);
    }

    #[tokio::test]
    async fn test_existing_table_is_truncated_and_rerun_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let mut schema = Schema::new(Engine::Postgres);
        schema.tables.push(users_table());
        schema.tables.push(posts_table());
        schema.enums.push(EnumType {
            name: "mood".into(),
            values: vec!["ok".into()],
        });
        let snapshot = write_snapshot(
            tmp.path(),
            &schema,
            &[("users", "id,email,name\n1,a@example.com,A\n")],
        );

        let mut writer = FakeWriter::default();
        let first = RestoreOrchestrator::new(&mut writer, RestoreOptions::default())
            .run(&snapshot)
            .await
            .unwrap();
        assert_eq!(first.enums_created, 1);
        let second = RestoreOrchestrator::new(&mut writer, RestoreOptions::default())
            .run(&snapshot)
            .await
            .unwrap();
        assert_eq!(second.enums_created, 0);
        assert_eq!(second.tables_created, 0);
        assert_eq!(second.tables_truncated, 2);
        assert_eq!(second.constraints_existing, 1);
        assert_eq!(writer.data["users"].len(), 1);
    }

    // =========================================================================
    // Row handling tests
    // =========================================================================

    #[tokio::test]
    async fn test_enum_value_outside_domain_skips_row() {
        let tmp = tempfile::tempdir().unwrap();
        let mut schema = Schema::new(Engine::Mysql);
        let mut accounts = Table::new("accounts");
        accounts.columns.push(Column::new("id", "int").primary());
        accounts.columns.push(Column::new("status", "enum").with_enum(
            "accounts_status_enum",
            vec!["active".into(), "inactive".into()],
        ));
        schema.tables.push(accounts);
        let snapshot = write_snapshot(
            tmp.path(),
            &schema,
            &[("accounts", "id,status\n1,active\n2,deleted\n3,NULL\n")],
        );

        let mut writer = FakeWriter::default();
        let report = RestoreOrchestrator::new(&mut writer, RestoreOptions::default())
            .run(&snapshot)
            .await
            .unwrap();
        assert_eq!(report.rows_loaded, 2);
        assert_eq!(report.skipped_rows.len(), 1);
        assert_eq!(report.skipped_rows[0].row, 2);
        assert!(report.skipped_rows[0].reason.contains("deleted"));
    }

    #[tokio::test]
    async fn test_row_format_error_fails_only_that_table() {
        let tmp = tempfile::tempdir().unwrap();
        let mut schema = Schema::new(Engine::Postgres);
        schema.tables.push(users_table());
        schema.tables.push(posts_table());
        let snapshot = write_snapshot(
            tmp.path(),
            &schema,
            &[
                ("users", "id,email,name\n1,a@example.com\n"),
                ("posts", "id,user_id\n1,1\n2,1\n"),
            ],
        );

        let mut writer = FakeWriter::default();
        let report = RestoreOrchestrator::new(
            &mut writer,
            RestoreOptions {
                batch_size: 1,
                ..Default::default()
            },
        )
        .run(&snapshot)
        .await
        .unwrap();

        assert!(report.has_failures());
        assert_eq!(report.status, "failed");
        assert_eq!(report.failed_tables[0].table, "users");
        assert!(report.failed_tables[0].error.contains("column count mismatch"));
        assert!(writer.calls.contains(&"rollback users".to_string()));
        assert!(!writer.data.contains_key("users"));
        assert_eq!(writer.data["posts"].len(), 2);
    }

    #[tokio::test]
    async fn test_unrecognized_violation_rolls_back_table() {
        let tmp = tempfile::tempdir().unwrap();
        let mut schema = Schema::new(Engine::Postgres);
        schema.tables.push(users_table());
        let snapshot = write_snapshot(
            tmp.path(),
            &schema,
            &[("users", "id,email,name\n1,a@example.com,A\n")],
        );

        let mut writer = FakeWriter {
            reject_table: Some("users".into()),
            ..Default::default()
        };
        let report = RestoreOrchestrator::new(&mut writer, RestoreOptions::default())
            .run(&snapshot)
            .await
            .unwrap();
        assert_eq!(report.failed_tables.len(), 1);
        assert!(writer.calls.contains(&"rollback users".to_string()));
    }

    #[tokio::test]
    async fn test_suspend_failure_is_not_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let mut schema = Schema::new(Engine::Postgres);
        schema.tables.push(users_table());
        let snapshot = write_snapshot(tmp.path(), &schema, &[]);

        let mut writer = FakeWriter {
            fail_suspend: true,
            ..Default::default()
        };
        let report = RestoreOrchestrator::new(&mut writer, RestoreOptions::default())
            .run(&snapshot)
            .await
            .unwrap();
        assert_eq!(report.phase, RestorePhase::Done);
        assert!(!writer.calls.contains(&"resume".to_string()));
    }

    #[tokio::test]
    async fn test_suspension_can_be_disabled() {
        let tmp = tempfile::tempdir().unwrap();
        let mut schema = Schema::new(Engine::Postgres);
        schema.tables.push(users_table());
        let snapshot = write_snapshot(tmp.path(), &schema, &[]);

        let mut writer = FakeWriter::default();
        RestoreOrchestrator::new(
            &mut writer,
            RestoreOptions {
                suspend_constraints: false,
                ..Default::default()
            },
        )
        .run(&snapshot)
        .await
        .unwrap();
        assert!(!writer.calls.iter().any(|c| c == "suspend" || c == "resume"));
    }

    #[test]
    fn test_phase_order_and_names() {
        assert!(RestorePhase::Idle < RestorePhase::EnumsCreated);
        assert!(RestorePhase::ConstraintsAttached < RestorePhase::DataLoaded);
        assert_eq!(RestorePhase::TablesCreated.to_string(), "TablesCreated");
    }
}
