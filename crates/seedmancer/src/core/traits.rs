//! Core traits for engine-agnostic snapshot work.
//!
//! - [`SourceReader`]: introspects a live database and streams its rows
//! - [`TargetWriter`]: one restore session against a target database
//! - [`Dialect`]: DDL text generation for one engine
//!
//! Engines implement these in `drivers/`; the orchestrator only talks to the
//! traits, which keeps it testable with in-memory fakes.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;

use super::identifier::Quoter;
use super::schema::{Column, ColumnDefault, Engine, EnumType, ForeignKey, Schema, Table};
use super::value::Batch;

/// Options for reading rows from a table.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Table name.
    pub table: String,
    /// Columns to read, in snapshot order.
    pub columns: Vec<String>,
    /// Declared column types, parallel to `columns`.
    pub col_types: Vec<String>,
    /// Columns giving a stable row order across batches.
    pub order_by: Vec<String>,
    /// Number of rows per batch.
    pub batch_size: usize,
}

impl ReadOptions {
    /// Read every column of `table`, ordered by its primary key (or by all
    /// columns when it has none).
    pub fn for_table(table: &Table, batch_size: usize) -> Self {
        let columns: Vec<String> = table.columns.iter().map(|c| c.name.clone()).collect();
        let pk: Vec<String> = table.primary_key().map(|c| c.name.clone()).collect();
        Self {
            table: table.name.clone(),
            col_types: table.columns.iter().map(|c| c.data_type.clone()).collect(),
            order_by: if pk.is_empty() { columns.clone() } else { pk },
            columns,
            batch_size: batch_size.max(1),
        }
    }
}

/// Read schema and rows from a live database.
#[async_trait]
pub trait SourceReader: Send + Sync {
    /// Introspect every base table in the working namespace.
    async fn extract_schema(&self) -> Result<Schema>;

    /// Start streaming rows from a table.
    ///
    /// The reader spawns a background task that fills a bounded channel, so a
    /// slow consumer applies backpressure to the query loop. The final batch
    /// has `is_last` set; an `Err` ends the stream.
    fn read_table(&self, opts: ReadOptions) -> mpsc::Receiver<Result<Batch>>;

    /// Engine this reader is connected to.
    fn engine(&self) -> Engine;

    /// Close the connection pool.
    async fn close(&self);
}

/// Result of attaching a foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintOutcome {
    Created,
    AlreadyExists,
}

/// Rows accepted and rejected by one [`TargetWriter::write_batch`] call.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct WriteOutcome {
    pub written: u64,
    /// Index within the batch and reason, for rows the target refused.
    pub skipped: Vec<(usize, String)>,
}

/// One restore session against a target database.
///
/// Methods take `&mut self` because engines keep session state (constraint
/// checks, open transactions) on a single connection for the whole restore.
#[async_trait]
pub trait TargetWriter: Send {
    /// Engine this writer targets.
    fn engine(&self) -> Engine;

    // ===== Session =====

    /// Suspend foreign key enforcement for this session.
    async fn suspend_constraints(&mut self) -> Result<()>;

    /// Restore foreign key enforcement for this session.
    async fn resume_constraints(&mut self) -> Result<()>;

    // ===== Schema Operations =====

    /// Create an enum type. Returns `false` if it already existed or the
    /// engine has no standalone enum types.
    async fn create_enum(&mut self, enum_type: &EnumType) -> Result<bool>;

    /// Check if a table exists.
    async fn table_exists(&mut self, table: &str) -> Result<bool>;

    /// Check if a column exists on a table.
    async fn column_exists(&mut self, table: &str, column: &str) -> Result<bool>;

    /// Remove all rows from an existing table.
    async fn truncate_table(&mut self, table: &str) -> Result<()>;

    /// Create a table without foreign key constraints.
    async fn create_table(&mut self, table: &Table, schema: &Schema) -> Result<()>;

    /// Attach a foreign key constraint for `column`.
    async fn create_foreign_key(
        &mut self,
        table: &str,
        column: &str,
        fk: &ForeignKey,
    ) -> Result<ConstraintOutcome>;

    // ===== Data Operations =====

    /// Open the local transaction that wraps one table's load.
    async fn begin_table(&mut self, table: &Table) -> Result<()>;

    /// Write decoded rows to the table inside the open transaction.
    async fn write_batch(&mut self, table: &Table, batch: Batch) -> Result<WriteOutcome>;

    /// Commit the table's transaction and resynchronize its sequences.
    async fn commit_table(&mut self, table: &Table) -> Result<()>;

    /// Roll back the table's transaction after a failure.
    async fn rollback_table(&mut self, table: &Table) -> Result<()>;

    /// Release the session.
    async fn close(&mut self);
}

/// Result of mapping a declared type onto a target engine.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeMapping {
    /// Target type string (e.g., "varchar(255)", "bigint").
    pub target_type: String,
    /// Whether this mapping loses data or precision.
    pub is_lossy: bool,
    /// Warning message for lossy mappings.
    pub warning: Option<String>,
}

impl TypeMapping {
    /// Create a lossless type mapping.
    pub fn lossless(target_type: impl Into<String>) -> Self {
        Self {
            target_type: target_type.into(),
            is_lossy: false,
            warning: None,
        }
    }

    /// Create a lossy type mapping with a warning.
    pub fn lossy(target_type: impl Into<String>, warning: impl Into<String>) -> Self {
        Self {
            target_type: target_type.into(),
            is_lossy: true,
            warning: Some(warning.into()),
        }
    }
}

/// DDL text generation for one engine.
///
/// `create_table_sql` and `add_foreign_key_sql` are template methods built on
/// the per-engine hooks; every identifier and string goes through
/// [`Dialect::quoter`].
pub trait Dialect: Send + Sync {
    /// Get the dialect identifier (e.g., "postgres", "mysql").
    fn name(&self) -> &str;

    /// Identifier and literal quoting for this engine.
    fn quoter(&self) -> &dyn Quoter;

    /// Map a column's declared type (captured from `schema.database_type`)
    /// to a type this engine accepts.
    fn map_type(&self, column: &Column, schema: &Schema) -> Result<TypeMapping>;

    /// Full column definition: name, type, nullability, default.
    fn column_definition(&self, column: &Column, schema: &Schema) -> Result<String>;

    /// Statement creating an enum type, or `None` when enums are inline.
    fn create_enum_sql(&self, enum_type: &EnumType) -> Result<Option<String>>;

    /// Statement removing all rows from a table.
    fn truncate_sql(&self, table: &str) -> Result<String>;

    /// Suffix appended after the closing parenthesis of CREATE TABLE.
    fn table_options(&self) -> &str {
        ""
    }

    /// Keyword introducing a single-column unique constraint.
    fn unique_keyword(&self) -> &str {
        "UNIQUE"
    }

    /// Translate an expression default captured from `source` into this
    /// engine's syntax, or `None` when it has no equivalent.
    fn translate_expression(&self, expr: &str, source: Engine, target_type: &str)
        -> Option<String>;

    /// Render the `DEFAULT ...` clause for a literal or expression default.
    /// Sequence defaults are handled by `column_definition`.
    fn default_clause(&self, column: &Column, target_type: &str, source: Engine) -> Option<String> {
        match &column.default {
            ColumnDefault::Null | ColumnDefault::Sequence(_) => None,
            ColumnDefault::Literal(v) => {
                if target_type.eq_ignore_ascii_case("boolean") {
                    return crate::codec::parse_bool(v).map(|b| format!(" DEFAULT {}", b));
                }
                let numeric = v.parse::<f64>().is_ok() && !is_textual_type(target_type);
                if numeric {
                    Some(format!(" DEFAULT {}", v))
                } else {
                    Some(format!(" DEFAULT {}", self.quoter().quote_literal(v)))
                }
            }
            ColumnDefault::Expression(e) => match self.translate_expression(e, source, target_type) {
                Some(sql) => Some(format!(" DEFAULT {}", sql)),
                None => {
                    tracing::warn!(
                        "Dropping default '{}' on column '{}': no {} equivalent",
                        e,
                        column.name,
                        self.name()
                    );
                    None
                }
            },
        }
    }

    /// CREATE TABLE without foreign keys: columns, primary key, unique keys.
    fn create_table_sql(&self, table: &Table, schema: &Schema) -> Result<String> {
        let q = self.quoter();
        let mut defs = Vec::with_capacity(table.columns.len() + 2);
        for column in &table.columns {
            defs.push(self.column_definition(column, schema)?);
        }

        let pk: Vec<&str> = table.primary_key().map(|c| c.name.as_str()).collect();
        if !pk.is_empty() {
            defs.push(format!("PRIMARY KEY ({})", q.quote_list(&pk)?));
        }

        for column in table.columns.iter().filter(|c| c.is_unique && !c.is_primary) {
            defs.push(format!(
                "{} ({})",
                self.unique_keyword(),
                q.quote_ident(&column.name)?
            ));
        }

        let mut sql = format!(
            "CREATE TABLE {} (\n  {}\n)",
            q.quote_ident(&table.name)?,
            defs.join(",\n  ")
        );
        let options = self.table_options();
        if !options.is_empty() {
            sql.push(' ');
            sql.push_str(options);
        }
        Ok(sql)
    }

    /// ALTER TABLE ... ADD CONSTRAINT <table>_<column>_fkey FOREIGN KEY ...
    fn add_foreign_key_sql(&self, table: &str, column: &str, fk: &ForeignKey) -> Result<String> {
        let q = self.quoter();
        Ok(format!(
            "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            q.quote_ident(table)?,
            q.quote_ident(&format!("{}_{}_fkey", table, column))?,
            q.quote_ident(column)?,
            q.quote_ident(&fk.table)?,
            q.quote_ident(&fk.column)?
        ))
    }
}

fn is_textual_type(target_type: &str) -> bool {
    let t = target_type.to_ascii_lowercase();
    t.contains("char") || t.contains("text") || t.starts_with("enum") || t.starts_with('"')
}
