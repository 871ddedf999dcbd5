//! PostgreSQL restore session.
//!
//! Holds one pooled connection for the whole restore so that
//! `session_replication_role` and per-table transactions apply to every
//! statement. Rows are loaded with `COPY ... FROM STDIN` in text format.

use async_trait::async_trait;
use bytes::Bytes;
use deadpool_postgres::{Object, Pool};
use futures::SinkExt;
use tokio_postgres::error::SqlState;
use tracing::{debug, info, warn};

use crate::core::identifier::{PgQuoter, Quoter};
use crate::core::schema::{ColumnDefault, Engine, EnumType, ForeignKey, Schema, Table};
use crate::core::traits::{ConstraintOutcome, Dialect, TargetWriter, WriteOutcome};
use crate::core::value::{Batch, SqlValue};
use crate::drivers::common::ConnectionUrl;
use crate::error::{Result, SnapshotError};

use super::{connect_pool, PostgresDialect};

/// PostgreSQL target writer.
pub struct PostgresWriter {
    pool: Pool,
    client: Object,
    dialect: PostgresDialect,
}

impl PostgresWriter {
    /// Open a restore session against the database named in `conn`.
    pub async fn connect(conn: &ConnectionUrl) -> Result<Self> {
        let pool = connect_pool(conn, 1).await?;
        let client = pool
            .get()
            .await
            .map_err(|e| SnapshotError::connection(e, "opening PostgreSQL restore session"))?;
        Ok(Self {
            pool,
            client,
            dialect: PostgresDialect::new(),
        })
    }

    async fn exists(
        &self,
        sql: &str,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
    ) -> Result<bool> {
        let row = self.client.query_one(sql, params).await?;
        Ok(row.try_get::<_, bool>(0)?)
    }

    /// Move each sequence-backed column's sequence past the loaded maximum.
    async fn reset_sequences(&self, table: &Table) {
        let q = PgQuoter;
        for column in table.columns.iter().filter(|c| uses_sequence(&c.default, &c.data_type)) {
            let sequence = match self
                .client
                .query_one(
                    "SELECT pg_get_serial_sequence($1, $2)",
                    &[&quoted_or_raw(&q, &table.name), &column.name],
                )
                .await
                .ok()
                .and_then(|row| row.try_get::<_, Option<String>>(0).ok().flatten())
            {
                Some(seq) => seq,
                None => match &column.default {
                    ColumnDefault::Sequence(name) => name.clone(),
                    _ => format!("{}_{}_seq", table.name, column.name),
                },
            };

            let (Ok(col), Ok(tbl)) = (q.quote_ident(&column.name), q.quote_ident(&table.name)) else {
                continue;
            };
            let sql = format!(
                "SELECT setval($1::text::regclass, COALESCE((SELECT MAX({col}) FROM {tbl}), 0) + 1, false)",
            );
            match self.client.query(&sql, &[&sequence]).await {
                Ok(_) => debug!("Reset sequence {} for {}.{}", sequence, table.name, column.name),
                Err(e) => warn!(
                    "Could not reset sequence {} for {}.{}: {}",
                    sequence, table.name, column.name, e
                ),
            }
        }
    }
}

#[async_trait]
impl TargetWriter for PostgresWriter {
    fn engine(&self) -> Engine {
        Engine::Postgres
    }

    async fn suspend_constraints(&mut self) -> Result<()> {
        self.client
            .batch_execute("SET session_replication_role = 'replica'")
            .await?;
        Ok(())
    }

    async fn resume_constraints(&mut self) -> Result<()> {
        self.client
            .batch_execute("SET session_replication_role = 'origin'")
            .await?;
        Ok(())
    }

    async fn create_enum(&mut self, enum_type: &EnumType) -> Result<bool> {
        let exists = self
            .exists(
                "SELECT EXISTS (SELECT 1 FROM pg_type t \
                 JOIN pg_namespace n ON n.oid = t.typnamespace \
                 WHERE t.typname = $1 AND n.nspname = current_schema())",
                &[&enum_type.name],
            )
            .await?;
        if exists {
            debug!("Enum type {} already exists", enum_type.name);
            return Ok(false);
        }

        let Some(sql) = self.dialect.create_enum_sql(enum_type)? else {
            return Ok(false);
        };
        match self.client.batch_execute(&sql).await {
            Ok(()) => Ok(true),
            Err(e) if is_duplicate(&e) => Ok(false),
            Err(e) => Err(SnapshotError::ddl(&enum_type.name, e)),
        }
    }

    async fn table_exists(&mut self, table: &str) -> Result<bool> {
        self.exists(
            "SELECT EXISTS (SELECT 1 FROM information_schema.tables \
             WHERE table_schema = current_schema() AND table_name = $1)",
            &[&table],
        )
        .await
    }

    async fn column_exists(&mut self, table: &str, column: &str) -> Result<bool> {
        self.exists(
            "SELECT EXISTS (SELECT 1 FROM information_schema.columns \
             WHERE table_schema = current_schema() AND table_name = $1 AND column_name = $2)",
            &[&table, &column],
        )
        .await
    }

    async fn truncate_table(&mut self, table: &str) -> Result<()> {
        let sql = self.dialect.truncate_sql(table)?;
        self.client
            .batch_execute(&sql)
            .await
            .map_err(|e| SnapshotError::ddl(table, e))
    }

    async fn create_table(&mut self, table: &Table, schema: &Schema) -> Result<()> {
        let sql = self.dialect.create_table_sql(table, schema)?;
        debug!("{}", sql);
        self.client
            .batch_execute(&sql)
            .await
            .map_err(|e| SnapshotError::ddl(&table.name, e))
    }

    async fn create_foreign_key(
        &mut self,
        table: &str,
        column: &str,
        fk: &ForeignKey,
    ) -> Result<ConstraintOutcome> {
        let sql = self.dialect.add_foreign_key_sql(table, column, fk)?;
        match self.client.batch_execute(&sql).await {
            Ok(()) => Ok(ConstraintOutcome::Created),
            Err(e) if is_duplicate(&e) => Ok(ConstraintOutcome::AlreadyExists),
            Err(e) => Err(SnapshotError::ddl(format!("{}_{}_fkey", table, column), e)),
        }
    }

    async fn begin_table(&mut self, _table: &Table) -> Result<()> {
        self.client.batch_execute("BEGIN").await?;
        Ok(())
    }

    async fn write_batch(&mut self, table: &Table, batch: Batch) -> Result<WriteOutcome> {
        if batch.is_empty() {
            return Ok(WriteOutcome::default());
        }
        let q = PgQuoter;
        let names: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
        let copy_sql = format!(
            "COPY {} ({}) FROM STDIN WITH (FORMAT TEXT)",
            q.quote_ident(&table.name)?,
            q.quote_list(&names)?
        );

        let mut text_buf = String::with_capacity(batch.len() * 128);
        for row in &batch.rows {
            encode_copy_row(row, &mut text_buf);
        }
        let written = batch.len() as u64;

        let sink = self
            .client
            .copy_in(&copy_sql)
            .await
            .map_err(|e| SnapshotError::load(&table.name, format!("initiating COPY: {}", e)))?;
        tokio::pin!(sink);
        sink.send(Bytes::from(text_buf))
            .await
            .map_err(|e| SnapshotError::load(&table.name, format!("sending COPY data: {}", e)))?;
        sink.finish()
            .await
            .map_err(|e| SnapshotError::load(&table.name, format!("finishing COPY: {}", e)))?;

        Ok(WriteOutcome {
            written,
            skipped: Vec::new(),
        })
    }

    async fn commit_table(&mut self, table: &Table) -> Result<()> {
        self.client.batch_execute("COMMIT").await?;
        self.reset_sequences(table).await;
        Ok(())
    }

    async fn rollback_table(&mut self, _table: &Table) -> Result<()> {
        self.client.batch_execute("ROLLBACK").await?;
        Ok(())
    }

    async fn close(&mut self) {
        self.pool.close();
        info!("PostgreSQL restore session closed");
    }
}

fn is_duplicate(e: &tokio_postgres::Error) -> bool {
    matches!(
        e.code(),
        Some(c) if *c == SqlState::DUPLICATE_OBJECT || *c == SqlState::DUPLICATE_TABLE
    ) || e.to_string().contains("already exists")
}

fn uses_sequence(default: &ColumnDefault, data_type: &str) -> bool {
    default.is_sequence()
        || matches!(
            data_type.to_ascii_lowercase().as_str(),
            "serial" | "bigserial" | "smallserial"
        )
}

fn quoted_or_raw(q: &PgQuoter, name: &str) -> String {
    q.quote_ident(name).unwrap_or_else(|_| name.to_string())
}

/// Append one row in COPY text format.
fn encode_copy_row(row: &[SqlValue], buf: &mut String) {
    for (i, value) in row.iter().enumerate() {
        if i > 0 {
            buf.push('\t');
        }
        buf.push_str(&copy_text_value(value));
    }
    buf.push('\n');
}

fn copy_text_value(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => "\\N".to_string(),
        SqlValue::Bool(b) => (if *b { "t" } else { "f" }).to_string(),
        SqlValue::Int(i) => i.to_string(),
        SqlValue::Float(f) => f.to_string(),
        SqlValue::Decimal(d) => d.to_string(),
        SqlValue::Uuid(u) => u.hyphenated().to_string(),
        SqlValue::Timestamp(ts) => ts.to_rfc3339(),
        SqlValue::Date(d) => d.format("%Y-%m-%d").to_string(),
        SqlValue::Text(s) | SqlValue::Json(s) | SqlValue::Array(s) => escape_copy_text(s),
    }
}

/// Escape a string for COPY text format.
fn escape_copy_text(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '\t' => result.push_str("\\t"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            _ => result.push(c),
        }
    }
    result
}
