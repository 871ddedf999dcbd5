//! MySQL/MariaDB restore session.
//!
//! Uses mysql_async with a single connection held for the whole restore, so
//! `FOREIGN_KEY_CHECKS` and the per-table transaction cover every statement.
//! Rows are inserted one parameterized statement at a time; rows the server
//! truncates are skipped rather than failing the table.

use async_trait::async_trait;
use chrono::Utc;
use mysql_async::prelude::*;
use mysql_async::{Conn, Opts, OptsBuilder, Pool, SslOpts, Value};
use tracing::{debug, info, warn};

use crate::codec::array;
use crate::core::identifier::{MysqlQuoter, Quoter};
use crate::core::schema::{Engine, EnumType, ForeignKey, Schema, Table};
use crate::core::traits::{ConstraintOutcome, Dialect, TargetWriter, WriteOutcome};
use crate::core::value::{Batch, SqlValue};
use crate::drivers::common::{redact_url, ConnectionUrl, SslMode};
use crate::error::{Result, SnapshotError};

use super::MysqlDialect;

/// Server error codes for objects that already exist.
const ER_DUP_KEYNAME: u16 = 1061;
const ER_FK_DUP_NAME: u16 = 1826;

/// MySQL target writer.
pub struct MysqlWriter {
    pool: Pool,
    conn: Option<Conn>,
    dialect: MysqlDialect,
}

impl MysqlWriter {
    /// Open a restore session against the database named in `conn`.
    pub async fn connect(conn: &ConnectionUrl) -> Result<Self> {
        let opts = Opts::from_url(&conn.url).map_err(|e| {
            SnapshotError::connection(e, format!("parsing {}", redact_url(&conn.url)))
        })?;

        let mut builder = OptsBuilder::from_opts(opts)
            .init(vec!["SET NAMES utf8mb4", "SET time_zone = '+00:00'"]);
        match ssl_opts(conn.ssl_mode) {
            Some(ssl) => builder = builder.ssl_opts(ssl),
            None => warn!("MySQL TLS is disabled. Credentials will be transmitted in plaintext."),
        }

        let pool = Pool::new(builder);
        let mut session = pool
            .get_conn()
            .await
            .map_err(|e| SnapshotError::connection(e, "opening MySQL restore session"))?;
        session
            .query_drop("SELECT 1")
            .await
            .map_err(|e| SnapshotError::connection(e, "testing MySQL connection"))?;

        info!("Connected to MySQL target: {}/{}", conn.host, conn.database);
        Ok(Self {
            pool,
            conn: Some(session),
            dialect: MysqlDialect::new(),
        })
    }

    fn conn(&mut self) -> Result<&mut Conn> {
        self.conn
            .as_mut()
            .ok_or_else(|| SnapshotError::connection("session already closed", "MySQL restore"))
    }

    async fn count(&mut self, sql: &str, params: Vec<Value>) -> Result<i64> {
        let count: Option<i64> = self.conn()?.exec_first(sql, params).await?;
        Ok(count.unwrap_or(0))
    }
}

#[async_trait]
impl TargetWriter for MysqlWriter {
    fn engine(&self) -> Engine {
        Engine::Mysql
    }

    async fn suspend_constraints(&mut self) -> Result<()> {
        self.conn()?.query_drop("SET FOREIGN_KEY_CHECKS = 0").await?;
        Ok(())
    }

    async fn resume_constraints(&mut self) -> Result<()> {
        self.conn()?.query_drop("SET FOREIGN_KEY_CHECKS = 1").await?;
        Ok(())
    }

    async fn create_enum(&mut self, enum_type: &EnumType) -> Result<bool> {
        debug!("Enum {} is declared inline on its columns", enum_type.name);
        Ok(false)
    }

    async fn table_exists(&mut self, table: &str) -> Result<bool> {
        let n = self
            .count(
                "SELECT COUNT(*) FROM information_schema.tables \
                 WHERE table_schema = DATABASE() AND table_name = ?",
                vec![Value::from(table)],
            )
            .await?;
        Ok(n > 0)
    }

    async fn column_exists(&mut self, table: &str, column: &str) -> Result<bool> {
        let n = self
            .count(
                "SELECT COUNT(*) FROM information_schema.columns \
                 WHERE table_schema = DATABASE() AND table_name = ? AND column_name = ?",
                vec![Value::from(table), Value::from(column)],
            )
            .await?;
        Ok(n > 0)
    }

    async fn truncate_table(&mut self, table: &str) -> Result<()> {
        let sql = self.dialect.truncate_sql(table)?;
        self.conn()?
            .query_drop(sql)
            .await
            .map_err(|e| SnapshotError::ddl(table, e))
    }

    async fn create_table(&mut self, table: &Table, schema: &Schema) -> Result<()> {
        let sql = self.dialect.create_table_sql(table, schema)?;
        debug!("{}", sql);
        self.conn()?
            .query_drop(sql)
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
        match self.conn()?.query_drop(sql).await {
            Ok(()) => Ok(ConstraintOutcome::Created),
            Err(mysql_async::Error::Server(ref e))
                if e.code == ER_FK_DUP_NAME
                    || e.code == ER_DUP_KEYNAME
                    || e.message.contains("already exists") =>
            {
                Ok(ConstraintOutcome::AlreadyExists)
            }
            Err(e) => Err(SnapshotError::ddl(format!("{}_{}_fkey", table, column), e)),
        }
    }

    async fn begin_table(&mut self, _table: &Table) -> Result<()> {
        self.conn()?.query_drop("START TRANSACTION").await?;
        Ok(())
    }

    async fn write_batch(&mut self, table: &Table, batch: Batch) -> Result<WriteOutcome> {
        let q = MysqlQuoter;
        let names: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
        let placeholders = vec!["?"; names.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            q.quote_ident(&table.name)?,
            q.quote_list(&names)?,
            placeholders
        );

        let conn = self.conn()?;
        let stmt = conn.prep(sql.as_str()).await?;
        let mut outcome = WriteOutcome::default();
        for (idx, row) in batch.rows.into_iter().enumerate() {
            let params: Vec<Value> = row.iter().map(to_mysql_value).collect();
            match conn.exec_drop(&stmt, params).await {
                Ok(()) => outcome.written += 1,
                Err(mysql_async::Error::Server(e)) if e.message.contains("Data truncated") => {
                    warn!("Skipping row {} in {}: {}", idx, table.name, e.message);
                    outcome.skipped.push((idx, e.message));
                }
                Err(mysql_async::Error::Server(e)) => {
                    return Err(SnapshotError::ConstraintViolation {
                        table: table.name.clone(),
                        message: e.message,
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(outcome)
    }

    async fn commit_table(&mut self, _table: &Table) -> Result<()> {
        self.conn()?.query_drop("COMMIT").await?;
        Ok(())
    }

    async fn rollback_table(&mut self, _table: &Table) -> Result<()> {
        self.conn()?.query_drop("ROLLBACK").await?;
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err(e) = conn.disconnect().await {
                warn!("Error closing MySQL session: {}", e);
            }
        }
        if let Err(e) = self.pool.clone().disconnect().await {
            warn!("Error closing MySQL pool: {}", e);
        }
        info!("MySQL restore session closed");
    }
}

fn ssl_opts(mode: SslMode) -> Option<SslOpts> {
    match mode {
        SslMode::Disable => None,
        SslMode::Require => Some(SslOpts::default().with_danger_accept_invalid_certs(true)),
        SslMode::VerifyCa => Some(SslOpts::default().with_danger_skip_domain_validation(true)),
        SslMode::VerifyFull => Some(SslOpts::default()),
    }
}

/// Convert a decoded value into a statement parameter.
fn to_mysql_value(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::NULL,
        SqlValue::Bool(b) => Value::Int(i64::from(*b)),
        SqlValue::Int(i) => Value::Int(*i),
        SqlValue::Float(f) => Value::Double(*f),
        SqlValue::Decimal(d) => Value::Bytes(d.to_string().into_bytes()),
        SqlValue::Text(s) | SqlValue::Json(s) => Value::Bytes(s.clone().into_bytes()),
        SqlValue::Array(s) => Value::Bytes(array::native_to_json(s).into_bytes()),
        SqlValue::Uuid(u) => Value::Bytes(u.hyphenated().to_string().into_bytes()),
        SqlValue::Timestamp(ts) => Value::Bytes(
            ts.with_timezone(&Utc)
                .format("%Y-%m-%d %H:%M:%S%.6f")
                .to_string()
                .into_bytes(),
        ),
        SqlValue::Date(d) => Value::Bytes(d.format("%Y-%m-%d").to_string().into_bytes()),
    }
}
