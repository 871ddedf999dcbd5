//! Database driver implementations.
//!
//! - [`postgres`]: PostgreSQL reader, writer, and dialect
//! - [`mysql`]: MySQL/MariaDB reader, writer, and dialect
//! - [`common`]: connection URLs and TLS
//!
//! The engine is chosen from the connection URL scheme. Dialects are
//! dispatched through [`DialectImpl`]; readers and writers are boxed trait
//! objects because the orchestrators hold exactly one of each per run.

pub mod common;
pub mod mysql;
pub mod postgres;

pub use common::{ConnectionUrl, SslMode};
pub use mysql::{MysqlDialect, MysqlReader, MysqlWriter};
pub use postgres::{PostgresDialect, PostgresReader, PostgresWriter};

use crate::core::identifier::Quoter;
use crate::core::schema::{Column, Engine, EnumType, Schema};
use crate::core::traits::{Dialect, SourceReader, TargetWriter, TypeMapping};
use crate::error::Result;

/// Enum-based static dispatch for dialects.
///
/// We use a manual impl rather than a dispatch macro; the compiler generates
/// a match instead of a vtable call.
#[derive(Debug, Clone)]
pub enum DialectImpl {
    Postgres(PostgresDialect),
    Mysql(MysqlDialect),
}

impl DialectImpl {
    /// Dialect for a target engine.
    pub fn for_engine(engine: Engine) -> Self {
        match engine {
            Engine::Postgres => DialectImpl::Postgres(PostgresDialect::new()),
            Engine::Mysql => DialectImpl::Mysql(MysqlDialect::new()),
        }
    }
}

impl Dialect for DialectImpl {
    fn name(&self) -> &str {
        match self {
            DialectImpl::Postgres(d) => d.name(),
            DialectImpl::Mysql(d) => d.name(),
        }
    }

    fn quoter(&self) -> &dyn Quoter {
        match self {
            DialectImpl::Postgres(d) => d.quoter(),
            DialectImpl::Mysql(d) => d.quoter(),
        }
    }

    fn map_type(&self, column: &Column, schema: &Schema) -> Result<TypeMapping> {
        match self {
            DialectImpl::Postgres(d) => d.map_type(column, schema),
            DialectImpl::Mysql(d) => d.map_type(column, schema),
        }
    }

    fn column_definition(&self, column: &Column, schema: &Schema) -> Result<String> {
        match self {
            DialectImpl::Postgres(d) => d.column_definition(column, schema),
            DialectImpl::Mysql(d) => d.column_definition(column, schema),
        }
    }

    fn create_enum_sql(&self, enum_type: &EnumType) -> Result<Option<String>> {
        match self {
            DialectImpl::Postgres(d) => d.create_enum_sql(enum_type),
            DialectImpl::Mysql(d) => d.create_enum_sql(enum_type),
        }
    }

    fn truncate_sql(&self, table: &str) -> Result<String> {
        match self {
            DialectImpl::Postgres(d) => d.truncate_sql(table),
            DialectImpl::Mysql(d) => d.truncate_sql(table),
        }
    }

    fn table_options(&self) -> &str {
        match self {
            DialectImpl::Postgres(d) => d.table_options(),
            DialectImpl::Mysql(d) => d.table_options(),
        }
    }

    fn unique_keyword(&self) -> &str {
        match self {
            DialectImpl::Postgres(d) => d.unique_keyword(),
            DialectImpl::Mysql(d) => d.unique_keyword(),
        }
    }

    fn translate_expression(&self, expr: &str, source: Engine, target_type: &str) -> Option<String> {
        match self {
            DialectImpl::Postgres(d) => d.translate_expression(expr, source, target_type),
            DialectImpl::Mysql(d) => d.translate_expression(expr, source, target_type),
        }
    }
}

/// Connect a source reader for `url`, choosing the engine from its scheme.
pub async fn connect_source(url: &str, max_conns: usize) -> Result<Box<dyn SourceReader>> {
    let conn = ConnectionUrl::parse(url)?;
    Ok(match conn.engine {
        Engine::Postgres => Box::new(PostgresReader::connect(&conn, max_conns).await?),
        Engine::Mysql => Box::new(MysqlReader::connect(&conn, max_conns).await?),
    })
}

/// Open a restore session for `url`, choosing the engine from its scheme.
pub async fn connect_target(url: &str) -> Result<Box<dyn TargetWriter>> {
    let conn = ConnectionUrl::parse(url)?;
    Ok(match conn.engine {
        Engine::Postgres => Box::new(PostgresWriter::connect(&conn).await?),
        Engine::Mysql => Box::new(MysqlWriter::connect(&conn).await?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{ColumnDefault, Table};

    #[test]
    fn test_dialect_for_engine() {
        assert_eq!(DialectImpl::for_engine(Engine::Postgres).name(), "postgres");
        assert_eq!(DialectImpl::for_engine(Engine::Mysql).name(), "mysql");
    }

    #[test]
    fn test_dialect_impl_dispatches_overrides() {
        let mut table = Table::new("tags");
        table.columns.push(
            Column::new("id", "integer")
                .primary()
                .with_default(ColumnDefault::Sequence("tags_id_seq".into())),
        );
        table.columns.push(Column::new("label", "text").unique());
        let schema = Schema::new(Engine::Postgres);

        let mysql = DialectImpl::for_engine(Engine::Mysql);
        let sql = mysql.create_table_sql(&table, &schema).unwrap();
        assert!(sql.contains("UNIQUE KEY (`label`)"));
        assert!(sql.ends_with("COLLATE=utf8mb4_unicode_ci"));

        let pg = DialectImpl::for_engine(Engine::Postgres);
        let sql = pg.create_table_sql(&table, &schema).unwrap();
        assert!(sql.contains("\"id\" serial NOT NULL"));
        assert!(sql.contains("UNIQUE (\"label\")"));
    }

    #[tokio::test]
    async fn test_connect_rejects_unknown_scheme() {
        assert!(connect_target("sqlite://local.db").await.is_err());
        assert!(connect_source("oracle://h/db", 1).await.is_err());
    }
}
