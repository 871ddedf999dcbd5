//! MySQL/MariaDB source reader.
//!
//! Uses SQLx for pooling and queries. Inline `enum(...)` column types are
//! lifted into named enum types so the schema looks the same as one captured
//! from PostgreSQL.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow, MySqlSslMode};
use sqlx::Row as _;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::codec::{self, TypeCategory};
use crate::core::identifier::{MysqlQuoter, Quoter};
use crate::core::schema::{Column, ColumnDefault, Engine, EnumType, ForeignKey, Schema, Table};
use crate::core::traits::{ReadOptions, SourceReader};
use crate::core::value::{Batch, Row, SqlValue};
use crate::drivers::common::{redact_url, ConnectionUrl, SslMode};
use crate::error::{Result, SnapshotError};

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

const TABLE_QUERY: &str = r#"
    SELECT CAST(TABLE_NAME AS CHAR(255)) AS TABLE_NAME
    FROM INFORMATION_SCHEMA.TABLES
    WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE'
    ORDER BY TABLE_NAME
"#;

const COLUMN_QUERY: &str = r#"
    SELECT
        CAST(COLUMN_NAME AS CHAR(255)) AS COLUMN_NAME,
        CAST(DATA_TYPE AS CHAR(255)) AS DATA_TYPE,
        CAST(COLUMN_TYPE AS CHAR(4096)) AS COLUMN_TYPE,
        CAST(IS_NULLABLE AS CHAR(3)) AS IS_NULLABLE,
        CAST(COLUMN_DEFAULT AS CHAR(4096)) AS COLUMN_DEFAULT,
        CAST(COLUMN_KEY AS CHAR(3)) AS COLUMN_KEY,
        CAST(EXTRA AS CHAR(255)) AS EXTRA,
        CAST(CASE
            WHEN CHARACTER_MAXIMUM_LENGTH IS NULL THEN 0
            WHEN CHARACTER_MAXIMUM_LENGTH > 2147483647 THEN 0
            ELSE CHARACTER_MAXIMUM_LENGTH
        END AS SIGNED) AS max_length
    FROM INFORMATION_SCHEMA.COLUMNS
    WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
    ORDER BY ORDINAL_POSITION
"#;

const FOREIGN_KEY_QUERY: &str = r#"
    SELECT
        CAST(COLUMN_NAME AS CHAR(255)) AS COLUMN_NAME,
        CAST(REFERENCED_TABLE_NAME AS CHAR(255)) AS REFERENCED_TABLE_NAME,
        CAST(REFERENCED_COLUMN_NAME AS CHAR(255)) AS REFERENCED_COLUMN_NAME
    FROM INFORMATION_SCHEMA.KEY_COLUMN_USAGE
    WHERE TABLE_SCHEMA = DATABASE()
      AND TABLE_NAME = ?
      AND REFERENCED_TABLE_NAME IS NOT NULL
    ORDER BY ORDINAL_POSITION
"#;

/// MySQL/MariaDB source reader.
pub struct MysqlReader {
    pool: MySqlPool,
}

impl MysqlReader {
    /// Connect to the database named in `conn`.
    pub async fn connect(conn: &ConnectionUrl, max_conns: usize) -> Result<Self> {
        let options = MySqlConnectOptions::from_str(&conn.url)
            .map_err(|e| SnapshotError::connection(e, format!("parsing {}", redact_url(&conn.url))))?
            .ssl_mode(sqlx_ssl_mode(conn.ssl_mode));

        let pool = MySqlPoolOptions::new()
            .max_connections(max_conns.max(1) as u32)
            .acquire_timeout(POOL_CONNECTION_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| SnapshotError::connection(e, "creating MySQL source pool"))?;

        sqlx::query("SELECT 1")
            .fetch_one(&pool)
            .await
            .map_err(|e| SnapshotError::connection(e, "testing MySQL source connection"))?;

        info!("Connected to MySQL source: {}/{}", conn.host, conn.database);
        Ok(Self { pool })
    }

    async fn load_table(&self, name: String, enums: &mut Vec<EnumType>) -> Result<Table> {
        let rows: Vec<MySqlRow> = sqlx::query(COLUMN_QUERY)
            .bind(&name)
            .fetch_all(&self.pool)
            .await?;

        let mut table = Table::new(name);
        for row in rows {
            let column = column_from_row(&table.name, &row, enums)?;
            table.columns.push(column);
        }
        if table.columns.is_empty() {
            return Err(SnapshotError::Introspection(format!(
                "table {} has no visible columns",
                table.name
            )));
        }

        let fk_rows: Vec<MySqlRow> = sqlx::query(FOREIGN_KEY_QUERY)
            .bind(&table.name)
            .fetch_all(&self.pool)
            .await?;
        for row in fk_rows {
            let column_name = required(&row, "COLUMN_NAME")?;
            let fk = ForeignKey {
                table: required(&row, "REFERENCED_TABLE_NAME")?,
                column: required(&row, "REFERENCED_COLUMN_NAME")?,
            };
            if let Some(column) = table.columns.iter_mut().find(|c| c.name == column_name) {
                column.foreign_key.get_or_insert(fk);
            }
        }

        debug!("Loaded {} columns for {}", table.columns.len(), table.name);
        Ok(table)
    }
}

#[async_trait]
impl SourceReader for MysqlReader {
    async fn extract_schema(&self) -> Result<Schema> {
        let rows: Vec<MySqlRow> = sqlx::query(TABLE_QUERY).fetch_all(&self.pool).await?;

        let mut schema = Schema::new(Engine::Mysql);
        for row in rows {
            let name = required(&row, "TABLE_NAME")?;
            let table = self.load_table(name, &mut schema.enums).await?;
            schema.tables.push(table);
        }

        info!(
            "Extracted {} tables and {} enums",
            schema.tables.len(),
            schema.enums.len()
        );
        Ok(schema)
    }

    fn read_table(&self, opts: ReadOptions) -> mpsc::Receiver<Result<Batch>> {
        let (tx, rx) = mpsc::channel(4);
        let pool = self.pool.clone();

        tokio::spawn(async move {
            if let Err(e) = read_table_internal(pool, opts, tx.clone()).await {
                let _ = tx.send(Err(e)).await;
            }
        });

        rx
    }

    fn engine(&self) -> Engine {
        Engine::Mysql
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

fn sqlx_ssl_mode(mode: SslMode) -> MySqlSslMode {
    match mode {
        SslMode::Disable => MySqlSslMode::Disabled,
        SslMode::Require => MySqlSslMode::Required,
        SslMode::VerifyCa => MySqlSslMode::VerifyCa,
        SslMode::VerifyFull => MySqlSslMode::VerifyIdentity,
    }
}

fn required(row: &MySqlRow, field: &str) -> Result<String> {
    let value: Option<String> = row.try_get(field)?;
    value.ok_or_else(|| SnapshotError::Introspection(format!("catalog returned NULL for {}", field)))
}

fn column_from_row(table: &str, row: &MySqlRow, enums: &mut Vec<EnumType>) -> Result<Column> {
    let name = required(row, "COLUMN_NAME")?;
    let data_type = required(row, "DATA_TYPE")?.to_ascii_lowercase();
    let raw_column_type = required(row, "COLUMN_TYPE")?;
    let column_type = raw_column_type.to_ascii_lowercase();
    let is_nullable = required(row, "IS_NULLABLE")?;
    let default: Option<String> = row.try_get("COLUMN_DEFAULT")?;
    let key: Option<String> = row.try_get("COLUMN_KEY")?;
    let extra: Option<String> = row.try_get("EXTRA")?;
    let max_length: i64 = row.try_get("max_length")?;

    let mut column = Column::new(name, declared_type(&data_type, &column_type));
    column.nullable = is_nullable == "YES";
    column.is_primary = key.as_deref() == Some("PRI");
    column.is_unique = matches!(key.as_deref(), Some("PRI") | Some("UNI"));
    if matches!(data_type.as_str(), "varchar" | "char") && max_length > 0 {
        column.max_length = u32::try_from(max_length).ok();
    }
    column.default = classify_default(table, &column.name, default, extra.as_deref().unwrap_or(""));

    if data_type == "enum" {
        let enum_name = format!("{}_{}_enum", table, column.name);
        let values = parse_enum_values(&raw_column_type);
        if !enums.iter().any(|e| e.name == enum_name) {
            enums.push(EnumType {
                name: enum_name.clone(),
                values: values.clone(),
            });
        }
        column = column.with_enum(enum_name, values);
    }
    Ok(column)
}

/// Declared type recorded in the snapshot for a MySQL column.
fn declared_type(data_type: &str, column_type: &str) -> String {
    if column_type.starts_with("tinyint(1)") {
        return "boolean".into();
    }
    match data_type {
        "decimal" | "numeric" => return column_type.to_string(),
        "enum" => return "enum".into(),
        _ => {}
    }
    if column_type.contains("unsigned") {
        return format!("{} unsigned", data_type);
    }
    data_type.to_string()
}

/// Resolve a catalog default into its closed form.
fn classify_default(table: &str, column: &str, raw: Option<String>, extra: &str) -> ColumnDefault {
    let extra = extra.to_ascii_lowercase();
    if extra.contains("auto_increment") {
        return ColumnDefault::Sequence(format!("{}_{}_seq", table, column));
    }
    let Some(raw) = raw else {
        return ColumnDefault::Null;
    };
    let upper = raw.trim().to_ascii_uppercase();
    if upper == "NULL" {
        return ColumnDefault::Null;
    }
    if extra.contains("default_generated")
        || upper.starts_with("CURRENT_TIMESTAMP")
        || upper.starts_with("NOW(")
        || upper.starts_with("CURRENT_DATE")
    {
        return ColumnDefault::Expression(raw);
    }
    // MariaDB reports string literals quoted; MySQL 8 reports them bare.
    if raw.starts_with('\'') {
        return ColumnDefault::from_sql_text(&raw);
    }
    ColumnDefault::Literal(raw)
}

/// Parse the member list out of `enum('a','b','it''s')`, preserving order.
pub(crate) fn parse_enum_values(column_type: &str) -> Vec<String> {
    let trimmed = column_type.trim();
    let inner = match (trimmed.find('('), trimmed.rfind(')')) {
        (Some(open), Some(close)) if close > open => &trimmed[open + 1..close],
        _ => return Vec::new(),
    };

    let mut values = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        match (c, in_quote) {
            ('\'', true) if chars.peek() == Some(&'\'') => {
                current.push('\'');
                chars.next();
            }
            ('\'', true) => {
                values.push(std::mem::take(&mut current));
                in_quote = false;
            }
            ('\'', false) => in_quote = true,
            ('\\', true) => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            (_, true) => current.push(c),
            _ => {}
        }
    }
    values
}

/// How a column is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadKind {
    Integer,
    Text(TypeCategory),
}

impl ReadKind {
    fn of(data_type: &str) -> Self {
        let t = data_type.to_ascii_lowercase();
        match t.as_str() {
            "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "bigint" | "year" => {
                ReadKind::Integer
            }
            _ => ReadKind::Text(TypeCategory::of(&t)),
        }
    }
}

fn build_select(opts: &ReadOptions, kinds: &[ReadKind]) -> Result<String> {
    let q = MysqlQuoter;
    let mut exprs = Vec::with_capacity(opts.columns.len());
    for (column, kind) in opts.columns.iter().zip(kinds) {
        let quoted = q.quote_ident(column)?;
        exprs.push(match kind {
            ReadKind::Integer => format!("CAST({} AS SIGNED)", quoted),
            ReadKind::Text(_) => format!("CAST({} AS CHAR)", quoted),
        });
    }
    let mut sql = format!("SELECT {} FROM {}", exprs.join(", "), q.quote_ident(&opts.table)?);
    if !opts.order_by.is_empty() {
        let order: Vec<&str> = opts.order_by.iter().map(String::as_str).collect();
        sql.push_str(" ORDER BY ");
        sql.push_str(&q.quote_list(&order)?);
    }
    Ok(sql)
}

async fn read_table_internal(
    pool: MySqlPool,
    opts: ReadOptions,
    tx: mpsc::Sender<Result<Batch>>,
) -> Result<()> {
    let kinds: Vec<ReadKind> = opts.col_types.iter().map(|t| ReadKind::of(t)).collect();
    let base_sql = build_select(&opts, &kinds)?;
    debug!("Read query for {}: {}", opts.table, base_sql);

    let mut offset = 0usize;
    loop {
        let sql = format!("{} LIMIT {} OFFSET {}", base_sql, opts.batch_size, offset);
        let rows: Vec<MySqlRow> = sqlx::query(&sql).fetch_all(&pool).await?;
        let fetched = rows.len();

        let mut batch_rows = Vec::with_capacity(fetched);
        for row in &rows {
            batch_rows.push(convert_row(row, &kinds)?);
        }

        let is_last = fetched < opts.batch_size;
        let mut batch = Batch::new(batch_rows);
        if is_last {
            batch = batch.mark_final();
        }
        if tx.send(Ok(batch)).await.is_err() || is_last {
            return Ok(());
        }
        offset += fetched;
    }
}

fn convert_row(row: &MySqlRow, kinds: &[ReadKind]) -> Result<Row> {
    let mut values = Vec::with_capacity(kinds.len());
    for (idx, kind) in kinds.iter().enumerate() {
        let value = match kind {
            ReadKind::Integer => row.try_get::<Option<i64>, _>(idx)?.into(),
            ReadKind::Text(category) => match row.try_get::<Option<String>, _>(idx)? {
                None => SqlValue::Null,
                Some(text) => text_value(text, *category),
            },
        };
        values.push(value);
    }
    Ok(values)
}

/// Typed value for a non-null text cell; text-like categories stay verbatim.
fn text_value(text: String, category: TypeCategory) -> SqlValue {
    match category {
        TypeCategory::Text | TypeCategory::Enum => SqlValue::Text(text),
        TypeCategory::Json => SqlValue::Json(text),
        TypeCategory::Boolean => match codec::parse_bool(&text) {
            Some(b) => SqlValue::Bool(b),
            None => SqlValue::Text(text),
        },
        other => match codec::decode(&text, other) {
            SqlValue::Null => SqlValue::Text(text),
            value => value,
        },
    }
}
