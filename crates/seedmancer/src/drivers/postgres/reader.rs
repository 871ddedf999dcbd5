//! PostgreSQL source reader.
//!
//! Introspects the `public` namespace and streams table rows in primary-key
//! order. Types without a lossless native decoding are read as `::text`.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use deadpool_postgres::Pool;
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::core::identifier::{PgQuoter, Quoter};
use crate::core::schema::{Column, ColumnDefault, Engine, EnumType, ForeignKey, Schema, Table};
use crate::core::traits::{ReadOptions, SourceReader};
use crate::core::value::{Batch, Row, SqlValue};
use crate::drivers::common::ConnectionUrl;
use crate::error::{Result, SnapshotError};

use super::{connect_pool, WORKING_SCHEMA};

const ENUM_QUERY: &str = r#"
    SELECT
        t.typname::text AS enum_name,
        array_agg(e.enumlabel::text ORDER BY e.enumsortorder) AS enum_values
    FROM pg_type t
    JOIN pg_enum e ON t.oid = e.enumtypid
    JOIN pg_catalog.pg_namespace n ON n.oid = t.typnamespace
    WHERE n.nspname = $1
    GROUP BY t.typname
    ORDER BY t.typname
"#;

const COLUMN_QUERY: &str = r#"
    WITH fk_info AS (
        SELECT
            tc.table_name,
            kcu.column_name,
            ccu.table_name AS foreign_table_name,
            ccu.column_name AS foreign_column_name
        FROM information_schema.table_constraints tc
        JOIN information_schema.key_column_usage kcu
            ON tc.constraint_name = kcu.constraint_name
           AND tc.table_schema = kcu.table_schema
        JOIN information_schema.constraint_column_usage ccu
            ON ccu.constraint_name = tc.constraint_name
           AND ccu.constraint_schema = tc.table_schema
        WHERE tc.constraint_type = 'FOREIGN KEY' AND tc.table_schema = $1
    ),
    pk_info AS (
        SELECT t.table_name, c.column_name
        FROM information_schema.table_constraints t
        JOIN information_schema.constraint_column_usage c
            ON c.constraint_name = t.constraint_name
           AND c.constraint_schema = t.table_schema
        WHERE t.constraint_type = 'PRIMARY KEY' AND t.table_schema = $1
    ),
    unique_info AS (
        SELECT t.table_name, c.column_name
        FROM information_schema.table_constraints t
        JOIN information_schema.constraint_column_usage c
            ON c.constraint_name = t.constraint_name
           AND c.constraint_schema = t.table_schema
        WHERE t.constraint_type = 'UNIQUE' AND t.table_schema = $1
    )
    SELECT
        t.table_name::text,
        c.column_name::text,
        c.udt_name::text,
        c.data_type::text,
        c.is_nullable::text,
        c.column_default::text,
        c.character_maximum_length::int4,
        pk_info.column_name IS NOT NULL AS is_primary,
        unique_info.column_name IS NOT NULL AS is_unique,
        fk.foreign_table_name::text,
        fk.foreign_column_name::text
    FROM information_schema.tables t
    JOIN information_schema.columns c
        ON t.table_name = c.table_name AND t.table_schema = c.table_schema
    LEFT JOIN fk_info fk
        ON t.table_name = fk.table_name AND c.column_name = fk.column_name
    LEFT JOIN pk_info
        ON t.table_name = pk_info.table_name AND c.column_name = pk_info.column_name
    LEFT JOIN unique_info
        ON t.table_name = unique_info.table_name AND c.column_name = unique_info.column_name
    WHERE t.table_schema = $1
      AND t.table_type = 'BASE TABLE'
    ORDER BY t.table_name, c.ordinal_position
"#;

/// PostgreSQL source reader.
pub struct PostgresReader {
    pool: Pool,
}

impl PostgresReader {
    /// Connect to the database named in `conn`.
    pub async fn connect(conn: &ConnectionUrl, max_conns: usize) -> Result<Self> {
        Ok(Self {
            pool: connect_pool(conn, max_conns).await?,
        })
    }

    async fn client(&self, context: &str) -> Result<deadpool_postgres::Object> {
        self.pool
            .get()
            .await
            .map_err(|e| SnapshotError::connection(e, format!("getting connection for {}", context)))
    }

    async fn load_enums(&self) -> Result<Vec<EnumType>> {
        let client = self.client("load_enums").await?;
        let rows = client.query(ENUM_QUERY, &[&WORKING_SCHEMA]).await?;

        let mut enums = Vec::with_capacity(rows.len());
        for row in rows {
            let name: Option<String> = row.try_get(0)?;
            let values: Option<Vec<String>> = row.try_get(1)?;
            match (name, values) {
                (Some(name), Some(values)) => enums.push(EnumType { name, values }),
                _ => {
                    return Err(SnapshotError::Introspection(
                        "enum catalog row with null name or labels".into(),
                    ))
                }
            }
        }
        debug!("Loaded {} enum types", enums.len());
        Ok(enums)
    }
}

#[async_trait]
impl SourceReader for PostgresReader {
    async fn extract_schema(&self) -> Result<Schema> {
        let enums = self.load_enums().await?;
        let enum_names: HashSet<&str> = enums.iter().map(|e| e.name.as_str()).collect();

        let client = self.client("extract_schema").await?;
        let rows = client.query(COLUMN_QUERY, &[&WORKING_SCHEMA]).await?;

        let mut tables: Vec<Table> = Vec::new();
        for row in rows {
            let table_name = required(&row, 0, "table_name")?;
            let column_name = required(&row, 1, "column_name")?;
            let udt_name = required(&row, 2, "udt_name")?;
            let data_type = required(&row, 3, "data_type")?;
            let is_nullable = required(&row, 4, "is_nullable")?;
            let column_default: Option<String> = row.try_get(5)?;
            let max_length: Option<i32> = row.try_get(6)?;
            let is_primary: bool = row.try_get(7)?;
            let is_unique: bool = row.try_get(8)?;
            let fk_table: Option<String> = row.try_get(9)?;
            let fk_column: Option<String> = row.try_get(10)?;

            if tables.last().map(|t| t.name != table_name).unwrap_or(true) {
                tables.push(Table::new(table_name.clone()));
            }
            let Some(table) = tables.last_mut() else {
                continue;
            };

            // One row per matching constraint: merge repeats of the same column.
            if let Some(existing) = table.columns.iter_mut().find(|c| c.name == column_name) {
                existing.is_primary |= is_primary;
                existing.is_unique |= is_unique;
                if existing.foreign_key.is_none() {
                    existing.foreign_key = foreign_key(fk_table, fk_column);
                }
                continue;
            }

            let mut column = Column::new(column_name, normalize_type(&data_type, &udt_name));
            column.nullable = is_nullable == "YES";
            column.is_primary = is_primary;
            column.is_unique = is_unique;
            column.foreign_key = foreign_key(fk_table, fk_column);
            column.max_length = max_length.and_then(|n| u32::try_from(n).ok());
            if let Some(text) = column_default {
                column.default = ColumnDefault::from_sql_text(&text);
            }
            if data_type == "USER-DEFINED" && enum_names.contains(udt_name.as_str()) {
                column.data_type = "enum".into();
                column.enum_name = Some(udt_name);
            }
            table.columns.push(column);
        }

        info!(
            "Extracted {} tables and {} enums from schema '{}'",
            tables.len(),
            enums.len(),
            WORKING_SCHEMA
        );

        let mut schema = Schema::new(Engine::Postgres);
        schema.enums = enums;
        schema.tables = tables;
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
        Engine::Postgres
    }

    async fn close(&self) {
        self.pool.close();
    }
}

fn required(row: &tokio_postgres::Row, idx: usize, field: &str) -> Result<String> {
    let value: Option<String> = row.try_get(idx)?;
    value.ok_or_else(|| {
        SnapshotError::Introspection(format!("catalog returned NULL for {}", field))
    })
}

fn foreign_key(table: Option<String>, column: Option<String>) -> Option<ForeignKey> {
    match (table, column) {
        (Some(table), Some(column)) => Some(ForeignKey { table, column }),
        _ => None,
    }
}

/// Declared type recorded in the snapshot. Arrays carry their element type,
/// user-defined types their type name.
fn normalize_type(data_type: &str, udt_name: &str) -> String {
    match data_type {
        "ARRAY" => format!("{}[]", udt_name.trim_start_matches('_')),
        "USER-DEFINED" => udt_name.to_string(),
        other => other.to_string(),
    }
}

/// How a column is fetched and turned into a [`SqlValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadKind {
    Bool,
    Int2,
    Int4,
    Int8,
    Float4,
    Float8,
    Numeric,
    Timestamp,
    TimestampTz,
    Date,
    Json,
    Uuid,
    Array,
    Text,
}

impl ReadKind {
    fn of(data_type: &str) -> Self {
        let t = data_type.to_ascii_lowercase();
        if t.ends_with("[]") || t == "array" {
            return ReadKind::Array;
        }
        match t.split('(').next().unwrap_or("").trim() {
            "boolean" | "bool" => ReadKind::Bool,
            "smallint" | "int2" => ReadKind::Int2,
            "integer" | "int" | "int4" => ReadKind::Int4,
            "bigint" | "int8" => ReadKind::Int8,
            "real" | "float4" => ReadKind::Float4,
            "double precision" | "float8" => ReadKind::Float8,
            "numeric" | "decimal" => ReadKind::Numeric,
            "timestamp" | "timestamp without time zone" => ReadKind::Timestamp,
            "timestamptz" | "timestamp with time zone" => ReadKind::TimestampTz,
            "date" => ReadKind::Date,
            "json" | "jsonb" => ReadKind::Json,
            "uuid" => ReadKind::Uuid,
            _ => ReadKind::Text,
        }
    }

    /// Read through a text cast rather than a native decoder.
    fn as_text(self) -> bool {
        matches!(self, ReadKind::Numeric | ReadKind::Array | ReadKind::Text)
    }
}

fn build_select(opts: &ReadOptions, kinds: &[ReadKind]) -> Result<String> {
    let q = PgQuoter;
    let mut exprs = Vec::with_capacity(opts.columns.len());
    for (column, kind) in opts.columns.iter().zip(kinds) {
        let quoted = q.quote_ident(column)?;
        exprs.push(if kind.as_text() {
            format!("{}::text", quoted)
        } else {
            quoted
        });
    }
    let mut order = Vec::with_capacity(opts.order_by.len());
    for column in &opts.order_by {
        let quoted = q.quote_ident(column)?;
        let data_type = opts
            .columns
            .iter()
            .position(|c| c == column)
            .and_then(|idx| opts.col_types.get(idx))
            .map(String::as_str)
            .unwrap_or("");
        order.push(if has_ordering(data_type) {
            quoted
        } else {
            format!("{}::text", quoted)
        });
    }

    let mut sql = format!(
        "SELECT {} FROM {}.{}",
        exprs.join(", "),
        q.quote_ident(WORKING_SCHEMA)?,
        q.quote_ident(&opts.table)?
    );
    if !order.is_empty() {
        sql.push_str(" ORDER BY ");
        sql.push_str(&order.join(", "));
    }
    Ok(sql)
}

/// False for types PostgreSQL has no default btree ordering for.
fn has_ordering(data_type: &str) -> bool {
    let t = data_type.to_ascii_lowercase();
    let base = t.trim_end_matches("[]").trim_start_matches('_');
    !matches!(
        base.split('(').next().unwrap_or("").trim(),
        "json" | "xml" | "point" | "line" | "lseg" | "box" | "path" | "polygon" | "circle"
    )
}

async fn read_table_internal(
    pool: Pool,
    opts: ReadOptions,
    tx: mpsc::Sender<Result<Batch>>,
) -> Result<()> {
    let client = pool
        .get()
        .await
        .map_err(|e| SnapshotError::connection(e, "getting connection for read_table"))?;

    let kinds: Vec<ReadKind> = opts.col_types.iter().map(|t| ReadKind::of(t)).collect();
    let base_sql = build_select(&opts, &kinds)?;
    debug!("Read query for {}: {}", opts.table, base_sql);

    let mut offset = 0usize;
    loop {
        let sql = format!("{} LIMIT {} OFFSET {}", base_sql, opts.batch_size, offset);
        let rows = client.query(&sql, &[]).await?;
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

fn convert_row(row: &tokio_postgres::Row, kinds: &[ReadKind]) -> Result<Row> {
    let mut values = Vec::with_capacity(kinds.len());
    for (idx, kind) in kinds.iter().enumerate() {
        let value = match kind {
            ReadKind::Bool => row.try_get::<_, Option<bool>>(idx)?.into(),
            ReadKind::Int2 => row.try_get::<_, Option<i16>>(idx)?.map(i64::from).into(),
            ReadKind::Int4 => row.try_get::<_, Option<i32>>(idx)?.into(),
            ReadKind::Int8 => row.try_get::<_, Option<i64>>(idx)?.into(),
            ReadKind::Float4 => row.try_get::<_, Option<f32>>(idx)?.map(f64::from).into(),
            ReadKind::Float8 => row.try_get::<_, Option<f64>>(idx)?.into(),
            ReadKind::Numeric => match row.try_get::<_, Option<String>>(idx)? {
                Some(text) => match text.parse::<Decimal>() {
                    Ok(d) => SqlValue::Decimal(d),
                    Err(_) => SqlValue::Text(text),
                },
                None => SqlValue::Null,
            },
            ReadKind::Timestamp => row
                .try_get::<_, Option<NaiveDateTime>>(idx)?
                .map(|ts| SqlValue::Timestamp(ts.and_utc().fixed_offset()))
                .unwrap_or(SqlValue::Null),
            ReadKind::TimestampTz => row
                .try_get::<_, Option<DateTime<Utc>>>(idx)?
                .map(|ts| SqlValue::Timestamp(ts.fixed_offset()))
                .unwrap_or(SqlValue::Null),
            ReadKind::Date => row.try_get::<_, Option<NaiveDate>>(idx)?.into(),
            ReadKind::Json => row
                .try_get::<_, Option<serde_json::Value>>(idx)?
                .map(|v| SqlValue::Json(v.to_string()))
                .unwrap_or(SqlValue::Null),
            ReadKind::Uuid => row.try_get::<_, Option<uuid::Uuid>>(idx)?.into(),
            ReadKind::Array => row
                .try_get::<_, Option<String>>(idx)?
                .map(SqlValue::Array)
                .unwrap_or(SqlValue::Null),
            ReadKind::Text => row.try_get::<_, Option<String>>(idx)?.into(),
        };
        values.push(value);
    }
    Ok(values)
}
