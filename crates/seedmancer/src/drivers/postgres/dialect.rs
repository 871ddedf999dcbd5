//! PostgreSQL DDL dialect.
//!
//! Maps declared types from either source engine onto PostgreSQL types,
//! renders sequence defaults as `serial` types, and creates enums as
//! standalone `CREATE TYPE ... AS ENUM` types.

use tracing::warn;

use crate::core::identifier::{PgQuoter, Quoter};
use crate::core::schema::{Column, ColumnDefault, Engine, EnumType, Schema};
use crate::core::traits::{Dialect, TypeMapping};
use crate::drivers::common::split_type;
use crate::error::{Result, SnapshotError};

/// PostgreSQL dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct PostgresDialect {
    quoter: PgQuoter,
}

impl PostgresDialect {
    pub fn new() -> Self {
        Self::default()
    }

    /// Types captured from a PostgreSQL catalog.
    fn map_native(&self, column: &Column) -> TypeMapping {
        let (base, args) = split_type(&column.data_type);
        match base.as_str() {
            "array" => TypeMapping::lossy("text[]", "array element type unknown, using text[]"),
            "user-defined" => {
                TypeMapping::lossy("text", "user-defined type without enum values, using text")
            }
            "character varying" | "varchar" | "character" | "char" | "bpchar" => {
                match (args, column.max_length) {
                    (Some(a), _) => TypeMapping::lossless(format!("{}({})", base, a)),
                    (None, Some(n)) => TypeMapping::lossless(format!("{}({})", base, n)),
                    (None, None) => TypeMapping::lossless(base),
                }
            }
            _ => TypeMapping::lossless(column.data_type.clone()),
        }
    }

    /// Types captured from a MySQL catalog.
    fn map_from_mysql(&self, column: &Column) -> TypeMapping {
        let (base, args) = split_type(&column.data_type);
        let length = args
            .as_deref()
            .and_then(|a| a.parse::<u32>().ok())
            .or(column.max_length);
        match base.as_str() {
            "boolean" | "bool" => TypeMapping::lossless("boolean"),
            "tinyint" | "smallint" | "year" => TypeMapping::lossless("smallint"),
            "tinyint unsigned" | "smallint unsigned" => TypeMapping::lossless("integer"),
            "mediumint" | "int" | "integer" => TypeMapping::lossless("integer"),
            "mediumint unsigned" | "int unsigned" | "integer unsigned" => {
                TypeMapping::lossless("bigint")
            }
            "bigint" => TypeMapping::lossless("bigint"),
            "bigint unsigned" => TypeMapping::lossless("numeric(20,0)"),
            "decimal" | "numeric" => match args {
                Some(a) => TypeMapping::lossless(format!("numeric({})", a)),
                None => TypeMapping::lossless("numeric"),
            },
            "float" => TypeMapping::lossless("real"),
            "double" | "double precision" | "real" => TypeMapping::lossless("double precision"),
            "varchar" => match length {
                Some(n) => TypeMapping::lossless(format!("character varying({})", n)),
                None => TypeMapping::lossless("character varying"),
            },
            "char" => TypeMapping::lossless(format!("character({})", length.unwrap_or(1))),
            "tinytext" | "text" | "mediumtext" | "longtext" => TypeMapping::lossless("text"),
            "datetime" => TypeMapping::lossless("timestamp without time zone"),
            "timestamp" => TypeMapping::lossless("timestamp with time zone"),
            "date" => TypeMapping::lossless("date"),
            "time" => TypeMapping::lossless("time without time zone"),
            "json" => TypeMapping::lossless("jsonb"),
            "binary" | "varbinary" | "tinyblob" | "blob" | "mediumblob" | "longblob" => {
                TypeMapping::lossless("bytea")
            }
            "set" => TypeMapping::lossy("text", "MySQL SET stored as comma-separated text"),
            other => TypeMapping::lossy("text", format!("no PostgreSQL mapping for '{}'", other)),
        }
    }
}

impl Dialect for PostgresDialect {
    fn name(&self) -> &str {
        "postgres"
    }

    fn quoter(&self) -> &dyn Quoter {
        &self.quoter
    }

    fn map_type(&self, column: &Column, schema: &Schema) -> Result<TypeMapping> {
        if let Some(enum_name) = &column.enum_name {
            return Ok(TypeMapping::lossless(self.quoter.quote_ident(enum_name)?));
        }
        Ok(match schema.database_type {
            Engine::Postgres => self.map_native(column),
            Engine::Mysql => self.map_from_mysql(column),
        })
    }

    fn column_definition(&self, column: &Column, schema: &Schema) -> Result<String> {
        let mapping = self.map_type(column, schema)?;
        if let Some(warning) = &mapping.warning {
            warn!("Column '{}': {}", column.name, warning);
        }

        let mut target_type = mapping.target_type;
        if let ColumnDefault::Sequence(name) = &column.default {
            match serial_for(&target_type) {
                Some(serial) => target_type = serial.to_string(),
                None => warn!(
                    "Column '{}' uses sequence '{}' but type {} has no serial form; default dropped",
                    column.name, name, target_type
                ),
            }
        }

        let mut def = format!("{} {}", self.quoter.quote_ident(&column.name)?, target_type);
        if !column.nullable {
            def.push_str(" NOT NULL");
        }
        if let Some(clause) = self.default_clause(column, &target_type, schema.database_type) {
            def.push_str(&clause);
        }
        Ok(def)
    }

    fn create_enum_sql(&self, enum_type: &EnumType) -> Result<Option<String>> {
        if enum_type.values.is_empty() {
            return Err(SnapshotError::ddl(
                &enum_type.name,
                "enum type has no values",
            ));
        }
        let values: Vec<String> = enum_type
            .values
            .iter()
            .map(|v| self.quoter.quote_literal(v))
            .collect();
        Ok(Some(format!(
            "CREATE TYPE {} AS ENUM ({})",
            self.quoter.quote_ident(&enum_type.name)?,
            values.join(", ")
        )))
    }

    fn truncate_sql(&self, table: &str) -> Result<String> {
        Ok(format!(
            "TRUNCATE TABLE {} CASCADE",
            self.quoter.quote_ident(table)?
        ))
    }

    fn translate_expression(&self, expr: &str, source: Engine, _target_type: &str) -> Option<String> {
        if source == Engine::Postgres {
            return Some(expr.to_string());
        }
        let normalized = expr.trim().trim_start_matches('(').trim_end_matches(')');
        let lower = normalized.to_ascii_lowercase();
        if lower.starts_with("current_timestamp") || lower.starts_with("now(") {
            return Some("CURRENT_TIMESTAMP".into());
        }
        match lower.as_str() {
            "current_date" | "curdate(" => Some("CURRENT_DATE".into()),
            "uuid(" => Some("gen_random_uuid()".into()),
            "true" | "false" => Some(lower),
            _ => None,
        }
    }
}

fn serial_for(target_type: &str) -> Option<&'static str> {
    match target_type.to_ascii_lowercase().as_str() {
        "integer" | "int" | "int4" | "serial" => Some("serial"),
        "bigint" | "int8" | "bigserial" => Some("bigserial"),
        "smallint" | "int2" | "smallserial" => Some("smallserial"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{ForeignKey, Table};

    fn pg_schema() -> Schema {
        Schema::new(Engine::Postgres)
    }

    // =========================================================================
    // Type mapping tests
    // =========================================================================

    #[test]
    fn test_native_types_pass_through() {
        let d = PostgresDialect::new();
        let col = Column::new("created_at", "timestamp with time zone");
        assert_eq!(
            d.map_type(&col, &pg_schema()).unwrap().target_type,
            "timestamp with time zone"
        );
        let col = Column::new("name", "character varying").with_max_length(40);
        assert_eq!(
            d.map_type(&col, &pg_schema()).unwrap().target_type,
            "character varying(40)"
        );
        let col = Column::new("tags", "ARRAY");
        let mapping = d.map_type(&col, &pg_schema()).unwrap();
        assert_eq!(mapping.target_type, "text[]");
        assert!(mapping.is_lossy);
        let col = Column::new("scores", "integer[]");
        assert_eq!(d.map_type(&col, &pg_schema()).unwrap().target_type, "integer[]");
    }

    #[test]
    fn test_enum_column_uses_quoted_type_name() {
        let d = PostgresDialect::new();
        let col = Column::new("status", "enum").with_enum("order status", vec![]);
        assert_eq!(
            d.map_type(&col, &pg_schema()).unwrap().target_type,
            "\"order status\""
        );
    }

    #[test]
    fn test_mysql_types_mapped() {
        let d = PostgresDialect::new();
        let schema = Schema::new(Engine::Mysql);
        let cases = [
            ("int", "integer"),
            ("int unsigned", "bigint"),
            ("bigint unsigned", "numeric(20,0)"),
            ("tinyint", "smallint"),
            ("boolean", "boolean"),
            ("decimal(10,2)", "numeric(10,2)"),
            ("double", "double precision"),
            ("datetime", "timestamp without time zone"),
            ("longtext", "text"),
            ("json", "jsonb"),
            ("longblob", "bytea"),
        ];
        for (source, expected) in cases {
            let col = Column::new("c", source);
            assert_eq!(
                d.map_type(&col, &schema).unwrap().target_type,
                expected,
                "mapping {}",
                source
            );
        }
        let col = Column::new("name", "varchar").with_max_length(80);
        assert_eq!(
            d.map_type(&col, &schema).unwrap().target_type,
            "character varying(80)"
        );
        assert!(d.map_type(&Column::new("g", "geometry"), &schema).unwrap().is_lossy);
    }

    // =========================================================================
    // Column definition tests
    // =========================================================================

    #[test]
    fn test_sequence_default_becomes_serial() {
        let d = PostgresDialect::new();
        let col = Column::new("id", "integer")
            .primary()
            .with_default(ColumnDefault::Sequence("users_id_seq".into()));
        assert_eq!(
            d.column_definition(&col, &pg_schema()).unwrap(),
            "\"id\" serial NOT NULL"
        );
        let col = Column::new("id", "bigint")
            .with_default(ColumnDefault::Sequence("big_seq".into()));
        assert_eq!(d.column_definition(&col, &pg_schema()).unwrap(), "\"id\" bigserial");
    }

    #[test]
    fn test_literal_and_expression_defaults() {
        let d = PostgresDialect::new();
        let col = Column::new("status", "text")
            .not_null()
            .with_default(ColumnDefault::Literal("it's new".into()));
        assert_eq!(
            d.column_definition(&col, &pg_schema()).unwrap(),
            "\"status\" text NOT NULL DEFAULT 'it''s new'"
        );
        let col = Column::new("qty", "integer").with_default(ColumnDefault::Literal("0".into()));
        assert_eq!(
            d.column_definition(&col, &pg_schema()).unwrap(),
            "\"qty\" integer DEFAULT 0"
        );
        let col = Column::new("code", "character varying")
            .with_default(ColumnDefault::Literal("007".into()));
        assert_eq!(
            d.column_definition(&col, &pg_schema()).unwrap(),
            "\"code\" character varying DEFAULT '007'"
        );
        let col = Column::new("at", "timestamp with time zone")
            .with_default(ColumnDefault::Expression("now()".into()));
        assert_eq!(
            d.column_definition(&col, &pg_schema()).unwrap(),
            "\"at\" timestamp with time zone DEFAULT now()"
        );
    }

    #[test]
    fn test_mysql_defaults_translated() {
        let d = PostgresDialect::new();
        let schema = Schema::new(Engine::Mysql);
        let col = Column::new("at", "datetime")
            .with_default(ColumnDefault::Expression("CURRENT_TIMESTAMP(6)".into()));
        assert_eq!(
            d.column_definition(&col, &schema).unwrap(),
            "\"at\" timestamp without time zone DEFAULT CURRENT_TIMESTAMP"
        );
        let col = Column::new("flag", "boolean").with_default(ColumnDefault::Literal("1".into()));
        assert_eq!(
            d.column_definition(&col, &schema).unwrap(),
            "\"flag\" boolean DEFAULT true"
        );
        let col = Column::new("x", "int")
            .with_default(ColumnDefault::Expression("(rand() * 10)".into()));
        assert_eq!(d.column_definition(&col, &schema).unwrap(), "\"x\" integer");
    }

    // =========================================================================
    // Statement tests
    // =========================================================================

    #[test]
    fn test_create_enum_sql() {
        let d = PostgresDialect::new();
        let e = EnumType {
            name: "mood".into(),
            values: vec!["ok".into(), "can't".into()],
        };
        assert_eq!(
            d.create_enum_sql(&e).unwrap().unwrap(),
            "CREATE TYPE \"mood\" AS ENUM ('ok', 'can''t')"
        );
        let empty = EnumType {
            name: "none".into(),
            values: vec![],
        };
        assert!(d.create_enum_sql(&empty).is_err());
    }

    #[test]
    fn test_create_table_sql_without_foreign_keys() {
        let d = PostgresDialect::new();
        let mut table = Table::new("posts");
        table.columns.push(
            Column::new("id", "integer")
                .primary()
                .with_default(ColumnDefault::Sequence("posts_id_seq".into())),
        );
        table.columns.push(Column::new("slug", "text").unique().not_null());
        table
            .columns
            .push(Column::new("user_id", "integer").references("users", "id"));
        let sql = d.create_table_sql(&table, &pg_schema()).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE \"posts\" (\n  \"id\" serial NOT NULL,\n  \"slug\" text NOT NULL,\n  \
             \"user_id\" integer,\n  PRIMARY KEY (\"id\"),\n  UNIQUE (\"slug\")\n)"
        );
        assert!(!sql.contains("REFERENCES"));
    }

    #[test]
    fn test_add_foreign_key_and_truncate() {
        let d = PostgresDialect::new();
        let fk = ForeignKey {
            table: "users".into(),
            column: "id".into(),
        };
        assert_eq!(
            d.add_foreign_key_sql("posts", "user_id", &fk).unwrap(),
            "ALTER TABLE \"posts\" ADD CONSTRAINT \"posts_user_id_fkey\" FOREIGN KEY (\"user_id\") \
             REFERENCES \"users\" (\"id\")"
        );
        assert_eq!(
            d.truncate_sql("posts").unwrap(),
            "TRUNCATE TABLE \"posts\" CASCADE"
        );
    }
}
