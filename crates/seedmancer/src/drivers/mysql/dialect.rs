//! MySQL DDL dialect.
//!
//! Enum columns are declared inline as `ENUM(...)`, sequences become
//! `AUTO_INCREMENT`, and every table is created as InnoDB with utf8mb4.
//! Compatible with MySQL 8.0.13+ (expression defaults) and MariaDB 10.2+.

use tracing::warn;

use crate::core::identifier::{MysqlQuoter, Quoter};
use crate::core::schema::{Column, ColumnDefault, Engine, EnumType, Schema};
use crate::core::traits::{Dialect, TypeMapping};
use crate::drivers::common::split_type;
use crate::error::{Result, SnapshotError};

const TABLE_OPTIONS: &str = "ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci";

/// MySQL/MariaDB dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct MysqlDialect {
    quoter: MysqlQuoter,
}

impl MysqlDialect {
    pub fn new() -> Self {
        Self::default()
    }

    fn map_native(&self, column: &Column) -> TypeMapping {
        let (base, args) = split_type(&column.data_type);
        match (base.as_str(), args) {
            ("boolean" | "bool", _) => TypeMapping::lossless("tinyint(1)"),
            ("varchar", None) => {
                TypeMapping::lossless(format!("varchar({})", column.max_length.unwrap_or(255)))
            }
            ("char", None) => {
                TypeMapping::lossless(format!("char({})", column.max_length.unwrap_or(1)))
            }
            _ => TypeMapping::lossless(column.data_type.clone()),
        }
    }

    fn map_from_postgres(&self, column: &Column) -> TypeMapping {
        let (base, args) = split_type(&column.data_type);
        if base.ends_with("[]") || base == "array" || base.starts_with('_') {
            return TypeMapping::lossy("json", "array stored as a JSON array");
        }
        let length = args
            .as_deref()
            .and_then(|a| a.parse::<u32>().ok())
            .or(column.max_length);
        let keyed = column.is_primary || column.is_unique || column.foreign_key.is_some();

        match base.as_str() {
            "smallint" | "int2" | "smallserial" => TypeMapping::lossless("smallint"),
            "integer" | "int" | "int4" | "serial" => TypeMapping::lossless("int"),
            "bigint" | "int8" | "bigserial" => TypeMapping::lossless("bigint"),
            "numeric" | "decimal" => match args {
                Some(a) => TypeMapping::lossless(format!("decimal({})", a)),
                None => TypeMapping::lossy(
                    "decimal(65,30)",
                    "unconstrained numeric narrowed to decimal(65,30)",
                ),
            },
            "real" | "float4" => TypeMapping::lossless("float"),
            "double precision" | "float8" => TypeMapping::lossless("double"),
            "money" => TypeMapping::lossless("decimal(19,2)"),
            "boolean" | "bool" => TypeMapping::lossless("tinyint(1)"),
            "character varying" | "varchar" => {
                TypeMapping::lossless(format!("varchar({})", length.unwrap_or(255)))
            }
            "character" | "char" | "bpchar" => {
                TypeMapping::lossless(format!("char({})", length.unwrap_or(1)))
            }
            "text" | "citext" | "name" if keyed => TypeMapping::lossy(
                "varchar(255)",
                "key column of type text limited to varchar(255)",
            ),
            "text" | "citext" | "name" => TypeMapping::lossless("longtext"),
            "timestamp" | "timestamp without time zone" => TypeMapping::lossless("datetime(6)"),
            "timestamptz" | "timestamp with time zone" => {
                TypeMapping::lossy("datetime(6)", "time zone offsets normalized to UTC")
            }
            "date" => TypeMapping::lossless("date"),
            "time" | "time without time zone" | "time with time zone" | "timetz" => {
                TypeMapping::lossless("time(6)")
            }
            "json" | "jsonb" => TypeMapping::lossless("json"),
            "uuid" => TypeMapping::lossless("char(36)"),
            "bytea" => TypeMapping::lossless("longblob"),
            "inet" | "cidr" | "macaddr" => TypeMapping::lossless("varchar(45)"),
            "interval" => TypeMapping::lossy("varchar(64)", "interval stored as text"),
            "user-defined" => TypeMapping::lossy(
                "longtext",
                "user-defined type without enum values, using longtext",
            ),
            other => TypeMapping::lossy(
                "longtext",
                format!("no MySQL mapping for '{}', using longtext", other),
            ),
        }
    }

    fn inline_enum(&self, column: &Column, schema: &Schema) -> Result<TypeMapping> {
        let values = schema.enum_values(column).ok_or_else(|| {
            SnapshotError::ddl(
                &column.name,
                format!(
                    "enum type '{}' has no values",
                    column.enum_name.as_deref().unwrap_or_default()
                ),
            )
        })?;
        let quoted: Vec<String> = values.iter().map(|v| self.quoter.quote_literal(v)).collect();
        Ok(TypeMapping::lossless(format!("ENUM({})", quoted.join(","))))
    }
}

impl Dialect for MysqlDialect {
    fn name(&self) -> &str {
        "mysql"
    }

    fn quoter(&self) -> &dyn Quoter {
        &self.quoter
    }

    fn map_type(&self, column: &Column, schema: &Schema) -> Result<TypeMapping> {
        if column.enum_name.is_some() {
            return self.inline_enum(column, schema);
        }
        Ok(match schema.database_type {
            Engine::Mysql => self.map_native(column),
            Engine::Postgres => self.map_from_postgres(column),
        })
    }

    fn column_definition(&self, column: &Column, schema: &Schema) -> Result<String> {
        let mapping = self.map_type(column, schema)?;
        if let Some(warning) = &mapping.warning {
            warn!("Column '{}': {}", column.name, warning);
        }
        let target_type = mapping.target_type;

        let mut def = format!("{} {}", self.quoter.quote_ident(&column.name)?, target_type);
        if !column.nullable {
            def.push_str(" NOT NULL");
        }

        match &column.default {
            ColumnDefault::Sequence(name) => {
                if is_integer_type(&target_type) {
                    def.push_str(" AUTO_INCREMENT");
                } else {
                    warn!(
                        "Column '{}' uses sequence '{}' but type {} cannot auto-increment; default dropped",
                        column.name, name, target_type
                    );
                }
            }
            ColumnDefault::Literal(v) if target_type == "tinyint(1)" => {
                if let Some(b) = crate::codec::parse_bool(v) {
                    def.push_str(if b { " DEFAULT 1" } else { " DEFAULT 0" });
                }
            }
            ColumnDefault::Literal(v) if forbids_literal_default(&target_type) => {
                def.push_str(&format!(" DEFAULT ({})", self.quoter.quote_literal(v)));
            }
            _ => {
                if let Some(clause) =
                    self.default_clause(column, &target_type, schema.database_type)
                {
                    def.push_str(&clause);
                }
            }
        }
        Ok(def)
    }

    fn create_enum_sql(&self, _enum_type: &EnumType) -> Result<Option<String>> {
        Ok(None)
    }

    fn truncate_sql(&self, table: &str) -> Result<String> {
        Ok(format!("TRUNCATE TABLE {}", self.quoter.quote_ident(table)?))
    }

    fn table_options(&self) -> &str {
        TABLE_OPTIONS
    }

    fn unique_keyword(&self) -> &str {
        "UNIQUE KEY"
    }

    fn translate_expression(&self, expr: &str, source: Engine, target_type: &str) -> Option<String> {
        let trimmed = expr.trim();
        let lower = trimmed.to_ascii_lowercase();

        if source == Engine::Mysql {
            if lower.starts_with("current_timestamp") || trimmed.starts_with('(') {
                return Some(trimmed.to_string());
            }
            return Some(format!("({})", trimmed));
        }

        let bare = lower.trim_start_matches('(').trim_end_matches(')');
        let temporal = target_type.starts_with("datetime") || target_type.starts_with("timestamp");
        if bare.starts_with("now(")
            || bare.starts_with("current_timestamp")
            || bare.starts_with("localtimestamp")
            || bare.contains("now()")
        {
            if !temporal {
                return None;
            }
            return Some(if target_type.ends_with("(6)") {
                "CURRENT_TIMESTAMP(6)".into()
            } else {
                "CURRENT_TIMESTAMP".into()
            });
        }
        match bare {
            "current_date" => Some("(CURRENT_DATE)".into()),
            "gen_random_uuid(" | "uuid_generate_v4(" => Some("(UUID())".into()),
            "true" => Some("1".into()),
            "false" => Some("0".into()),
            _ => None,
        }
    }
}

fn is_integer_type(target_type: &str) -> bool {
    let (base, _) = split_type(target_type);
    let base = base.trim_end_matches(" unsigned");
    matches!(base, "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "bigint")
}

/// BLOB, TEXT, and JSON columns accept only parenthesized expression defaults.
fn forbids_literal_default(target_type: &str) -> bool {
    let t = target_type.to_ascii_lowercase();
    t.ends_with("text") || t.ends_with("blob") || t == "json"
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
    fn test_postgres_types_mapped() {
        let d = MysqlDialect::new();
        let cases = [
            ("integer", "int"),
            ("bigint", "bigint"),
            ("boolean", "tinyint(1)"),
            ("numeric(12,4)", "decimal(12,4)"),
            ("double precision", "double"),
            ("timestamp without time zone", "datetime(6)"),
            ("jsonb", "json"),
            ("uuid", "char(36)"),
            ("bytea", "longblob"),
            ("text", "longtext"),
        ];
        for (source, expected) in cases {
            let col = Column::new("c", source);
            assert_eq!(
                d.map_type(&col, &pg_schema()).unwrap().target_type,
                expected,
                "mapping {}",
                source
            );
        }
    }

    #[test]
    fn test_lossy_postgres_mappings() {
        let d = MysqlDialect::new();
        let tags = d.map_type(&Column::new("tags", "text[]"), &pg_schema()).unwrap();
        assert_eq!(tags.target_type, "json");
        assert!(tags.is_lossy);
        let any = d.map_type(&Column::new("n", "numeric"), &pg_schema()).unwrap();
        assert_eq!(any.target_type, "decimal(65,30)");
        assert!(any.is_lossy);
        let keyed = d
            .map_type(&Column::new("slug", "text").unique(), &pg_schema())
            .unwrap();
        assert_eq!(keyed.target_type, "varchar(255)");
    }

    #[test]
    fn test_varchar_length() {
        let d = MysqlDialect::new();
        let col = Column::new("name", "character varying").with_max_length(64);
        assert_eq!(d.map_type(&col, &pg_schema()).unwrap().target_type, "varchar(64)");
        let col = Column::new("name", "character varying");
        assert_eq!(d.map_type(&col, &pg_schema()).unwrap().target_type, "varchar(255)");
        let col = Column::new("name", "varchar").with_max_length(20);
        assert_eq!(
            d.map_type(&col, &Schema::new(Engine::Mysql)).unwrap().target_type,
            "varchar(20)"
        );
    }

    #[test]
    fn test_enum_is_inlined() {
        let d = MysqlDialect::new();
        let mut schema = pg_schema();
        schema.enums.push(EnumType {
            name: "status".into(),
            values: vec!["active".into(), "o'neil".into()],
        });
        let col = Column::new("status", "enum").with_enum("status", vec![]);
        assert_eq!(
            d.map_type(&col, &schema).unwrap().target_type,
            "ENUM('active','o''neil')"
        );
        let orphan = Column::new("kind", "enum").with_enum("missing", vec![]);
        assert!(d.map_type(&orphan, &schema).is_err());
    }

    // =========================================================================
    // Column definition tests
    // =========================================================================

    #[test]
    fn test_sequence_becomes_auto_increment() {
        let d = MysqlDialect::new();
        let col = Column::new("id", "integer")
            .primary()
            .with_default(ColumnDefault::Sequence("users_id_seq".into()));
        assert_eq!(
            d.column_definition(&col, &pg_schema()).unwrap(),
            "`id` int NOT NULL AUTO_INCREMENT"
        );
    }

    #[test]
    fn test_defaults_translated_from_postgres() {
        let d = MysqlDialect::new();
        let col = Column::new("created_at", "timestamp without time zone")
            .with_default(ColumnDefault::Expression("now()".into()));
        assert_eq!(
            d.column_definition(&col, &pg_schema()).unwrap(),
            "`created_at` datetime(6) DEFAULT CURRENT_TIMESTAMP(6)"
        );
        let col = Column::new("active", "boolean")
            .not_null()
            .with_default(ColumnDefault::Literal("true".into()));
        assert_eq!(
            d.column_definition(&col, &pg_schema()).unwrap(),
            "`active` tinyint(1) NOT NULL DEFAULT 1"
        );
        let col = Column::new("meta", "jsonb").with_default(ColumnDefault::Literal("{}".into()));
        assert_eq!(
            d.column_definition(&col, &pg_schema()).unwrap(),
            "`meta` json DEFAULT ('{}')"
        );
        let col = Column::new("x", "integer")
            .with_default(ColumnDefault::Expression("nextval_custom()".into()));
        assert_eq!(d.column_definition(&col, &pg_schema()).unwrap(), "`x` int");
    }

    #[test]
    fn test_mysql_expressions_pass_through() {
        let d = MysqlDialect::new();
        let schema = Schema::new(Engine::Mysql);
        let col = Column::new("at", "datetime")
            .with_default(ColumnDefault::Expression("CURRENT_TIMESTAMP".into()));
        assert_eq!(
            d.column_definition(&col, &schema).unwrap(),
            "`at` datetime DEFAULT CURRENT_TIMESTAMP"
        );
        let col = Column::new("token", "char(36)")
            .with_default(ColumnDefault::Expression("uuid()".into()));
        assert_eq!(
            d.column_definition(&col, &schema).unwrap(),
            "`token` char(36) DEFAULT (uuid())"
        );
    }

    // =========================================================================
    // Statement tests
    // =========================================================================

    #[test]
    fn test_create_table_sql() {
        let d = MysqlDialect::new();
        let mut table = Table::new("users");
        table.columns.push(
            Column::new("id", "integer")
                .primary()
                .with_default(ColumnDefault::Sequence("users_id_seq".into())),
        );
        table
            .columns
            .push(Column::new("email", "character varying").with_max_length(120).unique());
        let sql = d.create_table_sql(&table, &pg_schema()).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE `users` (\n  `id` int NOT NULL AUTO_INCREMENT,\n  `email` varchar(120),\n  \
             PRIMARY KEY (`id`),\n  UNIQUE KEY (`email`)\n) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 \
             COLLATE=utf8mb4_unicode_ci"
        );
    }

    #[test]
    fn test_statements() {
        let d = MysqlDialect::new();
        let e = EnumType {
            name: "status".into(),
            values: vec!["a".into()],
        };
        assert!(d.create_enum_sql(&e).unwrap().is_none());
        assert_eq!(d.truncate_sql("users").unwrap(), "TRUNCATE TABLE `users`");
        let fk = ForeignKey {
            table: "users".into(),
            column: "id".into(),
        };
        assert_eq!(
            d.add_foreign_key_sql("posts", "user_id", &fk).unwrap(),
            "ALTER TABLE `posts` ADD CONSTRAINT `posts_user_id_fkey` FOREIGN KEY (`user_id`) \
             REFERENCES `users` (`id`)"
        );
    }
}
