//! Schema model: tables, columns, foreign keys, and enum types.
//!
//! The same types are produced by catalog introspection and read back from
//! `schema.json`, so the serialized field names are part of the snapshot format.

use std::collections::HashSet;
use std::fmt;

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SnapshotError};

/// Database engine a schema was captured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    #[default]
    #[serde(alias = "postgresql")]
    Postgres,
    Mysql,
}

impl Engine {
    /// Engine tag as written to `schema.json`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::Postgres => "postgres",
            Engine::Mysql => "mysql",
        }
    }

    /// Detect the engine from a connection URL scheme.
    pub fn from_url(url: &str) -> Result<Self> {
        let scheme = url.split("://").next().unwrap_or_default().to_lowercase();
        match scheme.as_str() {
            "postgres" | "postgresql" => Ok(Engine::Postgres),
            "mysql" => Ok(Engine::Mysql),
            _ => Err(SnapshotError::Config(format!(
                "unsupported database URL scheme '{}' (expected postgres:// or mysql://)",
                scheme
            ))),
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A complete captured schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    #[serde(default)]
    pub database_type: Engine,
    #[serde(default)]
    pub enums: Vec<EnumType>,
    pub tables: Vec<Table>,
}

impl Schema {
    pub fn new(database_type: Engine) -> Self {
        Self {
            database_type,
            enums: Vec::new(),
            tables: Vec::new(),
        }
    }

    /// Find a table by name.
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Find an enum type by name.
    pub fn enum_type(&self, name: &str) -> Option<&EnumType> {
        self.enums.iter().find(|e| e.name == name)
    }

    /// Allowed values for an enum-typed column, preferring the column's own
    /// value list over the named enum.
    pub fn enum_values<'a>(&'a self, column: &'a Column) -> Option<&'a [String]> {
        if let Some(values) = column.values.as_deref() {
            if !values.is_empty() {
                return Some(values);
            }
        }
        column
            .enum_name
            .as_deref()
            .and_then(|name| self.enum_type(name))
            .map(|e| e.values.as_slice())
    }

    /// True if some column in the schema has a foreign key to `table.column`.
    pub fn is_referenced(&self, table: &str, column: &str) -> bool {
        self.tables.iter().any(|t| {
            t.columns.iter().any(|c| {
                c.foreign_key
                    .as_ref()
                    .is_some_and(|fk| fk.table == table && fk.column == column)
            })
        })
    }

    /// Check structural invariants after deserialization.
    ///
    /// Enum columns whose named type is missing but which carry their own value
    /// list get an enum entry synthesized from that list. Anything else that
    /// cannot be resolved is a serialization error.
    pub fn validate(&mut self) -> Result<()> {
        let mut seen = HashSet::new();
        for table in &self.tables {
            if table.name.is_empty() {
                return Err(SnapshotError::Serialization(
                    "table with empty name in schema".into(),
                ));
            }
            if !seen.insert(table.name.as_str()) {
                return Err(SnapshotError::Serialization(format!(
                    "duplicate table name '{}' in schema",
                    table.name
                )));
            }
            let mut cols = HashSet::new();
            for column in &table.columns {
                if !cols.insert(column.name.as_str()) {
                    return Err(SnapshotError::Serialization(format!(
                        "duplicate column '{}' in table '{}'",
                        column.name, table.name
                    )));
                }
            }
        }

        let mut synthesized = Vec::new();
        for table in &self.tables {
            for column in &table.columns {
                let Some(enum_name) = column.enum_name.as_deref() else {
                    continue;
                };
                if self.enum_type(enum_name).is_some()
                    || synthesized.iter().any(|e: &EnumType| e.name == enum_name)
                {
                    continue;
                }
                match column.values.as_ref() {
                    Some(values) if !values.is_empty() => synthesized.push(EnumType {
                        name: enum_name.to_string(),
                        values: values.clone(),
                    }),
                    _ => {
                        return Err(SnapshotError::Serialization(format!(
                            "column {}.{} references unknown enum '{}'",
                            table.name, column.name, enum_name
                        )))
                    }
                }
            }
        }
        self.enums.extend(synthesized);
        Ok(())
    }
}

/// An enumerated type with ordered members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumType {
    pub name: String,
    pub values: Vec<String>,
}

/// Table metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Find a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Primary key columns in declaration order.
    pub fn primary_key(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.is_primary)
    }

    /// Columns carrying a foreign key.
    pub fn foreign_keys(&self) -> impl Iterator<Item = (&Column, &ForeignKey)> {
        self.columns
            .iter()
            .filter_map(|c| c.foreign_key.as_ref().map(|fk| (c, fk)))
    }
}

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub name: String,

    /// Declared type as reported by the source catalog.
    #[serde(rename = "type")]
    pub data_type: String,

    #[serde(default)]
    pub nullable: bool,

    #[serde(default)]
    pub default: ColumnDefault,

    #[serde(default)]
    pub is_primary: bool,

    #[serde(default)]
    pub is_unique: bool,

    #[serde(default)]
    pub foreign_key: Option<ForeignKey>,

    /// Name of the enum type this column uses.
    #[serde(default, rename = "enum")]
    pub enum_name: Option<String>,

    /// Explicit value domain for enum columns.
    #[serde(default)]
    pub values: Option<Vec<String>>,

    /// Character length bound, when the source declares one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            default: ColumnDefault::Null,
            is_primary: false,
            is_unique: false,
            foreign_key: None,
            enum_name: None,
            values: None,
            max_length: None,
        }
    }

    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self.is_unique = true;
        self.nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.is_unique = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_default(mut self, default: ColumnDefault) -> Self {
        self.default = default;
        self
    }

    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.foreign_key = Some(ForeignKey {
            table: table.into(),
            column: column.into(),
        });
        self
    }

    pub fn with_enum(mut self, name: impl Into<String>, values: Vec<String>) -> Self {
        self.data_type = "enum".into();
        self.enum_name = Some(name.into());
        self.values = Some(values);
        self
    }

    pub fn with_max_length(mut self, len: u32) -> Self {
        self.max_length = Some(len);
        self
    }

    /// True if values must be unique within the table.
    pub fn requires_unique(&self) -> bool {
        self.is_primary || self.is_unique
    }
}

/// Directed foreign key edge owned by the referencing column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKey {
    pub table: String,
    pub column: String,
}

/// Column default, classified once when the schema is built.
///
/// In `schema.json` a default is stored as its SQL text (or `null`) when that
/// text classifies back to the same variant. Anything else, such as an
/// expression that reads like a literal (`42`, `'x'::text`), is stored tagged
/// as `{"expression": "..."}` so the variant survives the round trip.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ColumnDefault {
    #[default]
    Null,
    /// A constant value, unquoted and unescaped.
    Literal(String),
    /// A sequence or auto-increment generator, by sequence name.
    Sequence(String),
    /// Any other SQL expression, kept verbatim.
    Expression(String),
}

impl ColumnDefault {
    /// Classify PostgreSQL-style default text.
    pub fn from_sql_text(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return ColumnDefault::Null;
        }

        let upper = trimmed.to_ascii_uppercase();
        if upper == "NULL" || upper.starts_with("NULL::") {
            return ColumnDefault::Null;
        }

        if upper.starts_with("NEXTVAL(") {
            if let Some(name) = quoted_prefix(&trimmed["nextval(".len()..]) {
                return ColumnDefault::Sequence(name);
            }
            return ColumnDefault::Expression(trimmed.to_string());
        }

        if trimmed.starts_with('\'') {
            if let Some((value, rest)) = split_quoted(trimmed) {
                if rest.is_empty() || rest.starts_with("::") {
                    return ColumnDefault::Literal(value);
                }
            }
            return ColumnDefault::Expression(trimmed.to_string());
        }

        let unwrapped = trimmed
            .strip_prefix('(')
            .and_then(|s| s.strip_suffix(')'))
            .unwrap_or(trimmed);
        let numeric = unwrapped.split("::").next().unwrap_or(unwrapped);
        if is_numeric_literal(numeric) {
            return ColumnDefault::Literal(numeric.to_string());
        }

        ColumnDefault::Expression(trimmed.to_string())
    }

    /// Render as SQL text in the form accepted by [`ColumnDefault::from_sql_text`].
    pub fn to_sql_text(&self) -> Option<String> {
        match self {
            ColumnDefault::Null => None,
            ColumnDefault::Literal(v) if is_numeric_literal(v) => Some(v.clone()),
            ColumnDefault::Literal(v) => Some(format!("'{}'", v.replace('\'', "''"))),
            ColumnDefault::Sequence(name) => Some(format!(
                "nextval('{}'::regclass)",
                name.replace('\'', "''")
            )),
            ColumnDefault::Expression(e) => Some(e.clone()),
        }
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self, ColumnDefault::Sequence(_))
    }
}

impl Serialize for ColumnDefault {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let Some(text) = self.to_sql_text() else {
            return serializer.serialize_none();
        };
        if ColumnDefault::from_sql_text(&text) == *self {
            return serializer.serialize_str(&text);
        }
        let (tag, value) = match self {
            ColumnDefault::Null => return serializer.serialize_none(),
            ColumnDefault::Literal(v) => ("literal", v),
            ColumnDefault::Sequence(v) => ("sequence", v),
            ColumnDefault::Expression(v) => ("expression", v),
        };
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(tag, value)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for ColumnDefault {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct DefaultVisitor;

        impl<'de> Visitor<'de> for DefaultVisitor {
            type Value = ColumnDefault;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a default expression string, tagged default, number, boolean, or null")
            }

            fn visit_none<E: de::Error>(self) -> std::result::Result<Self::Value, E> {
                Ok(ColumnDefault::Null)
            }

            fn visit_unit<E: de::Error>(self) -> std::result::Result<Self::Value, E> {
                Ok(ColumnDefault::Null)
            }

            fn visit_some<D: Deserializer<'de>>(
                self,
                deserializer: D,
            ) -> std::result::Result<Self::Value, D::Error> {
                deserializer.deserialize_any(self)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Self::Value, E> {
                Ok(ColumnDefault::from_sql_text(v))
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<Self::Value, E> {
                Ok(ColumnDefault::Expression(v.to_string()))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Self::Value, E> {
                Ok(ColumnDefault::Literal(v.to_string()))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Self::Value, E> {
                Ok(ColumnDefault::Literal(v.to_string()))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Self::Value, E> {
                Ok(ColumnDefault::Literal(v.to_string()))
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                const TAGS: &[&str] = &["literal", "sequence", "expression"];
                let Some((tag, value)) = map.next_entry::<String, String>()? else {
                    return Ok(ColumnDefault::Null);
                };
                if let Some((extra, _)) = map.next_entry::<String, de::IgnoredAny>()? {
                    return Err(de::Error::unknown_field(&extra, TAGS));
                }
                match tag.as_str() {
                    "literal" => Ok(ColumnDefault::Literal(value)),
                    "sequence" => Ok(ColumnDefault::Sequence(value)),
                    "expression" => Ok(ColumnDefault::Expression(value)),
                    other => Err(de::Error::unknown_field(other, TAGS)),
                }
            }
        }

        deserializer.deserialize_option(DefaultVisitor)
    }
}

/// Parse a leading `'...'` and return the unescaped content plus the remainder.
fn split_quoted(text: &str) -> Option<(String, &str)> {
    let body = text.strip_prefix('\'')?;
    let mut value = String::new();
    let mut chars = body.char_indices().peekable();
    while let Some((idx, ch)) = chars.next() {
        if ch == '\'' {
            if matches!(chars.peek(), Some((_, '\''))) {
                value.push('\'');
                chars.next();
                continue;
            }
            return Some((value, &body[idx + 1..]));
        }
        value.push(ch);
    }
    None
}

fn quoted_prefix(text: &str) -> Option<String> {
    split_quoted(text.trim_start()).map(|(v, _)| v)
}

fn is_numeric_literal(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    !digits.is_empty()
        && digits.chars().any(|c| c.is_ascii_digit())
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && digits.matches('.').count() <= 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schema() -> Schema {
        let mut schema = Schema::new(Engine::Postgres);
        schema.enums.push(EnumType {
            name: "status".into(),
            values: vec!["active".into(), "inactive".into(), "pending".into()],
        });
        let mut users = Table::new("users");
        users.columns.push(
            Column::new("id", "integer")
                .primary()
                .with_default(ColumnDefault::Sequence("users_id_seq".into())),
        );
        users.columns.push(
            Column::new("email", "character varying")
                .unique()
                .not_null()
                .with_max_length(255),
        );
        users.columns.push(
            Column::new("status", "enum")
                .with_enum("status", vec![])
                .with_default(ColumnDefault::Literal("active".into())),
        );
        users.columns.push(
            Column::new("created_at", "timestamp with time zone")
                .with_default(ColumnDefault::Expression("now()".into())),
        );
        let mut posts = Table::new("posts");
        posts.columns.push(Column::new("id", "integer").primary());
        posts
            .columns
            .push(Column::new("user_id", "integer").references("users", "id"));
        schema.tables.push(users);
        schema.tables.push(posts);
        schema
    }

    // =========================================================================
    // Default classification tests
    // =========================================================================

    #[test]
    fn test_default_classifies_sequence() {
        assert_eq!(
            ColumnDefault::from_sql_text("nextval('users_id_seq'::regclass)"),
            ColumnDefault::Sequence("users_id_seq".into())
        );
    }

    #[test]
    fn test_default_classifies_literals() {
        assert_eq!(
            ColumnDefault::from_sql_text("'active'::status"),
            ColumnDefault::Literal("active".into())
        );
        assert_eq!(
            ColumnDefault::from_sql_text("'it''s'::character varying"),
            ColumnDefault::Literal("it's".into())
        );
        assert_eq!(
            ColumnDefault::from_sql_text("42"),
            ColumnDefault::Literal("42".into())
        );
        assert_eq!(
            ColumnDefault::from_sql_text("(-1)"),
            ColumnDefault::Literal("-1".into())
        );
        assert_eq!(
            ColumnDefault::from_sql_text("0.5::numeric"),
            ColumnDefault::Literal("0.5".into())
        );
    }

    #[test]
    fn test_default_classifies_null_and_expressions() {
        assert_eq!(ColumnDefault::from_sql_text("NULL"), ColumnDefault::Null);
        assert_eq!(
            ColumnDefault::from_sql_text("NULL::character varying"),
            ColumnDefault::Null
        );
        assert_eq!(
            ColumnDefault::from_sql_text("now()"),
            ColumnDefault::Expression("now()".into())
        );
        assert_eq!(
            ColumnDefault::from_sql_text("true"),
            ColumnDefault::Expression("true".into())
        );
        assert_eq!(
            ColumnDefault::from_sql_text("'a'::text || 'b'::text"),
            ColumnDefault::Expression("'a'::text || 'b'::text".into())
        );
    }

    #[test]
    fn test_default_text_round_trip() {
        let cases = vec![
            ColumnDefault::Null,
            ColumnDefault::Literal("active".into()),
            ColumnDefault::Literal("it's".into()),
            ColumnDefault::Literal("7".into()),
            ColumnDefault::Sequence("orders_id_seq".into()),
            ColumnDefault::Expression("CURRENT_TIMESTAMP".into()),
        ];
        for case in cases {
            let json = serde_json::to_string(&case).unwrap();
            let back: ColumnDefault = serde_json::from_str(&json).unwrap();
            assert_eq!(back, case, "round trip through {}", json);
        }
    }

    #[test]
    fn test_default_round_trip_keeps_literal_looking_expressions() {
        let cases = vec![
            ColumnDefault::Expression("42".into()),
            ColumnDefault::Expression("(5)".into()),
            ColumnDefault::Expression("'x'".into()),
            ColumnDefault::Expression("'x'::text".into()),
            ColumnDefault::Expression("NULL".into()),
            ColumnDefault::Expression("nextval('s'::regclass)".into()),
            ColumnDefault::Literal("".into()),
            ColumnDefault::Literal(" 7 ".into()),
            ColumnDefault::Sequence("it's_seq".into()),
        ];
        for case in cases {
            let json = serde_json::to_string(&case).unwrap();
            let back: ColumnDefault = serde_json::from_str(&json).unwrap();
            assert_eq!(back, case, "round trip through {}", json);
        }
    }

    #[test]
    fn test_default_tags_only_ambiguous_expressions() {
        let plain = serde_json::to_value(ColumnDefault::Expression("now()".into())).unwrap();
        assert_eq!(plain, serde_json::json!("now()"));
        let tagged = serde_json::to_value(ColumnDefault::Expression("42".into())).unwrap();
        assert_eq!(tagged, serde_json::json!({"expression": "42"}));
    }

    #[test]
    fn test_default_rejects_unknown_tag() {
        let err = serde_json::from_str::<ColumnDefault>(r#"{"formula": "1"}"#).unwrap_err();
        assert!(err.to_string().contains("formula"));
    }

    #[test]
    fn test_schema_round_trip_with_tagged_default() {
        let mut schema = sample_schema();
        schema.tables[1].columns[0].default = ColumnDefault::Expression("'x'::text".into());
        let json = serde_json::to_string(&schema).unwrap();
        let back: Schema = serde_json::from_str(&json).unwrap();
        assert_eq!(back, schema);
    }

    #[test]
    fn test_default_accepts_json_scalars() {
        let v: ColumnDefault = serde_json::from_str("5").unwrap();
        assert_eq!(v, ColumnDefault::Literal("5".into()));
        let v: ColumnDefault = serde_json::from_str("null").unwrap();
        assert_eq!(v, ColumnDefault::Null);
        let v: ColumnDefault = serde_json::from_str("false").unwrap();
        assert_eq!(v, ColumnDefault::Expression("false".into()));
    }

    // =========================================================================
    // Schema serialization tests
    // =========================================================================

    #[test]
    fn test_schema_round_trip() {
        let schema = sample_schema();
        let json = serde_json::to_string_pretty(&schema).unwrap();
        let back: Schema = serde_json::from_str(&json).unwrap();
        assert_eq!(back, schema);
    }

    #[test]
    fn test_schema_json_field_names() {
        let json = serde_json::to_value(sample_schema()).unwrap();
        assert_eq!(json["databaseType"], "postgres");
        let col = &json["tables"][1]["columns"][1];
        assert_eq!(col["foreignKey"]["table"], "users");
        assert_eq!(col["isPrimary"], false);
        assert!(col["enum"].is_null());
        assert_eq!(json["tables"][0]["columns"][0]["default"], "nextval('users_id_seq'::regclass)");
        assert_eq!(json["tables"][0]["columns"][1]["maxLength"], 255);
        assert!(json["tables"][0]["columns"][0].get("maxLength").is_none());
    }

    #[test]
    fn test_schema_reads_minimal_document() {
        let doc = r#"{"databaseType":"mysql","tables":[{"name":"t","columns":[
            {"name":"id","type":"int","nullable":false,"default":null,"isPrimary":true,
             "isUnique":false,"foreignKey":null,"enum":null,"values":null}]}]}"#;
        let schema: Schema = serde_json::from_str(doc).unwrap();
        assert_eq!(schema.database_type, Engine::Mysql);
        assert!(schema.enums.is_empty());
        assert!(schema.tables[0].columns[0].is_primary);
    }

    // =========================================================================
    // Validation tests
    // =========================================================================

    #[test]
    fn test_validate_rejects_duplicate_tables() {
        let mut schema = sample_schema();
        schema.tables.push(Table::new("users"));
        let err = schema.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate table"));
    }

    #[test]
    fn test_validate_synthesizes_enum_from_column_values() {
        let mut schema = Schema::new(Engine::Mysql);
        let mut t = Table::new("orders");
        t.columns.push(Column::new("state", "enum").with_enum(
            "orders_state_enum",
            vec!["open".into(), "closed".into()],
        ));
        schema.tables.push(t);
        schema.validate().unwrap();
        assert_eq!(schema.enums.len(), 1);
        assert_eq!(schema.enums[0].values, vec!["open", "closed"]);
    }

    #[test]
    fn test_validate_rejects_unresolvable_enum() {
        let mut schema = Schema::new(Engine::Postgres);
        let mut t = Table::new("orders");
        t.columns
            .push(Column::new("state", "enum").with_enum("missing", vec![]));
        schema.tables.push(t);
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_enum_values_prefers_column_domain() {
        let schema = sample_schema();
        let status = schema.tables[0].column("status").unwrap();
        assert_eq!(
            schema.enum_values(status).unwrap(),
            &["active".to_string(), "inactive".into(), "pending".into()]
        );
        assert!(schema.is_referenced("users", "id"));
        assert!(!schema.is_referenced("users", "email"));
    }

    #[test]
    fn test_engine_from_url() {
        assert_eq!(Engine::from_url("postgres://u@h/db").unwrap(), Engine::Postgres);
        assert_eq!(Engine::from_url("postgresql://u@h/db").unwrap(), Engine::Postgres);
        assert_eq!(Engine::from_url("mysql://u@h/db").unwrap(), Engine::Mysql);
        assert!(Engine::from_url("sqlite://x").is_err());
    }
}
